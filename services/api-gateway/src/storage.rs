//! Attachment storage on the local filesystem.
//!
//! Uploads are written under the configured directory with a random
//! stored name; the original file name is kept only in the database.

use mrf_database::StoredFile;
use mrf_utils::{file_extension, sanitize_file_name, MrfError, MrfResult};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AttachmentStorage {
    root: PathBuf,
}

impl AttachmentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save(&self, file_name: &str, content_type: &str, data: &[u8]) -> MrfResult<StoredFile> {
        tokio::fs::create_dir_all(&self.root).await?;

        let file_name = sanitize_file_name(file_name);
        let extension = file_extension(&file_name);
        let stored_name = if extension.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{}.{}", Uuid::new_v4(), extension)
        };

        tokio::fs::write(self.root.join(&stored_name), data).await?;
        tracing::debug!(stored_name = %stored_name, size = data.len(), "Stored attachment");

        Ok(StoredFile {
            file_name,
            stored_name,
            content_type: content_type.to_string(),
            file_size: data.len() as i64,
        })
    }

    pub async fn read(&self, stored_name: &str) -> MrfResult<Vec<u8>> {
        match tokio::fs::read(self.path_of(stored_name)).await {
            Ok(data) => Ok(data),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(MrfError::not_found("Attachment file"))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Best effort: missing files are logged and skipped.
    pub async fn remove_all(&self, stored_names: &[String]) -> usize {
        let mut removed = 0;
        for name in stored_names {
            match tokio::fs::remove_file(self.path_of(name)).await {
                Ok(()) => removed += 1,
                Err(error) => {
                    tracing::warn!(stored_name = %name, error = %error, "Failed to remove attachment file")
                }
            }
        }
        removed
    }

    fn path_of(&self, stored_name: &str) -> PathBuf {
        self.root.join(sanitize_file_name(stored_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> AttachmentStorage {
        AttachmentStorage::new(std::env::temp_dir().join(format!("mrf-storage-{}", Uuid::new_v4())))
    }

    #[tokio::test]
    async fn test_save_read_and_remove() {
        let storage = temp_storage();
        let stored = storage
            .save("quote.pdf", "application/pdf", b"%PDF-1.4")
            .await
            .unwrap();

        assert_eq!(stored.file_name, "quote.pdf");
        assert!(stored.stored_name.ends_with(".pdf"));
        assert_ne!(stored.stored_name, "quote.pdf");
        assert_eq!(stored.file_size, 8);
        assert_eq!(storage.read(&stored.stored_name).await.unwrap(), b"%PDF-1.4");

        let removed = storage
            .remove_all(&[stored.stored_name.clone(), "missing.pdf".to_string()])
            .await;
        assert_eq!(removed, 1);
        assert!(storage.read(&stored.stored_name).await.is_err());

        tokio::fs::remove_dir_all(storage.root()).await.ok();
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let err = temp_storage().read("gone.pdf").await.unwrap_err();
        assert_eq!(err.http_status_code(), 404);
    }

    #[tokio::test]
    async fn test_stored_names_stay_inside_root() {
        let storage = temp_storage();
        let path = storage.path_of("../../etc/passwd");
        assert!(path.starts_with(storage.root()));
    }
}
