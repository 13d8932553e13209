use crate::error::{MrfError, MrfResult};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

pub const ATTACHMENT_TYPES: &[&str] = &["jpg", "jpeg", "png", "gif", "pdf"];
pub const QUOTATION_TYPES: &[&str] = &["pdf"];
pub const IMPORT_TYPES: &[&str] = &["xlsx", "xls", "csv"];

pub fn validate_model<T: Validate>(model: &T) -> MrfResult<()> {
    match model.validate() {
        Ok(()) => Ok(()),
        Err(errors) => Err(MrfError::validation_list(format_validation_errors(&errors))),
    }
}

/// Validates each element, prefixing messages with the 1-based position.
pub fn validate_each<T: Validate>(label: &str, items: &[T]) -> MrfResult<()> {
    let messages: Vec<String> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| item.validate().err().map(|e| (i, e)))
        .flat_map(|(i, errors)| {
            format_validation_errors(&errors)
                .into_iter()
                .map(move |m| format!("{} {}: {}", label, i + 1, m))
        })
        .collect();

    if messages.is_empty() {
        Ok(())
    } else {
        Err(MrfError::validation_list(messages))
    }
}

/// Flattens validator errors into user-facing messages, preferring the
/// message declared on the field.
pub fn format_validation_errors(errors: &ValidationErrors) -> Vec<String> {
    let mut messages = Vec::new();
    collect_messages(errors, &mut messages);
    messages.sort();
    messages
}

fn collect_messages(errors: &ValidationErrors, messages: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = match &error.message {
                        Some(message) => message.to_string(),
                        None => match error.code.as_ref() {
                            "email" => "Invalid email format".to_string(),
                            "length" => format!("Invalid length for field '{}'", field),
                            "range" => format!("Value out of range for field '{}'", field),
                            "required" => format!("Field '{}' is required", field),
                            code => format!("Validation failed for field '{}': {}", field, code),
                        },
                    };
                    messages.push(message);
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_messages(nested, messages),
            ValidationErrorsKind::List(items) => {
                for nested in items.values() {
                    collect_messages(nested, messages);
                }
            }
        }
    }
}

pub fn validate_email_address(email: &str) -> MrfResult<()> {
    if !validator::validate_email(email.trim()) {
        return Err(MrfError::validation("Valid email is required"));
    }
    Ok(())
}

pub fn file_extension(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}

pub fn validate_file_type(file_name: &str, allowed_types: &[&str]) -> MrfResult<()> {
    let extension = file_extension(file_name);

    if !allowed_types.contains(&extension.as_str()) {
        return Err(MrfError::validation(format!(
            "File type '{}' not allowed. Allowed types: {}",
            extension,
            allowed_types.join(", ")
        )));
    }

    Ok(())
}

pub fn validate_file_size(file_size: u64, max_size: u64) -> MrfResult<()> {
    if file_size > max_size {
        return Err(MrfError::validation(format!(
            "File size {} bytes exceeds maximum allowed size {} bytes",
            file_size, max_size
        )));
    }

    Ok(())
}

pub fn validate_date_range(
    from: Option<chrono::NaiveDate>,
    to: Option<chrono::NaiveDate>,
) -> MrfResult<()> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(MrfError::validation("Start date must not be after end date"));
        }
    }
    Ok(())
}

/// Strips path components and characters unsafe in stored file names.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.chars().take(120).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrf_models::{InventoryItem, RegisterUser};

    #[test]
    fn test_validate_model_uses_declared_messages() {
        let user = RegisterUser {
            email: "ada@example.com".into(),
            password: "abc".into(),
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            user_code: None,
            designation: None,
            department: None,
            location: None,
        };
        match validate_model(&user) {
            Err(MrfError::Validation { messages }) => {
                assert_eq!(messages, vec!["Password must be at least 6 characters".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_each_prefixes_position() {
        let items: Vec<InventoryItem> = serde_json::from_str(
            r#"[{"material_description":"Gasket","quantity":1},
                {"material_description":"","quantity":2}]"#,
        )
        .unwrap();
        match validate_each("Item", &items) {
            Err(MrfError::Validation { messages }) => {
                assert_eq!(messages, vec!["Item 2: Material description is required".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_email_address() {
        assert!(validate_email_address("test@example.com").is_ok());
        assert!(validate_email_address("invalid-email").is_err());
        assert!(validate_email_address("@example").is_err());
    }

    #[test]
    fn test_validate_file_type() {
        assert!(validate_file_type("quote.PDF", QUOTATION_TYPES).is_ok());
        assert!(validate_file_type("photo.jpeg", ATTACHMENT_TYPES).is_ok());
        assert!(validate_file_type("quote.docx", QUOTATION_TYPES).is_err());
        assert!(validate_file_type("tracker.xlsx", IMPORT_TYPES).is_ok());
        assert!(validate_file_type("no_extension", IMPORT_TYPES).is_err());
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(5 * 1024 * 1024, 5 * 1024 * 1024).is_ok());
        assert!(validate_file_size(5 * 1024 * 1024 + 1, 5 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(r"C:\docs\quote 1.pdf"), "quote_1.pdf");
        assert_eq!(sanitize_file_name("..."), "file");
    }
}
