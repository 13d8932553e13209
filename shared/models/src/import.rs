//! Spreadsheet import jobs and the requests they carry.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What to do when an imported MRF number already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateStrategy {
    #[default]
    Skip,
    Overwrite,
}

impl DuplicateStrategy {
    pub fn parse(input: Option<&str>) -> Self {
        match input.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("overwrite") => DuplicateStrategy::Overwrite,
            _ => DuplicateStrategy::Skip,
        }
    }
}

/// One problem found while importing, tied to a spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRowError {
    /// 1-based sheet row, header included.
    pub row: usize,
    pub mrf_number: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedLine {
    pub material_description: String,
    pub quantity: f64,
    pub quantity_unit: String,
}

/// Request assembled from the rows sharing one MRF number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedRequest {
    pub mrf_number: String,
    pub request_date: NaiveDate,
    pub asset: String,
    pub reason: String,
    pub service_material: String,
    pub discipline: String,
    pub status_notes: Option<String>,
    pub call_off_number: Option<String>,
    pub remarks: Option<String>,
    pub lines: Vec<ImportedLine>,
    /// First sheet row the request came from.
    pub source_row: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ImportJob {
    pub id: Uuid,
    pub file_name: String,
    pub imported_by: Option<Uuid>,
    pub status: String,
    pub duplicate_strategy: String,
    pub mapping_used: serde_json::Value,
    pub total_rows: i32,
    pub successful_rows: i32,
    pub failed_rows: i32,
    pub error_log: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

pub const IMPORT_STATUS_PROCESSING: &str = "processing";
pub const IMPORT_STATUS_COMPLETED: &str = "completed";
pub const IMPORT_STATUS_FAILED: &str = "failed";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub job_id: Uuid,
    pub total_rows: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<ImportRowError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_strategy_parse() {
        assert_eq!(DuplicateStrategy::parse(None), DuplicateStrategy::Skip);
        assert_eq!(DuplicateStrategy::parse(Some("Overwrite ")), DuplicateStrategy::Overwrite);
        assert_eq!(DuplicateStrategy::parse(Some("merge")), DuplicateStrategy::Skip);
    }
}
