//! # MRF Tracker Domain Models
//!
//! Core domain types for the material request form (MRF) tracking system.
//! Models derive serde for the HTTP layer and `sqlx::FromRow` for the
//! repositories; string-backed enums are stored as their display text.
//!
//! ## Key Models
//!
//! - **MaterialRequest**: request header with tracking fields and its current workflow stage
//! - **MaterialRequestLine**: one requested material, owned by exactly one request
//! - **WorkflowStage**: the fixed approval path and its next-stage table
//! - **ApprovalHistory**: append-only ledger of stage transitions
//! - **Attachment**: general uploads and vendor quotations with their own status
//! - **Warehouse / InventoryStock**: receipts, disbursements and the stock ledger
//! - **ImportJob**: bookkeeping for spreadsheet imports
//!
//! ## Workflow
//!
//! Stage transitions are planned by pure functions in [`workflow`]; the
//! database layer applies a [`StageTransition`] inside one transaction.

#[macro_use]
mod macros;

pub mod activity;
pub mod analytics;
pub mod attachment;
pub mod import;
pub mod inventory;
pub mod pagination;
pub mod request;
pub mod site;
pub mod user;
pub mod workflow;

#[cfg(test)]
pub mod property_tests;

pub use activity::*;
pub use analytics::*;
pub use attachment::*;
pub use import::*;
pub use inventory::*;
pub use pagination::*;
pub use request::*;
pub use site::*;
pub use user::*;
pub use workflow::*;

use thiserror::Error;

/// Returned when a stored or submitted value does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_enum_text_round_trip() {
        for stage in WorkflowStage::ALL {
            assert_eq!(WorkflowStage::from_str(stage.as_str()).unwrap(), *stage);
        }
        assert_eq!(RequestStatus::from_str("rejected").unwrap(), RequestStatus::Rejected);
        assert!(Criticality::from_str("Urgent").is_err());
    }

    #[test]
    fn test_enums_serialize_as_text() {
        let json = serde_json::to_string(&WorkflowStage::BlanketCheck).unwrap();
        assert_eq!(json, "\"BLANKET_CHECK\"");

        let status: QuotationStatus = serde_json::from_str("\"Not Submitted\"").unwrap();
        assert_eq!(status, QuotationStatus::NotSubmitted);

        let bad: Result<UserRole, _> = serde_json::from_str("\"superuser\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_parse_error_message() {
        let err = AttachmentCategory::from_str("invoice").unwrap_err();
        assert_eq!(err.to_string(), "invalid AttachmentCategory: 'invoice'");
    }
}
