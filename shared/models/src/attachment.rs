//! Files attached to a request, including vendor quotations.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::QuotationStatus;

string_enum! {
    pub enum AttachmentCategory {
        General => "general",
        Quotation => "quotation",
    }
}

string_enum! {
    pub enum AttachmentStatus {
        Uploaded => "uploaded",
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

impl AttachmentCategory {
    pub fn default_status(&self) -> AttachmentStatus {
        match self {
            AttachmentCategory::General => AttachmentStatus::Uploaded,
            AttachmentCategory::Quotation => AttachmentStatus::Pending,
        }
    }

    /// Unknown or missing status input falls back to the category default.
    pub fn status_or_default(&self, input: Option<&str>) -> AttachmentStatus {
        input
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| self.default_status())
    }
}

/// Request-level quotation status after one of its quotations changed.
pub fn request_quotation_status(any_approved: bool, changed_to: AttachmentStatus) -> QuotationStatus {
    if any_approved {
        return QuotationStatus::Approved;
    }
    match changed_to {
        AttachmentStatus::Rejected => QuotationStatus::Rejected,
        _ => QuotationStatus::Pending,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Attachment {
    pub id: Uuid,
    pub request_id: Uuid,
    pub file_name: String,
    pub stored_name: String,
    pub content_type: String,
    pub file_size: i64,
    #[sqlx(try_from = "String")]
    pub category: AttachmentCategory,
    #[sqlx(try_from = "String")]
    pub status: AttachmentStatus,
    pub vendor_name: Option<String>,
    pub quotation_reference: Option<String>,
    pub quotation_amount: Option<f64>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Metadata accompanying an uploaded file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAttachment {
    pub category: Option<String>,
    pub status: Option<String>,
    pub vendor_name: Option<String>,
    pub quotation_reference: Option<String>,
    pub quotation_amount: Option<f64>,
    pub currency: Option<String>,
    pub notes: Option<String>,
}

impl NewAttachment {
    pub fn category(&self) -> AttachmentCategory {
        self.category
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(AttachmentCategory::General)
    }
}

/// Quotation row joined with its request, for the admin review list.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuotationListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub attachment: Attachment,
    pub mrf_number: String,
    pub asset: String,
    pub requester_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotationFilter {
    /// `pending` when absent, `all` for every status.
    pub status: Option<String>,
    pub area: Option<String>,
    pub search: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl QuotationFilter {
    /// Status to filter on; `None` means all.
    pub fn status(&self) -> Option<AttachmentStatus> {
        match self.status.as_deref().map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("all") => None,
            Some(s) => s.parse().ok().or(Some(AttachmentStatus::Pending)),
            None => Some(AttachmentStatus::Pending),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotationStatusUpdate {
    pub status: String,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_defaults_by_category() {
        assert_eq!(
            AttachmentCategory::Quotation.status_or_default(None),
            AttachmentStatus::Pending
        );
        assert_eq!(
            AttachmentCategory::General.status_or_default(Some("weird")),
            AttachmentStatus::Uploaded
        );
        assert_eq!(
            AttachmentCategory::Quotation.status_or_default(Some("Approved")),
            AttachmentStatus::Approved
        );
    }

    #[test]
    fn test_request_quotation_status() {
        assert_eq!(
            request_quotation_status(true, AttachmentStatus::Rejected),
            QuotationStatus::Approved
        );
        assert_eq!(
            request_quotation_status(false, AttachmentStatus::Rejected),
            QuotationStatus::Rejected
        );
        assert_eq!(
            request_quotation_status(false, AttachmentStatus::Pending),
            QuotationStatus::Pending
        );
    }

    #[test]
    fn test_quotation_filter_status() {
        let mut filter = QuotationFilter::default();
        assert_eq!(filter.status(), Some(AttachmentStatus::Pending));
        filter.status = Some("ALL".into());
        assert_eq!(filter.status(), None);
        filter.status = Some("approved".into());
        assert_eq!(filter.status(), Some(AttachmentStatus::Approved));
    }
}
