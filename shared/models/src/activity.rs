use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

string_enum! {
    /// User actions recorded in the activity log.
    pub enum ActivityAction {
        Register => "REGISTER",
        Login => "LOGIN",
        Logout => "LOGOUT",
        ProfileUpdated => "PROFILE_UPDATED",
        PasswordChanged => "PASSWORD_CHANGED",
        RequestCreated => "REQUEST_CREATED",
        RequestUpdated => "REQUEST_UPDATED",
        RequestDeleted => "REQUEST_DELETED",
        RequestApproved => "REQUEST_APPROVED",
        RequestRejected => "REQUEST_REJECTED",
        RequestRescheduled => "REQUEST_RESCHEDULED",
        AttachmentUploaded => "ATTACHMENT_UPLOADED",
        QuotationReviewed => "QUOTATION_REVIEWED",
        DataImported => "DATA_IMPORTED",
        DataExported => "DATA_EXPORTED",
        ReceiptCreated => "RECEIPT_CREATED",
        DisbursementCreated => "DISBURSEMENT_CREATED",
        UserCreated => "USER_CREATED",
        UserUpdated => "USER_UPDATED",
        PasswordReset => "PASSWORD_RESET",
        DataPurged => "DATA_PURGED",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub action: ActivityAction,
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry to append; the log assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub user_id: Option<Uuid>,
    pub action: ActivityAction,
    pub entity_type: Option<&'static str>,
    pub entity_id: Option<Uuid>,
    pub details: Option<String>,
}

impl NewActivity {
    pub fn new(user_id: Uuid, action: ActivityAction) -> Self {
        Self {
            user_id: Some(user_id),
            action,
            entity_type: None,
            entity_id: None,
            details: None,
        }
    }

    pub fn on(mut self, entity_type: &'static str, entity_id: Uuid) -> Self {
        self.entity_type = Some(entity_type);
        self.entity_id = Some(entity_id);
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub action: Option<String>,
    pub user_id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Counters shown on the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_users_by_role: std::collections::BTreeMap<String, i64>,
    pub requests_by_status: std::collections::BTreeMap<String, i64>,
    pub total_requests: i64,
    pub pending_quotations: i64,
    pub activity_last_24h: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let user = Uuid::new_v4();
        let request = Uuid::new_v4();
        let entry = NewActivity::new(user, ActivityAction::RequestCreated)
            .on("material_request", request)
            .details("Created request LAR-MTCE-001-2025");

        assert_eq!(entry.entity_id, Some(request));
        assert_eq!(entry.action.as_str(), "REQUEST_CREATED");
    }
}
