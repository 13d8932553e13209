//! Approval Workflow
//!
//! Stage map, next-stage table and the pure planning functions that decide
//! what a workflow action does to a request.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

string_enum! {
    /// Named stages of the approval and procurement path.
    pub enum WorkflowStage {
        MrfCreated => "MRF_CREATED",
        MrfApproved => "MRF_APPROVED",
        BlanketCheck => "BLANKET_CHECK",
        QuotationRequested => "QUOTATION_REQUESTED",
        QuotationSubmitted => "QUOTATION_SUBMITTED",
        QuotationApproved => "QUOTATION_APPROVED",
        QuotationAccepted => "QUOTATION_ACCEPTED",
        ProformaSubmitted => "PROFORMA_SUBMITTED",
        ProformaApproved => "PROFORMA_APPROVED",
        Shipped => "SHIPPED",
        ComplianceCheck => "COMPLIANCE_CHECK",
        Received => "RECEIVED",
        Closed => "CLOSED",
        Rejected => "REJECTED",
        Rescheduled => "RESCHEDULED",
    }
}

impl WorkflowStage {
    /// Next stage on approval. `None` for stages outside the table.
    pub fn next(&self) -> Option<WorkflowStage> {
        use WorkflowStage::*;

        match self {
            MrfCreated => Some(MrfApproved),
            MrfApproved => Some(BlanketCheck),
            BlanketCheck => Some(QuotationRequested),
            QuotationRequested => Some(QuotationSubmitted),
            QuotationSubmitted => Some(QuotationApproved),
            QuotationApproved => Some(QuotationAccepted),
            QuotationAccepted => Some(ProformaSubmitted),
            ProformaSubmitted => Some(ProformaApproved),
            ProformaApproved => Some(Shipped),
            Shipped => Some(ComplianceCheck),
            ComplianceCheck => Some(Received),
            Received => Some(Closed),
            Closed | Rejected | Rescheduled => None,
        }
    }

    /// Human readable stage name shown in the UI and in emails.
    pub fn label(&self) -> &'static str {
        use WorkflowStage::*;

        match self {
            MrfCreated => "MRF Created",
            MrfApproved => "MRF Approved",
            BlanketCheck => "Checking Blanket Order",
            QuotationRequested => "Quotation Requested",
            QuotationSubmitted => "Quotation Submitted",
            QuotationApproved => "Quotation Approved",
            QuotationAccepted => "Quotation Accepted",
            ProformaSubmitted => "Pro Forma Invoice Submitted",
            ProformaApproved => "Pro Forma Approved",
            Shipped => "Materials Shipped",
            ComplianceCheck => "Quality Compliance Check",
            Received => "Materials Received",
            Closed => "MRF Closed",
            Rejected => "Rejected",
            Rescheduled => "Rescheduled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStage::Closed | WorkflowStage::Rejected)
    }

    /// Dashboard bucket the stage is counted under.
    pub fn bucket(&self) -> Option<StageBucket> {
        use WorkflowStage::*;

        match self {
            MrfCreated | MrfApproved | BlanketCheck => Some(StageBucket::AwaitingApproval),
            QuotationRequested | QuotationSubmitted | QuotationApproved => {
                Some(StageBucket::AwaitingQuotation)
            }
            Shipped | ComplianceCheck | Received => Some(StageBucket::Delivered),
            Closed => Some(StageBucket::Closed),
            _ => None,
        }
    }
}

/// Dashboard grouping of workflow stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StageBucket {
    AwaitingApproval,
    AwaitingQuotation,
    Delivered,
    Closed,
}

/// Stages an approver with the given level may act on.
pub fn stages_for_approval_level(level: i16) -> &'static [WorkflowStage] {
    use WorkflowStage::*;

    match level {
        1 => &[MrfCreated],
        2 => &[MrfApproved],
        3 | 4 => &[BlanketCheck, QuotationApproved, ProformaSubmitted, ComplianceCheck],
        _ => &[],
    }
}

string_enum! {
    /// Action recorded on an approval history row.
    pub enum ApprovalAction {
        Approved => "APPROVED",
        Rejected => "REJECTED",
        Rescheduled => "RESCHEDULED",
    }
}

string_enum! {
    pub enum ComplianceOutcome {
        Pass => "PASS",
        Fail => "FAIL",
    }
}

/// Which set of approver columns an approval stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproverSlot {
    Supervisor,
    Manager,
    AreaManager,
}

impl ApproverSlot {
    pub fn for_stage(stage: WorkflowStage) -> Option<Self> {
        match stage {
            WorkflowStage::MrfCreated => Some(Self::Supervisor),
            WorkflowStage::MrfApproved => Some(Self::Manager),
            WorkflowStage::BlanketCheck => Some(Self::AreaManager),
            _ => None,
        }
    }

    /// Column prefix shared by `approved_by_*`, `approved_date_*` and `*_comments`.
    pub fn column_suffix(&self) -> &'static str {
        match self {
            Self::Supervisor => "supervisor",
            Self::Manager => "manager",
            Self::AreaManager => "area_manager",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Cannot approve from current stage ({0})")]
    CannotApprove(WorkflowStage),

    #[error("Rejection reason must be at least 10 characters")]
    ReasonTooShort,

    #[error("New date and reason are required to reschedule")]
    RescheduleIncomplete,

    #[error("Status must be PASS or FAIL")]
    InvalidComplianceStatus,

    #[error("Blanket order reference is required")]
    MissingBlanketReference,

    #[error("Request is at stage {actual}, expected {expected}")]
    WrongStage {
        expected: WorkflowStage,
        actual: WorkflowStage,
    },
}

pub const MIN_REJECTION_REASON_LEN: usize = 10;

/// Everything a workflow action changes, decided before touching the database.
#[derive(Debug, Clone, PartialEq)]
pub struct StageTransition {
    pub from: WorkflowStage,
    pub to: WorkflowStage,
    pub action: ApprovalAction,
    pub slot: Option<ApproverSlot>,
    /// Set when the transition records a blanket order on the request.
    pub has_blanket_order: bool,
    pub blanket_order_ref: Option<String>,
    pub comments: Option<String>,
}

impl StageTransition {
    pub fn changes_stage(&self) -> bool {
        self.from != self.to
    }
}

/// Body of `POST /approvals/:id/approve`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub comments: Option<String>,
    #[serde(default)]
    pub has_blanket_order: bool,
    pub blanket_order_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionInput {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleInput {
    pub new_date: Option<NaiveDate>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceInput {
    #[serde(default)]
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlanketOrderInput {
    #[serde(default)]
    pub blanket_order_ref: String,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProformaInput {
    #[serde(default)]
    pub proforma_ref: String,
    pub amount_usd: Option<f64>,
    pub amount_ngn: Option<f64>,
    pub proforma_date: Option<NaiveDate>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Table-driven approval. `BLANKET_CHECK` with a blanket order skips the
/// quotation stages.
pub fn plan_approval(
    current: WorkflowStage,
    decision: &ApprovalDecision,
) -> Result<StageTransition, WorkflowError> {
    let next = current.next().ok_or(WorkflowError::CannotApprove(current))?;
    let blanket = current == WorkflowStage::BlanketCheck && decision.has_blanket_order;

    let to = if blanket {
        WorkflowStage::ProformaSubmitted
    } else {
        next
    };

    Ok(StageTransition {
        from: current,
        to,
        action: ApprovalAction::Approved,
        slot: ApproverSlot::for_stage(current),
        has_blanket_order: blanket,
        blanket_order_ref: if blanket {
            non_blank(decision.blanket_order_ref.as_deref())
        } else {
            None
        },
        comments: non_blank(decision.comments.as_deref()),
    })
}

/// Rejection is allowed from any stage.
pub fn plan_rejection(
    current: WorkflowStage,
    reason: &str,
) -> Result<StageTransition, WorkflowError> {
    let reason = reason.trim();
    if reason.chars().count() < MIN_REJECTION_REASON_LEN {
        return Err(WorkflowError::ReasonTooShort);
    }

    Ok(StageTransition {
        from: current,
        to: WorkflowStage::Rejected,
        action: ApprovalAction::Rejected,
        slot: None,
        has_blanket_order: false,
        blanket_order_ref: None,
        comments: Some(reason.to_string()),
    })
}

pub fn plan_reschedule(
    current: WorkflowStage,
    input: &RescheduleInput,
) -> Result<StageTransition, WorkflowError> {
    let reason = input.reason.trim();
    let date = match input.new_date {
        Some(date) if !reason.is_empty() => date,
        _ => return Err(WorkflowError::RescheduleIncomplete),
    };

    Ok(StageTransition {
        from: current,
        to: current,
        action: ApprovalAction::Rescheduled,
        slot: None,
        has_blanket_order: false,
        blanket_order_ref: None,
        comments: Some(format!("Rescheduled to {}: {}", date, reason)),
    })
}

pub fn plan_compliance(
    current: WorkflowStage,
    input: &ComplianceInput,
) -> Result<StageTransition, WorkflowError> {
    let outcome: ComplianceOutcome = input
        .status
        .parse()
        .map_err(|_| WorkflowError::InvalidComplianceStatus)?;
    expect_stage(current, WorkflowStage::ComplianceCheck)?;

    let (to, action) = match outcome {
        ComplianceOutcome::Pass => (WorkflowStage::Received, ApprovalAction::Approved),
        ComplianceOutcome::Fail => (WorkflowStage::Rejected, ApprovalAction::Rejected),
    };
    let notes = non_blank(input.notes.as_deref()).unwrap_or_else(|| "No notes".to_string());

    Ok(StageTransition {
        from: current,
        to,
        action,
        slot: None,
        has_blanket_order: false,
        blanket_order_ref: None,
        comments: Some(format!("Compliance Check {}: {}", outcome, notes)),
    })
}

pub fn plan_blanket_order(
    current: WorkflowStage,
    input: &BlanketOrderInput,
) -> Result<StageTransition, WorkflowError> {
    expect_stage(current, WorkflowStage::BlanketCheck)?;

    let reference = non_blank(Some(&input.blanket_order_ref))
        .ok_or(WorkflowError::MissingBlanketReference)?;

    Ok(StageTransition {
        from: current,
        to: WorkflowStage::ProformaSubmitted,
        action: ApprovalAction::Approved,
        slot: Some(ApproverSlot::AreaManager),
        has_blanket_order: true,
        comments: Some(format!(
            "Blanket Order Ref: {} - Skipped quotation stage",
            reference
        )),
        blanket_order_ref: Some(reference),
    })
}

pub fn plan_proforma(
    current: WorkflowStage,
    input: &ProformaInput,
) -> Result<StageTransition, WorkflowError> {
    expect_stage(current, WorkflowStage::ProformaSubmitted)?;

    Ok(StageTransition {
        from: current,
        to: WorkflowStage::ProformaApproved,
        action: ApprovalAction::Approved,
        slot: None,
        has_blanket_order: false,
        blanket_order_ref: None,
        comments: non_blank(Some(&input.proforma_ref))
            .map(|reference| format!("Pro forma invoice {} submitted", reference)),
    })
}

fn expect_stage(actual: WorkflowStage, expected: WorkflowStage) -> Result<(), WorkflowError> {
    if actual == expected {
        Ok(())
    } else {
        Err(WorkflowError::WrongStage { expected, actual })
    }
}

/// One row of the approval ledger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ApprovalHistory {
    pub id: Uuid,
    pub request_id: Uuid,
    #[sqlx(try_from = "String")]
    pub from_stage: WorkflowStage,
    #[sqlx(try_from = "String")]
    pub to_stage: WorkflowStage,
    #[sqlx(try_from = "String")]
    pub action: ApprovalAction,
    pub approved_by: Option<Uuid>,
    pub approver_name: Option<String>,
    pub approver_role: Option<String>,
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Query string of `GET /approvals/pending`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingFilter {
    /// Site code (`LAR`, `SAR`, `PHC`) matched against the MRF number prefix.
    pub area: Option<String>,
    pub discipline: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Request as shown in an approver's queue.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingApproval {
    pub id: Uuid,
    pub mrf_number: String,
    pub request_date: NaiveDate,
    pub first_name: String,
    pub last_name: String,
    pub asset: String,
    pub discipline: String,
    pub criticality: String,
    pub reason: String,
    #[sqlx(try_from = "String")]
    pub workflow_stage: WorkflowStage,
    pub line_items_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_stage_chain_ends_at_closed() {
        let mut stage = WorkflowStage::MrfCreated;
        let mut steps = 0;
        while let Some(next) = stage.next() {
            stage = next;
            steps += 1;
        }
        assert_eq!(stage, WorkflowStage::Closed);
        assert_eq!(steps, 12);
    }

    #[test]
    fn test_approve_stamps_stage_specific_slot() {
        let decision = ApprovalDecision::default();

        let plan = plan_approval(WorkflowStage::MrfCreated, &decision).unwrap();
        assert_eq!(plan.to, WorkflowStage::MrfApproved);
        assert_eq!(plan.slot, Some(ApproverSlot::Supervisor));

        let plan = plan_approval(WorkflowStage::MrfApproved, &decision).unwrap();
        assert_eq!(plan.slot, Some(ApproverSlot::Manager));

        let plan = plan_approval(WorkflowStage::Shipped, &decision).unwrap();
        assert_eq!(plan.to, WorkflowStage::ComplianceCheck);
        assert_eq!(plan.slot, None);
    }

    #[test]
    fn test_blanket_order_skips_quotation() {
        let decision = ApprovalDecision {
            comments: Some("  ".into()),
            has_blanket_order: true,
            blanket_order_ref: Some("BO-2291".into()),
        };

        let plan = plan_approval(WorkflowStage::BlanketCheck, &decision).unwrap();
        assert_eq!(plan.to, WorkflowStage::ProformaSubmitted);
        assert!(plan.has_blanket_order);
        assert_eq!(plan.blanket_order_ref.as_deref(), Some("BO-2291"));
        assert_eq!(plan.comments, None);

        // The flag only matters at BLANKET_CHECK.
        let plan = plan_approval(WorkflowStage::MrfApproved, &decision).unwrap();
        assert_eq!(plan.to, WorkflowStage::BlanketCheck);
        assert!(!plan.has_blanket_order);
    }

    #[test]
    fn test_cannot_approve_outside_table() {
        for stage in [
            WorkflowStage::Closed,
            WorkflowStage::Rejected,
            WorkflowStage::Rescheduled,
        ] {
            assert_eq!(
                plan_approval(stage, &ApprovalDecision::default()),
                Err(WorkflowError::CannotApprove(stage))
            );
        }
    }

    #[test]
    fn test_rejection_requires_reason() {
        assert_eq!(
            plan_rejection(WorkflowStage::MrfCreated, "   too short   "),
            Err(WorkflowError::ReasonTooShort)
        );

        let plan = plan_rejection(WorkflowStage::Shipped, "  Wrong part number supplied ").unwrap();
        assert_eq!(plan.to, WorkflowStage::Rejected);
        assert_eq!(plan.action, ApprovalAction::Rejected);
        assert_eq!(plan.comments.as_deref(), Some("Wrong part number supplied"));
    }

    #[test]
    fn test_reschedule_keeps_stage() {
        let input = RescheduleInput {
            new_date: NaiveDate::from_ymd_opt(2025, 3, 14),
            reason: "Vendor holiday".into(),
        };
        let plan = plan_reschedule(WorkflowStage::QuotationRequested, &input).unwrap();
        assert!(!plan.changes_stage());
        assert_eq!(plan.action, ApprovalAction::Rescheduled);
        assert_eq!(
            plan.comments.as_deref(),
            Some("Rescheduled to 2025-03-14: Vendor holiday")
        );

        let missing_date = RescheduleInput {
            new_date: None,
            reason: "Vendor holiday".into(),
        };
        assert_eq!(
            plan_reschedule(WorkflowStage::MrfCreated, &missing_date),
            Err(WorkflowError::RescheduleIncomplete)
        );
    }

    #[test]
    fn test_compliance_branches() {
        let pass = ComplianceInput {
            status: "pass".into(),
            notes: None,
        };
        let plan = plan_compliance(WorkflowStage::ComplianceCheck, &pass).unwrap();
        assert_eq!(plan.to, WorkflowStage::Received);
        assert_eq!(plan.comments.as_deref(), Some("Compliance Check PASS: No notes"));

        let fail = ComplianceInput {
            status: "FAIL".into(),
            notes: Some("Corroded flanges".into()),
        };
        let plan = plan_compliance(WorkflowStage::ComplianceCheck, &fail).unwrap();
        assert_eq!(plan.to, WorkflowStage::Rejected);
        assert_eq!(plan.action, ApprovalAction::Rejected);

        let unknown = ComplianceInput {
            status: "MAYBE".into(),
            notes: None,
        };
        assert_eq!(
            plan_compliance(WorkflowStage::ComplianceCheck, &unknown),
            Err(WorkflowError::InvalidComplianceStatus)
        );

        assert!(matches!(
            plan_compliance(WorkflowStage::Shipped, &pass),
            Err(WorkflowError::WrongStage { .. })
        ));
    }

    #[test]
    fn test_blanket_order_and_proforma_stage_guards() {
        let blanket = BlanketOrderInput {
            blanket_order_ref: "BO-77".into(),
            comments: None,
        };
        let plan = plan_blanket_order(WorkflowStage::BlanketCheck, &blanket).unwrap();
        assert_eq!(plan.to, WorkflowStage::ProformaSubmitted);
        assert_eq!(
            plan.comments.as_deref(),
            Some("Blanket Order Ref: BO-77 - Skipped quotation stage")
        );

        let empty = BlanketOrderInput {
            blanket_order_ref: " ".into(),
            comments: None,
        };
        assert_eq!(
            plan_blanket_order(WorkflowStage::BlanketCheck, &empty),
            Err(WorkflowError::MissingBlanketReference)
        );

        let proforma = ProformaInput {
            proforma_ref: "PFI-001".into(),
            amount_usd: Some(1200.0),
            amount_ngn: None,
            proforma_date: None,
        };
        assert_eq!(
            plan_proforma(WorkflowStage::ProformaSubmitted, &proforma).unwrap().to,
            WorkflowStage::ProformaApproved
        );
        assert!(plan_proforma(WorkflowStage::MrfCreated, &proforma).is_err());
    }

    #[test]
    fn test_approval_levels() {
        assert_eq!(stages_for_approval_level(1), &[WorkflowStage::MrfCreated]);
        assert_eq!(stages_for_approval_level(4).len(), 4);
        assert!(stages_for_approval_level(0).is_empty());
    }

    #[test]
    fn test_buckets() {
        assert_eq!(WorkflowStage::BlanketCheck.bucket(), Some(StageBucket::AwaitingApproval));
        assert_eq!(WorkflowStage::Received.bucket(), Some(StageBucket::Delivered));
        assert_eq!(WorkflowStage::QuotationAccepted.bucket(), None);
        assert_eq!(WorkflowStage::BlanketCheck.label(), "Checking Blanket Order");
    }
}
