//! Workflow Repository
//!
//! Applies planned stage transitions. Each action locks the request row,
//! plans against the locked stage, updates the request and appends exactly
//! one approval history row, all in a single transaction.

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use mrf_models::{
    plan_approval, plan_blanket_order, plan_compliance, plan_proforma, plan_rejection,
    plan_reschedule, stages_for_approval_level, ActivityAction, ApprovalAction, ApprovalDecision,
    ApprovalHistory, BlanketOrderInput, ComplianceInput, MaterialRequest, NewActivity, PageRequest,
    Paginated, PendingApproval, PendingFilter, ProformaInput, RequestStatus, RescheduleInput,
    SiteCode, StageTransition, User, WorkflowError, WorkflowStage,
};
use mrf_utils::{MrfError, MrfResult};

use super::ActivityRepository;

/// Columns an action writes besides the stage, slot and blanket flag.
#[derive(Debug, Clone, PartialEq)]
enum StageEffect {
    None,
    Rejected { reason: String, stage: WorkflowStage },
    Rescheduled { date: NaiveDate, reason: String },
    Compliance { status: String, notes: Option<String> },
    Proforma {
        reference: String,
        amount_usd: Option<f64>,
        amount_ngn: Option<f64>,
        date: NaiveDate,
    },
}

pub struct WorkflowRepository {
    pool: PgPool,
}

impl WorkflowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Requests waiting at the stages the approver's level acts on.
    pub async fn pending(&self, approver: &User, filter: &PendingFilter) -> MrfResult<Paginated<PendingApproval>> {
        let page = PageRequest::new(filter.page.unwrap_or(1), filter.limit.unwrap_or(25));
        let stages: Vec<&str> = stages_for_approval_level(approver.approval_level)
            .iter()
            .map(|s| s.as_str())
            .collect();

        if stages.is_empty() {
            return Ok(Paginated::new(Vec::new(), page, 0));
        }

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM material_requests r WHERE ");
        push_pending_filters(&mut count, &stages, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT r.id, r.mrf_number, r.request_date, r.first_name, r.last_name, r.asset,
                   r.discipline, r.criticality, r.reason, r.workflow_stage,
                   (SELECT COUNT(*) FROM material_request_lines l WHERE l.request_id = r.id)
                       AS line_items_count
            FROM material_requests r
            WHERE "#,
        );
        push_pending_filters(&mut query, &stages, filter);
        query
            .push(" ORDER BY r.request_date DESC, r.created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query
            .build_query_as::<PendingApproval>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(rows, page, total))
    }

    pub async fn approve(&self, id: Uuid, approver: &User, decision: &ApprovalDecision) -> MrfResult<MaterialRequest> {
        self.transition(id, approver, |stage| {
            Ok((plan_approval(stage, decision)?, StageEffect::None))
        })
        .await
    }

    pub async fn reject(&self, id: Uuid, approver: &User, reason: &str) -> MrfResult<MaterialRequest> {
        self.transition(id, approver, |stage| {
            let plan = plan_rejection(stage, reason)?;
            let effect = StageEffect::Rejected {
                reason: reason.trim().to_string(),
                stage,
            };
            Ok((plan, effect))
        })
        .await
    }

    pub async fn reschedule(&self, id: Uuid, approver: &User, input: &RescheduleInput) -> MrfResult<MaterialRequest> {
        self.transition(id, approver, |stage| {
            let plan = plan_reschedule(stage, input)?;
            let date = input.new_date.ok_or(WorkflowError::RescheduleIncomplete)?;
            let effect = StageEffect::Rescheduled {
                date,
                reason: input.reason.trim().to_string(),
            };
            Ok((plan, effect))
        })
        .await
    }

    pub async fn compliance(&self, id: Uuid, approver: &User, input: &ComplianceInput) -> MrfResult<MaterialRequest> {
        self.transition(id, approver, |stage| {
            let plan = plan_compliance(stage, input)?;
            let effect = StageEffect::Compliance {
                status: input.status.trim().to_uppercase(),
                notes: input.notes.clone(),
            };
            Ok((plan, effect))
        })
        .await
    }

    pub async fn blanket_order(&self, id: Uuid, approver: &User, input: &BlanketOrderInput) -> MrfResult<MaterialRequest> {
        self.transition(id, approver, |stage| {
            Ok((plan_blanket_order(stage, input)?, StageEffect::None))
        })
        .await
    }

    pub async fn proforma(&self, id: Uuid, approver: &User, input: &ProformaInput) -> MrfResult<MaterialRequest> {
        self.transition(id, approver, |stage| {
            let plan = plan_proforma(stage, input)?;
            let effect = StageEffect::Proforma {
                reference: input.proforma_ref.trim().to_string(),
                amount_usd: input.amount_usd,
                amount_ngn: input.amount_ngn,
                date: input.proforma_date.unwrap_or_else(|| Utc::now().date_naive()),
            };
            Ok((plan, effect))
        })
        .await
    }

    pub async fn history(&self, request_id: Uuid) -> MrfResult<Vec<ApprovalHistory>> {
        let rows = sqlx::query_as::<_, ApprovalHistory>(
            r#"
            SELECT id, request_id, from_stage, to_stage, action, approved_by,
                   approver_name, approver_role, comments, created_at
            FROM approval_history
            WHERE request_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn transition<F>(&self, id: Uuid, approver: &User, plan: F) -> MrfResult<MaterialRequest>
    where
        F: FnOnce(WorkflowStage) -> Result<(StageTransition, StageEffect), WorkflowError>,
    {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(String, String)> = sqlx::query_as(
            "SELECT workflow_stage, mrf_number FROM material_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let (stored_stage, mrf_number) =
            locked.ok_or_else(|| MrfError::not_found("Material request"))?;
        let current: WorkflowStage = stored_stage
            .parse()
            .map_err(|e| MrfError::internal(format!("Stored stage for {}: {}", mrf_number, e)))?;

        let (transition, effect) = plan(current)?;

        let request = apply_transition(&mut tx, id, approver, &transition, &effect).await?;
        insert_history(&mut tx, id, approver, &transition).await?;

        let action = match transition.action {
            ApprovalAction::Approved => ActivityAction::RequestApproved,
            ApprovalAction::Rejected => ActivityAction::RequestRejected,
            ApprovalAction::Rescheduled => ActivityAction::RequestRescheduled,
        };
        let activity = NewActivity::new(approver.id, action)
            .on("material_request", id)
            .details(format!("{}: {} -> {}", mrf_number, transition.from, transition.to));
        ActivityRepository::record(&mut tx, &activity).await?;

        tx.commit().await?;

        tracing::info!(
            mrf_number = %mrf_number,
            from = %transition.from,
            to = %transition.to,
            action = %transition.action,
            approver = %approver.id,
            "Workflow transition applied"
        );

        Ok(request)
    }
}

fn push_pending_filters(query: &mut QueryBuilder<'_, Postgres>, stages: &[&str], filter: &PendingFilter) {
    let owned: Vec<String> = stages.iter().map(|s| s.to_string()).collect();
    query.push("r.workflow_stage = ANY(").push_bind(owned).push(")");

    if let Some(area) = filter.area.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        let pattern = match SiteCode::from_filter(area) {
            Some(site) => site.like_pattern(),
            None => format!("{}-%", area.to_uppercase()),
        };
        query.push(" AND r.mrf_number LIKE ").push_bind(pattern);
    }
    if let Some(discipline) = filter.discipline.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        query
            .push(" AND UPPER(r.discipline) = ")
            .push_bind(discipline.to_uppercase());
    }
}

async fn apply_transition(
    conn: &mut PgConnection,
    id: Uuid,
    approver: &User,
    transition: &StageTransition,
    effect: &StageEffect,
) -> MrfResult<MaterialRequest> {
    let mut query = QueryBuilder::<Postgres>::new("UPDATE material_requests SET updated_at = NOW()");
    push_transition_columns(&mut query, approver.id, transition, effect);
    query.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

    let request = query
        .build_query_as::<MaterialRequest>()
        .fetch_one(&mut *conn)
        .await?;
    Ok(request)
}

fn push_transition_columns(
    query: &mut QueryBuilder<'_, Postgres>,
    approver_id: Uuid,
    transition: &StageTransition,
    effect: &StageEffect,
) {
    if transition.changes_stage() {
        query
            .push(", workflow_stage = ")
            .push_bind(transition.to.as_str());
    }

    if let Some(slot) = transition.slot {
        let suffix = slot.column_suffix();
        query
            .push(format!(", approved_by_{} = ", suffix))
            .push_bind(approver_id)
            .push(format!(", approved_date_{} = NOW()", suffix))
            .push(format!(", {}_comments = ", suffix))
            .push_bind(transition.comments.clone());
    }

    if transition.has_blanket_order {
        query
            .push(", has_blanket_order = TRUE, blanket_order_ref = ")
            .push_bind(transition.blanket_order_ref.clone());
    }

    if transition.to == WorkflowStage::Rejected {
        query
            .push(", status = ")
            .push_bind(RequestStatus::Rejected.as_str());
    }

    match effect {
        StageEffect::None => {}
        StageEffect::Rejected { reason, stage } => {
            query
                .push(", rejection_reason = ")
                .push_bind(reason.clone())
                .push(", rejection_stage = ")
                .push_bind(stage.as_str());
        }
        StageEffect::Rescheduled { date, reason } => {
            query
                .push(", rescheduled_date = ")
                .push_bind(*date)
                .push(", reschedule_reason = ")
                .push_bind(reason.clone());
        }
        StageEffect::Compliance { status, notes } => {
            query
                .push(", compliance_status = ")
                .push_bind(status.clone())
                .push(", compliance_notes = ")
                .push_bind(notes.clone());
        }
        StageEffect::Proforma {
            reference,
            amount_usd,
            amount_ngn,
            date,
        } => {
            query
                .push(", proforma_ref = ")
                .push_bind(reference.clone())
                .push(", proforma_amount_usd = ")
                .push_bind(*amount_usd)
                .push(", proforma_amount_ngn = ")
                .push_bind(*amount_ngn)
                .push(", proforma_date = ")
                .push_bind(*date);
        }
    }
}

async fn insert_history(
    conn: &mut PgConnection,
    request_id: Uuid,
    approver: &User,
    transition: &StageTransition,
) -> MrfResult<()> {
    sqlx::query(
        r#"
        INSERT INTO approval_history
            (request_id, from_stage, to_stage, action, approved_by,
             approver_name, approver_role, comments)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(request_id)
    .bind(transition.from.as_str())
    .bind(transition.to.as_str())
    .bind(transition.action.as_str())
    .bind(approver.id)
    .bind(approver.full_name())
    .bind(approver.approver_role())
    .bind(&transition.comments)
    .execute(conn)
    .await
    .context("Failed to record approval history")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrf_models::ApproverSlot;

    fn transition(from: WorkflowStage, to: WorkflowStage) -> StageTransition {
        StageTransition {
            from,
            to,
            action: ApprovalAction::Approved,
            slot: None,
            has_blanket_order: false,
            blanket_order_ref: None,
            comments: None,
        }
    }

    fn columns(transition: &StageTransition, effect: &StageEffect) -> String {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE material_requests SET updated_at = NOW()");
        push_transition_columns(&mut query, Uuid::new_v4(), transition, effect);
        query.sql().to_string()
    }

    #[test]
    fn test_supervisor_slot_columns() {
        let mut plan = transition(WorkflowStage::MrfCreated, WorkflowStage::MrfApproved);
        plan.slot = Some(ApproverSlot::Supervisor);

        let sql = columns(&plan, &StageEffect::None);
        assert!(sql.contains("workflow_stage = $1"));
        assert!(sql.contains("approved_by_supervisor = $2"));
        assert!(sql.contains("approved_date_supervisor = NOW()"));
        assert!(sql.contains("supervisor_comments = $3"));
        assert!(!sql.contains("status ="));
    }

    #[test]
    fn test_rejection_sets_status_and_reason() {
        let mut plan = transition(WorkflowStage::QuotationRequested, WorkflowStage::Rejected);
        plan.action = ApprovalAction::Rejected;
        let effect = StageEffect::Rejected {
            reason: "Budget not available".into(),
            stage: WorkflowStage::QuotationRequested,
        };

        let sql = columns(&plan, &effect);
        assert!(sql.contains(", status = $2"));
        assert!(sql.contains("rejection_reason = $3"));
        assert!(sql.contains("rejection_stage = $4"));
    }

    #[test]
    fn test_reschedule_keeps_stage() {
        let mut plan = transition(WorkflowStage::Shipped, WorkflowStage::Shipped);
        plan.action = ApprovalAction::Rescheduled;
        let effect = StageEffect::Rescheduled {
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            reason: "Vendor delay".into(),
        };

        let sql = columns(&plan, &effect);
        assert!(!sql.contains("workflow_stage"));
        assert!(sql.contains("rescheduled_date = $1"));
    }

    #[test]
    fn test_blanket_order_columns() {
        let mut plan = transition(WorkflowStage::BlanketCheck, WorkflowStage::ProformaSubmitted);
        plan.slot = Some(ApproverSlot::AreaManager);
        plan.has_blanket_order = true;
        plan.blanket_order_ref = Some("BO-77".into());

        let sql = columns(&plan, &StageEffect::None);
        assert!(sql.contains("approved_by_area_manager = $2"));
        assert!(sql.contains("area_manager_comments = $3"));
        assert!(sql.contains("has_blanket_order = TRUE, blanket_order_ref = $4"));
    }

    #[test]
    fn test_pending_filters() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM material_requests r WHERE ");
        let filter = PendingFilter {
            area: Some("sar".into()),
            discipline: Some("electrical".into()),
            ..Default::default()
        };
        push_pending_filters(&mut query, &["MRF_CREATED"], &filter);
        assert_eq!(
            query.sql(),
            "SELECT COUNT(*) FROM material_requests r WHERE r.workflow_stage = ANY($1) \
             AND r.mrf_number LIKE $2 AND UPPER(r.discipline) = $3"
        );
    }
}
