//! Attachment Repository
//!
//! General uploads and vendor quotations. Quotation changes keep the
//! owning request's quotation summary in step within the same transaction.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use mrf_models::{
    request_quotation_status, ActivityAction, Attachment, AttachmentCategory, AttachmentStatus,
    NewActivity, NewAttachment, PageRequest, Paginated, QuotationFilter, QuotationListing,
    QuotationStatus, SiteCode,
};
use mrf_utils::{MrfError, MrfResult};

use super::ActivityRepository;

/// File already written to storage, ready to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub file_name: String,
    pub stored_name: String,
    pub content_type: String,
    pub file_size: i64,
}

pub struct AttachmentRepository {
    pool: PgPool,
}

impl AttachmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Attachment>> {
        sqlx::query_as::<_, Attachment>("SELECT * FROM attachments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch attachment by ID")
    }

    /// Record an uploaded file. Quotations move the request's quotation
    /// status to `Approved` or `Pending`.
    pub async fn create(
        &self,
        request_id: Uuid,
        meta: &NewAttachment,
        file: &StoredFile,
        user_id: Uuid,
    ) -> Result<Attachment> {
        let category = meta.category();
        let status = category.status_or_default(meta.status.as_deref());
        let approved = status == AttachmentStatus::Approved;

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let attachment = sqlx::query_as::<_, Attachment>(
            r#"
            INSERT INTO attachments
                (request_id, file_name, stored_name, content_type, file_size, category,
                 status, vendor_name, quotation_reference, quotation_amount, currency,
                 notes, uploaded_by, approved_by, approved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(request_id)
        .bind(&file.file_name)
        .bind(&file.stored_name)
        .bind(&file.content_type)
        .bind(file.file_size)
        .bind(category.as_str())
        .bind(status.as_str())
        .bind(&meta.vendor_name)
        .bind(&meta.quotation_reference)
        .bind(meta.quotation_amount)
        .bind(&meta.currency)
        .bind(&meta.notes)
        .bind(user_id)
        .bind(approved.then_some(user_id))
        .bind(approved.then(Utc::now))
        .fetch_one(&mut *tx)
        .await
        .context("Failed to create attachment")?;

        if category == AttachmentCategory::Quotation {
            let summary = if approved {
                QuotationStatus::Approved
            } else {
                QuotationStatus::Pending
            };
            let reference = approved.then(|| quotation_reference(&attachment));
            sync_request_quotation(&mut tx, request_id, summary, reference).await?;
        }

        let activity = NewActivity::new(user_id, ActivityAction::AttachmentUploaded)
            .on("attachment", attachment.id)
            .details(format!("Uploaded {} ({})", attachment.file_name, category));
        ActivityRepository::record(&mut tx, &activity).await?;

        tx.commit().await.context("Failed to commit attachment")?;
        Ok(attachment)
    }

    /// Quotation attachments with their request, newest first.
    pub async fn list_quotations(&self, filter: &QuotationFilter) -> Result<Paginated<QuotationListing>> {
        let page = PageRequest::new(filter.page.unwrap_or(1), filter.limit.unwrap_or(25));

        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM attachments a JOIN material_requests r ON r.id = a.request_id WHERE ",
        );
        push_quotation_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count quotations")?;

        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT a.*, r.mrf_number, r.asset,
                   TRIM(r.first_name || ' ' || r.last_name) AS requester_name
            FROM attachments a
            JOIN material_requests r ON r.id = a.request_id
            WHERE "#,
        );
        push_quotation_filters(&mut query, filter);
        query
            .push(" ORDER BY a.created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query
            .build_query_as::<QuotationListing>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list quotations")?;

        Ok(Paginated::new(rows, page, total))
    }

    /// Review a quotation and recompute the request's quotation summary.
    pub async fn update_quotation_status(
        &self,
        id: Uuid,
        status: &str,
        notes: Option<&str>,
        user_id: Uuid,
    ) -> MrfResult<Attachment> {
        let status: AttachmentStatus = status
            .parse()
            .ok()
            .filter(|s| *s != AttachmentStatus::Uploaded)
            .ok_or_else(|| MrfError::validation("Invalid status value"))?;
        let reviewed = status != AttachmentStatus::Pending;

        let mut tx = self.pool.begin().await?;

        let attachment = sqlx::query_as::<_, Attachment>(
            r#"
            UPDATE attachments SET
                status = $2,
                notes = COALESCE($3, notes),
                approved_by = $4,
                approved_at = $5
            WHERE id = $1 AND category = 'quotation'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(notes.map(str::trim).filter(|n| !n.is_empty()))
        .bind(reviewed.then_some(user_id))
        .bind(reviewed.then(Utc::now))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| MrfError::not_found("Quotation"))?;

        let approved: Option<Attachment> = sqlx::query_as(
            r#"
            SELECT * FROM attachments
            WHERE request_id = $1 AND category = 'quotation' AND status = 'approved'
            ORDER BY approved_at DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(attachment.request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let summary = request_quotation_status(approved.is_some(), status);
        let reference = approved.as_ref().map(quotation_reference);
        sync_request_quotation(&mut tx, attachment.request_id, summary, reference).await?;

        let activity = NewActivity::new(user_id, ActivityAction::QuotationReviewed)
            .on("attachment", attachment.id)
            .details(format!("Quotation {} marked {}", attachment.file_name, status));
        ActivityRepository::record(&mut tx, &activity).await?;

        tx.commit().await?;

        tracing::info!(attachment_id = %id, status = %status, summary = %summary, "Quotation reviewed");
        Ok(attachment)
    }
}

fn quotation_reference(attachment: &Attachment) -> String {
    attachment
        .quotation_reference
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(&attachment.file_name)
        .to_string()
}

/// With an approved reference the approval date is stamped; without one
/// both reference and date are cleared.
async fn sync_request_quotation(
    conn: &mut PgConnection,
    request_id: Uuid,
    summary: QuotationStatus,
    approved_reference: Option<String>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE material_requests SET
            quotation_status = $2,
            quotation_reference = $3,
            quotation_approval_date = CASE
                WHEN $3::text IS NULL THEN NULL
                ELSE COALESCE(quotation_approval_date, CURRENT_DATE)
            END,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(request_id)
    .bind(summary.as_str())
    .bind(approved_reference)
    .execute(conn)
    .await
    .context("Failed to update request quotation status")?;
    Ok(())
}

fn push_quotation_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &QuotationFilter) {
    query.push("a.category = 'quotation'");

    if let Some(status) = filter.status() {
        query.push(" AND a.status = ").push_bind(status.as_str());
    }
    if let Some(area) = filter
        .area
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("all"))
    {
        let pattern = match SiteCode::from_filter(area) {
            Some(site) => site.like_pattern(),
            None => format!("{}-%", area.to_uppercase()),
        };
        query.push(" AND r.mrf_number LIKE ").push_bind(pattern);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        query
            .push(" AND (r.mrf_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR a.file_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR COALESCE(a.vendor_name, r.vendor_name, '') ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(from) = filter.from {
        query.push(" AND a.created_at::date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(" AND a.created_at::date <= ").push_bind(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> QueryBuilder<'static, Postgres> {
        QueryBuilder::new("SELECT COUNT(*) FROM attachments a WHERE ")
    }

    #[test]
    fn test_default_listing_is_pending_quotations() {
        let mut query = base();
        push_quotation_filters(&mut query, &QuotationFilter::default());
        assert_eq!(
            query.sql(),
            "SELECT COUNT(*) FROM attachments a WHERE a.category = 'quotation' AND a.status = $1"
        );
    }

    #[test]
    fn test_all_statuses_with_search() {
        let filter = QuotationFilter {
            status: Some("all".into()),
            area: Some("LAR".into()),
            search: Some("pump".into()),
            ..Default::default()
        };
        let mut query = base();
        push_quotation_filters(&mut query, &filter);
        let sql = query.sql();
        assert!(!sql.contains("a.status"));
        assert!(sql.contains("r.mrf_number LIKE $1"));
        assert!(sql.contains("ILIKE $4)"));
    }
}
