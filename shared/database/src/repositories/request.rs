//! Material Request Repository
//!
//! Intake, listing, tracking updates and export of material requests.
//! Reference numbers are generated under a per-site advisory lock so two
//! concurrent submissions never compute the same sequence.

use anyhow::{Context, Result};
use chrono::Datelike;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use mrf_models::{
    ActivityAction, Attachment, ExportFilter, MaterialRequest, MaterialRequestLine,
    NewActivity, NewMaterialRequest, PageRequest, Paginated, QuotationStatus, RequestDetail,
    RequestFilter, RequestListItem, RequestSort, RequestStatus, RequestUpdate, SiteCode, User,
};
use mrf_utils::{spreadsheet::ExportRow, MrfError};

use super::ActivityRepository;

pub struct RequestRepository {
    pool: PgPool,
}

impl RequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert header, lines and the creation log entry in one transaction.
    ///
    /// Generated numbers use the year of submission, not `request_date`.
    pub async fn create(&self, input: &NewMaterialRequest, user: &User) -> Result<RequestDetail> {
        let today = chrono::Utc::now().date_naive();
        let request_date = input.request_date.unwrap_or(today);

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let mrf_number = match input.explicit_mrf_number() {
            Some(number) => number.to_string(),
            None => next_mrf_number(&mut tx, input.site(), today.year()).await?,
        };

        let request = sqlx::query_as::<_, MaterialRequest>(
            r#"
            INSERT INTO material_requests
                (mrf_number, request_date, user_id, first_name, last_name, user_code,
                 designation, office_extension, asset, unit_tag, discipline,
                 material_category, criticality, work_order_no, work_order_type,
                 reason, service_material, remarks, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $3)
            RETURNING *
            "#,
        )
        .bind(&mrf_number)
        .bind(request_date)
        .bind(user.id)
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(input.user_code.trim())
        .bind(input.designation.trim())
        .bind(input.office_extension.as_deref().unwrap_or_default())
        .bind(input.asset.trim())
        .bind(input.unit_tag.as_deref().unwrap_or_default())
        .bind(input.discipline.trim())
        .bind(input.material_category.as_deref().unwrap_or_default())
        .bind(input.criticality().as_str())
        .bind(input.work_order_no.as_deref().unwrap_or_default())
        .bind(input.work_order_type.as_deref().unwrap_or_default())
        .bind(input.reason.trim())
        .bind(input.service_material.as_deref().unwrap_or("Material"))
        .bind(&input.remarks)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("Failed to create request {}", mrf_number))?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for (index, line) in input.lines.iter().enumerate() {
            let inserted = sqlx::query_as::<_, MaterialRequestLine>(
                r#"
                INSERT INTO material_request_lines
                    (request_id, line_no, material_description, oem_model, part_number,
                     quantity, quantity_unit)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(request.id)
            .bind(index as i32 + 1)
            .bind(line.material_description.trim())
            .bind(line.oem_model.as_deref().unwrap_or_default())
            .bind(line.part_number.as_deref().unwrap_or_default())
            .bind(line.quantity.unwrap_or(1.0))
            .bind(line.quantity_unit.as_deref().unwrap_or("pcs"))
            .fetch_one(&mut *tx)
            .await
            .context("Failed to create request line")?;
            lines.push(inserted);
        }

        let activity = NewActivity::new(user.id, ActivityAction::RequestCreated)
            .on("material_request", request.id)
            .details(format!("Created MRF {} with {} line(s)", mrf_number, lines.len()));
        ActivityRepository::record(&mut tx, &activity).await?;

        tx.commit().await.context("Failed to commit request")?;

        tracing::info!(mrf_number = %request.mrf_number, lines = lines.len(), "Material request created");

        Ok(RequestDetail {
            request,
            lines,
            attachments: Vec::new(),
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<MaterialRequest>> {
        sqlx::query_as::<_, MaterialRequest>("SELECT * FROM material_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch request by ID")
    }

    pub async fn find_by_mrf_number(&self, mrf_number: &str) -> Result<Option<MaterialRequest>> {
        sqlx::query_as::<_, MaterialRequest>(
            "SELECT * FROM material_requests WHERE mrf_number = $1",
        )
        .bind(mrf_number.trim())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch request by MRF number")
    }

    pub async fn lines(&self, request_id: Uuid) -> Result<Vec<MaterialRequestLine>> {
        sqlx::query_as::<_, MaterialRequestLine>(
            "SELECT * FROM material_request_lines WHERE request_id = $1 ORDER BY line_no",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch request lines")
    }

    pub async fn detail(&self, id: Uuid) -> Result<Option<RequestDetail>> {
        let Some(request) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let lines = self.lines(id).await?;
        let attachments = sqlx::query_as::<_, Attachment>(
            "SELECT * FROM attachments WHERE request_id = $1 ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch request attachments")?;

        Ok(Some(RequestDetail {
            request,
            lines,
            attachments,
        }))
    }

    /// Filtered, paginated list. Viewers without global visibility only
    /// see requests they raised.
    pub async fn list(&self, filter: &RequestFilter, viewer: &User) -> Result<Paginated<RequestListItem>> {
        let page = PageRequest::new(filter.page.unwrap_or(1), filter.limit.unwrap_or(25));
        let owner = if viewer.can_view_all_requests() {
            filter.user_id
        } else {
            Some(viewer.id)
        };

        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM material_requests r WHERE 1=1");
        push_request_filters(&mut count, filter, owner);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count requests")?;

        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT r.*,
                   (SELECT COUNT(*) FROM material_request_lines l WHERE l.request_id = r.id)
                       AS line_items_count
            FROM material_requests r
            WHERE 1=1
            "#,
        );
        push_request_filters(&mut query, filter, owner);
        query
            .push(" ORDER BY ")
            .push(RequestSort::parse(filter.sort.as_deref()).order_by())
            .push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = query
            .build_query_as::<RequestListItem>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list requests")?;

        Ok(Paginated::new(items, page, total))
    }

    /// Apply the set tracking fields and log the change.
    pub async fn update(
        &self,
        id: Uuid,
        update: &RequestUpdate,
        user_id: Uuid,
    ) -> Result<Option<MaterialRequest>> {
        let quotation_status = update
            .quotation_status
            .as_deref()
            .and_then(QuotationStatus::normalize)
            .map(|s| s.as_str());

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let request = sqlx::query_as::<_, MaterialRequest>(
            r#"
            UPDATE material_requests SET
                status = COALESCE($2, status),
                status_notes = COALESCE($3, status_notes),
                internal_reference = COALESCE($4, internal_reference),
                action_pending = COALESCE($5, action_pending),
                vendor_name = COALESCE($6, vendor_name),
                blanket_order_number = COALESCE($7, blanket_order_number),
                call_off_number = COALESCE($8, call_off_number),
                purchase_order_no = COALESCE($9, purchase_order_no),
                quotation_reference = COALESCE($10, quotation_reference),
                quotation_status = COALESCE($11, quotation_status),
                quotation_approval_date = COALESCE($12, quotation_approval_date),
                quotation_amount_usd = COALESCE($13, quotation_amount_usd),
                quotation_amount_eur = COALESCE($14, quotation_amount_eur),
                quotation_amount_ngn = COALESCE($15, quotation_amount_ngn),
                estimated_delivery_date = COALESCE($16, estimated_delivery_date),
                actual_delivery_date = COALESCE($17, actual_delivery_date),
                notes = COALESCE($18, notes),
                other = COALESCE($19, other),
                remarks = COALESCE($20, remarks),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.status.map(|s| s.as_str()))
        .bind(&update.status_notes)
        .bind(&update.internal_reference)
        .bind(&update.action_pending)
        .bind(&update.vendor_name)
        .bind(&update.blanket_order_number)
        .bind(&update.call_off_number)
        .bind(&update.purchase_order_no)
        .bind(&update.quotation_reference)
        .bind(quotation_status)
        .bind(update.quotation_approval_date)
        .bind(update.quotation_amount_usd)
        .bind(update.quotation_amount_eur)
        .bind(update.quotation_amount_ngn)
        .bind(update.estimated_delivery_date)
        .bind(update.actual_delivery_date)
        .bind(&update.notes)
        .bind(&update.other)
        .bind(&update.remarks)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to update request")?;

        let Some(request) = request else {
            return Ok(None);
        };

        let activity = NewActivity::new(user_id, ActivityAction::RequestUpdated)
            .on("material_request", request.id)
            .details(format!("Updated MRF {}", request.mrf_number));
        ActivityRepository::record(&mut tx, &activity).await?;

        tx.commit().await.context("Failed to commit request update")?;
        Ok(Some(request))
    }

    /// Delete a request with its lines, history and attachment rows.
    /// Returns the stored attachment names, or `None` when nothing matched.
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<Option<Vec<String>>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let stored_files: Vec<String> =
            sqlx::query_scalar("SELECT stored_name FROM attachments WHERE request_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .context("Failed to list request attachments")?;

        let mrf_number: Option<String> =
            sqlx::query_scalar("DELETE FROM material_requests WHERE id = $1 RETURNING mrf_number")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to delete request")?;

        let Some(mrf_number) = mrf_number else {
            return Ok(None);
        };

        let activity = NewActivity::new(user_id, ActivityAction::RequestDeleted)
            .details(format!("Deleted MRF {}", mrf_number));
        ActivityRepository::record(&mut tx, &activity).await?;

        tx.commit().await.context("Failed to commit request deletion")?;

        tracing::info!(mrf_number = %mrf_number, "Material request deleted");
        Ok(Some(stored_files))
    }

    /// Rows for the export sheet, numbered in request-date order.
    pub async fn export_rows(&self, filter: &ExportFilter) -> Result<Vec<ExportRow>> {
        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT ROW_NUMBER() OVER (ORDER BY r.request_date, r.mrf_number) AS item,
                   r.asset, r.mrf_number, r.request_date,
                   EXTRACT(YEAR FROM r.request_date)::integer AS year,
                   r.reason, r.service_material, r.discipline, r.criticality,
                   r.status_notes, r.status, r.internal_reference, r.action_pending,
                   r.vendor_name, r.blanket_order_number, r.call_off_number,
                   r.quotation_reference, r.quotation_approval_date,
                   r.quotation_amount_usd, r.quotation_amount_eur, r.quotation_amount_ngn,
                   r.estimated_delivery_date, r.actual_delivery_date, r.notes, r.other
            FROM material_requests r
            WHERE 1=1
            "#,
        );
        push_export_filters(&mut query, filter);
        query.push(" ORDER BY r.request_date DESC, r.mrf_number");

        query
            .build_query_as::<ExportRow>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch export rows")
    }
}

/// Next free reference for the site and year. Must run inside the
/// transaction that inserts the request; the advisory lock is released on
/// commit or rollback.
pub(crate) async fn next_mrf_number(conn: &mut PgConnection, site: SiteCode, year: i32) -> Result<String> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(site.reference_prefix())
        .execute(&mut *conn)
        .await
        .context("Failed to lock reference sequence")?;

    let existing: Vec<String> = sqlx::query_scalar(
        "SELECT mrf_number FROM material_requests WHERE mrf_number LIKE $1 AND mrf_number LIKE $2",
    )
    .bind(site.like_pattern())
    .bind(format!("%-{}", year))
    .fetch_all(&mut *conn)
    .await
    .context("Failed to read existing reference numbers")?;

    site.next_reference(year, existing.iter().map(String::as_str))
        .ok_or_else(|| {
            MrfError::conflict(format!(
                "Reference sequence for {} {} is exhausted",
                site.code(),
                year
            ))
            .into()
        })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

fn push_request_filters(
    query: &mut QueryBuilder<'_, Postgres>,
    filter: &RequestFilter,
    owner: Option<Uuid>,
) {
    if let Some(owner) = owner {
        query
            .push(" AND (r.user_id = ")
            .push_bind(owner)
            .push(" OR r.created_by = ")
            .push_bind(owner)
            .push(")");
    }
    if let Some(from) = filter.from {
        query.push(" AND r.request_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(" AND r.request_date <= ").push_bind(to);
    }
    if let Some(status) = non_empty(filter.status.as_deref()) {
        let status = status
            .parse::<RequestStatus>()
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|_| status.to_string());
        query.push(" AND r.status = ").push_bind(status);
    }
    if let Some(area) = non_empty(filter.area.as_deref()) {
        let site = SiteCode::from_filter(area).unwrap_or_else(|| SiteCode::from_area(area));
        query.push(" AND r.mrf_number LIKE ").push_bind(site.like_pattern());
    }
    if let Some(location) = non_empty(filter.location.as_deref()) {
        query
            .push(" AND r.asset ILIKE ")
            .push_bind(format!("%{}%", location));
    }
    if let Some(discipline) = non_empty(filter.discipline.as_deref()) {
        query
            .push(" AND UPPER(r.discipline) = ")
            .push_bind(discipline.to_uppercase());
    }
    if let Some(vendor) = non_empty(filter.vendor.as_deref()) {
        query
            .push(" AND r.vendor_name ILIKE ")
            .push_bind(format!("%{}%", vendor));
    }
    if let Some(mrf) = non_empty(filter.mrf.as_deref()) {
        query
            .push(" AND r.mrf_number ILIKE ")
            .push_bind(format!("%{}%", mrf));
    }
    if let Some(status) = non_empty(filter.quotation_status.as_deref()).and_then(QuotationStatus::normalize) {
        query
            .push(" AND r.quotation_status = ")
            .push_bind(status.as_str());
    }
    if let Some(material) = non_empty(filter.material.as_deref()) {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM material_request_lines l \
                 WHERE l.request_id = r.id AND l.material_description ILIKE ",
            )
            .push_bind(format!("%{}%", material))
            .push(")");
    }
}

fn push_export_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ExportFilter) {
    if let Some(from) = filter.from {
        query.push(" AND r.request_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(" AND r.request_date <= ").push_bind(to);
    }
    if let Some(status) = non_empty(filter.status.as_deref()) {
        query.push(" AND r.status ILIKE ").push_bind(status.to_string());
    }
    if let Some(criticality) = non_empty(filter.criticality.as_deref()) {
        query.push(" AND r.criticality ILIKE ").push_bind(criticality.to_string());
    }
    if let Some(location) = non_empty(filter.location.as_deref()) {
        match SiteCode::from_filter(location) {
            Some(site) => {
                query.push(" AND r.mrf_number LIKE ").push_bind(site.like_pattern());
            }
            None => {
                query
                    .push(" AND r.asset ILIKE ")
                    .push_bind(format!("%{}%", location));
            }
        }
    }
    if let Some(material) = non_empty(filter.material.as_deref()) {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM material_request_lines l \
                 WHERE l.request_id = r.id AND l.material_description ILIKE ",
            )
            .push_bind(format!("%{}%", material))
            .push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> QueryBuilder<'static, Postgres> {
        QueryBuilder::new("SELECT * FROM material_requests r WHERE 1=1")
    }

    #[test]
    fn test_owner_scope_comes_first() {
        let filter = RequestFilter::default();
        let mut query = base();
        push_request_filters(&mut query, &filter, Some(Uuid::new_v4()));
        assert!(query
            .sql()
            .ends_with("AND (r.user_id = $1 OR r.created_by = $2)"));
    }

    #[test]
    fn test_area_filter_uses_site_prefix() {
        let filter = RequestFilter {
            area: Some("Swamp Area".into()),
            discipline: Some("gmc".into()),
            ..Default::default()
        };
        let mut query = base();
        push_request_filters(&mut query, &filter, None);
        let sql = query.sql();
        assert!(sql.contains("r.mrf_number LIKE $1"));
        assert!(sql.contains("UPPER(r.discipline) = $2"));
    }

    #[test]
    fn test_all_and_blank_filters_are_ignored() {
        let filter = RequestFilter {
            status: Some("all".into()),
            vendor: Some("  ".into()),
            quotation_status: Some("lost".into()),
            ..Default::default()
        };
        let mut query = base();
        push_request_filters(&mut query, &filter, None);
        assert_eq!(query.sql(), "SELECT * FROM material_requests r WHERE 1=1");
    }

    #[test]
    fn test_export_location_site_or_asset() {
        let site = ExportFilter {
            location: Some("PHC POD".into()),
            ..Default::default()
        };
        let mut query = base();
        push_export_filters(&mut query, &site);
        assert!(query.sql().contains("r.mrf_number LIKE $1"));

        let asset = ExportFilter {
            location: Some("KWALE".into()),
            material: Some("seal".into()),
            ..Default::default()
        };
        let mut query = base();
        push_export_filters(&mut query, &asset);
        assert!(query.sql().contains("r.asset ILIKE $1"));
        assert!(query.sql().contains("l.material_description ILIKE $2)"));
    }
}
