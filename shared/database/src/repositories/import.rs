//! Import Repository
//!
//! Persists parsed spreadsheet requests and the bookkeeping of each import
//! job. Every request is written in its own transaction so one bad row
//! never discards the rest of the sheet.

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use mrf_models::{
    ActivityAction, Criticality, DuplicateStrategy, ImportJob, ImportRowError, ImportSummary,
    ImportedRequest, NewActivity, RequestStatus, IMPORT_STATUS_COMPLETED, IMPORT_STATUS_FAILED,
    IMPORT_STATUS_PROCESSING,
};

use super::ActivityRepository;

pub const IMPORT_HISTORY_LIMIT: i64 = 50;

const DUPLICATE_SKIPPED: &str = "Duplicate (skipped)";

/// Result of writing one imported request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Inserted,
    Replaced,
    Skipped,
}

pub struct ImportRepository {
    pool: PgPool,
}

impl ImportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_job(
        &self,
        file_name: &str,
        user_id: Uuid,
        strategy: DuplicateStrategy,
        mapping: &serde_json::Value,
    ) -> Result<ImportJob> {
        let strategy = match strategy {
            DuplicateStrategy::Skip => "skip",
            DuplicateStrategy::Overwrite => "overwrite",
        };

        sqlx::query_as::<_, ImportJob>(
            r#"
            INSERT INTO import_jobs (file_name, imported_by, status, duplicate_strategy, mapping_used)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(file_name)
        .bind(user_id)
        .bind(IMPORT_STATUS_PROCESSING)
        .bind(strategy)
        .bind(mapping)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create import job")
    }

    /// Write the parsed requests, then close the job with its counters.
    /// `errors` carries problems already found while parsing the sheet.
    pub async fn import_requests(
        &self,
        job: &ImportJob,
        user_id: Uuid,
        requests: &[ImportedRequest],
        strategy: DuplicateStrategy,
        mut errors: Vec<ImportRowError>,
        total_rows: usize,
    ) -> Result<ImportSummary> {
        let mut successful = 0usize;

        for request in requests {
            match self.write_request(job.id, user_id, request, strategy).await {
                Ok(RowOutcome::Inserted) | Ok(RowOutcome::Replaced) => successful += 1,
                Ok(RowOutcome::Skipped) => errors.push(ImportRowError {
                    row: request.source_row,
                    mrf_number: Some(request.mrf_number.clone()),
                    error: DUPLICATE_SKIPPED.to_string(),
                }),
                Err(error) => {
                    tracing::warn!(mrf_number = %request.mrf_number, error = %error, "Import row failed");
                    errors.push(ImportRowError {
                        row: request.source_row,
                        mrf_number: Some(request.mrf_number.clone()),
                        error: format!("{:#}", error),
                    });
                }
            }
        }

        errors.sort_by_key(|e| e.row);
        let failed = errors.len();
        let error_log = serde_json::to_value(&errors).context("Failed to serialize import errors")?;

        sqlx::query(
            r#"
            UPDATE import_jobs SET
                status = $2,
                total_rows = $3,
                successful_rows = $4,
                failed_rows = $5,
                error_log = $6,
                completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(IMPORT_STATUS_COMPLETED)
        .bind(total_rows as i32)
        .bind(successful as i32)
        .bind(failed as i32)
        .bind(&error_log)
        .execute(&self.pool)
        .await
        .context("Failed to complete import job")?;

        let activity = NewActivity::new(user_id, ActivityAction::DataImported)
            .on("import_job", job.id)
            .details(format!("Imported {} requests from {}", successful, job.file_name));
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        ActivityRepository::record(&mut conn, &activity).await?;

        tracing::info!(
            job_id = %job.id,
            total_rows,
            successful,
            failed,
            "Import completed"
        );

        Ok(ImportSummary {
            job_id: job.id,
            total_rows,
            successful,
            failed,
            errors,
        })
    }

    pub async fn mark_failed(&self, job_id: Uuid, message: &str) -> Result<()> {
        let error_log = serde_json::json!([{ "row": 0, "mrf_number": null, "error": message }]);

        sqlx::query(
            r#"
            UPDATE import_jobs
            SET status = $2, error_log = $3, completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(IMPORT_STATUS_FAILED)
        .bind(&error_log)
        .execute(&self.pool)
        .await
        .context("Failed to mark import job failed")?;
        Ok(())
    }

    pub async fn job(&self, id: Uuid) -> Result<Option<ImportJob>> {
        sqlx::query_as::<_, ImportJob>("SELECT * FROM import_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch import job")
    }

    pub async fn history(&self) -> Result<Vec<ImportJob>> {
        sqlx::query_as::<_, ImportJob>("SELECT * FROM import_jobs ORDER BY created_at DESC LIMIT $1")
            .bind(IMPORT_HISTORY_LIMIT)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch import history")
    }

    async fn write_request(
        &self,
        job_id: Uuid,
        user_id: Uuid,
        request: &ImportedRequest,
        strategy: DuplicateStrategy,
    ) -> Result<RowOutcome> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM material_requests WHERE mrf_number = $1 FOR UPDATE",
        )
        .bind(&request.mrf_number)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to check for duplicate")?;

        let outcome = match (existing, strategy) {
            (None, _) => RowOutcome::Inserted,
            (Some(_), DuplicateStrategy::Skip) => return Ok(RowOutcome::Skipped),
            (Some(id), DuplicateStrategy::Overwrite) => {
                sqlx::query("DELETE FROM material_requests WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to replace existing request")?;
                RowOutcome::Replaced
            }
        };

        insert_imported(&mut tx, job_id, user_id, request).await?;
        tx.commit().await.context("Failed to commit imported request")?;
        Ok(outcome)
    }
}

async fn insert_imported(
    conn: &mut PgConnection,
    job_id: Uuid,
    user_id: Uuid,
    request: &ImportedRequest,
) -> Result<()> {
    let request_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO material_requests
            (mrf_number, request_date, first_name, last_name, user_code, designation,
             asset, discipline, criticality, reason, service_material, status,
             status_notes, call_off_number, remarks, import_job_id, created_by)
        VALUES ($1, $2, 'Import', 'User', $1, 'Imported', $3, $4, $5, $6, $7, $8,
                $9, $10, $11, $12, $13)
        RETURNING id
        "#,
    )
    .bind(&request.mrf_number)
    .bind(request.request_date)
    .bind(&request.asset)
    .bind(&request.discipline)
    .bind(Criticality::Medium.as_str())
    .bind(&request.reason)
    .bind(&request.service_material)
    .bind(RequestStatus::Pending.as_str())
    .bind(&request.status_notes)
    .bind(&request.call_off_number)
    .bind(&request.remarks)
    .bind(job_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("Failed to insert {}", request.mrf_number))?;

    for (index, line) in request.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO material_request_lines
                (request_id, line_no, material_description, quantity, quantity_unit)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(request_id)
        .bind(index as i32 + 1)
        .bind(&line.material_description)
        .bind(line.quantity)
        .bind(&line.quantity_unit)
        .execute(&mut *conn)
        .await
        .context("Failed to insert imported line")?;
    }

    Ok(())
}
