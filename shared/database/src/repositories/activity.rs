//! Activity Repository
//!
//! Append-only activity log plus the admin dashboard counters.

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::BTreeMap;
use uuid::Uuid;

use mrf_models::{
    ActivityAction, ActivityFilter, ActivityLog, DashboardStats, LabelCount, NewActivity,
    PageRequest, Paginated,
};

/// Outcome of wiping all request data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurgeSummary {
    pub requests_deleted: u64,
    /// Stored names of the attachment files whose rows were removed.
    pub stored_files: Vec<String>,
}

pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an entry on an existing connection, usually inside the
    /// transaction of the change being logged.
    pub async fn record(conn: &mut PgConnection, activity: &NewActivity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (user_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(activity.user_id)
        .bind(activity.action.as_str())
        .bind(activity.entity_type)
        .bind(activity.entity_id)
        .bind(&activity.details)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to log activity {}", activity.action))?;
        Ok(())
    }

    pub async fn log(&self, activity: NewActivity) -> Result<()> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        Self::record(&mut conn, &activity).await
    }

    pub async fn list(&self, filter: &ActivityFilter) -> Result<Paginated<ActivityLog>> {
        let page = PageRequest::new(filter.page.unwrap_or(1), filter.limit.unwrap_or(100));

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM activity_logs WHERE 1=1");
        push_activity_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count activity logs")?;

        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM activity_logs WHERE 1=1");
        push_activity_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let logs = query
            .build_query_as::<ActivityLog>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list activity logs")?;

        Ok(Paginated::new(logs, page, total))
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let users: Vec<LabelCount> = sqlx::query_as(
            r#"
            SELECT role AS label, COUNT(*) AS count
            FROM users
            WHERE is_active = TRUE
            GROUP BY role
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to count users by role")?;

        let requests: Vec<LabelCount> = sqlx::query_as(
            "SELECT status AS label, COUNT(*) AS count FROM material_requests GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to count requests by status")?;

        let pending_quotations: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attachments WHERE category = 'quotation' AND status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count pending quotations")?;

        let activity_last_24h: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM activity_logs WHERE created_at > NOW() - INTERVAL '24 hours'",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count recent activity")?;

        Ok(DashboardStats {
            total_requests: requests.iter().map(|r| r.count).sum(),
            active_users_by_role: into_map(users),
            requests_by_status: into_map(requests),
            pending_quotations,
            activity_last_24h,
        })
    }

    /// Delete every request with its lines, history, attachments and import
    /// jobs in one transaction. Users, sessions and inventory are kept.
    pub async fn purge_request_data(&self, user_id: Uuid) -> Result<PurgeSummary> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let stored_files: Vec<String> = sqlx::query_scalar("SELECT stored_name FROM attachments")
            .fetch_all(&mut *tx)
            .await
            .context("Failed to list attachment files")?;

        for table in ["attachments", "approval_history", "material_request_lines"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to clear {}", table))?;
        }

        let requests = sqlx::query("DELETE FROM material_requests")
            .execute(&mut *tx)
            .await
            .context("Failed to clear material_requests")?;

        sqlx::query("DELETE FROM import_jobs")
            .execute(&mut *tx)
            .await
            .context("Failed to clear import_jobs")?;

        let activity = NewActivity::new(user_id, ActivityAction::DataPurged).details(format!(
            "All material request data deleted ({} requests)",
            requests.rows_affected()
        ));
        Self::record(&mut tx, &activity).await?;

        tx.commit().await.context("Failed to commit purge")?;

        tracing::warn!(
            requests = requests.rows_affected(),
            files = stored_files.len(),
            "All request data purged"
        );

        Ok(PurgeSummary {
            requests_deleted: requests.rows_affected(),
            stored_files,
        })
    }
}

fn push_activity_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ActivityFilter) {
    if let Some(user_id) = filter.user_id {
        query.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(action) = filter.action.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        query
            .push(" AND action ILIKE ")
            .push_bind(format!("%{}%", action));
    }
}

fn into_map(rows: Vec<LabelCount>) -> BTreeMap<String, i64> {
    rows.into_iter().map(|row| (row.label, row.count)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_filters() {
        let filter = ActivityFilter {
            action: Some("request".into()),
            user_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM activity_logs WHERE 1=1");
        push_activity_filters(&mut query, &filter);
        assert_eq!(
            query.sql(),
            "SELECT * FROM activity_logs WHERE 1=1 AND user_id = $1 AND action ILIKE $2"
        );
    }

    #[test]
    fn test_label_counts_fold_into_map() {
        let map = into_map(vec![
            LabelCount { label: "admin".into(), count: 1 },
            LabelCount { label: "worker".into(), count: 7 },
        ]);
        assert_eq!(map.get("worker"), Some(&7));
        assert_eq!(map.len(), 2);
    }
}
