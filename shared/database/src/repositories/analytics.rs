//! Analytics Repository
//!
//! Read-only aggregates over requests and their lines. All queries share
//! one filter: date range, location (site prefix or asset) and discipline.

use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, QueryBuilder};

use mrf_models::{
    average_per_month, AnalyticsFilter, AnalyticsSummary, Breakdown, LabelCount, LocationScope,
    MaterialSearchHit, StageTotals, TimeInterval, TimeSeriesPoint, TopMaterial,
};

pub const DEFAULT_TOP_MATERIALS: i64 = 10;
const MAX_SEARCH_HITS: i64 = 100;

/// Dimension a breakdown groups requests by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakdownDimension {
    Location,
    Discipline,
    Vendor,
}

impl BreakdownDimension {
    fn label_sql(&self) -> &'static str {
        match self {
            BreakdownDimension::Location => "r.asset",
            BreakdownDimension::Discipline => "UPPER(r.discipline)",
            BreakdownDimension::Vendor => "COALESCE(NULLIF(TRIM(r.vendor_name), ''), 'Unassigned')",
        }
    }
}

pub struct AnalyticsRepository {
    pool: PgPool,
}

impl AnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn summary(&self, filter: &AnalyticsFilter) -> Result<AnalyticsSummary> {
        let mut totals = QueryBuilder::<Postgres>::new(
            r#"
            SELECT COUNT(*),
                   COUNT(DISTINCT date_trunc('month', r.request_date)),
                   COALESCE(SUM(r.quotation_amount_usd), 0),
                   COALESCE(SUM(r.quotation_amount_ngn), 0)
            FROM material_requests r
            WHERE 1=1"#,
        );
        push_analytics_filters(&mut totals, filter);
        let (total_requests, active_months, total_value_usd, total_value_ngn): (i64, i64, f64, f64) =
            totals
                .build_query_as()
                .fetch_one(&self.pool)
                .await
                .context("Failed to compute request totals")?;

        let mut materials = QueryBuilder::<Postgres>::new(
            r#"
            SELECT COUNT(DISTINCT LOWER(l.material_description)),
                   COALESCE(SUM(l.quantity), 0)
            FROM material_request_lines l
            JOIN material_requests r ON r.id = l.request_id
            WHERE 1=1"#,
        );
        push_analytics_filters(&mut materials, filter);
        let (unique_materials, total_quantity): (i64, f64) = materials
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .context("Failed to compute material totals")?;

        let by_status = self.label_counts("r.status", filter).await?;
        let stages = self.label_counts("r.workflow_stage", filter).await?;
        let top_material = self.top_materials(filter, 1).await?.into_iter().next();

        Ok(AnalyticsSummary {
            total_requests,
            by_status: by_status.iter().map(|c| (c.label.clone(), c.count)).collect(),
            unique_materials,
            total_quantity,
            total_value_usd,
            total_value_ngn,
            average_per_month: average_per_month(total_requests, active_months),
            top_material,
            stage_totals: StageTotals::from_stage_counts(&stages),
            workflow_stages: stages.into_iter().map(|c| (c.label, c.count)).collect(),
        })
    }

    async fn label_counts(&self, column: &'static str, filter: &AnalyticsFilter) -> Result<Vec<LabelCount>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} AS label, COUNT(*) AS count FROM material_requests r WHERE 1=1",
            column
        ));
        push_analytics_filters(&mut query, filter);
        query.push(" GROUP BY 1 ORDER BY 2 DESC");

        query
            .build_query_as::<LabelCount>()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to count requests by {}", column))
    }

    pub async fn top_materials(&self, filter: &AnalyticsFilter, limit: i64) -> Result<Vec<TopMaterial>> {
        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT l.material_description,
                   COUNT(DISTINCT r.id) AS request_count,
                   COALESCE(SUM(l.quantity), 0) AS total_quantity
            FROM material_request_lines l
            JOIN material_requests r ON r.id = l.request_id
            WHERE 1=1"#,
        );
        push_analytics_filters(&mut query, filter);
        query
            .push(" GROUP BY l.material_description ORDER BY request_count DESC, total_quantity DESC LIMIT ")
            .push_bind(limit.clamp(1, 100));

        query
            .build_query_as::<TopMaterial>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch top materials")
    }

    pub async fn time_series(&self, filter: &AnalyticsFilter, interval: TimeInterval) -> Result<Vec<TimeSeriesPoint>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            r#"
            SELECT date_trunc('{}', r.request_date::timestamptz) AS period,
                   COUNT(DISTINCT r.id) AS request_count,
                   COALESCE(SUM(l.quantity), 0) AS total_quantity
            FROM material_requests r
            LEFT JOIN material_request_lines l ON l.request_id = r.id
            WHERE 1=1"#,
            interval.as_str()
        ));
        push_analytics_filters(&mut query, filter);
        query.push(" GROUP BY 1 ORDER BY 1");

        query
            .build_query_as::<TimeSeriesPoint>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch time series")
    }

    pub async fn search_materials(&self, term: &str, filter: &AnalyticsFilter) -> Result<Vec<MaterialSearchHit>> {
        let pattern = format!("%{}%", term.trim());

        let mut query = QueryBuilder::<Postgres>::new(
            r#"
            SELECT l.material_description, l.oem_model, l.part_number,
                   COUNT(DISTINCT r.id) AS request_count,
                   COALESCE(SUM(l.quantity), 0) AS total_quantity,
                   MAX(r.request_date) AS last_requested
            FROM material_request_lines l
            JOIN material_requests r ON r.id = l.request_id
            WHERE (l.material_description ILIKE "#,
        );
        query
            .push_bind(pattern.clone())
            .push(" OR l.part_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR l.oem_model ILIKE ")
            .push_bind(pattern)
            .push(")");
        push_analytics_filters(&mut query, filter);
        query
            .push(" GROUP BY 1, 2, 3 ORDER BY request_count DESC, last_requested DESC LIMIT ")
            .push_bind(MAX_SEARCH_HITS);

        query
            .build_query_as::<MaterialSearchHit>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to search materials")
    }

    pub async fn breakdown(&self, dimension: BreakdownDimension, filter: &AnalyticsFilter) -> Result<Vec<Breakdown>> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            r#"
            SELECT {} AS label,
                   COUNT(*) AS request_count,
                   COALESCE(SUM(q.quantity), 0) AS total_quantity,
                   COALESCE(SUM(r.quotation_amount_usd), 0) AS total_value_usd,
                   COALESCE(SUM(r.quotation_amount_ngn), 0) AS total_value_ngn
            FROM material_requests r
            LEFT JOIN (
                SELECT request_id, SUM(quantity) AS quantity
                FROM material_request_lines
                GROUP BY request_id
            ) q ON q.request_id = r.id
            WHERE 1=1"#,
            dimension.label_sql()
        ));
        push_analytics_filters(&mut query, filter);
        query.push(" GROUP BY 1 ORDER BY request_count DESC, label");

        query
            .build_query_as::<Breakdown>()
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch breakdown by {:?}", dimension))
    }
}

fn push_analytics_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &AnalyticsFilter) {
    if let Some(from) = filter.from {
        query.push(" AND r.request_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        query.push(" AND r.request_date <= ").push_bind(to);
    }
    match filter.location_scope() {
        Some(LocationScope::Site(site)) => {
            query.push(" AND r.mrf_number LIKE ").push_bind(site.like_pattern());
        }
        Some(LocationScope::Asset(asset)) => {
            query.push(" AND r.asset ILIKE ").push_bind(asset);
        }
        None => {}
    }
    if let Some(discipline) = filter
        .discipline
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty() && !d.eq_ignore_ascii_case("all"))
    {
        query
            .push(" AND UPPER(r.discipline) = ")
            .push_bind(discipline.to_uppercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sql_for(filter: &AnalyticsFilter) -> String {
        let mut query = QueryBuilder::<Postgres>::new("SELECT 1 FROM material_requests r WHERE 1=1");
        push_analytics_filters(&mut query, filter);
        query.sql().to_string()
    }

    #[test]
    fn test_site_location_filters_by_prefix() {
        let filter = AnalyticsFilter {
            from: NaiveDate::from_ymd_opt(2025, 1, 1),
            to: NaiveDate::from_ymd_opt(2025, 6, 30),
            location: Some("Swamp Area".into()),
            discipline: Some("mechanical".into()),
        };
        assert_eq!(
            sql_for(&filter),
            "SELECT 1 FROM material_requests r WHERE 1=1 AND r.request_date >= $1 \
             AND r.request_date <= $2 AND r.mrf_number LIKE $3 AND UPPER(r.discipline) = $4"
        );
    }

    #[test]
    fn test_other_location_matches_asset() {
        let filter = AnalyticsFilter {
            location: Some("OBOB".into()),
            ..Default::default()
        };
        assert!(sql_for(&filter).ends_with("AND r.asset ILIKE $1"));
    }

    #[test]
    fn test_all_location_is_unfiltered() {
        let filter = AnalyticsFilter {
            location: Some("all".into()),
            discipline: Some("All".into()),
            ..Default::default()
        };
        assert_eq!(sql_for(&filter), "SELECT 1 FROM material_requests r WHERE 1=1");
    }

    #[test]
    fn test_breakdown_labels() {
        assert_eq!(BreakdownDimension::Location.label_sql(), "r.asset");
        assert!(BreakdownDimension::Vendor.label_sql().contains("Unassigned"));
    }
}
