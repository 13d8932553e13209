//! Read-only analytics over requests and their lines.

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use mrf_database::{AnalyticsRepository, BreakdownDimension, DEFAULT_TOP_MATERIALS};
use mrf_models::{
    AnalyticsFilter, AnalyticsSummary, Breakdown, MaterialSearchHit, TimeInterval,
    TimeSeriesPoint, TopMaterial,
};
use mrf_utils::{validate_date_range, MrfError, MrfResult};

use super::{ApiResponse, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TopMaterialsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeSeriesQuery {
    pub interval: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDetail {
    pub location: String,
    pub summary: AnalyticsSummary,
    pub top_materials: Vec<TopMaterial>,
}

fn repository(state: &AppState, filter: &AnalyticsFilter) -> MrfResult<AnalyticsRepository> {
    validate_date_range(filter.from, filter.to)?;
    Ok(AnalyticsRepository::new(state.pool.clone()))
}

pub fn parse_interval(input: Option<&str>) -> MrfResult<TimeInterval> {
    input
        .unwrap_or("month")
        .parse()
        .map_err(|_| MrfError::validation("Invalid interval. Use day, week, month or year"))
}

/// GET /api/analytics/summary
pub async fn summary(
    State(state): State<AppState>,
    Query(filter): Query<AnalyticsFilter>,
) -> ApiResult<AnalyticsSummary> {
    let summary = repository(&state, &filter)?.summary(&filter).await?;
    Ok(ApiResponse::ok(summary))
}

/// GET /api/analytics/top-materials
pub async fn top_materials(
    State(state): State<AppState>,
    Query(filter): Query<AnalyticsFilter>,
    Query(query): Query<TopMaterialsQuery>,
) -> ApiResult<Vec<TopMaterial>> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_MATERIALS);
    let materials = repository(&state, &filter)?.top_materials(&filter, limit).await?;
    Ok(ApiResponse::ok(materials))
}

/// GET /api/analytics/timeseries
pub async fn time_series(
    State(state): State<AppState>,
    Query(filter): Query<AnalyticsFilter>,
    Query(query): Query<TimeSeriesQuery>,
) -> ApiResult<Vec<TimeSeriesPoint>> {
    let interval = parse_interval(query.interval.as_deref())?;
    let points = repository(&state, &filter)?.time_series(&filter, interval).await?;
    Ok(ApiResponse::ok(points))
}

/// GET /api/analytics/search
pub async fn search_materials(
    State(state): State<AppState>,
    Query(filter): Query<AnalyticsFilter>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<MaterialSearchHit>> {
    let term = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| MrfError::validation("Search query is required"))?;

    let hits = repository(&state, &filter)?.search_materials(term, &filter).await?;
    Ok(ApiResponse::ok(hits))
}

async fn breakdown(
    state: &AppState,
    dimension: BreakdownDimension,
    filter: &AnalyticsFilter,
) -> ApiResult<Vec<Breakdown>> {
    let rows = repository(state, filter)?.breakdown(dimension, filter).await?;
    Ok(ApiResponse::ok(rows))
}

/// GET /api/analytics/by-location
pub async fn by_location(
    State(state): State<AppState>,
    Query(filter): Query<AnalyticsFilter>,
) -> ApiResult<Vec<Breakdown>> {
    breakdown(&state, BreakdownDimension::Location, &filter).await
}

/// GET /api/analytics/by-group
pub async fn by_group(
    State(state): State<AppState>,
    Query(filter): Query<AnalyticsFilter>,
) -> ApiResult<Vec<Breakdown>> {
    breakdown(&state, BreakdownDimension::Discipline, &filter).await
}

/// GET /api/analytics/by-vendor
pub async fn by_vendor(
    State(state): State<AppState>,
    Query(filter): Query<AnalyticsFilter>,
) -> ApiResult<Vec<Breakdown>> {
    breakdown(&state, BreakdownDimension::Vendor, &filter).await
}

/// GET /api/analytics/location/:location
pub async fn location_detail(
    State(state): State<AppState>,
    Path(location): Path<String>,
    Query(mut filter): Query<AnalyticsFilter>,
) -> ApiResult<LocationDetail> {
    filter.location = Some(location.clone());
    let repo = repository(&state, &filter)?;

    let summary = repo.summary(&filter).await?;
    let top_materials = repo.top_materials(&filter, DEFAULT_TOP_MATERIALS).await?;
    Ok(ApiResponse::ok(LocationDetail {
        location,
        summary,
        top_materials,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_defaults_to_month() {
        assert_eq!(parse_interval(None).unwrap(), TimeInterval::Month);
        assert_eq!(parse_interval(Some("WEEK")).unwrap(), TimeInterval::Week);
    }

    #[test]
    fn test_unknown_interval_is_rejected() {
        let err = parse_interval(Some("fortnight")).unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }
}
