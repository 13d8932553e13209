//! Analytics filters and result shapes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

use crate::{ParseEnumError, SiteCode, StageBucket};

/// Shared query string of the analytics endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub location: Option<String>,
    pub discipline: Option<String>,
}

/// How a location filter narrows requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationScope {
    /// Match on the MRF number prefix.
    Site(SiteCode),
    /// Match on the asset name, case-insensitively.
    Asset(String),
}

impl AnalyticsFilter {
    pub fn location_scope(&self) -> Option<LocationScope> {
        let location = self.location.as_deref()?.trim();
        if location.is_empty() || location.eq_ignore_ascii_case("all") {
            return None;
        }
        Some(match SiteCode::from_filter(location) {
            Some(site) => LocationScope::Site(site),
            None => LocationScope::Asset(location.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInterval {
    Day,
    Week,
    Month,
    Year,
}

impl TimeInterval {
    /// Unit passed to Postgres `date_trunc`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInterval::Day => "day",
            TimeInterval::Week => "week",
            TimeInterval::Month => "month",
            TimeInterval::Year => "year",
        }
    }
}

impl std::str::FromStr for TimeInterval {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(TimeInterval::Day),
            "week" => Ok(TimeInterval::Week),
            "month" => Ok(TimeInterval::Month),
            "year" => Ok(TimeInterval::Year),
            _ => Err(ParseEnumError::new("TimeInterval", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopMaterial {
    pub material_description: String,
    pub request_count: i64,
    pub total_quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    pub period: DateTime<Utc>,
    pub request_count: i64,
    pub total_quantity: f64,
}

/// Requests, quantity and value grouped by one dimension.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub label: String,
    pub request_count: i64,
    pub total_quantity: f64,
    pub total_value_usd: f64,
    pub total_value_ngn: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MaterialSearchHit {
    pub material_description: String,
    pub oem_model: String,
    pub part_number: String,
    pub request_count: i64,
    pub total_quantity: f64,
    pub last_requested: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageTotals {
    pub awaiting_approval: i64,
    pub awaiting_quotation: i64,
    pub delivered: i64,
    pub closed: i64,
}

impl StageTotals {
    /// Folds per-stage counts into dashboard buckets.
    pub fn from_stage_counts(counts: &[LabelCount]) -> Self {
        let mut totals = StageTotals::default();
        for entry in counts {
            let bucket = entry
                .label
                .parse::<crate::WorkflowStage>()
                .ok()
                .and_then(|stage| stage.bucket());
            match bucket {
                Some(StageBucket::AwaitingApproval) => totals.awaiting_approval += entry.count,
                Some(StageBucket::AwaitingQuotation) => totals.awaiting_quotation += entry.count,
                Some(StageBucket::Delivered) => totals.delivered += entry.count,
                Some(StageBucket::Closed) => totals.closed += entry.count,
                None => {}
            }
        }
        totals
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_requests: i64,
    pub by_status: BTreeMap<String, i64>,
    pub unique_materials: i64,
    pub total_quantity: f64,
    pub total_value_usd: f64,
    pub total_value_ngn: f64,
    pub average_per_month: f64,
    pub top_material: Option<TopMaterial>,
    pub workflow_stages: BTreeMap<String, i64>,
    pub stage_totals: StageTotals,
}

/// Average requests per month over the months that had any.
pub fn average_per_month(total_requests: i64, active_months: i64) -> f64 {
    if active_months <= 0 {
        return 0.0;
    }
    let average = total_requests as f64 / active_months as f64;
    (average * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_scope() {
        let mut filter = AnalyticsFilter {
            location: Some("Swamp Area".into()),
            ..Default::default()
        };
        assert_eq!(filter.location_scope(), Some(LocationScope::Site(SiteCode::Sar)));

        filter.location = Some("KWALE".into());
        assert_eq!(filter.location_scope(), Some(LocationScope::Asset("KWALE".into())));

        filter.location = Some("all".into());
        assert_eq!(filter.location_scope(), None);
    }

    #[test]
    fn test_interval_parse() {
        assert_eq!("Month".parse::<TimeInterval>().unwrap(), TimeInterval::Month);
        assert!("quarter".parse::<TimeInterval>().is_err());
    }

    #[test]
    fn test_stage_totals() {
        let counts = vec![
            LabelCount { label: "MRF_CREATED".into(), count: 4 },
            LabelCount { label: "BLANKET_CHECK".into(), count: 1 },
            LabelCount { label: "QUOTATION_SUBMITTED".into(), count: 2 },
            LabelCount { label: "RECEIVED".into(), count: 3 },
            LabelCount { label: "CLOSED".into(), count: 5 },
            LabelCount { label: "REJECTED".into(), count: 9 },
        ];
        let totals = StageTotals::from_stage_counts(&counts);
        assert_eq!(totals.awaiting_approval, 5);
        assert_eq!(totals.awaiting_quotation, 2);
        assert_eq!(totals.delivered, 3);
        assert_eq!(totals.closed, 5);
    }

    #[test]
    fn test_average_per_month() {
        assert_eq!(average_per_month(10, 3), 3.33);
        assert_eq!(average_per_month(10, 0), 0.0);
    }
}
