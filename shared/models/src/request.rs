//! Material requests and their line items.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{Attachment, SiteCode, WorkflowStage};

string_enum! {
    pub enum Criticality {
        Low => "Low",
        Medium => "Medium",
        High => "High",
        Critical => "Critical",
    }
}

impl Default for Criticality {
    fn default() -> Self {
        Criticality::Medium
    }
}

string_enum! {
    /// Administrative status, tracked separately from the workflow stage.
    pub enum RequestStatus {
        Pending => "Pending",
        Approved => "Approved",
        Rejected => "Rejected",
        Ordered => "Ordered",
        Delivered => "Delivered",
        Completed => "Completed",
    }
}

string_enum! {
    /// Request level summary of its quotation attachments.
    pub enum QuotationStatus {
        NotSubmitted => "Not Submitted",
        Pending => "Pending",
        Approved => "Approved",
        Rejected => "Rejected",
    }
}

impl QuotationStatus {
    /// Accepts the spellings the UI and imported sheets use
    /// (`not_submitted`, `Not Submitted`, `approved`, ...).
    pub fn normalize(input: &str) -> Option<Self> {
        input.trim().replace(['_', '-'], " ").parse().ok()
    }
}

pub const DISCIPLINES: &[&str] = &[
    "MECHANICAL",
    "ELECTRICAL",
    "INSTRUMENT",
    "GMC",
    "ASSET INTEGRITY",
    "SERVICE",
    "ROT EQUIPMENT",
    "others",
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MaterialRequest {
    pub id: Uuid,
    pub mrf_number: String,
    pub request_date: NaiveDate,
    pub user_id: Option<Uuid>,

    // Requester
    pub first_name: String,
    pub last_name: String,
    pub user_code: String,
    pub designation: String,
    pub office_extension: String,

    // Work details
    pub asset: String,
    pub unit_tag: String,
    pub discipline: String,
    pub material_category: String,
    #[sqlx(try_from = "String")]
    pub criticality: Criticality,
    pub work_order_no: String,
    pub work_order_type: String,
    pub reason: String,
    pub service_material: String,
    pub remarks: Option<String>,

    // Procurement tracking
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    pub status_notes: Option<String>,
    pub internal_reference: Option<String>,
    pub action_pending: Option<String>,
    pub vendor_name: Option<String>,
    pub blanket_order_number: Option<String>,
    pub call_off_number: Option<String>,
    pub purchase_order_no: Option<String>,
    pub quotation_reference: Option<String>,
    #[sqlx(try_from = "String")]
    pub quotation_status: QuotationStatus,
    pub quotation_approval_date: Option<NaiveDate>,
    pub quotation_amount_usd: Option<f64>,
    pub quotation_amount_eur: Option<f64>,
    pub quotation_amount_ngn: Option<f64>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub actual_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub other: Option<String>,

    // Workflow
    #[sqlx(try_from = "String")]
    pub workflow_stage: WorkflowStage,
    pub approved_by_supervisor: Option<Uuid>,
    pub approved_date_supervisor: Option<DateTime<Utc>>,
    pub supervisor_comments: Option<String>,
    pub approved_by_manager: Option<Uuid>,
    pub approved_date_manager: Option<DateTime<Utc>>,
    pub manager_comments: Option<String>,
    pub approved_by_area_manager: Option<Uuid>,
    pub approved_date_area_manager: Option<DateTime<Utc>>,
    pub area_manager_comments: Option<String>,
    pub has_blanket_order: bool,
    pub blanket_order_ref: Option<String>,
    pub proforma_ref: Option<String>,
    pub proforma_amount_usd: Option<f64>,
    pub proforma_amount_ngn: Option<f64>,
    pub proforma_date: Option<NaiveDate>,
    pub compliance_status: Option<String>,
    pub compliance_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub rejection_stage: Option<String>,
    pub rescheduled_date: Option<NaiveDate>,
    pub reschedule_reason: Option<String>,

    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MaterialRequest {
    pub fn requester_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn site(&self) -> Option<SiteCode> {
        SiteCode::of_reference(&self.mrf_number)
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == Some(user_id) || self.created_by == Some(user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct MaterialRequestLine {
    pub id: Uuid,
    pub request_id: Uuid,
    pub line_no: i32,
    pub material_description: String,
    pub oem_model: String,
    pub part_number: String,
    pub quantity: f64,
    pub quantity_unit: String,
    pub received_quantity: f64,
}

/// Request row as listed, with its line count.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RequestListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub request: MaterialRequest,
    pub line_items_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: MaterialRequest,
    pub lines: Vec<MaterialRequestLine>,
    pub attachments: Vec<Attachment>,
}

/// Body of `POST /requests`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMaterialRequest {
    /// Explicit reference number; generated from `area` when absent.
    pub mrf_number: Option<String>,
    pub request_date: Option<NaiveDate>,
    pub area: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub user_code: String,
    #[serde(default)]
    pub designation: String,
    pub office_extension: Option<String>,
    #[serde(default, alias = "location")]
    pub asset: String,
    pub unit_tag: Option<String>,
    #[serde(default, alias = "material_group")]
    pub discipline: String,
    pub material_category: Option<String>,
    #[serde(alias = "priority")]
    pub criticality: Option<String>,
    pub work_order_no: Option<String>,
    pub work_order_type: Option<String>,
    #[serde(default)]
    pub reason: String,
    pub service_material: Option<String>,
    pub remarks: Option<String>,
    #[serde(default)]
    pub lines: Vec<NewRequestLine>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRequestLine {
    #[serde(default)]
    pub material_description: String,
    pub oem_model: Option<String>,
    pub part_number: Option<String>,
    pub quantity: Option<f64>,
    pub quantity_unit: Option<String>,
}

impl NewMaterialRequest {
    /// All problems with the submission, in form order. Empty when valid.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let required = [
            (&self.first_name, "First name is required"),
            (&self.last_name, "Last name is required"),
            (&self.user_code, "User ID is required"),
            (&self.designation, "Designation is required"),
            (&self.asset, "Location is required"),
            (&self.discipline, "Material group/discipline is required"),
            (&self.reason, "Reason for request is required"),
        ];
        for (value, message) in required {
            if value.trim().is_empty() {
                errors.push(message.to_string());
            }
        }

        if let Some(criticality) = self.criticality.as_deref() {
            if criticality.parse::<Criticality>().is_err() {
                errors.push("Invalid criticality value".to_string());
            }
        }

        if self.lines.is_empty() {
            errors.push("At least one material line item is required".to_string());
        }
        for (index, line) in self.lines.iter().enumerate() {
            if line.material_description.trim().is_empty() {
                errors.push(format!("Line {}: Material description is required", index + 1));
            }
            match line.quantity {
                Some(quantity) if quantity.is_finite() && quantity > 0.0 => {}
                _ => errors.push(format!("Line {}: Quantity must be greater than 0", index + 1)),
            }
        }

        errors
    }

    pub fn criticality(&self) -> Criticality {
        self.criticality
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or_default()
    }

    /// Site used when the reference number has to be generated. A missing
    /// area means Land Area; the asset name never picks the site.
    pub fn site(&self) -> SiteCode {
        self.area
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .map(SiteCode::from_area)
            .unwrap_or(SiteCode::Lar)
    }

    pub fn explicit_mrf_number(&self) -> Option<&str> {
        self.mrf_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// Body of `PUT /requests/:id`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestUpdate {
    pub status: Option<RequestStatus>,
    pub status_notes: Option<String>,
    pub internal_reference: Option<String>,
    pub action_pending: Option<String>,
    pub vendor_name: Option<String>,
    pub blanket_order_number: Option<String>,
    pub call_off_number: Option<String>,
    pub purchase_order_no: Option<String>,
    pub quotation_reference: Option<String>,
    pub quotation_status: Option<String>,
    pub quotation_approval_date: Option<NaiveDate>,
    pub quotation_amount_usd: Option<f64>,
    pub quotation_amount_eur: Option<f64>,
    pub quotation_amount_ngn: Option<f64>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub actual_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub other: Option<String>,
    pub remarks: Option<String>,
}

impl RequestUpdate {
    /// True when any field other than `remarks` is set.
    pub fn touches_tracking_fields(&self) -> bool {
        self.status.is_some()
            || self.status_notes.is_some()
            || self.internal_reference.is_some()
            || self.action_pending.is_some()
            || self.vendor_name.is_some()
            || self.blanket_order_number.is_some()
            || self.call_off_number.is_some()
            || self.purchase_order_no.is_some()
            || self.quotation_reference.is_some()
            || self.quotation_status.is_some()
            || self.quotation_approval_date.is_some()
            || self.quotation_amount_usd.is_some()
            || self.quotation_amount_eur.is_some()
            || self.quotation_amount_ngn.is_some()
            || self.estimated_delivery_date.is_some()
            || self.actual_delivery_date.is_some()
            || self.notes.is_some()
            || self.other.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.touches_tracking_fields() && self.remarks.is_none()
    }

    /// Drops everything but `remarks`, for callers without tracking rights.
    pub fn remarks_only(self) -> Self {
        Self {
            remarks: self.remarks,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSort {
    #[default]
    DateDesc,
    DateAsc,
    MrfNumber,
    Criticality,
}

impl RequestSort {
    pub fn parse(input: Option<&str>) -> Self {
        match input.map(str::trim) {
            Some("date_asc") => RequestSort::DateAsc,
            Some("mrf_number") => RequestSort::MrfNumber,
            Some("criticality") => RequestSort::Criticality,
            _ => RequestSort::DateDesc,
        }
    }

    pub fn order_by(&self) -> &'static str {
        match self {
            RequestSort::DateDesc => "r.request_date DESC, r.created_at DESC",
            RequestSort::DateAsc => "r.request_date ASC, r.created_at ASC",
            RequestSort::MrfNumber => "r.mrf_number ASC",
            RequestSort::Criticality => {
                "CASE r.criticality WHEN 'Critical' THEN 1 WHEN 'High' THEN 2 \
                 WHEN 'Medium' THEN 3 ELSE 4 END, r.request_date DESC"
            }
        }
    }
}

/// Query string of `GET /requests`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<String>,
    pub area: Option<String>,
    pub location: Option<String>,
    pub discipline: Option<String>,
    pub vendor: Option<String>,
    pub mrf: Option<String>,
    pub quotation_status: Option<String>,
    pub material: Option<String>,
    pub user_id: Option<Uuid>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Query string of `GET /exports`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportFilter {
    pub format: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<String>,
    pub criticality: Option<String>,
    pub location: Option<String>,
    pub material: Option<String>,
}

/// Fixed value lists offered by the request form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lookups {
    pub material_groups: Vec<&'static str>,
    pub priorities: Vec<&'static str>,
    pub statuses: Vec<&'static str>,
    pub quotation_statuses: Vec<&'static str>,
    pub land_area_locations: Vec<&'static str>,
    pub swamp_area_locations: Vec<&'static str>,
    pub phc_pod_locations: Vec<&'static str>,
}

impl Lookups {
    pub fn standard() -> Self {
        Self {
            material_groups: DISCIPLINES.to_vec(),
            priorities: Criticality::ALL.iter().map(|c| c.as_str()).collect(),
            statuses: RequestStatus::ALL.iter().map(|s| s.as_str()).collect(),
            quotation_statuses: QuotationStatus::ALL.iter().map(|s| s.as_str()).collect(),
            land_area_locations: SiteCode::Lar.locations().to_vec(),
            swamp_area_locations: SiteCode::Sar.locations().to_vec(),
            phc_pod_locations: SiteCode::Phc.locations().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> NewMaterialRequest {
        NewMaterialRequest {
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            user_code: "EMP-044".into(),
            designation: "Technician".into(),
            asset: "OBOB".into(),
            discipline: "MECHANICAL".into(),
            reason: "Pump seal replacement".into(),
            lines: vec![NewRequestLine {
                material_description: "Mechanical seal 45mm".into(),
                quantity: Some(2.0),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_request_has_no_errors() {
        assert!(valid_request().validation_errors().is_empty());
    }

    #[test]
    fn test_validation_collects_every_message() {
        let mut request = valid_request();
        request.user_code = "  ".into();
        request.criticality = Some("Urgent".into());
        request.lines.push(NewRequestLine {
            material_description: String::new(),
            quantity: Some(0.0),
            ..Default::default()
        });

        let errors = request.validation_errors();
        assert_eq!(
            errors,
            vec![
                "User ID is required".to_string(),
                "Invalid criticality value".to_string(),
                "Line 2: Material description is required".to_string(),
                "Line 2: Quantity must be greater than 0".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_lines_rejected() {
        let mut request = valid_request();
        request.lines.clear();
        assert_eq!(
            request.validation_errors(),
            vec!["At least one material line item is required".to_string()]
        );
    }

    #[test]
    fn test_defaults_and_site() {
        let mut request = valid_request();
        assert_eq!(request.criticality(), Criticality::Medium);
        assert_eq!(request.site(), SiteCode::Lar);

        request.area = Some("Swamp Area".into());
        assert_eq!(request.site(), SiteCode::Sar);

        request.mrf_number = Some("   ".into());
        assert_eq!(request.explicit_mrf_number(), None);
    }

    #[test]
    fn test_asset_does_not_choose_site() {
        let mut request = valid_request();
        request.area = None;
        request.asset = "PHC".into();
        assert_eq!(request.site(), SiteCode::Lar);

        request.area = Some("  ".into());
        request.asset = "Swamp Area".into();
        assert_eq!(request.site(), SiteCode::Lar);

        request.area = Some("PHC POD".into());
        assert_eq!(request.site(), SiteCode::Phc);
    }

    #[test]
    fn test_location_alias() {
        let json = r#"{"location":"KWALE","material_group":"GMC","priority":"High"}"#;
        let request: NewMaterialRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.asset, "KWALE");
        assert_eq!(request.discipline, "GMC");
        assert_eq!(request.criticality(), Criticality::High);
    }

    #[test]
    fn test_quotation_status_normalize() {
        assert_eq!(QuotationStatus::normalize("not_submitted"), Some(QuotationStatus::NotSubmitted));
        assert_eq!(QuotationStatus::normalize("APPROVED"), Some(QuotationStatus::Approved));
        assert_eq!(QuotationStatus::normalize("lost"), None);
    }

    #[test]
    fn test_update_rights() {
        let update = RequestUpdate {
            vendor_name: Some("Acme".into()),
            remarks: Some("call vendor".into()),
            ..Default::default()
        };
        assert!(update.touches_tracking_fields());

        let trimmed = update.remarks_only();
        assert!(!trimmed.touches_tracking_fields());
        assert!(!trimmed.is_empty());
        assert!(RequestUpdate::default().is_empty());
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!(RequestSort::parse(None), RequestSort::DateDesc);
        assert_eq!(RequestSort::parse(Some("criticality")), RequestSort::Criticality);
        assert_eq!(RequestSort::parse(Some("bogus")), RequestSort::DateDesc);
    }
}
