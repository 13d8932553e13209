//! Warehouse inventory: receipts, disbursements, stock and surplus.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Warehouse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub location: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Stock position of one material in one warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct InventoryStock {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub warehouse_name: String,
    pub material_description: String,
    pub oem_model: String,
    pub part_number: String,
    pub quantity_available: f64,
    pub unit: String,
    pub reorder_level: f64,
    pub shelf_location: Option<String>,
    pub remarks: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryStock {
    pub fn is_low_stock(&self) -> bool {
        self.quantity_available <= self.reorder_level
    }
}

/// Kind of warehouse document, which decides its number prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarehouseDocument {
    Receipt,
    Disbursement,
}

impl WarehouseDocument {
    pub fn prefix(&self) -> &'static str {
        match self {
            WarehouseDocument::Receipt => "WR",
            WarehouseDocument::Disbursement => "WD",
        }
    }

    /// `WR-20250131-0001`: date plus the day's running count.
    pub fn number(&self, date: NaiveDate, sequence: i64) -> String {
        format!("{}-{}-{:04}", self.prefix(), date.format("%Y%m%d"), sequence)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct WarehouseReceipt {
    pub id: Uuid,
    pub receipt_number: String,
    pub warehouse_id: Uuid,
    pub receipt_date: NaiveDate,
    pub mrf_number: Option<String>,
    pub supplier: Option<String>,
    pub received_by: String,
    pub remarks: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Disbursement {
    pub id: Uuid,
    pub disbursement_number: String,
    pub warehouse_id: Uuid,
    pub disbursement_date: NaiveDate,
    pub mrf_number: Option<String>,
    pub disbursed_by: String,
    pub received_by: String,
    pub purpose: Option<String>,
    pub remarks: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Line of a receipt or disbursement.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DocumentLine {
    pub id: Uuid,
    pub document_id: Uuid,
    pub line_no: i32,
    pub material_description: String,
    pub oem_model: String,
    pub part_number: String,
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptDetail {
    #[serde(flatten)]
    pub receipt: WarehouseReceipt,
    pub lines: Vec<DocumentLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisbursementDetail {
    #[serde(flatten)]
    pub disbursement: Disbursement,
    pub lines: Vec<DocumentLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InventoryItem {
    #[validate(length(min = 1, message = "Material description is required"))]
    pub material_description: String,
    #[serde(default)]
    pub oem_model: String,
    #[serde(default)]
    pub part_number: String,
    #[validate(range(min = 0.0001, message = "Quantity must be greater than 0"))]
    pub quantity: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
}

fn default_unit() -> String {
    "pcs".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewReceipt {
    pub warehouse_id: Uuid,
    pub receipt_date: NaiveDate,
    pub mrf_number: Option<String>,
    pub supplier: Option<String>,
    #[validate(length(min = 1, message = "Received by is required"))]
    pub received_by: String,
    pub remarks: Option<String>,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewDisbursement {
    pub warehouse_id: Uuid,
    pub disbursement_date: NaiveDate,
    pub mrf_number: Option<String>,
    #[validate(length(min = 1, message = "Disbursed by is required"))]
    pub disbursed_by: String,
    #[validate(length(min = 1, message = "Received by is required"))]
    pub received_by: String,
    pub purpose: Option<String>,
    pub remarks: Option<String>,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockUpdate {
    pub reorder_level: Option<f64>,
    pub shelf_location: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockFilter {
    pub warehouse_id: Option<Uuid>,
    pub search: Option<String>,
    #[serde(default)]
    pub low_stock_only: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentFilter {
    pub warehouse_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub const DEFAULT_DISPOSITION: &str = "Available";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct SurplusRecord {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub material_description: String,
    pub oem_model: String,
    pub part_number: String,
    pub quantity: f64,
    pub unit: String,
    pub condition: Option<String>,
    pub disposition: String,
    pub reported_by: String,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewSurplus {
    pub warehouse_id: Uuid,
    #[validate(length(min = 1, message = "Material description is required"))]
    pub material_description: String,
    #[serde(default)]
    pub oem_model: String,
    #[serde(default)]
    pub part_number: String,
    #[validate(range(min = 0.0001, message = "Quantity must be greater than 0"))]
    pub quantity: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub condition: Option<String>,
    pub disposition: Option<String>,
    #[validate(length(min = 1, message = "Reported by is required"))]
    pub reported_by: String,
    pub remarks: Option<String>,
}

impl NewSurplus {
    pub fn disposition(&self) -> &str {
        self.disposition
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DISPOSITION)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurplusUpdate {
    pub disposition: Option<String>,
    pub quantity: Option<f64>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurplusFilter {
    pub warehouse_id: Option<Uuid>,
    pub disposition: Option<String>,
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_numbers() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(WarehouseDocument::Receipt.number(date, 1), "WR-20250131-0001");
        assert_eq!(WarehouseDocument::Disbursement.number(date, 27), "WD-20250131-0027");
    }

    #[test]
    fn test_receipt_validation() {
        let receipt = NewReceipt {
            warehouse_id: Uuid::new_v4(),
            receipt_date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            mrf_number: None,
            supplier: None,
            received_by: String::new(),
            remarks: None,
            items: vec![],
        };
        let errors = receipt.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("received_by"));
        assert!(errors.field_errors().contains_key("items"));
    }

    #[test]
    fn test_item_quantity_must_be_positive() {
        let item: InventoryItem =
            serde_json::from_str(r#"{"material_description":"Gasket","quantity":0}"#).unwrap();
        assert_eq!(item.unit, "pcs");
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_surplus_disposition_default() {
        let surplus: NewSurplus = serde_json::from_value(serde_json::json!({
            "warehouse_id": Uuid::new_v4(),
            "material_description": "Valve 2in",
            "quantity": 3.0,
            "disposition": "  ",
            "reported_by": "Store keeper"
        }))
        .unwrap();
        assert_eq!(surplus.disposition(), "Available");
    }
}
