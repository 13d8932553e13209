//! Tracker export in the fixed 25-column layout, plus the import template.

use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet};
use serde::Serialize;
use sqlx::FromRow;

use crate::error::{MrfError, MrfResult};

pub const EXPORT_HEADERS: [&str; 25] = [
    "Item",
    "Asset",
    "Mrf Number",
    "Request Date",
    "Year",
    "Reason for Request",
    "Service\\Material",
    "Discipline",
    "Criticality",
    "Status Notes",
    "Status",
    "Internal Reference",
    "Action Pending",
    "Vendor Name",
    "Blanket Order Number",
    "Call Off Number",
    "Quotation",
    "Quotation Approval Date",
    "Quotation Amount\nUSD",
    "Quotation Amount\nEUR",
    "Quotation Amount NGN",
    "Estimated Delivery",
    "Date of Delivery",
    "Notes",
    "Other",
];

const COLUMN_WIDTHS: [u16; 25] = [
    8, 15, 20, 15, 8, 50, 30, 15, 12, 30, 20, 20, 20, 25, 20, 18, 18, 18, 15, 15, 18, 15, 15, 30,
    20,
];

const NAVY: u32 = 0x00205B;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

impl ExportFormat {
    /// Anything but `csv` exports XLSX.
    pub fn parse(input: Option<&str>) -> Self {
        match input.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("csv") => ExportFormat::Csv,
            _ => ExportFormat::Xlsx,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

/// One exported request, numbered by request date.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ExportRow {
    pub item: i64,
    pub asset: String,
    pub mrf_number: String,
    pub request_date: NaiveDate,
    pub year: i32,
    pub reason: String,
    pub service_material: String,
    pub discipline: String,
    pub criticality: String,
    pub status_notes: Option<String>,
    pub status: String,
    pub internal_reference: Option<String>,
    pub action_pending: Option<String>,
    pub vendor_name: Option<String>,
    pub blanket_order_number: Option<String>,
    pub call_off_number: Option<String>,
    pub quotation_reference: Option<String>,
    pub quotation_approval_date: Option<NaiveDate>,
    pub quotation_amount_usd: Option<f64>,
    pub quotation_amount_eur: Option<f64>,
    pub quotation_amount_ngn: Option<f64>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub actual_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub other: Option<String>,
}

enum Value<'a> {
    Empty,
    Text(&'a str),
    Integer(i64),
    Amount(f64),
    Date(NaiveDate),
}

fn text(value: &Option<String>) -> Value<'_> {
    match value.as_deref() {
        Some(s) if !s.is_empty() => Value::Text(s),
        _ => Value::Empty,
    }
}

fn amount(value: Option<f64>) -> Value<'static> {
    value.map(Value::Amount).unwrap_or(Value::Empty)
}

fn date(value: Option<NaiveDate>) -> Value<'static> {
    value.map(Value::Date).unwrap_or(Value::Empty)
}

impl ExportRow {
    fn values(&self) -> [Value<'_>; 25] {
        [
            Value::Integer(self.item),
            Value::Text(&self.asset),
            Value::Text(&self.mrf_number),
            Value::Date(self.request_date),
            Value::Integer(self.year as i64),
            Value::Text(&self.reason),
            Value::Text(&self.service_material),
            Value::Text(&self.discipline),
            Value::Text(&self.criticality),
            text(&self.status_notes),
            Value::Text(&self.status),
            text(&self.internal_reference),
            text(&self.action_pending),
            text(&self.vendor_name),
            text(&self.blanket_order_number),
            text(&self.call_off_number),
            text(&self.quotation_reference),
            date(self.quotation_approval_date),
            amount(self.quotation_amount_usd),
            amount(self.quotation_amount_eur),
            amount(self.quotation_amount_ngn),
            date(self.estimated_delivery_date),
            date(self.actual_delivery_date),
            text(&self.notes),
            text(&self.other),
        ]
    }

    /// Example row shipped in the import template.
    pub fn sample() -> Self {
        let request_date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap_or(NaiveDate::MIN);
        Self {
            item: 1,
            asset: "LAND AREA".to_string(),
            mrf_number: "LAR-MTCE-001-2025".to_string(),
            request_date,
            year: 2025,
            reason: "TO CARRY OUT 500 HOURS ROUTINE PREVENTIVE MAINTENANCE SERVICE".to_string(),
            service_material: "OIL FILTER, FUEL FILTER, WATER SEPARATOR".to_string(),
            discipline: "MECHANICAL".to_string(),
            criticality: "Medium".to_string(),
            status_notes: None,
            status: "Pending".to_string(),
            internal_reference: None,
            action_pending: None,
            vendor_name: None,
            blanket_order_number: None,
            call_off_number: None,
            quotation_reference: None,
            quotation_approval_date: None,
            quotation_amount_usd: None,
            quotation_amount_eur: None,
            quotation_amount_ngn: None,
            estimated_delivery_date: None,
            actual_delivery_date: None,
            notes: None,
            other: None,
        }
    }
}

/// Days since 1899-12-30, the spreadsheet date epoch.
fn excel_serial(date: NaiveDate) -> f64 {
    const EPOCH_DAYS_FROM_CE: i32 = 693_594;
    (date.num_days_from_ce() - EPOCH_DAYS_FROM_CE) as f64
}

pub fn write_xlsx(rows: &[ExportRow], sheet_name: &str) -> MrfResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    write_header(worksheet)?;

    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let amount_format = Format::new().set_num_format("#,##0.00");

    for (r, row) in rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, value) in row.values().iter().enumerate() {
            let c = c as u16;
            match value {
                Value::Empty => {}
                Value::Text(s) => {
                    worksheet.write_string(r, c, *s)?;
                }
                Value::Integer(n) => {
                    worksheet.write_number(r, c, *n as f64)?;
                }
                Value::Amount(n) => {
                    worksheet.write_number_with_format(r, c, *n, &amount_format)?;
                }
                Value::Date(d) => {
                    worksheet.write_number_with_format(r, c, excel_serial(*d), &date_format)?;
                }
            }
        }
    }

    worksheet.autofilter(0, 0, rows.len() as u32, (EXPORT_HEADERS.len() - 1) as u16)?;
    worksheet.set_freeze_panes(1, 0)?;

    Ok(workbook.save_to_buffer()?)
}

fn write_header(worksheet: &mut Worksheet) -> MrfResult<()> {
    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(NAVY))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap();

    for (c, (title, width)) in EXPORT_HEADERS.iter().zip(COLUMN_WIDTHS).enumerate() {
        let c = c as u16;
        worksheet.write_string_with_format(0, c, *title, &header_format)?;
        worksheet.set_column_width(c, width)?;
    }
    worksheet.set_row_height(0, 30)?;
    Ok(())
}

pub fn write_csv(rows: &[ExportRow]) -> MrfResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| MrfError::export(format!("Failed to write CSV: {}", e));

    writer.write_record(EXPORT_HEADERS).map_err(csv_err)?;
    for row in rows {
        let record: Vec<String> = row
            .values()
            .iter()
            .map(|value| match value {
                Value::Empty => String::new(),
                Value::Text(s) => s.to_string(),
                Value::Integer(n) => n.to_string(),
                Value::Amount(n) => format!("{:.2}", n),
                Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            })
            .collect();
        writer.write_record(&record).map_err(csv_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| MrfError::export(format!("Failed to flush CSV: {}", e)))
}

/// Header row plus one example request.
pub fn import_template() -> MrfResult<Vec<u8>> {
    write_xlsx(&[ExportRow::sample()], "MRF Import Template")
}

/// `[LAR_|SAR_|PHC_]MRF_Export_<date>.<ext>`, prefixed when the location
/// filter names a site.
pub fn export_file_name(location: Option<&str>, format: &ExportFormat, today: NaiveDate) -> String {
    let prefix = match location.map(|l| l.trim().to_uppercase()) {
        Some(l) if l.contains("LAND") || l == "LAR" => "LAR_",
        Some(l) if l.contains("SWAMP") || l == "SAR" => "SAR_",
        Some(l) if l.contains("PHC") => "PHC_",
        _ => "",
    };
    format!(
        "{}MRF_Export_{}.{}",
        prefix,
        today.format("%Y-%m-%d"),
        format.extension()
    )
}
