//! Tracker sheet parser.
//!
//! The first sheet's first row is the header row. Columns are matched by
//! case-insensitive substring rules and data rows are grouped by MRF number
//! into [`ImportedRequest`]s.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek};

use calamine::{open_workbook_from_rs, DataType, Range, Reader, Xls, Xlsx};
use chrono::{Duration, NaiveDate};
use mrf_models::{ImportRowError, ImportedLine, ImportedRequest};

use super::SheetFormat;
use crate::error::{MrfError, MrfResult};

const DEFAULT_LOCATION: &str = "Not Specified";
const DEFAULT_DISCIPLINE: &str = "General";
const DEFAULT_REASON: &str = "No reason provided";
const DEFAULT_SERVICE_MATERIAL: &str = "Material";
const FALLBACK_LINE: &str = "Material request";
const DEFAULT_UNIT: &str = "pcs";

/// Single cell value, independent of the source format.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Trimmed text, or `None` for blank and NaN cells.
    pub fn text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let s = s.trim();
                if s.is_empty() || s == "NaN" {
                    None
                } else {
                    Some(s.to_string())
                }
            }
            Cell::Number(n) if n.is_nan() => None,
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
        }
    }

    fn is_blank(&self) -> bool {
        self.text().is_none()
    }
}

impl From<&DataType> for Cell {
    fn from(value: &DataType) -> Self {
        match value {
            DataType::Empty | DataType::Error(_) => Cell::Empty,
            DataType::String(s) => Cell::Text(s.clone()),
            DataType::Float(f) | DataType::DateTime(f) => Cell::Number(*f),
            DataType::Int(i) => Cell::Number(*i as f64),
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Fields the importer looks for in the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImportField {
    Location,
    MrfNumber,
    RequestDate,
    Reason,
    ServiceMaterial,
    Discipline,
    StatusNotes,
    CallOffNumber,
    Remarks,
}

impl ImportField {
    pub const ALL: [ImportField; 9] = [
        ImportField::Location,
        ImportField::MrfNumber,
        ImportField::RequestDate,
        ImportField::Reason,
        ImportField::ServiceMaterial,
        ImportField::Discipline,
        ImportField::StatusNotes,
        ImportField::CallOffNumber,
        ImportField::Remarks,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ImportField::Location => "location",
            ImportField::MrfNumber => "mrf_number",
            ImportField::RequestDate => "request_date",
            ImportField::Reason => "reason",
            ImportField::ServiceMaterial => "service_material",
            ImportField::Discipline => "discipline",
            ImportField::StatusNotes => "status_notes",
            ImportField::CallOffNumber => "call_off_number",
            ImportField::Remarks => "remarks",
        }
    }

    fn patterns(&self) -> &'static [&'static str] {
        match self {
            ImportField::Location => &["location", "asset", "site"],
            ImportField::MrfNumber => &["mrf number", "mrf_number", "mrfnumber", "mrf numb"],
            ImportField::RequestDate => &["request date", "date", "request_date"],
            ImportField::Reason => &["reason", "reason for request", "purpose"],
            ImportField::ServiceMaterial => {
                &["service/material", "service\\material", "service_material"]
            }
            ImportField::Discipline => &["discipline", "material group"],
            ImportField::StatusNotes => &["status notes", "status_notes"],
            ImportField::CallOffNumber => &["call off", "call off number", "calloff"],
            ImportField::Remarks => &["remarks", "comment", "remark"],
        }
    }
}

/// Header column chosen for each field. The first matching header wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: BTreeMap<ImportField, usize>,
    headers: Vec<String>,
}

impl ColumnMapping {
    pub fn detect(headers: &[String]) -> Self {
        let mut columns = BTreeMap::new();
        for (index, header) in headers.iter().enumerate() {
            let lower = header.trim().to_lowercase();
            for field in ImportField::ALL {
                if field.patterns().iter().any(|p| lower.contains(p)) {
                    columns.entry(field).or_insert(index);
                }
            }
        }
        Self {
            columns,
            headers: headers.to_vec(),
        }
    }

    pub fn column(&self, field: ImportField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    /// `{field: header}` as recorded on the import job.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .columns
            .iter()
            .map(|(field, &index)| {
                (
                    field.key().to_string(),
                    serde_json::Value::String(self.headers[index].clone()),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Outcome of parsing one uploaded sheet.
#[derive(Debug, Clone)]
pub struct ParsedImport {
    pub requests: Vec<ImportedRequest>,
    pub errors: Vec<ImportRowError>,
    /// Non-blank data rows, header excluded.
    pub total_rows: usize,
    pub mapping: ColumnMapping,
}

struct Sheet {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

pub fn parse_import(file_name: &str, data: &[u8], today: NaiveDate) -> MrfResult<ParsedImport> {
    let format = SheetFormat::from_file_name(file_name).ok_or_else(|| {
        MrfError::import(format!("Unsupported spreadsheet type: {}", file_name))
    })?;

    let sheet = match format {
        SheetFormat::Csv => read_csv(data)?,
        SheetFormat::Xlsx => {
            let workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data))
                .map_err(|e| MrfError::import(format!("Failed to open workbook: {}", e)))?;
            read_workbook(workbook)?
        }
        SheetFormat::Xls => {
            let workbook: Xls<_> = open_workbook_from_rs(Cursor::new(data))
                .map_err(|e| MrfError::import(format!("Failed to open workbook: {}", e)))?;
            read_workbook(workbook)?
        }
    };

    group_rows(sheet, today)
}

fn read_csv(data: &[u8]) -> MrfResult<Sheet> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| MrfError::import(format!("Failed to read CSV headers: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| MrfError::import(format!("Row {}: {}", idx + 2, e)))?;
        rows.push(record.iter().map(|v| Cell::Text(v.to_string())).collect());
    }

    Ok(Sheet { headers, rows })
}

fn read_workbook<RS, R>(mut workbook: R) -> MrfResult<Sheet>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| MrfError::import("No sheets found in workbook"))?;

    let range: Range<DataType> = match workbook.worksheet_range(&sheet_name) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            return Err(MrfError::import(format!("Failed to read worksheet: {}", e)));
        }
        None => return Err(MrfError::import("Failed to read worksheet")),
    };

    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .ok_or_else(|| MrfError::import("Spreadsheet is empty"))?
        .iter()
        .map(|cell| Cell::from(cell).text().unwrap_or_default())
        .collect();

    let rows = rows_iter
        .map(|row| row.iter().map(Cell::from).collect())
        .collect();

    Ok(Sheet { headers, rows })
}

fn group_rows(sheet: Sheet, today: NaiveDate) -> MrfResult<ParsedImport> {
    let mapping = ColumnMapping::detect(&sheet.headers);
    let mrf_column = mapping
        .column(ImportField::MrfNumber)
        .ok_or_else(|| MrfError::import("No MRF number column found in header row"))?;

    let mut requests: Vec<ImportedRequest> = Vec::new();
    let mut index_by_number: HashMap<String, usize> = HashMap::new();
    let mut errors = Vec::new();
    let mut total_rows = 0;

    for (idx, row) in sheet.rows.iter().enumerate() {
        if row.iter().all(Cell::is_blank) {
            continue;
        }
        total_rows += 1;
        let row_number = idx + 2;

        let text = |field: ImportField| -> Option<String> {
            mapping
                .column(field)
                .and_then(|col| row.get(col))
                .and_then(Cell::text)
        };

        let Some(mrf_number) = row.get(mrf_column).and_then(Cell::text) else {
            errors.push(ImportRowError {
                row: row_number,
                mrf_number: None,
                error: "Missing MRF number".to_string(),
            });
            continue;
        };

        let service_material = text(ImportField::ServiceMaterial);

        let position = match index_by_number.get(&mrf_number) {
            Some(&position) => position,
            None => {
                let request_date = mapping
                    .column(ImportField::RequestDate)
                    .and_then(|col| row.get(col))
                    .map(|cell| parse_sheet_date(cell, today))
                    .unwrap_or(today);

                requests.push(ImportedRequest {
                    mrf_number: mrf_number.clone(),
                    request_date,
                    asset: text(ImportField::Location)
                        .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
                    reason: text(ImportField::Reason).unwrap_or_else(|| DEFAULT_REASON.to_string()),
                    service_material: service_material
                        .clone()
                        .unwrap_or_else(|| DEFAULT_SERVICE_MATERIAL.to_string()),
                    discipline: normalize_discipline(
                        text(ImportField::Discipline).as_deref().unwrap_or(""),
                    ),
                    status_notes: text(ImportField::StatusNotes),
                    call_off_number: text(ImportField::CallOffNumber),
                    remarks: text(ImportField::Remarks),
                    lines: Vec::new(),
                    source_row: row_number,
                });
                index_by_number.insert(mrf_number, requests.len() - 1);
                requests.len() - 1
            }
        };

        if let Some(description) = service_material {
            requests[position].lines.push(ImportedLine {
                material_description: description,
                quantity: 1.0,
                quantity_unit: DEFAULT_UNIT.to_string(),
            });
        }
    }

    for request in requests.iter_mut().filter(|r| r.lines.is_empty()) {
        let description = if request.service_material.trim().is_empty() {
            FALLBACK_LINE.to_string()
        } else {
            request.service_material.clone()
        };
        request.lines.push(ImportedLine {
            material_description: description,
            quantity: 1.0,
            quantity_unit: DEFAULT_UNIT.to_string(),
        });
    }

    Ok(ParsedImport {
        requests,
        errors,
        total_rows,
        mapping,
    })
}

/// Maps the discipline spellings found in tracker sheets onto the standard groups.
pub fn normalize_discipline(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DEFAULT_DISCIPLINE.to_string();
    }
    match trimmed.to_lowercase().as_str() {
        "rot" | "rot equip" | "rot equipment" | "inst air compressor" => {
            "ROT EQUIPMENT".to_string()
        }
        "others" | "other" => "others".to_string(),
        _ => trimmed.to_uppercase(),
    }
}

/// Excel serials count days from 1899-12-30. Text accepts `YYYY-MM-DD`
/// (optionally followed by a time), `DD/MM/YYYY` and `YYYY/MM/DD`.
/// Anything else yields `today`.
pub fn parse_sheet_date(cell: &Cell, today: NaiveDate) -> NaiveDate {
    match cell {
        Cell::Number(serial) => excel_serial_to_date(*serial).unwrap_or(today),
        Cell::Text(text) => parse_date_text(text.trim()).unwrap_or(today),
        Cell::Empty => today,
    }
}

/// Serial of 9999-12-31, the last date Excel can display.
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let days = Duration::try_days(serial.floor() as i64)?;
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(days)
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }
    if let Ok(serial) = text.parse::<f64>() {
        return excel_serial_to_date(serial);
    }
    let head: String = text.chars().take(10).collect();
    ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&head, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    const TRACKER_CSV: &str = "\
S/N,LOCATION,MRF NUMBER,REQUEST DATE,REASON FOR REQUEST,SERVICE\\MATERIAL,DISCIPLINE,CALL OFF NUMBER,REMARKS
1,LAND AREA,LAR-MTCE-001-2025,2025-01-15,500 hours service,OIL FILTER,rot equip,CO-17,urgent
2,LAND AREA,LAR-MTCE-001-2025,2025-01-15,500 hours service,FUEL FILTER,rot equip,,
3,SWAMP AREA,,2025-02-01,Replace gauge,PRESSURE GAUGE,instrument,,
4,SWAMP AREA,SAR-002-2025,03/02/2025,,,other,,
";

    #[test]
    fn test_detects_columns_from_tracker_headers() {
        let headers: Vec<String> = [
            "Item", "Asset", "Mrf Number", "Request Date", "Year", "Reason for Request",
            "Service\\Material", "Discipline", "Status Notes", "Quotation Approval Date",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mapping = ColumnMapping::detect(&headers);
        assert_eq!(mapping.column(ImportField::Location), Some(1));
        assert_eq!(mapping.column(ImportField::MrfNumber), Some(2));
        assert_eq!(mapping.column(ImportField::RequestDate), Some(3));
        assert_eq!(mapping.column(ImportField::Reason), Some(5));
        assert_eq!(mapping.column(ImportField::ServiceMaterial), Some(6));
        assert_eq!(mapping.column(ImportField::Discipline), Some(7));
        assert_eq!(mapping.column(ImportField::StatusNotes), Some(8));
        assert_eq!(mapping.column(ImportField::Remarks), None);

        let json = mapping.to_json();
        assert_eq!(json["mrf_number"], "Mrf Number");
        assert_eq!(json["request_date"], "Request Date");
    }

    #[test]
    fn test_groups_rows_by_mrf_number() {
        let parsed = parse_import("tracker.csv", TRACKER_CSV.as_bytes(), today()).unwrap();

        assert_eq!(parsed.total_rows, 4);
        assert_eq!(parsed.requests.len(), 2);

        let first = &parsed.requests[0];
        assert_eq!(first.mrf_number, "LAR-MTCE-001-2025");
        assert_eq!(first.asset, "LAND AREA");
        assert_eq!(first.discipline, "ROT EQUIPMENT");
        assert_eq!(first.call_off_number.as_deref(), Some("CO-17"));
        assert_eq!(first.remarks.as_deref(), Some("urgent"));
        assert_eq!(first.request_date, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert_eq!(first.source_row, 2);
        let descriptions: Vec<&str> = first
            .lines
            .iter()
            .map(|l| l.material_description.as_str())
            .collect();
        assert_eq!(descriptions, vec!["OIL FILTER", "FUEL FILTER"]);
        assert!(first.lines.iter().all(|l| l.quantity == 1.0 && l.quantity_unit == "pcs"));
    }

    #[test]
    fn test_missing_mrf_number_reports_sheet_row() {
        let parsed = parse_import("tracker.csv", TRACKER_CSV.as_bytes(), today()).unwrap();
        assert_eq!(
            parsed.errors,
            vec![ImportRowError {
                row: 4,
                mrf_number: None,
                error: "Missing MRF number".to_string(),
            }]
        );
    }

    #[test]
    fn test_defaults_for_sparse_rows() {
        let parsed = parse_import("tracker.csv", TRACKER_CSV.as_bytes(), today()).unwrap();
        let sparse = &parsed.requests[1];

        assert_eq!(sparse.reason, "No reason provided");
        assert_eq!(sparse.service_material, "Material");
        assert_eq!(sparse.discipline, "others");
        assert_eq!(sparse.request_date, NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
        assert_eq!(sparse.lines.len(), 1);
        assert_eq!(sparse.lines[0].material_description, "Material");
    }

    #[test]
    fn test_header_without_mrf_column_is_rejected() {
        let data = "Asset,Reason\nLAND AREA,pump\n";
        let err = parse_import("bad.csv", data.as_bytes(), today()).unwrap_err();
        assert_eq!(err.error_code(), "IMPORT_ERROR");
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(parse_import("tracker.ods", b"", today()).is_err());
    }

    #[test]
    fn test_normalize_discipline() {
        assert_eq!(normalize_discipline("Inst Air Compressor"), "ROT EQUIPMENT");
        assert_eq!(normalize_discipline(" rot "), "ROT EQUIPMENT");
        assert_eq!(normalize_discipline("Mechanical"), "MECHANICAL");
        assert_eq!(normalize_discipline("Other"), "others");
        assert_eq!(normalize_discipline("civil works"), "CIVIL WORKS");
        assert_eq!(normalize_discipline("   "), "General");
    }

    #[test]
    fn test_parse_sheet_date() {
        let jan15 = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(parse_sheet_date(&Cell::Number(45672.0), today()), jan15);
        assert_eq!(parse_sheet_date(&Cell::Number(45672.75), today()), jan15);
        assert_eq!(parse_sheet_date(&Cell::Text("2025-01-15".into()), today()), jan15);
        assert_eq!(parse_sheet_date(&Cell::Text("2025-01-15T08:30:00Z".into()), today()), jan15);
        assert_eq!(parse_sheet_date(&Cell::Text("15/01/2025".into()), today()), jan15);
        assert_eq!(parse_sheet_date(&Cell::Text("next week".into()), today()), today());
        assert_eq!(parse_sheet_date(&Cell::Empty, today()), today());
    }

    #[test]
    fn test_out_of_range_serial_falls_back_to_today() {
        let last = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();
        assert_eq!(parse_sheet_date(&Cell::Number(MAX_EXCEL_SERIAL), today()), last);
        assert_eq!(parse_sheet_date(&Cell::Number(MAX_EXCEL_SERIAL + 1.0), today()), today());
        assert_eq!(parse_sheet_date(&Cell::Number(1e300), today()), today());
        assert_eq!(parse_sheet_date(&Cell::Text("1e300".into()), today()), today());

        let data = "MRF NUMBER,REQUEST DATE\nLAR-MTCE-001-2025,1e300\n";
        let parsed = parse_import("huge-date.csv", data.as_bytes(), today()).unwrap();
        assert_eq!(parsed.requests.len(), 1);
        assert_eq!(parsed.requests[0].request_date, today());
    }

    proptest! {
        #[test]
        fn prop_numeric_dates_never_panic(serial in proptest::num::f64::ANY) {
            let date = parse_sheet_date(&Cell::Number(serial), today());
            prop_assert!(date == today() || (1.0..=MAX_EXCEL_SERIAL).contains(&serial));
        }

        #[test]
        fn prop_text_dates_never_panic(text in "\\PC{0,24}") {
            parse_sheet_date(&Cell::Text(text), today());
        }
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(Cell::Number(42.0).text().as_deref(), Some("42"));
        assert_eq!(Cell::Number(1.5).text().as_deref(), Some("1.5"));
        assert_eq!(Cell::Text("  NaN ".into()).text(), None);
        assert_eq!(Cell::Text(" x ".into()).text().as_deref(), Some("x"));
        assert_eq!(Cell::Empty.text(), None);
    }
}
