//! Spreadsheet import and export.
//!
//! Reads CSV, XLSX and XLS tracker sheets into imported requests and writes
//! the fixed 25-column export schema as XLSX or CSV.

pub mod exporter;
pub mod importer;

pub use exporter::{
    export_file_name, import_template, write_csv, write_xlsx, ExportFormat, ExportRow,
    EXPORT_HEADERS,
};
pub use importer::{
    normalize_discipline, parse_import, parse_sheet_date, Cell, ColumnMapping, ParsedImport,
};

use std::path::Path;

/// Spreadsheet container, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Xlsx,
    Xls,
}

impl SheetFormat {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name).extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            _ => None,
        }
    }
}
