//! `.xlsx` holdings exports. Only the first worksheet is read.

use super::{build_report, ColumnMap, ImportError, ImportReport};
use calamine::{Data, Reader, Xlsx};
use chrono::NaiveDate;
use std::io::Cursor;
use tracing::debug;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Parse the first worksheet of a workbook into lots dated `today`.
///
/// Blank rows are ignored; the first non-blank row is the header.
pub fn parse_holdings_xlsx(bytes: &[u8], today: NaiveDate) -> Result<ImportReport, ImportError> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| ImportError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::NoDataRows)?
        .map_err(|e| ImportError::Spreadsheet(e.to_string()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>())
        .filter(|cells| cells.iter().any(|c| !c.is_empty()));

    let headers = rows.next().ok_or(ImportError::NoDataRows)?;
    let body: Vec<Vec<String>> = rows.collect();
    if body.is_empty() {
        return Err(ImportError::NoDataRows);
    }

    let columns = ColumnMap::detect(&headers).ok_or(ImportError::UnrecognizedHeaders)?;
    debug!(?columns, rows = body.len(), "Spreadsheet columns resolved");
    build_report(&columns, body.into_iter().map(Some), today)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
