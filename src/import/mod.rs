//! Bulk import of broker holdings exports (delimited text or `.xlsx`).
//!
//! Header names differ between brokers, so columns are located by keyword:
//! - ticker: `instrument` / `symbol` / `ticker`
//! - quantity: `qty` / `quantity` / `shares`
//! - average cost: (`avg` | `average`) and (`cost` | `price`)
//!
//! Each row is validated on its own. Bad rows are counted and skipped, and the
//! import only fails as a whole when nothing usable remains.

mod spreadsheet;

pub use spreadsheet::{parse_holdings_xlsx, XLSX_CONTENT_TYPE};

use crate::domain::{Decimal, LotDraft, PurchaseLot};
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub const IMPORT_NOTE: &str = "Broker holdings import";

const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];
const STRIPPED_CHARS: [char; 4] = ['₹', '$', ',', ' '];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("file has no data rows")]
    NoDataRows,
    #[error("headers not recognized; required: Instrument, Qty, Avg. cost")]
    UnrecognizedHeaders,
    #[error("no valid holdings found ({skipped} rows skipped)")]
    NoValidRows { skipped: usize },
    #[error("csv parse error: {0}")]
    Csv(String),
    #[error("spreadsheet read error: {0}")]
    Spreadsheet(String),
}

/// Outcome of a partially successful import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    #[serde(skip)]
    pub lots: Vec<PurchaseLot>,
    pub accepted: usize,
    pub skipped: usize,
}

/// Column positions resolved from a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub ticker: usize,
    pub quantity: usize,
    pub avg_price: usize,
}

impl ColumnMap {
    pub fn detect<S: AsRef<str>>(headers: &[S]) -> Option<Self> {
        let lowered: Vec<String> = headers.iter().map(|h| h.as_ref().to_lowercase()).collect();
        let find = |pred: &dyn Fn(&str) -> bool| lowered.iter().position(|h| pred(h));

        let ticker = find(&|h| {
            h.contains("instrument") || h.contains("symbol") || h.contains("ticker")
        })?;
        let quantity =
            find(&|h| h.contains("qty") || h.contains("quantity") || h.contains("shares"))?;
        let avg_price = find(&|h| {
            (h.contains("avg") || h.contains("average"))
                && (h.contains("cost") || h.contains("price"))
        })?;

        Some(Self {
            ticker,
            quantity,
            avg_price,
        })
    }

    fn max_index(&self) -> usize {
        self.ticker.max(self.quantity).max(self.avg_price)
    }
}

/// Pick the candidate delimiter that appears most often in the header line.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    DELIMITERS
        .iter()
        .copied()
        .max_by_key(|&d| header_line.bytes().filter(|&b| b == d).count())
        .filter(|&d| header_line.as_bytes().contains(&d))
        .unwrap_or(b',')
}

/// Strip currency symbols and thousands separators, then parse.
fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str_canonical(&cleaned).ok()
}

fn parse_row(record: &[String], columns: &ColumnMap, today: NaiveDate) -> Option<PurchaseLot> {
    if record.len() <= columns.max_index() {
        return None;
    }

    let ticker = record.get(columns.ticker)?.trim().to_uppercase();
    if ticker.is_empty() || ticker == "TOTAL" {
        return None;
    }

    let quantity = parse_amount(record.get(columns.quantity)?)?;
    let price = parse_amount(record.get(columns.avg_price)?)?;

    LotDraft {
        ticker,
        purchase_date: today,
        price,
        quantity,
        pe: Decimal::zero(),
        pb: Decimal::zero(),
        eps: Decimal::zero(),
        note: Some(IMPORT_NOTE.to_string()),
    }
    .into_lot()
    .ok()
}

/// Parse a holdings export into lots dated `today`.
pub fn parse_holdings(text: &str, today: NaiveDate) -> Result<ImportReport, ImportError> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return Err(ImportError::NoDataRows);
    }

    let delimiter = sniff_delimiter(lines[0]);
    let body = lines.join("\n");
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(delimiter)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ImportError::Csv(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();
    let columns = ColumnMap::detect(&headers).ok_or(ImportError::UnrecognizedHeaders)?;
    debug!(?columns, delimiter = %(delimiter as char), "Import columns resolved");

    let rows = reader
        .records()
        .map(|record| record.ok().map(|r| r.iter().map(str::to_string).collect()));
    build_report(&columns, rows, today)
}

/// Validate each row; `None` marks a row the reader could not decode.
fn build_report<I>(
    columns: &ColumnMap,
    rows: I,
    today: NaiveDate,
) -> Result<ImportReport, ImportError>
where
    I: IntoIterator<Item = Option<Vec<String>>>,
{
    let mut lots = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        match row.and_then(|r| parse_row(&r, columns, today)) {
            Some(lot) => lots.push(lot),
            None => skipped += 1,
        }
    }

    if lots.is_empty() {
        return Err(ImportError::NoValidRows { skipped });
    }

    info!("Imported {} holdings ({} rows skipped)", lots.len(), skipped);
    Ok(ImportReport {
        accepted: lots.len(),
        skipped,
        lots,
    })
}
