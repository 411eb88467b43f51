//! CSV ingestion for transaction and store/item sales tables.

use crate::core::SeriesKey;
use crate::error::{PipelineError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// One row of the single-series transaction log.
///
/// Columns other than the order date and sales are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(rename = "Order Date", alias = "OrderDate", deserialize_with = "flexible_date")]
    pub date: NaiveDate,
    #[serde(rename = "Sales")]
    pub sales: f64,
}

/// One row of the store/item demand log. Missing `sales` cells read as NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoreItemRecord {
    #[serde(deserialize_with = "flexible_date")]
    pub date: NaiveDate,
    pub store: u32,
    pub item: u32,
    #[serde(deserialize_with = "sales_or_nan")]
    pub sales: f64,
}

impl StoreItemRecord {
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.store, self.item)
    }
}

/// Parse a calendar date in any of the accepted layouts.
///
/// Accepts ISO dates, US `month/day/year` dates and ISO datetimes (the time
/// part is dropped).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn flexible_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| D::Error::custom(format!("unparseable date '{}'", raw)))
}

fn sales_or_nan<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Read the transaction log from any reader.
///
/// Input bytes are decoded lossily so that latin-1 encoded exports (product
/// names with accents) still load.
pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<SalesRecord>> {
    read_rows(reader, &[&["Order Date", "OrderDate"], &["Sales"]])
}

/// Load the transaction log from a file path.
pub fn load_transactions<P: AsRef<Path>>(path: P) -> Result<Vec<SalesRecord>> {
    read_transactions(open(path.as_ref())?)
}

/// Read the store/item demand log from any reader.
pub fn read_store_item_sales<R: Read>(reader: R) -> Result<Vec<StoreItemRecord>> {
    read_rows(reader, &[&["date"], &["store"], &["item"], &["sales"]])
}

/// Load the store/item demand log from a file path.
pub fn load_store_item_sales<P: AsRef<Path>>(path: P) -> Result<Vec<StoreItemRecord>> {
    read_store_item_sales(open(path.as_ref())?)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        PipelineError::DataUnavailable(format!("cannot open '{}': {}", path.display(), e))
    })
}

/// Deserialize every row after checking that each required column exists.
fn read_rows<R, T>(mut reader: R, required: &[&[&str]]) -> Result<Vec<T>>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let text = String::from_utf8_lossy(&bytes);
    let text = text.trim_start_matches('\u{feff}');

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.clone();
    for names in required {
        find_column(&headers, names)?;
    }

    rdr.deserialize()
        .enumerate()
        .map(|(row, result)| result.map_err(|e| row_error(row, e)))
        .collect()
}

fn find_column(headers: &StringRecord, names: &[&str]) -> Result<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h))
        .ok_or_else(|| {
            PipelineError::DataUnavailable(format!("required column '{}' not found", names[0]))
        })
}

fn row_error(row: usize, err: csv::Error) -> PipelineError {
    let detail = match err.kind() {
        csv::ErrorKind::Deserialize { err, .. } => err.kind().to_string(),
        _ => err.to_string(),
    };
    PipelineError::DataUnavailable(format!("row {}: {}", row + 1, detail))
}
