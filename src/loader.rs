//! Transaction loader: delimited text in, `TransactionTable` out.
//!
//! Order identifiers are kept as the raw (trimmed) text of the cell, so
//! numeric-looking ids such as `007` group and sort as strings.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info};

use crate::error::DataLoadError;
use crate::models::{Transaction, TransactionTable};

pub const DATE_COLUMN: &str = "date";
pub const ORDER_COLUMN: &str = "order_id";
pub const SKU_COLUMN: &str = "sku_id";
pub const QUANTITY_COLUMN: &str = "quantity";

const REQUIRED: &[&str] = &[DATE_COLUMN, ORDER_COLUMN, SKU_COLUMN, QUANTITY_COLUMN];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];

/// Maps header names to their index in a record.
struct ColumnMap {
    indices: HashMap<String, usize>,
    headers: Vec<String>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut indices = HashMap::new();
        let mut names = Vec::with_capacity(headers.len());
        for (i, field) in headers.iter().enumerate() {
            let name = field.trim().trim_start_matches('\u{feff}').to_string();
            indices.entry(name.clone()).or_insert(i);
            names.push(name);
        }
        ColumnMap {
            indices,
            headers: names,
        }
    }

    fn get<'a>(&self, record: &'a csv::StringRecord, col: &str) -> &'a str {
        self.indices
            .get(col)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .unwrap_or("")
    }

    fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.indices.contains_key(**c))
            .map(|c| c.to_string())
            .collect()
    }
}

/// Parse a timestamp cell. Date-only values land at midnight.
/// RFC 3339 values with an offset keep their local wall-clock time.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn parse_quantity(s: &str) -> Option<f64> {
    let q: f64 = s.trim().parse().ok()?;
    (q.is_finite() && q >= 0.0).then_some(q)
}

/// Load a comma-delimited transaction log from `path`.
pub fn load_transactions(path: &Path) -> Result<TransactionTable, DataLoadError> {
    let file = std::fs::File::open(path).map_err(|source| DataLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = load_transactions_reader(std::io::BufReader::new(file))?;
    info!(
        path = %path.display(),
        rows = table.len(),
        "Loaded transaction log"
    );
    Ok(table)
}

/// Core parsing, over any `Read` source.
pub fn load_transactions_reader<R: Read>(reader: R) -> Result<TransactionTable, DataLoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(DataLoadError::EmptyFile);
    }
    let col_map = ColumnMap::from_headers(&headers);
    let missing = col_map.missing(REQUIRED);
    if !missing.is_empty() {
        return Err(DataLoadError::MissingColumns(missing));
    }
    debug!(columns = ?col_map.headers, "Validated transaction columns");

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result?;
        // +1 for the header row, +1 for 1-based numbering
        let line = idx + 2;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let date_str = col_map.get(&record, DATE_COLUMN);
        let date = parse_timestamp(date_str).ok_or_else(|| DataLoadError::InvalidDate {
            line,
            value: date_str.to_string(),
        })?;

        let qty_str = col_map.get(&record, QUANTITY_COLUMN);
        let quantity = parse_quantity(qty_str).ok_or_else(|| DataLoadError::InvalidQuantity {
            line,
            value: qty_str.to_string(),
        })?;

        rows.push(Transaction {
            order_id: col_map.get(&record, ORDER_COLUMN).to_string(),
            sku_id: col_map.get(&record, SKU_COLUMN).to_string(),
            quantity,
            date,
        });
    }

    Ok(TransactionTable::new(col_map.headers, rows))
}
