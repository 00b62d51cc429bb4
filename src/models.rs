use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One line of the transaction log (one order line)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub order_id: String,
    pub sku_id: String,
    pub quantity: f64,
    pub date: NaiveDateTime,
}

/// Loaded rows plus the header names they came from.
/// Rows are never mutated; filtering produces a new table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionTable {
    pub columns: Vec<String>,
    pub rows: Vec<Transaction>,
}

impl TransactionTable {
    pub fn new(columns: Vec<String>, rows: Vec<Transaction>) -> Self {
        Self { columns, rows }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Earliest and latest calendar dates present, if any rows exist.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.rows.iter().map(|t| t.date).min()?;
        let max = self.rows.iter().map(|t| t.date).max()?;
        Some((min.date(), max.date()))
    }
}

/// Per-order rollup (derived)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub lines: usize,
    pub qty: f64,
    /// Latest timestamp among the order's rows
    pub date: NaiveDateTime,
}

/// Per-day rollup of orders by last-activity date (derived)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub daily_orders: usize,
    pub daily_lines: usize,
    pub daily_qty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    DailyOrders,
    DailyLines,
    DailyQty,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::DailyOrders, Metric::DailyLines, Metric::DailyQty];

    pub fn name(self) -> &'static str {
        match self {
            Metric::DailyOrders => "daily_orders",
            Metric::DailyLines => "daily_lines",
            Metric::DailyQty => "daily_qty",
        }
    }

    pub fn value(self, day: &DailyActivity) -> f64 {
        match self {
            Metric::DailyOrders => day.daily_orders as f64,
            Metric::DailyLines => day.daily_lines as f64,
            Metric::DailyQty => day.daily_qty,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Metric::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AppError::UnknownMetric(wanted.to_string()))
    }
}

/// Rendering hint only; never changes computed values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Line,
    Bar,
}

impl FromStr for ChartType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(ChartType::Line),
            "bar" => Ok(ChartType::Bar),
            other => Err(AppError::UnknownChartType(other.to_string())),
        }
    }
}

/// One point of the activity view: a date and the selected metrics' values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityPoint {
    pub date: NaiveDate,
    pub values: BTreeMap<Metric, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductTotal {
    pub sku_id: String,
    pub quantity: f64,
}

/// Result of a top-products request.
/// `NoData` covers both a schema without product/quantity columns and a window with no rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "products", rename_all = "snake_case")]
pub enum TopProducts {
    Ranked(Vec<ProductTotal>),
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStat {
    pub label: &'static str,
    pub value: String,
}

/// API Response
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}
