use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::filter::DateWindow;
use crate::loader::{QUANTITY_COLUMN, SKU_COLUMN};
use crate::models::{
    ActivityPoint, DailyActivity, Metric, OrderSummary, ProductTotal, SummaryStat, TopProducts,
    Transaction, TransactionTable,
};

pub const TOP_N_DEFAULT: usize = 10;
pub const TOP_N_MIN: usize = 1;
pub const TOP_N_MAX: usize = 50;

/// Placeholder for values that are undefined on an empty record set
pub const NO_DATA: &str = "N/A";

/// Rolls transaction rows up into one summary per order id.
/// Works on any subset of the log; output is ordered by order id.
pub fn aggregate_orders(rows: &[Transaction]) -> Vec<OrderSummary> {
    let mut orders: BTreeMap<&str, OrderSummary> = BTreeMap::new();

    for row in rows {
        orders
            .entry(row.order_id.as_str())
            .and_modify(|o| {
                o.lines += 1;
                o.qty += row.quantity;
                o.date = o.date.max(row.date);
            })
            .or_insert_with(|| OrderSummary {
                order_id: row.order_id.clone(),
                lines: 1,
                qty: row.quantity,
                date: row.date,
            });
    }

    orders.into_values().collect()
}

/// Rolls order summaries up per calendar day.
///
/// An order is attributed to the day of its *last* activity only, so an
/// order spanning several days is counted once. Days without orders are not
/// filled in. Output is ordered by date.
pub fn aggregate_daily(orders: &[OrderSummary]) -> Vec<DailyActivity> {
    let mut days: BTreeMap<NaiveDate, DailyActivity> = BTreeMap::new();

    for order in orders {
        let date = order.date.date();
        let day = days.entry(date).or_insert_with(|| DailyActivity {
            date,
            daily_orders: 0,
            daily_lines: 0,
            daily_qty: 0.0,
        });
        day.daily_orders += 1;
        day.daily_lines += order.lines;
        day.daily_qty += order.qty;
    }

    days.into_values().collect()
}

/// Clamp a requested top-N into the supported range.
pub fn clamp_top_n(n: i64) -> usize {
    n.clamp(TOP_N_MIN as i64, TOP_N_MAX as i64) as usize
}

/// Projects the daily activity view for a window and a metric selection
pub struct ActivityProjector<'a> {
    daily: &'a [DailyActivity],
}

impl<'a> ActivityProjector<'a> {
    pub fn new(daily: &'a [DailyActivity]) -> Self {
        Self { daily }
    }

    pub fn project(&self, window: &DateWindow, metrics: &[Metric]) -> Vec<ActivityPoint> {
        let points: Vec<ActivityPoint> = window
            .apply(self.daily)
            .map(|day| ActivityPoint {
                date: day.date,
                values: metrics.iter().map(|m| (*m, m.value(day))).collect(),
            })
            .collect();

        debug!(
            start = %window.start,
            end = %window.end,
            points = points.len(),
            "Projected daily activity"
        );
        points
    }
}

/// Ranks products by total quantity within a transaction table
pub struct TopProductsRanker<'a> {
    table: &'a TransactionTable,
}

impl<'a> TopProductsRanker<'a> {
    pub fn new(table: &'a TransactionTable) -> Self {
        Self { table }
    }

    /// Largest `n` totals, then re-ordered ascending.
    /// Ties rank by product id so the output is deterministic.
    pub fn rank(&self, n: usize) -> TopProducts {
        if !self.table.has_column(SKU_COLUMN) || !self.table.has_column(QUANTITY_COLUMN) {
            warn!(
                columns = ?self.table.columns,
                "Product or quantity column absent, no ranking available"
            );
            return TopProducts::NoData;
        }
        if self.table.is_empty() || n == 0 {
            return TopProducts::NoData;
        }

        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for row in &self.table.rows {
            *totals.entry(row.sku_id.as_str()).or_insert(0.0) += row.quantity;
        }

        let mut ranked: Vec<ProductTotal> = totals
            .into_iter()
            .map(|(sku, quantity)| ProductTotal {
                sku_id: sku.to_string(),
                quantity,
            })
            .collect();

        ranked.sort_by(|a, b| b.quantity.total_cmp(&a.quantity));
        ranked.truncate(n);
        ranked.sort_by(|a, b| a.quantity.total_cmp(&b.quantity));

        TopProducts::Ranked(ranked)
    }
}

/// Computes the fixed list of descriptive statistics for a record set
pub struct SummaryAnalyzer<'a> {
    rows: &'a [Transaction],
}

impl<'a> SummaryAnalyzer<'a> {
    pub fn new(rows: &'a [Transaction]) -> Self {
        Self { rows }
    }

    pub fn analyze(&self) -> Vec<SummaryStat> {
        let mut orders: BTreeSet<&str> = BTreeSet::new();
        let mut total_qty = 0.0;
        let mut first: Option<NaiveDateTime> = None;
        let mut last: Option<NaiveDateTime> = None;

        for row in self.rows {
            orders.insert(row.order_id.as_str());
            total_qty += row.quantity;
            first = Some(first.map_or(row.date, |d| d.min(row.date)));
            last = Some(last.map_or(row.date, |d| d.max(row.date)));
        }

        let total_orders = orders.len();
        let total_lines = self.rows.len();

        let format_date = |d: Option<NaiveDateTime>| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| NO_DATA.to_string())
        };

        vec![
            stat("Start Date", format_date(first)),
            stat("End Date", format_date(last)),
            stat("Total Orders", total_orders.to_string()),
            stat("Total Lines", total_lines.to_string()),
            stat("Total Quantity", format_quantity(total_qty)),
            stat("Lines per Order", ratio(total_lines as f64, total_orders)),
            stat("Quantity per Line", ratio(total_qty, total_lines)),
            stat("Quantity per Order", ratio(total_qty, total_orders)),
        ]
    }
}

fn stat(label: &'static str, value: String) -> SummaryStat {
    SummaryStat { label, value }
}

fn ratio(numerator: f64, count: usize) -> String {
    if count == 0 {
        return NO_DATA.to_string();
    }
    format!("{:.2}", numerator / count as f64)
}

fn format_quantity(q: f64) -> String {
    if q.fract() == 0.0 {
        format!("{q:.0}")
    } else {
        format!("{q:.2}")
    }
}
