use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::AppError;
use crate::filter::DateWindow;
use crate::models::{ChartType, Metric};
use crate::projections::{clamp_top_n, TOP_N_DEFAULT};
use crate::state::Dataset;

/// Query string accepted by the view routes. Every field is optional and
/// kept as text; a blank value (a cleared input) counts as absent.
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    /// `YYYY-MM-DD`
    pub start: Option<String>,
    /// `YYYY-MM-DD`
    pub end: Option<String>,
    /// Comma separated metric names
    pub metrics: Option<String>,
    pub chart: Option<String>,
    pub top_n: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(name: &'static str, value: &Option<String>) -> Result<Option<NaiveDate>, AppError> {
    present(value)
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| AppError::InvalidParameter {
                name,
                value: s.to_string(),
            })
        })
        .transpose()
}

fn parse_top_n(value: &Option<String>) -> Result<Option<usize>, AppError> {
    present(value)
        .map(|s| {
            s.parse::<i64>()
                .map(clamp_top_n)
                .map_err(|_| AppError::InvalidParameter {
                    name: "top_n",
                    value: s.to_string(),
                })
        })
        .transpose()
}

/// Fully resolved parameters for one computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewParams {
    /// `None` when neither bound was given and the dataset is empty
    pub window: Option<DateWindow>,
    pub metrics: Vec<Metric>,
    pub chart: ChartType,
    pub top_n: usize,
}

impl ViewParams {
    /// Missing bounds fall back to the dataset's first and last day.
    pub fn resolve(query: &ViewQuery, dataset: &Dataset) -> Result<Self, AppError> {
        let bounds = dataset.date_bounds();
        let start = parse_date("start", &query.start)?.or(bounds.map(|(first, _)| first));
        let end = parse_date("end", &query.end)?.or(bounds.map(|(_, last)| last));
        let window = match (start, end) {
            (Some(start), Some(end)) => Some(DateWindow::new(start, end)),
            (Some(day), None) | (None, Some(day)) => Some(DateWindow::new(day, day)),
            (None, None) => None,
        };

        let mut metrics = Vec::new();
        for name in present(&query.metrics)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let metric: Metric = name.parse()?;
            if !metrics.contains(&metric) {
                metrics.push(metric);
            }
        }
        if metrics.is_empty() {
            metrics.push(Metric::DailyOrders);
        }

        let chart = match present(&query.chart) {
            Some(s) => s.parse()?,
            None => ChartType::default(),
        };

        let top_n = parse_top_n(&query.top_n)?.unwrap_or(TOP_N_DEFAULT);

        Ok(Self {
            window,
            metrics,
            chart,
            top_n,
        })
    }
}
