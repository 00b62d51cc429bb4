use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use crate::error::AppError;
use crate::models::{
    ActivityPoint, ApiResponse, ChartType, Metric, SummaryStat, TopProducts, TransactionTable,
};
use crate::params::{ViewParams, ViewQuery};
use crate::projections::{
    ActivityProjector, SummaryAnalyzer, TopProductsRanker, TOP_N_DEFAULT, TOP_N_MAX, TOP_N_MIN,
};
use crate::state::{AppState, Dataset};

#[derive(Debug, Serialize)]
pub struct ActivityView {
    pub chart: ChartType,
    pub metrics: Vec<Metric>,
    pub points: Vec<ActivityPoint>,
}

#[derive(Debug, Serialize)]
pub struct TopProductsView {
    pub top_n: usize,
    pub result: TopProducts,
}

#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub stats: Vec<SummaryStat>,
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub activity: ActivityView,
    pub top_products: TopProductsView,
    pub summary: SummaryView,
}

pub async fn root() -> &'static str {
    "Ops Dashboard API v0.1.0"
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let dataset = state.snapshot()?;
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "rows": dataset.table.len(),
        "loaded_at": dataset.loaded_at.to_rfc3339(),
    })))
}

/// Default filter window and the choices a client can offer
pub async fn get_bounds(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let dataset = state.snapshot()?;
    let bounds = dataset.date_bounds();

    Ok(Json(serde_json::json!({
        "start": bounds.map(|(first, _)| first),
        "end": bounds.map(|(_, last)| last),
        "metrics": Metric::ALL,
        "chart_types": [ChartType::Line, ChartType::Bar],
        "top_n": {
            "default": TOP_N_DEFAULT,
            "min": TOP_N_MIN,
            "max": TOP_N_MAX,
        },
    })))
}

pub async fn get_activity(
    State(state): State<AppState>,
    query: Result<Query<ViewQuery>, QueryRejection>,
) -> Result<Json<ActivityView>, AppError> {
    let Query(query) = query?;
    let dataset = state.snapshot()?;
    let params = ViewParams::resolve(&query, &dataset)?;
    Ok(Json(activity_view(&dataset, &params)))
}

pub async fn get_top_products(
    State(state): State<AppState>,
    query: Result<Query<ViewQuery>, QueryRejection>,
) -> Result<Json<TopProductsView>, AppError> {
    let Query(query) = query?;
    let dataset = state.snapshot()?;
    let params = ViewParams::resolve(&query, &dataset)?;
    let table = windowed_table(&dataset, &params);
    Ok(Json(top_products_view(&table, params.top_n)))
}

pub async fn get_summary(
    State(state): State<AppState>,
    query: Result<Query<ViewQuery>, QueryRejection>,
) -> Result<Json<SummaryView>, AppError> {
    let Query(query) = query?;
    let dataset = state.snapshot()?;
    let params = ViewParams::resolve(&query, &dataset)?;
    let table = windowed_table(&dataset, &params);
    Ok(Json(summary_view(&table)))
}

/// All three views for one filter interaction
pub async fn get_dashboard(
    State(state): State<AppState>,
    query: Result<Query<ViewQuery>, QueryRejection>,
) -> Result<Json<DashboardView>, AppError> {
    let Query(query) = query?;
    let dataset = state.snapshot()?;
    let params = ViewParams::resolve(&query, &dataset)?;
    let table = windowed_table(&dataset, &params);

    Ok(Json(DashboardView {
        activity: activity_view(&dataset, &params),
        top_products: top_products_view(&table, params.top_n),
        summary: summary_view(&table),
    }))
}

/// Re-read the transaction log without restarting the process
pub async fn reload(State(state): State<AppState>) -> Result<Json<ApiResponse>, AppError> {
    let worker = state.clone();
    let dataset = tokio::task::spawn_blocking(move || worker.reload())
        .await
        .map_err(|e| AppError::Task(e.to_string()))?
        .inspect_err(|e| error!("Reload failed, keeping previous dataset: {}", e))?;

    info!(rows = dataset.table.len(), "Reload requested via API");
    Ok(Json(ApiResponse::success(
        "Transaction log reloaded",
        serde_json::json!({
            "rows": dataset.table.len(),
            "orders": dataset.orders.len(),
            "days": dataset.daily.len(),
            "loaded_at": dataset.loaded_at.to_rfc3339(),
        }),
    )))
}

// View builders

fn activity_view(dataset: &Dataset, params: &ViewParams) -> ActivityView {
    let points = match &params.window {
        Some(window) => ActivityProjector::new(&dataset.daily).project(window, &params.metrics),
        None => Vec::new(),
    };
    ActivityView {
        chart: params.chart,
        metrics: params.metrics.clone(),
        points,
    }
}

/// Rows inside the request window, built once per request
fn windowed_table(dataset: &Dataset, params: &ViewParams) -> TransactionTable {
    let rows = match &params.window {
        Some(window) => window.filter(&dataset.table.rows),
        None => Vec::new(),
    };
    TransactionTable::new(dataset.table.columns.clone(), rows)
}

fn top_products_view(table: &TransactionTable, top_n: usize) -> TopProductsView {
    TopProductsView {
        top_n,
        result: TopProductsRanker::new(table).rank(top_n),
    }
}

fn summary_view(table: &TransactionTable) -> SummaryView {
    SummaryView {
        stats: SummaryAnalyzer::new(&table.rows).analyze(),
    }
}
