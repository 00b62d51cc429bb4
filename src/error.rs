use std::path::PathBuf;

use axum::{
    extract::rejection::QueryRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Failure to turn a transaction source into a usable table.
/// Fatal at startup; on reload the previous dataset is kept.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("transaction source is empty or has no header row")]
    EmptyFile,

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("line {line}: cannot parse date {value:?}")]
    InvalidDate { line: usize, value: String },

    #[error("line {line}: invalid quantity {value:?}")]
    InvalidQuantity { line: usize, value: String },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    DataLoad(#[from] DataLoadError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("unknown chart type: {0}")]
    UnknownChartType(String),

    #[error("invalid {name} parameter: {value:?}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("malformed query string: {0}")]
    Query(#[from] QueryRejection),

    #[error("authentication required")]
    Unauthorized,

    #[error("dataset lock poisoned")]
    LockPoisoned,

    #[error("background task failed: {0}")]
    Task(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::UnknownMetric(_)
            | AppError::UnknownChartType(_)
            | AppError::InvalidParameter { .. }
            | AppError::Query(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::DataLoad(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Config(_) | AppError::LockPoisoned | AppError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        }));

        if status == StatusCode::UNAUTHORIZED {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"ops-dashboard\"")],
                body,
            )
                .into_response();
        }

        (status, body).into_response()
    }
}
