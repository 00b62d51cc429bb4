//! Internal operations dashboard API.
//!
//! Loads a transaction log (one row per order line) once, derives per-order
//! and per-day rollups from it, and serves three filterable views over HTTP:
//!
//! - daily activity (orders, lines, quantity per day, by last-activity date)
//! - top products by quantity, ascending after truncation to N
//! - eight summary statistics for the selected window
//!
//! Every view is a pure function of the loaded dataset and the request
//! parameters. The dataset is shared behind an `Arc` and replaced wholesale
//! on `POST /api/reload`.

use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod models;
pub mod params;
pub mod projections;
pub mod routes;
pub mod state;

#[cfg(test)]
mod tests;

use config::Config;
use routes::{
    get_activity, get_bounds, get_dashboard, get_summary, get_top_products, health_check, reload,
    root,
};
use state::{AppState, Dataset};

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/bounds", get(get_bounds))
        .route("/activity", get(get_activity))
        .route("/top-products", get(get_top_products))
        .route("/summary", get(get_summary))
        .route("/dashboard", get(get_dashboard))
        .route("/reload", post(reload))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_login,
        ));

    let mut app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api", api);

    let origins = state.config.cors_origins.clone();
    if !origins.is_empty() {
        info!(origins = ?origins, "CORS enabled");
        app = app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE, AUTHORIZATION])
                .max_age(Duration::from_secs(60 * 60)),
        );
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Load the transaction log and serve until Ctrl+C / SIGTERM.
/// A log that fails to load aborts startup.
pub async fn start_server(config: Config) -> anyhow::Result<()> {
    info!(path = %config.data_path.display(), "Loading transaction log...");
    let dataset = Dataset::load(&config.data_path)?;

    let address = config.address();
    let state = AppState::new(config, dataset);
    let app = build_router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
