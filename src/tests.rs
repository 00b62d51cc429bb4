use std::io::Write;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderValue, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use tempfile::NamedTempFile;
use tower::ServiceExt;

use crate::auth::{hash_password, Credentials};
use crate::build_router;
use crate::config::Config;
use crate::state::{AppState, Dataset};

const LOG: &str = "order_id,sku_id,quantity,date\n\
                   1,X,5,2024-01-01 09:15:00\n\
                   1,Y,3,2024-01-01 09:15:00\n\
                   2,X,7,2024-01-02 23:00:00\n\
                   3,Z,2,2024-01-05 08:00:00\n";

fn write_log(text: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{text}").unwrap();
    temp_file.flush().unwrap();
    temp_file
}

fn app_with(log: &NamedTempFile, users: Credentials) -> Router {
    app_with_origins(log, users, Vec::new())
}

fn app_with_origins(
    log: &NamedTempFile,
    users: Credentials,
    cors_origins: Vec<HeaderValue>,
) -> Router {
    let config = Config {
        host: "127.0.0.1".into(),
        port: 0,
        data_path: log.path().to_path_buf(),
        users,
        cors_origins,
    };
    let dataset = Dataset::load(log.path()).unwrap();
    build_router(AppState::new(config, dataset))
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_and_root_are_open() {
    let log = write_log(LOG);
    let users = Credentials::parse(&format!("ops:{}", hash_password("pw"))).unwrap();
    let app = app_with(&log, users);

    let (status, json) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["rows"], 4);

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_requires_login_when_users_configured() {
    let log = write_log(LOG);
    let users = Credentials::parse(&format!("ops:{}", hash_password("pw"))).unwrap();
    let app = app_with(&log, users);

    let (status, _) = get_json(&app, "/api/summary").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::get("/api/summary")
        .header(
            header::AUTHORIZATION,
            format!("Basic {}", STANDARD.encode("ops:pw")),
        )
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_basic_scheme_is_case_insensitive() {
    let log = write_log(LOG);
    let users = Credentials::parse(&format!("ops:{}", hash_password("pw"))).unwrap();
    let app = app_with(&log, users);

    let request = Request::get("/api/summary")
        .header(
            header::AUTHORIZATION,
            format!("basic {}", STANDARD.encode("ops:pw")),
        )
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/summary")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_origin_only() {
    let log = write_log(LOG);
    let users = Credentials::parse(&format!("ops:{}", hash_password("pw"))).unwrap();
    let app = app_with_origins(
        &log,
        users,
        vec![HeaderValue::from_static("http://dash.local")],
    );

    let response = app.clone().oneshot(preflight("http://dash.local")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://dash.local"
    );

    let response = app.oneshot(preflight("http://elsewhere.example")).await.unwrap();
    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_no_cors_headers_without_configured_origins() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    let request = Request::get("/api/bounds")
        .header(header::ORIGIN, "http://dash.local")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_activity_view_defaults_to_full_range() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    let (status, json) = get_json(&app, "/api/activity").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["chart"], "line");
    assert_eq!(json["metrics"], serde_json::json!(["daily_orders"]));

    let points = json["points"].as_array().unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(points[0]["date"], "2024-01-01");
    assert_eq!(points[0]["values"]["daily_orders"], 1.0);
}

#[tokio::test]
async fn test_activity_window_includes_late_end_day_rows() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    let (_, json) = get_json(
        &app,
        "/api/activity?start=2024-01-02&end=2024-01-02&metrics=daily_lines,daily_qty&chart=bar",
    )
    .await;
    let points = json["points"].as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["values"]["daily_lines"], 1.0);
    assert_eq!(points[0]["values"]["daily_qty"], 7.0);
    assert_eq!(json["chart"], "bar");
}

#[tokio::test]
async fn test_reversed_window_is_empty_not_an_error() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    let (status, json) = get_json(&app, "/api/dashboard?start=2024-02-01&end=2024-01-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["activity"]["points"], serde_json::json!([]));
    assert_eq!(json["top_products"]["result"]["status"], "no_data");
    assert_eq!(json["summary"]["stats"][0]["value"], "N/A");
    assert_eq!(json["summary"]["stats"][5]["value"], "N/A");
}

#[tokio::test]
async fn test_unknown_metric_is_bad_request() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    let (status, json) = get_json(&app, "/api/activity?metrics=weekly").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn test_blank_query_values_fall_back_to_defaults() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    let (status, json) = get_json(&app, "/api/dashboard?start=&end=2024-01-02").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary"]["stats"][0]["value"], "2024-01-01");
    assert_eq!(json["summary"]["stats"][1]["value"], "2024-01-02");

    let (status, json) = get_json(&app, "/api/top-products?top_n=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["top_n"], 10);
}

#[tokio::test]
async fn test_malformed_query_values_are_json_errors() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    for uri in [
        "/api/summary?start=yesterday",
        "/api/activity?end=2024-02-30",
        "/api/top-products?top_n=ten",
        "/api/dashboard?start=2024-01-01&start=2024-01-02",
    ] {
        let (status, json) = get_json(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["status"], "error", "{uri}");
        assert!(json["message"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_dashboard_views_agree_on_window() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    let (_, json) = get_json(&app, "/api/dashboard?start=2024-01-01&end=2024-01-31").await;
    let stats = json["summary"]["stats"].as_array().unwrap();
    // Dates come from the rows in the window, not from the requested bounds
    assert_eq!(stats[0]["value"], "2024-01-01");
    assert_eq!(stats[1]["value"], "2024-01-05");
    assert_eq!(stats[3]["value"], "4");
    assert_eq!(stats[4]["value"], "17");

    let ranked: f64 = json["top_products"]["result"]["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["quantity"].as_f64().unwrap())
        .sum();
    assert_eq!(ranked, 17.0);
}

#[tokio::test]
async fn test_top_products_ranked_ascending() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    let (_, json) = get_json(&app, "/api/top-products?top_n=2").await;
    assert_eq!(json["top_n"], 2);
    assert_eq!(json["result"]["status"], "ranked");
    let products = json["result"]["products"].as_array().unwrap();
    assert_eq!(products.len(), 2);
    // X = 12, Y = 3, Z = 2
    assert_eq!(products[0]["sku_id"], "Y");
    assert_eq!(products[1]["sku_id"], "X");
    assert_eq!(products[1]["quantity"], 12.0);
}

#[tokio::test]
async fn test_top_n_is_clamped() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    let (_, json) = get_json(&app, "/api/top-products?top_n=0").await;
    assert_eq!(json["top_n"], 1);
    assert_eq!(json["result"]["products"][0]["sku_id"], "X");
}

#[tokio::test]
async fn test_summary_for_window() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    let (_, json) = get_json(&app, "/api/summary?start=2024-01-01&end=2024-01-02").await;
    let stats = json["stats"].as_array().unwrap();
    let values: Vec<&str> = stats.iter().map(|s| s["value"].as_str().unwrap()).collect();
    assert_eq!(
        values,
        vec!["2024-01-01", "2024-01-02", "2", "3", "15", "1.50", "5.00", "7.50"]
    );
}

#[tokio::test]
async fn test_bounds() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    let (_, json) = get_json(&app, "/api/bounds").await;
    assert_eq!(json["start"], "2024-01-01");
    assert_eq!(json["end"], "2024-01-05");
    assert_eq!(json["top_n"]["max"], 50);
    assert_eq!(
        json["metrics"],
        serde_json::json!(["daily_orders", "daily_lines", "daily_qty"])
    );
}

#[tokio::test]
async fn test_reload_endpoint() {
    let mut log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    writeln!(log, "4,W,1,2024-01-06").unwrap();
    log.flush().unwrap();

    let response = app
        .clone()
        .oneshot(Request::post("/api/reload").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, json) = get_json(&app, "/health").await;
    assert_eq!(json["rows"], 5);
}

#[tokio::test]
async fn test_failed_reload_reports_and_keeps_data() {
    let log = write_log(LOG);
    let app = app_with(&log, Credentials::default());

    std::fs::write(log.path(), "order_id,sku_id\n1,X\n").unwrap();

    let response = app
        .clone()
        .oneshot(Request::post("/api/reload").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let (_, json) = get_json(&app, "/health").await;
    assert_eq!(json["rows"], 4);
}
