mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use common::{fundamentals, temp_cache_path, MemoryStore, MockMarketData};
use folioscope::app::create_app;
use folioscope::auth::issue_token;
use folioscope::config::AppConfig;
use folioscope::models::Position;
use folioscope::services::factor_cache::FactorCache;
use folioscope::state::AppState;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    user_id: Uuid,
    token: String,
}

fn market() -> MockMarketData {
    MockMarketData::new()
        .with_candidate("7203.T", "Consumer Cyclical", fundamentals(0.028, 9.5, 1.1, 0.11))
        .with_candidate("7267.T", "Consumer Cyclical", fundamentals(0.031, 8.0, 1.0, 0.09))
        .with_candidate("8306.T", "Financial Services", fundamentals(0.035, 11.0, 0.9, 0.08))
        .with_candidate("8316.T", "Financial Services", fundamentals(0.040, 10.0, 0.8, 0.07))
        .with_candidate("8411.T", "Financial Services", fundamentals(0.042, 9.0, 0.8, 0.06))
        .with_candidate("9432.T", "Communication Services", fundamentals(0.033, 12.0, 0.4, 0.12))
        .with_candidate("9501.T", "Utilities", fundamentals(0.010, 6.0, 0.5, 0.03))
        .with_candidate("AAPL", "Technology", fundamentals(0.005, 30.0, 1.2, 1.5))
        .with_candidate("NVDA", "Technology", fundamentals(0.001, 55.0, 1.7, 0.9))
        .with_trend("NVDA", 0.02)
        .with_trend("9501.T", -0.004)
        .with_quote("AAPL", 200.0, "USD", "Technology")
        .with_quote("8306.T", 1_500.0, "JPY", "Financial Services")
        .with_quote("USDJPY=X", 150.0, "JPY", "")
}

fn test_app() -> TestApp {
    let market = Arc::new(market());
    let mut config = AppConfig::new("postgres://unused", SECRET);
    config.factor_cache.path = temp_cache_path();
    config.universe = market.fundamentals.keys().cloned().collect();

    let cache = Arc::new(FactorCache::new(
        market.clone(),
        config.universe.clone(),
        config.factor_cache.clone(),
    ));
    let store = Arc::new(MemoryStore::default());
    let user_id = Uuid::new_v4();
    store.add_position(user_id, Position::new("AAPL", 10.0, 150.0, "特定"));
    store.add_position(user_id, Position::new("8306.T", 100.0, 1_000.0, "NISA成長投資枠"));
    store.add_watch(user_id, "9432.T");

    let state = AppState::new(&config, store.clone(), market, cache);
    let token = issue_token(user_id, SECRET, chrono::Duration::hours(1)).unwrap();

    TestApp {
        router: create_app(state),
        store,
        user_id,
        token,
    }
}

async fn send(app: &TestApp, method: &str, uri: &str, body: Option<&str>, auth: bool) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if auth {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", app.token));
    }
    let request = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_needs_no_token() {
    let app = test_app();
    let (status, _) = send(&app, "GET", "/health", None, false).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn api_rejects_missing_token() {
    let app = test_app();
    for (method, uri) in [
        ("GET", "/api/recommendations"),
        ("GET", "/api/analysis/portfolio"),
        ("GET", "/api/analysis/sectors"),
        ("GET", "/api/recommendations/cache"),
    ] {
        let (status, _) = send(&app, method, uri, None, false).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn api_rejects_forged_token() {
    let app = test_app();
    let forged = issue_token(app.user_id, "not-the-secret", chrono::Duration::hours(1)).unwrap();
    let request = Request::builder()
        .uri("/api/recommendations")
        .header(header::AUTHORIZATION, format!("Bearer {}", forged))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn recommendations_exclude_holdings_and_watchlist() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/recommendations?risk=medium", None, true).await;
    assert_eq!(status, StatusCode::OK);

    let recs = body.as_array().expect("plain list without diagnostics");
    assert!(!recs.is_empty() && recs.len() <= 6);

    let tickers: Vec<&str> = recs.iter().map(|r| r["ticker"].as_str().unwrap()).collect();
    for held in ["AAPL", "8306.T", "9432.T"] {
        assert!(!tickers.contains(&held), "{} should be excluded", held);
    }

    let mut per_sector = std::collections::HashMap::new();
    for r in recs {
        let score = r["score"].as_u64().unwrap();
        assert!(score <= 100);
        assert!(r["breakdown"]["weights"].is_object());
        *per_sector.entry(r["sector"].as_str().unwrap_or("").to_string()).or_insert(0) += 1;
    }
    assert!(per_sector.values().all(|n| *n <= 2), "{:?}", per_sector);
}

#[tokio::test]
async fn low_risk_hides_volatile_high_beta_names() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/recommendations?risk=low&diagnostics=1", None, true).await;
    assert_eq!(status, StatusCode::OK);

    let tickers: Vec<&str> = body["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["ticker"].as_str().unwrap())
        .collect();
    assert!(!tickers.contains(&"NVDA"));
    assert_eq!(body["diagnostics"]["risk_filtered_count"], 1);
}

#[tokio::test]
async fn diagnostics_report_filter_counts_and_cache_source() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/recommendations?diagnostics=1", None, true).await;
    assert_eq!(status, StatusCode::OK);

    let diagnostics = &body["diagnostics"];
    assert_eq!(diagnostics["universe_size"], 9);
    assert_eq!(diagnostics["excluded_count"], 3);
    assert_eq!(diagnostics["fund_filtered_count"], 0);
    assert_eq!(diagnostics["eligible_count"], 6);
    assert_eq!(diagnostics["cache"]["source"], "rebuild");
    assert!(body["recommendations"].is_array());

    let (_, again) = send(&app, "GET", "/api/recommendations?diagnostics=1", None, true).await;
    assert_eq!(again["diagnostics"]["cache"]["source"], "memory");
}

#[tokio::test]
async fn unknown_risk_is_a_client_error() {
    let app = test_app();
    let (status, _) = send(&app, "GET", "/api/recommendations?risk=reckless", None, true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cache_status_and_refresh() {
    let app = test_app();
    let (_, status_before) = send(&app, "GET", "/api/recommendations/cache", None, true).await;
    assert_eq!(status_before["item_count"], 0);
    assert_eq!(status_before["ttl_hours"], 6);

    let (status, meta) = send(&app, "POST", "/api/recommendations/cache/refresh", None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["source"], "rebuild");

    let (_, status_after) = send(&app, "GET", "/api/recommendations/cache", None, true).await;
    assert_eq!(status_after["item_count"], 9);
    assert_eq!(status_after["rebuilding"], false);
}

#[tokio::test]
async fn portfolio_analysis_values_positions_and_records_history() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/analysis/portfolio", None, true).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["position_count"], 2);
    // AAPL: 200 USD * 150 * 10 shares; 8306.T: 1500 * 100 shares
    let total = body["totals"]["total_value"].as_f64().unwrap();
    assert!((total - 450_000.0).abs() < 1e-6, "total {}", total);
    assert!(body["diversification"]["axes"]["sector"]["score"].as_f64().unwrap() > 0.0);
    assert_eq!(body["risk"]["beta"], 1.0);

    let history = app.store.history.lock();
    let points = history.get(&app.user_id).unwrap();
    assert_eq!(points.len(), 1);
    assert!((points[0].total_value - 450_000.0).abs() < 1e-6);
}

#[tokio::test]
async fn sector_totals_use_local_labels() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/analysis/sectors", None, true).await;
    assert_eq!(status, StatusCode::OK);
    assert!((body["情報技術"].as_f64().unwrap() - 300_000.0).abs() < 1e-6);
    assert!((body["金融"].as_f64().unwrap() - 150_000.0).abs() < 1e-6);
}

#[tokio::test]
async fn rebalance_proposes_and_logs_operation() {
    let app = test_app();
    let body = r#"{"target_allocation": {"情報技術": 50.0, "金融": 50.0}}"#;
    let (status, proposals) = send(&app, "POST", "/api/analysis/rebalance", Some(body), true).await;
    assert_eq!(status, StatusCode::OK);

    let proposals = proposals.as_array().unwrap();
    assert_eq!(proposals.len(), 2);
    // 300k -> 225k and 150k -> 225k
    assert!((proposals[0]["amount"].as_f64().unwrap() - 75_000.0).abs() < 1e-6);
    let actions: Vec<&str> = proposals.iter().map(|p| p["action"].as_str().unwrap()).collect();
    assert!(actions.contains(&"buy") && actions.contains(&"sell"));

    let operations = app.store.operations.lock();
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0].1.kind, "analysis.rebalance");
    assert_eq!(operations[0].1.detail["proposal_count"], 2);
}

#[tokio::test]
async fn malformed_rebalance_is_rejected_before_processing() {
    let app = test_app();

    let over = r#"{"target_allocation": {"情報技術": 80.0, "金融": 40.0}}"#;
    let (status, _) = send(&app, "POST", "/api/analysis/rebalance", Some(over), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let empty = r#"{"target_allocation": {}}"#;
    let (status, _) = send(&app, "POST", "/api/analysis/rebalance", Some(empty), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/analysis/rebalance", Some("not json"), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/analysis/rebalance", Some(r#"{"targets": 1}"#), true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.store.operations.lock().is_empty());
}
