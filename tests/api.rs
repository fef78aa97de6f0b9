//! Dashboard behaviour through the HTTP shell.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use preorder_admin::domain::{PlatformTitle, SalesPeriod, SalesRecord, TitleId};
use preorder_admin::gateway::{Backends, CatalogGateway, GatewayError};
use preorder_admin::reconcile::TitleStore;
use preorder_admin::{build_registry, Dashboard, DashboardOptions};
use preorder_db::SnapshotFile;
use preorder_kernel::Settings;
use serde_json::{json, Value};
use time::macros::datetime;
use tower::ServiceExt;

fn dashboard_with(backends: Backends) -> Dashboard {
    let now = datetime!(2025-03-10 9:00 UTC);
    Dashboard::new(backends, DashboardOptions::default()).with_clock(Arc::new(move || now))
}

fn fixture_backends() -> Backends {
    Backends::fixture(datetime!(2025-03-10 9:00 UTC).date())
}

fn fixture_dashboard() -> Arc<Dashboard> {
    Arc::new(dashboard_with(fixture_backends()))
}

fn app(dashboard: Arc<Dashboard>) -> Router {
    let registry = build_registry(dashboard);
    preorder_http::build_router(&registry, &Settings::default())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let (status, bytes) = send(app, request).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// A catalog that is always down.
struct DownCatalog;

#[async_trait]
impl CatalogGateway for DownCatalog {
    async fn fetch_titles(&self) -> Result<Vec<PlatformTitle>, GatewayError> {
        Err(GatewayError::Unavailable {
            service: "shopify",
            message: "connection refused".into(),
        })
    }

    async fn fetch_sales(
        &self,
        _title_ids: &[TitleId],
        _period: SalesPeriod,
    ) -> Result<Vec<SalesRecord>, GatewayError> {
        Err(GatewayError::Unavailable {
            service: "shopify",
            message: "connection refused".into(),
        })
    }
}

/// A live catalog holding one title and no sales.
struct SingleTitleCatalog;

#[async_trait]
impl CatalogGateway for SingleTitleCatalog {
    async fn fetch_titles(&self) -> Result<Vec<PlatformTitle>, GatewayError> {
        Ok(vec![PlatformTitle {
            id: TitleId::new("9789999999999"),
            title: "Live Book".into(),
            pub_date: Some("2025-06-01".into()),
            collections: vec!["Preorder".into()],
        }])
    }

    async fn fetch_sales(
        &self,
        _title_ids: &[TitleId],
        _period: SalesPeriod,
    ) -> Result<Vec<SalesRecord>, GatewayError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn refresh_then_list_titles() {
    let app = app(fixture_dashboard());

    let (status, body) = call(&app, "POST", "/api/session/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "refreshed");
    assert_eq!(body["report"]["added"], 5);

    let (status, titles) = call(&app, "GET", "/api/titles?sort=pub_date", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = titles
        .as_array()
        .unwrap()
        .iter()
        .map(|title| title["id"].as_str().unwrap())
        .collect();
    // Real dates first, then the malformed one, then the missing one.
    assert_eq!(
        ids,
        [
            "9781234567892",
            "9781234567891",
            "9781234567890",
            "9781234567894",
            "9781234567893"
        ]
    );

    let (_, missing) = call(&app, "GET", "/api/titles?date=missing", None).await;
    assert_eq!(missing.as_array().unwrap().len(), 1);
    assert_eq!(missing[0]["date_status"], "missing");
}

#[tokio::test]
async fn unknown_filter_is_a_validation_error() {
    let app = app(fixture_dashboard());

    let (status, body) = call(&app, "GET", "/api/titles?date=someday", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(body["error"]["details"][0]["field"], "date");
}

#[tokio::test]
async fn approval_and_audit_trail() {
    let app = app(fixture_dashboard());
    call(&app, "POST", "/api/session/refresh", None).await;

    let (status, outcome) = call(
        &app,
        "POST",
        "/api/titles/9781234567892/approval",
        Some(json!({ "status": "approved", "actor": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "recorded");
    assert_eq!(outcome["event"]["actor"], "alice");

    let (status, body) = call(
        &app,
        "POST",
        "/api/titles/9781234567892/approval",
        Some(json!({ "status": "pending", "actor": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "invalid_transition");

    let (_, events) = call(&app, "GET", "/api/approvals/events?title=9781234567892", None).await;
    assert_eq!(events.as_array().unwrap().len(), 1);
    assert_eq!(events[0]["to"], "approved");
}

#[tokio::test]
async fn unknown_title_is_not_found() {
    let app = app(fixture_dashboard());

    let (status, body) = call(&app, "GET", "/api/titles/0000000000000", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn override_fixes_a_malformed_date() {
    let app = app(fixture_dashboard());
    call(&app, "POST", "/api/session/refresh", None).await;

    let (status, body) = call(&app, "GET", "/api/titles/9781234567894/publication-date", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "malformed_publication_date");

    let (status, _) = call(
        &app,
        "PUT",
        "/api/titles/9781234567894/override",
        Some(json!({ "date": "Spring 2025", "actor": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, view) = call(
        &app,
        "PUT",
        "/api/titles/9781234567894/override",
        Some(json!({ "date": "2025-05-20", "note": "from the publisher", "actor": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["effective_date"], "2025-05-20");
    assert_eq!(view["override"]["set_by"], "alice");

    let (status, body) = call(&app, "GET", "/api/titles/9781234567894/publication-date", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["publication_date"], "2025-05-20");

    let (_, view) = call(&app, "DELETE", "/api/titles/9781234567894/override", None).await;
    assert_eq!(view["date_status"], "malformed");
}

#[tokio::test]
async fn titles_csv_download() {
    let app = app(fixture_dashboard());
    call(&app, "POST", "/api/session/refresh", None).await;

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/reports/titles.csv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("preorder_titles.csv"));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(body.to_vec()).unwrap();
    assert!(csv.contains("9781234567892,Past Due Book,2025-01-09,pending,8,239.60"));
    assert!(csv.contains("9781234567893,Missing Date Book,,pending,"));
}

#[tokio::test]
async fn failed_refresh_leaves_the_store_untouched_and_warns() {
    let loaded = fixture_dashboard();
    loaded.refresh().await;
    let before = loaded.store_snapshot().await;

    // Same data, now behind a catalog that is down.
    let down = Arc::new(
        dashboard_with(Backends {
            catalog: Arc::new(DownCatalog),
            ..fixture_backends()
        })
        .with_store(before.clone()),
    );

    let app = app(down.clone());
    let (status, body) = call(&app, "POST", "/api/session/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "stale");
    assert!(body["warning"]["message"]
        .as_str()
        .unwrap()
        .contains("connection refused"));

    assert_eq!(down.store_snapshot().await, before);

    let (_, session) = call(&app, "GET", "/api/session", None).await;
    assert!(session["stale"].is_object());
    assert_eq!(session["titles"], 5);

    let (_, summary) = call(&app, "GET", "/api/reports/summary", None).await;
    assert!(summary["stale"].is_object());
}

#[tokio::test]
async fn weekly_report_needs_both_bounds() {
    let app = app(fixture_dashboard());
    call(&app, "POST", "/api/session/refresh", None).await;

    let (status, _) = call(&app, "GET", "/api/reports/weekly?start=2025-03-02", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, report) = call(&app, "GET", "/api/reports/weekly", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["period"]["start"], "2025-03-02");
    assert_eq!(report["period"]["end"], "2025-03-08");
}

#[tokio::test]
async fn approval_issue_round_trip() {
    let app = app(fixture_dashboard());
    call(&app, "POST", "/api/session/refresh", None).await;

    let (status, issues) = call(&app, "GET", "/api/approvals/issues", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(issues[0]["number"], 123);
    assert_eq!(issues[0]["checked"], json!(["9781234567891"]));

    let (status, sync) = call(&app, "POST", "/api/approvals/sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sync["approved"], json!(["9781234567891"]));
    assert_eq!(sync["comments_posted"], 1);

    let (status, created) = call(&app, "POST", "/api/approvals/issues", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["number"], 124);
}

#[tokio::test]
async fn leaving_test_mode_without_credentials_is_a_bad_request() {
    let app = app(fixture_dashboard());

    let (status, body) = call(
        &app,
        "PUT",
        "/api/session/test-mode",
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn openapi_lists_module_paths() {
    let app = app(fixture_dashboard());

    let (status, doc) = call(&app, "GET", "/docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/titles/{id}/approval"].is_object());
    assert!(doc["paths"]["/api/reports/titles.csv"].is_object());
    assert!(doc["components"]["schemas"]["Title"].is_object());
}

#[tokio::test]
async fn test_mode_round_trip_leaves_the_live_store_alone() {
    let dir = tempfile::tempdir().unwrap();
    let live_file = SnapshotFile::new(dir.path().join("state.json"), 3);
    let test_file = SnapshotFile::new(dir.path().join("state_test.json"), 3);

    let dashboard = Arc::new(
        dashboard_with(fixture_backends())
            .with_live(Backends {
                catalog: Arc::new(SingleTitleCatalog),
                ..fixture_backends()
            })
            .with_snapshot(live_file.clone())
            .unwrap()
            .with_test_snapshot(test_file.clone())
            .unwrap()
            .with_test_mode(false)
            .unwrap(),
    );
    let app = app(dashboard.clone());

    let (_, refreshed) = call(&app, "POST", "/api/session/refresh", None).await;
    assert_eq!(refreshed["report"]["added"], 1);
    let live_before = dashboard.store_snapshot().await;

    let (status, session) = call(
        &app,
        "PUT",
        "/api/session/test-mode",
        Some(json!({ "enabled": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["titles"], 0);

    let (_, refreshed) = call(&app, "POST", "/api/session/refresh", None).await;
    assert_eq!(refreshed["report"]["added"], 5);
    let (_, sync) = call(&app, "POST", "/api/approvals/sync", None).await;
    assert_eq!(sync["approved"], json!(["9781234567891"]));

    let (status, _) = call(
        &app,
        "PUT",
        "/api/session/test-mode",
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard.store_snapshot().await, live_before);

    let (_, events) = call(&app, "GET", "/api/approvals/events", None).await;
    assert_eq!(events, json!([]));

    let (_, refreshed) = call(&app, "POST", "/api/session/refresh", None).await;
    assert_eq!(refreshed["report"]["added"], 0);
    let (_, titles) = call(&app, "GET", "/api/titles?include_inactive=true", None).await;
    assert_eq!(titles.as_array().unwrap().len(), 1);
    assert_eq!(titles[0]["id"], "9789999999999");

    let reloaded: TitleStore = live_file.load().unwrap().unwrap();
    assert_eq!(reloaded.len(), 1);
    assert!(reloaded.audit_log().is_empty());
    assert!(reloaded.title(&TitleId::new("9781234567891")).is_none());

    let fixture_reloaded: TitleStore = test_file.load().unwrap().unwrap();
    assert_eq!(fixture_reloaded.len(), 5);
    assert_eq!(fixture_reloaded.audit_log().len(), 1);
}
