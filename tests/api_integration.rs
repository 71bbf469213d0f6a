//! HTTP API integration tests
//!
//! The router runs in-process via `oneshot`; ad data comes from an in-memory
//! loader so every response is deterministic.

use adlens::ads::{normalize, AdRecord, RawRow};
use adlens::api::{self, AppState};
use adlens::auth::AuthService;
use adlens::cursor::CursorSigner;
use adlens::error::{FetchError, FetchResult};
use adlens::insights::{ChatMessage, CompletionClient, CooldownGate, InsightsService};
use adlens::provider::{AdDataLoader, AdDataProvider, Clock, ManualClock};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Ten days of rows starting Monday 2024-01-01
struct SheetLoader {
    loads: AtomicUsize,
}

#[async_trait]
impl AdDataLoader for SheetLoader {
    async fn load(&self) -> FetchResult<Vec<AdRecord>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let header: RawRow = [
            "Date",
            "Campaign Name",
            "Ad Name",
            "Amount Spent (USD)",
            "Impressions",
            "Link Clicks",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let rows: Vec<RawRow> = (1..=10)
            .map(|day: u32| {
                let campaign = if day % 2 == 0 { "Winter Promo" } else { "Spring Sale" };
                vec![
                    format!("2024-01-{day:02}"),
                    campaign.to_string(),
                    format!("Ad {day}"),
                    day.to_string(),
                    "1000".to_string(),
                    (10 * day).to_string(),
                ]
            })
            .collect();
        normalize(&header, &rows)
    }
}

struct BrokenLoader;

#[async_trait]
impl AdDataLoader for BrokenLoader {
    async fn load(&self) -> FetchResult<Vec<AdRecord>> {
        Err(FetchError::Status { status: 503 })
    }
}

struct CannedClient;

#[async_trait]
impl CompletionClient for CannedClient {
    async fn complete(&self, _messages: &[ChatMessage]) -> anyhow::Result<String> {
        Ok("Spend grows every day.".to_string())
    }
}

struct TestApp {
    router: Router,
    loader: Arc<SheetLoader>,
}

fn provider_for(loader: Arc<dyn AdDataLoader>, clock: &Arc<ManualClock>) -> Arc<AdDataProvider> {
    Arc::new(AdDataProvider::new(
        loader,
        Duration::from_secs(300),
        Arc::clone(clock) as Arc<dyn Clock>,
    ))
}

fn create_app(api_keys: Vec<String>, with_insights: bool) -> TestApp {
    let clock = Arc::new(ManualClock::new());
    let loader = Arc::new(SheetLoader {
        loads: AtomicUsize::new(0),
    });
    let provider = provider_for(Arc::clone(&loader) as Arc<dyn AdDataLoader>, &clock);

    let insights = with_insights.then(|| {
        Arc::new(InsightsService::new(
            Arc::clone(&provider),
            Arc::new(CannedClient),
            CooldownGate::with_clock(
                Duration::from_secs(12),
                Arc::clone(&clock) as Arc<dyn Clock>,
            ),
            5,
        ))
    });

    let state = Arc::new(AppState {
        provider,
        insights,
        cursors: CursorSigner::new(Some("test_secret")),
    });
    TestApp {
        router: api::create_api_router(state, Arc::new(AuthService::new(api_keys))),
        loader,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn ask(question: &str) -> Request<Body> {
    Request::post("/api/insights")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "question": question }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = create_app(vec![], false);
    let (status, body) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "OK");
}

#[tokio::test]
async fn test_list_sorted_pages_follow_cursor() {
    let app = create_app(vec![], false);

    let (status, body) = get(
        &app.router,
        "/api/ad-data?per_page=4&sort=amountSpent&order=desc",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 10);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 4);
    assert_eq!(data[0]["amountSpent"], 10.0);
    assert_eq!(data[3]["amountSpent"], 7.0);

    let cursor = body["next_cursor"].as_str().unwrap().to_string();
    let (status, body) = get(&app.router, &format!("/api/ad-data?cursor={cursor}&limit=4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["amountSpent"], 6.0);

    let (_, body) = get(&app.router, "/api/ad-data?page=3&per_page=4").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert!(body.get("next_cursor").is_none());

    // One upstream load served every request
    assert_eq!(app.loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_list_filters_and_rejects_bad_params() {
    let app = create_app(vec![], false);

    let (status, body) = get(&app.router, "/api/ad-data?campaignName=winter&per_page=50").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 5);
    for record in body["data"].as_array().unwrap() {
        assert_eq!(record["campaignName"], "Winter Promo");
    }

    let (status, _) = get(&app.router, "/api/ad-data?spend=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app.router, "/api/ad-data?cursor=forged.cursor").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app.router, "/api/ad-data?order=sideways").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_records_by_id() {
    let app = create_app(vec![], false);

    let (status, body) = get(&app.router, "/api/ad-data/2024-01-03-2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["adName"], "Ad 3");
    assert_eq!(body["dataSourceTypeName"], "unknown");

    let (status, body) = get(&app.router, "/api/ad-data/2024-02-01-0").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("2024-02-01-0"));

    let (status, body) = get(&app.router, "/api/ad-data/many?ids=2024-01-02-1,missing,2024-01-01-0").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["2024-01-01-0", "2024-01-02-1"]);
}

#[tokio::test]
async fn test_aggregate_weekly_and_monthly() {
    let app = create_app(vec![], false);

    let (status, body) = get(
        &app.router,
        "/api/ad-data/aggregate?start=2024-01-01&end=2024-01-10&view_mode=weekly",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["view_mode"], "weekly");
    let buckets = body["buckets"].as_array().unwrap();
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0]["bucketStart"], "2024-01-01");
    assert_eq!(buckets[0]["recordCount"], 7);
    assert_eq!(buckets[0]["impressions"], 7000);
    assert_eq!(buckets[0]["amountSpent"], 28.0);
    assert_eq!(buckets[1]["bucketStart"], "2024-01-08");
    assert_eq!(buckets[1]["recordCount"], 3);

    let (_, body) = get(
        &app.router,
        "/api/ad-data/aggregate?start=2024-01-01&end=2024-01-31&view_mode=monthly",
    )
    .await;
    let buckets = body["buckets"].as_array().unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0]["amountSpent"], 55.0);
    assert_eq!(buckets[0]["linkClicks"], 550);

    // Inverted range is empty, not an error
    let (status, body) = get(
        &app.router,
        "/api/ad-data/aggregate?start=2024-01-10&end=2024-01-01",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["buckets"].as_array().unwrap().is_empty());

    let (status, _) = get(&app.router, "/api/ad-data/aggregate?view_mode=hourly").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app.router, "/api/ad-data/aggregate?start=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metric_series() {
    let app = create_app(vec![], false);

    let (status, body) = get(
        &app.router,
        "/api/ad-data/series?start=2024-01-01&end=2024-01-03&view_mode=daily&metric=linkClicks",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metric"], "linkClicks");
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(points[0]["bucket"], "2024-01-01");
    assert_eq!(points[2]["value"], 30.0);

    let (status, _) = get(&app.router, "/api/ad-data/series?metric=campaignName").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app.router, "/api/ad-data/series").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_summary_validate_and_refresh() {
    let app = create_app(vec![], false);

    let (status, body) = get(&app.router, "/api/ad-data/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalRecords"], 10);
    assert_eq!(body["amountSpent"], 55.0);
    assert_eq!(body["impressions"], 10000);

    let (status, body) = get(&app.router, "/api/ad-data/validate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(app.loader.loads.load(Ordering::SeqCst), 1);

    let (status, _) = send(
        &app.router,
        Request::post("/api/ad-data/refresh").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    get(&app.router, "/api/ad-data/summary").await;
    assert_eq!(app.loader.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let app = create_app(vec!["secret".to_string()], false);

    let (status, body) = get(&app.router, "/api/ad-data/summary").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let request = Request::get("/api/ad-data/summary")
        .header("X-API-Key", "secret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_insights_rate_limited() {
    let app = create_app(vec![], true);

    let (status, body) = send(&app.router, ask("How is spend trending?")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Spend grows every day.");

    let response = app
        .router
        .clone()
        .oneshot(ask("And clicks?"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "12");

    let (status, _) = send(&app.router, ask("   ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_insights_disabled() {
    let app = create_app(vec![], false);
    let (status, body) = send(&app.router, ask("Anything?")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_fetch_failure_maps_to_bad_gateway() {
    let clock = Arc::new(ManualClock::new());
    let state = Arc::new(AppState {
        provider: provider_for(Arc::new(BrokenLoader), &clock),
        insights: None,
        cursors: CursorSigner::new(None),
    });
    let router = api::create_api_router(state, Arc::new(AuthService::new(vec![])));

    for uri in ["/api/ad-data", "/api/ad-data/summary", "/api/ad-data/aggregate"] {
        let (status, body) = get(&router, uri).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY, "{uri}");
        assert_eq!(body["error"], "Failed to fetch ad data");
    }
}
