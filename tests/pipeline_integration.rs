//! Pipeline integration tests
//!
//! A throwaway values-API server on 127.0.0.1 stands in for the spreadsheet,
//! so these tests exercise the real HTTP client, paging, normalization and the
//! provider cache together.

use adlens::ads::AdRecord;
use adlens::config::SheetsConfig;
use adlens::error::FetchError;
use adlens::provider::{AdDataLoader, AdDataProvider, Clock, ManualClock, SheetsPipeline};
use adlens::sheets::{SheetWindow, SheetsClient};
use adlens::ads::MetricCalculator;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const API_KEY: &str = "test-key";

const HEADER: [&str; 11] = [
    "Date",
    "Data Source type name",
    "Campaign Name",
    "Ad Set Name",
    "Ad Name",
    "Amount Spent (USD)",
    "Impressions",
    "Link Clicks",
    "App Installs",
    "Registrations Completed",
    "Purchases",
];

struct FakeSheet {
    grid: Vec<Vec<String>>,
    requests: AtomicUsize,
    ranges: Mutex<Vec<String>>,
}

/// `Tab!A4:K6` → (4, 6)
fn parse_rows(range: &str) -> Option<(usize, usize)> {
    let cells = range.rsplit('!').next()?;
    let (start, end) = cells.split_once(':')?;
    let digits = |s: &str| -> Option<usize> {
        s.trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .parse()
            .ok()
    };
    Some((digits(start)?, digits(end)?))
}

async fn values(
    State(sheet): State<Arc<FakeSheet>>,
    Path((spreadsheet_id, range)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    sheet.requests.fetch_add(1, Ordering::SeqCst);
    sheet.ranges.lock().unwrap().push(range.clone());

    if params.get("key").map(String::as_str) != Some(API_KEY) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if spreadsheet_id == "broken" {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let Some((first, last)) = parse_rows(&range) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let last = last.min(sheet.grid.len());
    if first > last {
        return Json(json!({ "range": range })).into_response();
    }

    let rows = &sheet.grid[first - 1..last];
    let prefix = range
        .rsplit_once('!')
        .map(|(tab, _)| format!("{tab}!"))
        .unwrap_or_default();
    Json(json!({
        "range": format!("{prefix}A{first}:K{last}"),
        "values": rows,
    }))
    .into_response()
}

fn data_row(day: u32, spend: &str, impressions: &str, clicks: &str) -> Vec<String> {
    vec![
        format!("2024-01-{day:02}"),
        "Meta".to_string(),
        "Spring Sale".to_string(),
        "Broad".to_string(),
        format!("Ad {day}"),
        spend.to_string(),
        impressions.to_string(),
        clicks.to_string(),
        "2".to_string(),
        "1".to_string(),
        "1".to_string(),
    ]
}

fn grid(data_rows: u32) -> Vec<Vec<String>> {
    let mut grid = vec![HEADER.iter().map(|s| s.to_string()).collect()];
    grid.extend((1..=data_rows).map(|day| data_row(day, "10", "1000", "50")));
    grid
}

/// Start the fake server, returning its base URL
async fn spawn_sheet(grid: Vec<Vec<String>>) -> (String, Arc<FakeSheet>) {
    let sheet = Arc::new(FakeSheet {
        grid,
        requests: AtomicUsize::new(0),
        ranges: Mutex::new(Vec::new()),
    });
    let app = Router::new()
        .route(
            "/v4/spreadsheets/{spreadsheet_id}/values/{range}",
            get(values),
        )
        .with_state(Arc::clone(&sheet));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), sheet)
}

fn sheets_config(base_url: &str, spreadsheet_id: &str, page_size: usize) -> SheetsConfig {
    SheetsConfig {
        spreadsheet_id: spreadsheet_id.to_string(),
        api_key: API_KEY.to_string(),
        base_url: base_url.to_string(),
        sheet_name: Some("Ads".to_string()),
        first_column: "A".to_string(),
        last_column: "K".to_string(),
        page_size,
        request_timeout_secs: 5,
    }
}

fn pipeline(config: &SheetsConfig) -> Arc<SheetsPipeline> {
    let client = SheetsClient::from_config(config).unwrap();
    Arc::new(SheetsPipeline::new(
        Arc::new(client),
        SheetWindow::from(config),
        MetricCalculator::new(1_000),
        2,
    ))
}

#[tokio::test]
async fn test_pipeline_reads_every_page() {
    let (base_url, sheet) = spawn_sheet(grid(7)).await;
    let config = sheets_config(&base_url, "sheet-1", 3);
    let pipeline = pipeline(&config);

    let records: Vec<AdRecord> = pipeline.load().await.unwrap();

    assert_eq!(records.len(), 7);
    assert_eq!(
        *sheet.ranges.lock().unwrap(),
        vec!["Ads!A1:K3", "Ads!A4:K6", "Ads!A7:K9"]
    );

    let first = &records[0];
    assert_eq!(first.date, "2024-01-01");
    assert_eq!(first.campaign_name, "Spring Sale");
    assert_eq!(first.counters.impressions, 1000);
    assert!((first.metrics.cpm - 10.0).abs() < 1e-9);
    assert!((first.metrics.click_through_rate - 0.05).abs() < 1e-9);
    assert!((first.metrics.cost_per_link_click - 0.2).abs() < 1e-9);

    // Ids stay unique across pages and batches
    let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 7);

    // Identical rows share memoized metric results
    assert!(pipeline.calculator().memoized_entries() > 0);
    assert!(pipeline.calculator().memoized_entries() <= 8);
}

#[tokio::test]
async fn test_pipeline_zero_denominators_stay_finite() {
    let mut grid = grid(0);
    grid.push(data_row(2, "0", "0", "0"));
    grid.push(data_row(3, "5", "", "abc"));
    let (base_url, _sheet) = spawn_sheet(grid).await;
    let config = sheets_config(&base_url, "sheet-1", 100);

    let records = pipeline(&config).load().await.unwrap();

    assert_eq!(records.len(), 2);
    for record in &records {
        let m = &record.metrics;
        for value in [
            m.cpm,
            m.click_through_rate,
            m.cost_per_link_click,
            m.cost_per_app_install,
            m.click_to_install,
            m.cost_per_registration,
            m.cost_per_purchase,
            m.install_to_purchase,
        ] {
            assert!(value.is_finite());
        }
    }
    assert_eq!(records[1].counters.impressions, 0);
    assert_eq!(records[1].metrics.cpm, 0.0);
}

#[tokio::test]
async fn test_upstream_error_fails_the_load() {
    let (base_url, _sheet) = spawn_sheet(grid(3)).await;
    let config = sheets_config(&base_url, "broken", 100);

    let err = pipeline(&config).load().await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 500 }));
}

#[tokio::test]
async fn test_missing_date_header_is_rejected() {
    let mut grid = grid(2);
    grid[0][0] = "Day".to_string();
    let (base_url, _sheet) = spawn_sheet(grid).await;
    let config = sheets_config(&base_url, "sheet-1", 100);

    let err = pipeline(&config).load().await.unwrap_err();
    assert!(matches!(err, FetchError::MissingHeader("Date")));
}

#[tokio::test]
async fn test_provider_serves_cache_until_ttl() {
    let (base_url, sheet) = spawn_sheet(grid(4)).await;
    let config = sheets_config(&base_url, "sheet-1", 100);
    let clock = Arc::new(ManualClock::new());
    let provider = AdDataProvider::new(
        pipeline(&config) as Arc<dyn AdDataLoader>,
        Duration::from_secs(300),
        Arc::clone(&clock) as Arc<dyn Clock>,
    );

    let first = provider.fetch_ad_data_with_cache().await.unwrap();
    clock.advance(Duration::from_secs(299));
    let second = provider.fetch_ad_data_with_cache().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(sheet.requests.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(1));
    let third = provider.fetch_ad_data_with_cache().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.len(), 4);
    assert_eq!(sheet.requests.load(Ordering::SeqCst), 2);

    // Uncached reads always go upstream
    provider.fetch_ad_data().await.unwrap();
    assert_eq!(sheet.requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_empty_sheet_yields_no_records() {
    let (base_url, _sheet) = spawn_sheet(Vec::new()).await;
    let config = sheets_config(&base_url, "sheet-1", 100);

    let records = pipeline(&config).load().await.unwrap();
    assert!(records.is_empty());
}
