use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::ads::aggregator::default_dashboard_range;
use crate::ads::query::{self, ListQuery};
use crate::ads::{
    aggregate, series, validate_data_structure, AdDataSummary, AdField, AdRecord,
    AggregatedBucket, DateRange, Granularity, SeriesPoint, SortOrder,
};
use crate::cursor::{CursorData, CursorSigner};
use crate::error::{FetchError, InsightsError};
use crate::insights::InsightsService;
use crate::provider::AdDataProvider;

pub struct AppState {
    pub provider: Arc<AdDataProvider>,
    pub insights: Option<Arc<InsightsService>>,
    pub cursors: CursorSigner,
}

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 1000;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Handler error rendered as `{ "error": ... }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    retry_after: Option<Duration>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        tracing::error!("Failed to fetch ad data: {}", e);
        Self::new(StatusCode::BAD_GATEWAY, "Failed to fetch ad data")
    }
}

impl From<InsightsError> for ApiError {
    fn from(e: InsightsError) -> Self {
        match e {
            InsightsError::RateLimited(limit) => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: limit.to_string(),
                retry_after: Some(limit.retry_after),
            },
            InsightsError::Fetch(fetch) => fetch.into(),
            InsightsError::Disabled => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "Insights are not configured")
            }
            InsightsError::Completion(err) => {
                tracing::error!("Completion request failed: {:#}", err);
                Self::new(StatusCode::BAD_GATEWAY, "Failed to get completion")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response();

        if let Some(wait) = self.retry_after {
            // Whole seconds, rounded up
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct ListResponse {
    pub data: Vec<AdRecord>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Parse listing parameters; every non-reserved key is a field filter
fn parse_list_query(
    params: &HashMap<String, String>,
    cursors: &CursorSigner,
) -> Result<ListQuery, ApiError> {
    let parse_usize = |key: &str| -> Result<Option<usize>, ApiError> {
        params
            .get(key)
            .map(|v| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| ApiError::bad_request(format!("'{key}' must be a non-negative integer")))
            })
            .transpose()
    };

    let limit = parse_usize("limit")?
        .or(parse_usize("per_page")?)
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);

    let mut query = ListQuery {
        limit,
        ..ListQuery::default()
    };

    if let Some(sort) = params.get("sort") {
        query.sort = sort
            .parse::<AdField>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
    }
    if let Some(order) = params.get("order") {
        query.order = order
            .parse::<SortOrder>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
    }

    if let Some(cursor) = params.get("cursor") {
        let data = cursors
            .decode(cursor)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        query.offset = data.offset;
        query.sort = data.sort;
        query.order = data.order;
    } else if let Some(page) = parse_usize("page")? {
        query.offset = page.saturating_sub(1).saturating_mul(limit);
    }

    const RESERVED: [&str; 6] = ["cursor", "limit", "page", "per_page", "sort", "order"];
    for (key, value) in params {
        if RESERVED.contains(&key.as_str()) {
            continue;
        }
        let field = key
            .parse::<AdField>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        query.filters.push((field, value.clone()));
    }
    // HashMap order is arbitrary; keep filters deterministic
    query.filters.sort_by_key(|(field, _)| field.name());

    Ok(query)
}

/// List ad records with filtering, sorting and pagination
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<ListResponse> {
    let query = parse_list_query(&params, &state.cursors)?;
    let records = state.provider.fetch_ad_data_with_cache().await?;
    let page = query::list(&records, &query);

    let next_offset = query.offset + page.data.len();
    let next_cursor = if !page.data.is_empty() && next_offset < page.total {
        let cursor = state
            .cursors
            .encode(&CursorData {
                offset: next_offset,
                sort: query.sort,
                order: query.order,
            })
            .map_err(|e| {
                tracing::error!("Failed to sign cursor: {}", e);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create cursor")
            })?;
        Some(cursor)
    } else {
        None
    };

    Ok(Json(ListResponse {
        data: page.data,
        total: page.total,
        next_cursor,
    }))
}

/// Get one ad record by id
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<AdRecord> {
    let records = state.provider.fetch_ad_data_with_cache().await?;
    query::get_one(&records, &id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("Record not found: {id}")))
}

#[derive(Debug, Deserialize)]
pub struct ManyQuery {
    /// Comma-separated record ids
    pub ids: String,
}

/// Get several ad records by id
pub async fn get_many_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ManyQuery>,
) -> ApiResult<Vec<AdRecord>> {
    let ids: Vec<String> = params
        .ids
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let records = state.provider.fetch_ad_data_with_cache().await?;
    Ok(Json(query::get_many(&records, &ids)))
}

#[derive(Debug, Deserialize)]
pub struct AggregateParams {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub view_mode: Option<String>,
    pub metric: Option<String>,
}

impl AggregateParams {
    fn range(&self) -> DateRange {
        let default = default_dashboard_range(chrono::Utc::now().date_naive());
        DateRange::new(
            self.start.unwrap_or(default.start),
            self.end.unwrap_or(default.end),
        )
    }

    fn granularity(&self) -> Result<Granularity, ApiError> {
        match &self.view_mode {
            Some(mode) => mode
                .parse::<Granularity>()
                .map_err(|e| ApiError::bad_request(e.to_string())),
            None => Ok(Granularity::default()),
        }
    }
}

#[derive(Serialize)]
pub struct AggregateResponse {
    pub view_mode: Granularity,
    pub range: DateRange,
    pub buckets: Vec<AggregatedBucket>,
}

/// Aggregate records into per-period buckets
pub async fn aggregate_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AggregateParams>,
) -> ApiResult<AggregateResponse> {
    let range = params.range();
    let view_mode = params.granularity()?;
    let records = state.provider.fetch_ad_data_with_cache().await?;

    Ok(Json(AggregateResponse {
        view_mode,
        range,
        buckets: aggregate(&records, &range, view_mode),
    }))
}

#[derive(Serialize)]
pub struct SeriesResponse {
    pub metric: AdField,
    pub view_mode: Granularity,
    pub range: DateRange,
    pub points: Vec<SeriesPoint>,
}

/// One metric over time, ready for a line chart
pub async fn metric_series(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AggregateParams>,
) -> ApiResult<SeriesResponse> {
    let metric = params
        .metric
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("'metric' is required"))?
        .parse::<AdField>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    if !metric.is_numeric() {
        return Err(ApiError::bad_request(format!("'{metric}' is not a numeric metric")));
    }

    let range = params.range();
    let view_mode = params.granularity()?;
    let records = state.provider.fetch_ad_data_with_cache().await?;
    let buckets = aggregate(&records, &range, view_mode);

    Ok(Json(SeriesResponse {
        metric,
        view_mode,
        range,
        points: series(&buckets, metric).unwrap_or_default(),
    }))
}

/// Totals across every cached record
pub async fn summary(State(state): State<Arc<AppState>>) -> ApiResult<AdDataSummary> {
    let records = state.provider.fetch_ad_data_with_cache().await?;
    Ok(Json(AdDataSummary::from_records(&records)))
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

pub async fn validate(State(state): State<Arc<AppState>>) -> ApiResult<ValidateResponse> {
    let records = state.provider.fetch_ad_data_with_cache().await?;
    Ok(Json(ValidateResponse {
        valid: validate_data_structure(&records),
    }))
}

/// Drop the cached record set so the next read refetches
pub async fn refresh(State(state): State<Arc<AppState>>) -> Json<SuccessResponse> {
    state.provider.invalidate().await;
    tracing::info!("Ad data cache invalidated on request");
    Json(SuccessResponse {
        message: "Ad data cache invalidated".to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct InsightsRequest {
    pub question: String,
}

#[derive(Serialize)]
pub struct InsightsResponse {
    pub answer: String,
}

pub async fn ask_insights(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<InsightsRequest>,
) -> ApiResult<InsightsResponse> {
    if payload.question.trim().is_empty() {
        return Err(ApiError::bad_request("Question cannot be empty"));
    }
    let insights = state.insights.as_ref().ok_or(InsightsError::Disabled)?;
    let answer = insights.ask(&payload.question).await?;
    Ok(Json(InsightsResponse { answer }))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
