use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{auth_middleware, AuthService};

use super::handlers::{
    aggregate_records, ask_insights, get_many_records, get_record, health_check, list_records,
    metric_series, refresh, summary, validate, AppState,
};

pub fn create_api_router(state: Arc<AppState>, auth_service: Arc<AuthService>) -> Router {
    let protected_routes = Router::new()
        .route("/ad-data", get(list_records))
        .route("/ad-data/many", get(get_many_records))
        .route("/ad-data/aggregate", get(aggregate_records))
        .route("/ad-data/series", get(metric_series))
        .route("/ad-data/summary", get(summary))
        .route("/ad-data/validate", get(validate))
        .route("/ad-data/refresh", post(refresh))
        .route("/ad-data/{id}", get(get_record))
        .route("/insights", post(ask_insights))
        .route_layer(middleware::from_fn_with_state(auth_service, auth_middleware))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
