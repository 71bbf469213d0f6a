//! API-key gate for the `/api` routes

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::api::ErrorResponse;

pub const API_KEY_HEADER: &str = "X-API-Key";

pub struct AuthService {
    api_keys: Arc<Vec<String>>,
}

impl AuthService {
    /// With no keys configured every request is allowed
    pub fn new(api_keys: Vec<String>) -> Self {
        Self {
            api_keys: Arc::new(api_keys),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    pub fn validate_key(&self, key: &str) -> bool {
        if !self.is_enabled() {
            return true;
        }
        self.api_keys.iter().any(|k| k == key)
    }
}

pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if auth_service.validate_key(api_key) {
        next.run(request).await
    } else {
        tracing::debug!("Rejected request to {} with invalid API key", request.uri().path());
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid or missing API key".to_string(),
            }),
        )
            .into_response()
    }
}
