use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use adlens::api::{self, AppState};
use adlens::auth::AuthService;
use adlens::config::Config;
use adlens::cursor::CursorSigner;
use adlens::insights::{CooldownGate, InsightsService, OpenAiClient};
use adlens::provider::{AdDataProvider, SystemClock};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    let provider = Arc::new(AdDataProvider::from_config(&config, Arc::new(SystemClock))?);
    info!(
        "📄 Reading spreadsheet {} (cache TTL {}s, batch size {})",
        config.sheets.spreadsheet_id,
        config.pipeline.cache_ttl_secs,
        config.pipeline.batch_size
    );

    let insights = match OpenAiClient::from_config(&config.insights) {
        Ok(client) => {
            info!(
                "🤖 Insights enabled (model: {}, cooldown: {}s)",
                config.insights.model, config.insights.cooldown_secs
            );
            Some(Arc::new(InsightsService::new(
                Arc::clone(&provider),
                Arc::new(client),
                CooldownGate::new(Duration::from_secs(config.insights.cooldown_secs)),
                config.insights.context_records,
            )))
        }
        Err(e) => {
            warn!("Insights disabled: {:#}", e);
            None
        }
    };

    let auth_service = Arc::new(AuthService::new(config.auth.api_keys.clone()));
    if auth_service.is_enabled() {
        info!("🔐 API key authentication enabled ({} keys)", config.auth.api_keys.len());
    } else {
        info!("🔓 Authentication is disabled - all API requests are allowed");
    }

    let state = Arc::new(AppState {
        provider,
        insights,
        cursors: CursorSigner::new(config.pagination.cursor_hmac_secret.as_deref()),
    });

    let api_router = api::create_api_router(state, auth_service);

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!("   - API endpoints available at http://{}/api/...", api_addr);

    axum::serve(api_listener, api_router).await?;

    Ok(())
}
