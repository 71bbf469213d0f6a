//! Question answering over ad data via a chat-completion API
//!
//! Each question is sent with a compact JSON context of the first records.
//! Completions are billed, so every call that reaches the API passes a
//! [`CooldownGate`].

pub mod client;
pub mod rate_limiter;

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::ads::AdRecord;
use crate::error::InsightsError;
use crate::provider::AdDataProvider;

pub use client::{ChatMessage, CompletionClient, OpenAiClient, Role};
pub use rate_limiter::CooldownGate;

const SYSTEM_PROMPT: &str = "You are an AI assistant specialized in analyzing Facebook ad data.";

/// Fields of a record sent as prompt context
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordContext<'a> {
    pub id: &'a str,
    pub date: &'a str,
    pub amount_spent: f64,
    pub impressions: u64,
    pub link_clicks: u64,
    pub purchases: u64,
}

/// Summaries of the first `limit` records
pub fn summarize_context(records: &[AdRecord], limit: usize) -> Vec<RecordContext<'_>> {
    records
        .iter()
        .take(limit)
        .map(|r| RecordContext {
            id: &r.id,
            date: &r.date,
            amount_spent: r.counters.amount_spent,
            impressions: r.counters.impressions,
            link_clicks: r.counters.link_clicks,
            purchases: r.counters.purchases,
        })
        .collect()
}

pub fn build_messages(question: &str, context: &[RecordContext<'_>]) -> Vec<ChatMessage> {
    let context_json = serde_json::to_string(context).unwrap_or_else(|_| "[]".to_string());
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Question about Facebook ad data: {question}\nContext: {context_json}"
        )),
    ]
}

pub struct InsightsService {
    provider: Arc<AdDataProvider>,
    client: Arc<dyn CompletionClient>,
    gate: CooldownGate,
    context_records: usize,
}

impl InsightsService {
    pub fn new(
        provider: Arc<AdDataProvider>,
        client: Arc<dyn CompletionClient>,
        gate: CooldownGate,
        context_records: usize,
    ) -> Self {
        Self {
            provider,
            client,
            gate,
            context_records,
        }
    }

    /// Answer `question` using the cached ad data as context
    ///
    /// The cooldown is only consumed by calls that reach the completion API.
    pub async fn ask(&self, question: &str) -> Result<String, InsightsError> {
        let records = self.provider.fetch_ad_data_with_cache().await?;
        let context = summarize_context(&records, self.context_records);
        let messages = build_messages(question, &context);

        self.gate.try_acquire().await?;

        info!(
            "Requesting completion with {} context records",
            context.len()
        );
        self.client
            .complete(&messages)
            .await
            .map_err(InsightsError::Completion)
    }
}
