use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::SheetsConfig;
use crate::error::{FetchError, FetchResult};

/// One response of the values endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    /// Range actually served, e.g. `Sheet1!A1:K50000`
    #[serde(default)]
    pub range: Option<String>,
    /// Absent once the sheet is exhausted
    #[serde(default)]
    pub values: Option<Vec<Vec<String>>>,
}

/// Source of spreadsheet pages addressed by A1 range
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_range(&self, range: &str) -> FetchResult<ValueRange>;
}

/// Values API client authenticated with a query-string key
#[derive(Clone)]
pub struct SheetsClient {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    api_key: String,
}

impl SheetsClient {
    pub fn from_config(config: &SheetsConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("adlens-sheets-client/0.1.0")
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .context("failed to build HTTP client for the spreadsheet source")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, range
        )
    }
}

#[async_trait]
impl PageSource for SheetsClient {
    async fn fetch_range(&self, range: &str) -> FetchResult<ValueRange> {
        debug!("Requesting range {}", range);

        let response = self
            .client
            .get(self.values_url(range))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<ValueRange>().await?)
    }
}
