//! Ad data provider: the fetch pipeline behind a TTL cache
//!
//! Consumers call [`AdDataProvider::fetch_ad_data_with_cache`] on every
//! request; the sheet is only re-read once the cached copy expires.

pub mod cached;
pub mod clock;
pub mod pipeline;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::ads::{validate_data_structure, AdRecord, MetricCalculator};
use crate::config::Config;
use crate::error::{FetchError, FetchResult};
use crate::sheets::{SheetWindow, SheetsClient};

pub use cached::{AdDataCache, CacheEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use pipeline::SheetsPipeline;

/// Produces a complete, freshly derived record set
#[async_trait]
pub trait AdDataLoader: Send + Sync {
    async fn load(&self) -> FetchResult<Vec<AdRecord>>;
}

pub struct AdDataProvider {
    loader: Arc<dyn AdDataLoader>,
    cache: AdDataCache,
}

impl AdDataProvider {
    pub fn new(loader: Arc<dyn AdDataLoader>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let cache = AdDataCache::with_clock(Arc::clone(&loader), ttl, clock);
        Self { loader, cache }
    }

    /// Wire the Sheets client, pipeline and cache from configuration
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let client = SheetsClient::from_config(&config.sheets)?;
        let pipeline = SheetsPipeline::new(
            Arc::new(client),
            SheetWindow::from(&config.sheets),
            MetricCalculator::new(config.pipeline.metric_memo_max_entries),
            config.pipeline.batch_size,
        );

        Ok(Self::new(
            Arc::new(pipeline),
            Duration::from_secs(config.pipeline.cache_ttl_secs),
            clock,
        ))
    }

    /// Run the full pipeline, bypassing the cache
    pub async fn fetch_ad_data(&self) -> FetchResult<Vec<AdRecord>> {
        self.loader.load().await
    }

    pub async fn fetch_ad_data_with_cache(&self) -> FetchResult<Arc<Vec<AdRecord>>> {
        self.cache.get().await
    }

    /// Cached records, rejected when [`validate_data_structure`] fails
    pub async fn fetch_and_validate_ad_data(&self) -> FetchResult<Arc<Vec<AdRecord>>> {
        let records = self.fetch_ad_data_with_cache().await?;
        if !validate_data_structure(&records) {
            return Err(FetchError::InvalidStructure);
        }
        Ok(records)
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }

    pub fn cache(&self) -> &AdDataCache {
        &self.cache
    }
}
