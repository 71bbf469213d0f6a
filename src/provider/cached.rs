use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::ads::AdRecord;
use crate::error::FetchResult;
use crate::provider::clock::{Clock, SystemClock};
use crate::provider::AdDataLoader;

/// Last loaded record set and when its fetch started
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub records: Arc<Vec<AdRecord>>,
    pub fetched_at: Instant,
}

/// Single-slot, time-boxed cache in front of the fetch pipeline
///
/// Within the TTL every caller gets the same `Arc`. Once the entry's age
/// reaches the TTL the next caller reloads. Concurrent stale callers each
/// reload; the last one to finish wins the slot. A failed reload leaves the
/// previous entry in place.
pub struct AdDataCache {
    loader: Arc<dyn AdDataLoader>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    slot: RwLock<Option<CacheEntry>>,
}

impl AdDataCache {
    pub fn new(loader: Arc<dyn AdDataLoader>, ttl: Duration) -> Self {
        Self::with_clock(loader, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(loader: Arc<dyn AdDataLoader>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            loader,
            clock,
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.fetched_at) < self.ttl
    }

    /// Cached records, reloading when empty or stale
    pub async fn get(&self) -> FetchResult<Arc<Vec<AdRecord>>> {
        let now = self.clock.now();
        {
            let slot = self.slot.read().await;
            if let Some(entry) = slot.as_ref().filter(|e| self.is_fresh(e, now)) {
                debug!("Ad data cache hit ({} records)", entry.records.len());
                return Ok(Arc::clone(&entry.records));
            }
        }

        info!("Ad data cache empty or stale, reloading");
        let records = match self.loader.load().await {
            Ok(records) => Arc::new(records),
            Err(e) => {
                error!("Failed to reload ad data: {}", e);
                return Err(e);
            }
        };

        *self.slot.write().await = Some(CacheEntry {
            records: Arc::clone(&records),
            fetched_at: now,
        });
        info!("Ad data cache refreshed with {} records", records.len());

        Ok(records)
    }

    /// Drop the cached entry so the next `get` reloads
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    /// Current entry, fresh or not, without loading
    pub async fn entry(&self) -> Option<CacheEntry> {
        self.slot.read().await.clone()
    }
}
