//! Cooldown gate for the paid completion API
//!
//! A single timestamp, not a token bucket: a call is permitted only when the
//! cooldown has fully elapsed since the last permitted call. There is no burst
//! capacity and rejected calls are not queued.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::RateLimitError;
use crate::provider::{Clock, SystemClock};

pub struct CooldownGate {
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    last_permitted: Mutex<Option<Instant>>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self::with_clock(cooldown, Arc::new(SystemClock))
    }

    pub fn with_clock(cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cooldown,
            clock,
            last_permitted: Mutex::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Permit a call now, or report how long until one would be permitted
    pub async fn try_acquire(&self) -> Result<(), RateLimitError> {
        let now = self.clock.now();
        let mut last = self.last_permitted.lock().await;

        if let Some(previous) = *last {
            let elapsed = now.saturating_duration_since(previous);
            if elapsed < self.cooldown {
                let retry_after = self.cooldown - elapsed;
                debug!("Completion call rejected, {:?} of cooldown left", retry_after);
                return Err(RateLimitError { retry_after });
            }
        }

        *last = Some(now);
        Ok(())
    }
}
