//! Freshness cache
//!
//! Memoizes `status` for a TTL. Summary and detailed snapshots have their
//! own slot and clock: a detailed fetch is a separate, slower device
//! command, and a summary fetch must never strip the outlets from a
//! cached detailed snapshot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::core::pdu::Pdu;
use crate::core::status::Status;
use crate::error::Result;

/// TTL value that disables caching
pub const TTL_DISABLED: Duration = Duration::ZERO;

#[derive(Debug, Default)]
struct CacheEntry {
    summary: Option<(Status, Instant)>,
    detailed: Option<(Status, Instant)>,
}

impl CacheEntry {
    fn slot(&mut self, detailed: bool) -> &mut Option<(Status, Instant)> {
        if detailed {
            &mut self.detailed
        } else {
            &mut self.summary
        }
    }
}

/// TTL cache in front of another [`Pdu`]
pub struct CachedPdu {
    inner: Arc<dyn Pdu>,
    ttl: Duration,
    entry: Mutex<CacheEntry>,
}

impl CachedPdu {
    pub fn new(inner: Arc<dyn Pdu>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entry: Mutex::new(CacheEntry::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop both snapshots so the next call fetches
    pub async fn invalidate(&self) {
        *self.entry.lock().await = CacheEntry::default();
    }

    fn is_stale(&self, fetched_at: Instant) -> bool {
        Instant::now() >= fetched_at + self.ttl
    }
}

#[async_trait]
impl Pdu for CachedPdu {
    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    async fn switch_outlet(&self, id: &str, state: bool) -> Result<()> {
        self.inner.switch_outlet(id, state).await
    }

    async fn lock_outlet(&self, id: &str, state: bool) -> Result<()> {
        self.inner.lock_outlet(id, state).await
    }

    async fn reboot_outlet(&self, id: &str) -> Result<()> {
        self.inner.reboot_outlet(id).await
    }

    async fn status(&self, detailed: bool) -> Result<Status> {
        // Held across the fetch: concurrent callers share one device round-trip
        let mut entry = self.entry.lock().await;
        let slot = entry.slot(detailed);

        let fresh = slot.as_ref().is_some_and(|(_, at)| !self.is_stale(*at));
        if !fresh {
            debug!(detailed, "Status cache miss, fetching");
            let status = self.inner.status(detailed).await?;
            *slot = Some((status, Instant::now()));
        }

        let mut status = slot
            .as_ref()
            .map(|(status, _)| status.clone())
            .unwrap_or_default();
        if !detailed {
            status.outlets.clear();
        }
        Ok(status)
    }

    async fn clear_maximum_currents(&self) -> Result<()> {
        self.inner.clear_maximum_currents().await
    }

    async fn temperature(&self) -> Result<f64> {
        self.inner.temperature().await
    }

    async fn who_am_i(&self) -> Result<String> {
        self.inner.who_am_i().await
    }
}
