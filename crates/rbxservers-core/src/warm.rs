//! Background refresh of the first page.
//!
//! The loop drives the regular [`PageService`] entry point, so a tick that
//! finds a fresh entry costs nothing and a tick racing a caller joins the
//! caller's fetch. Failures are logged and never end the loop.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::cursor::CursorKey;
use crate::metrics;
use crate::service::PageService;

pub struct WarmLoop {
    service: PageService,
    interval: Duration,
}

impl WarmLoop {
    pub fn new(service: PageService, interval: Duration) -> Self {
        Self { service, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Refresh the first page once. Returns whether the page was obtained.
    pub async fn tick(&self) -> bool {
        match self.service.get_page_by_key(CursorKey::first_page()).await {
            Ok(page) => {
                tracing::debug!(entries = ?page.entry_count(), "First page warm");
                metrics::record_warm_tick(true);
                true
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    status = ?e.status_code(),
                    "First page preload failed"
                );
                metrics::record_warm_tick(false);
                false
            }
        }
    }

    /// Tick, sleep `interval`, forever.
    pub async fn run(self) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            "First page preload loop started"
        );
        loop {
            self.tick().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Run the loop on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
