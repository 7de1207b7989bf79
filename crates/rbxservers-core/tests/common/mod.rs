//! Shared helpers for rbxservers-core integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rbxservers_core::{CursorKey, Page, PageResult, PageSource, UpstreamError};
use serde_json::{Value, json};

/// Scripted page source that counts calls.
///
/// Each fetch pops the next scripted result; once the script is empty every
/// fetch returns `fallback`.
pub struct StubSource {
    calls: AtomicUsize,
    script: Mutex<VecDeque<PageResult>>,
    fallback: PageResult,
    delay: Duration,
    seen: Mutex<Vec<CursorKey>>,
}

impl StubSource {
    pub fn new(script: Vec<PageResult>, fallback: PageResult) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Always succeeds with `page`.
    pub fn ok(page: Page) -> Self {
        Self::new(Vec::new(), Ok(page))
    }

    /// Always fails with `err`.
    pub fn failing(err: UpstreamError) -> Self {
        Self::new(Vec::new(), Err(err))
    }

    /// Simulated upstream latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_keys(&self) -> Vec<CursorKey> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for StubSource {
    async fn fetch(&self, key: &CursorKey) -> Result<Page, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(key.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// A page shaped like the upstream listing response.
pub fn server_page(next_cursor: Option<&str>, server_ids: &[&str]) -> Value {
    let data: Vec<Value> = server_ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "maxPlayers": 12,
                "playing": 5,
                "playerTokens": [],
                "fps": 59.9,
                "ping": 80
            })
        })
        .collect();

    json!({
        "previousPageCursor": null,
        "nextPageCursor": next_cursor,
        "data": data
    })
}
