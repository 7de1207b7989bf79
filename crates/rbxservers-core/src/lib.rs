//! Caching, coalescing proxy core for the Roblox public server list.
//!
//! ## Pipeline
//!
//! ```text
//! caller / WarmLoop → PageService::get_page(cursor)
//!                         ├─ PageCache hit (fresh under TTL) → page
//!                         └─ InFlightRegistry join / start
//!                               └─ UpstreamClient::fetch (retry + backoff)
//!                                     └─ PageCache::put on success
//! ```
//!
//! At most one upstream fetch is in flight per cursor key; every caller that
//! arrives while it runs receives the same result, success or failure.

pub mod cache;
pub mod cursor;
pub mod error;
pub mod inflight;
pub mod metrics;
pub mod page;
pub mod service;
pub mod upstream;
pub mod warm;

pub use cache::{CacheEntry, PageCache};
pub use cursor::{CursorKey, FIRST_PAGE};
pub use error::UpstreamError;
pub use inflight::{Flight, InFlightRegistry, PageResult, PendingPage};
pub use page::Page;
pub use service::PageService;
pub use upstream::{MAX_PAGE_SIZE, PageSource, USER_AGENT, UpstreamClient, UpstreamConfig};
pub use warm::WarmLoop;
