//! Route-configuration snapshots and their concurrency-safe cache.

pub mod cache;
pub mod snapshot;

pub use cache::{BlockSource, ConfigCache, SourceError};
pub use snapshot::{ConfigData, ConfigRevision, RouteConfig};
