use crate::dom::SnapshotResult;
use crate::types::TextResult;
use async_trait::async_trait;
use std::time::Duration;

/// Produces a linear text rendering of a page plus its numbered outbound links.
///
/// Failures are reported inside the result (`success = false`) rather than as
/// an `Err`, so one leg's failure never short-circuits the other.
#[async_trait]
pub trait TextFetcher: Send + Sync {
    async fn fetch(&self, url: &str, width: usize, timeout: Duration) -> TextResult;
}

/// Produces a structured snapshot of a page's interactive elements.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> SnapshotResult;
}
