use super::quiescence::NetworkEvents;
use crate::error::Result;
use async_trait::async_trait;

/// The live document a listing is scraped from.
#[async_trait]
pub trait ListingPage: Send + Sync {
    /// URL the page was opened at.
    fn url(&self) -> &str;

    /// Scrolls down by `factor` times the visible height. Never navigates.
    async fn scroll_viewport(&self, factor: f64) -> Result<()>;

    /// Number of elements currently matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize>;

    /// Subscribes to request started / finished / failed events.
    /// Dropping the stream unsubscribes.
    async fn network_events(&self) -> Result<NetworkEvents>;

    /// Serialized DOM as it stands now.
    async fn html(&self) -> Result<String>;
}
