use crate::models::{AssetListing, MarketSnapshot};

use super::errors::FetchError;

/// Market-data provider port
///
/// Implementations issue exactly one upstream request per call and never retry;
/// caching and timeouts are layered on top by [`super::SnapshotFetcher`].
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch the current snapshot of a single asset
    async fn fetch_asset(&self, asset_id: &str) -> Result<MarketSnapshot, FetchError>;

    /// Fetch the full directory of known assets (id, symbol, name)
    async fn fetch_asset_directory(&self) -> Result<Vec<AssetListing>, FetchError>;
}
