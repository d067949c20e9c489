/// Market data module
///
/// The provider port and its CoinGecko adapter fetch raw snapshots; the
/// SnapshotFetcher puts a short-lived read-through cache and a request timeout
/// in front of whichever provider is configured.

pub mod coingecko;
pub mod errors;
pub mod fetcher;
pub mod provider;

pub use coingecko::CoinGeckoClient;
pub use errors::FetchError;
pub use fetcher::{FetcherConfig, SnapshotFetcher};
pub use provider::MarketDataProvider;
