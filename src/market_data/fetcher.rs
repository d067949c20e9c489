use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::models::{AssetListing, MarketSnapshot};

use super::errors::FetchError;
use super::provider::MarketDataProvider;

const DIRECTORY_KEY: &str = "directory";

/// Cache and timeout settings for [`SnapshotFetcher`]
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// How long a live price snapshot is served from cache
    pub snapshot_ttl: Duration,
    /// How long the asset directory is served from cache
    pub directory_ttl: Duration,
    /// Upper bound for a single upstream request
    pub request_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl: Duration::from_secs(120),
            directory_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
enum CachedPayload {
    Snapshot(MarketSnapshot),
    Directory(Arc<Vec<AssetListing>>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    fetched_at: Instant,
    payload: CachedPayload,
}

/// Read-through cache in front of a [`MarketDataProvider`]
///
/// - Hits within the TTL never touch the network
/// - Misses issue exactly one upstream request, bounded by `request_timeout`
/// - Failures leave any older entry in place but never serve it
///
/// Entries are evicted lazily on read. The number of distinct assets is small
/// (tens), so there is no background sweep.
pub struct SnapshotFetcher {
    provider: Arc<dyn MarketDataProvider>,
    cache: DashMap<String, CacheEntry>,
    config: FetcherConfig,
    upstream_requests: AtomicU64,
}

impl SnapshotFetcher {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: FetcherConfig) -> Self {
        Self {
            provider,
            cache: DashMap::new(),
            config,
            upstream_requests: AtomicU64::new(0),
        }
    }

    /// Get the snapshot for an asset, from cache when fresh enough
    pub async fn get(&self, asset_id: &str) -> Result<MarketSnapshot, FetchError> {
        let asset_id = normalize(asset_id);
        let key = snapshot_key(&asset_id);

        let cached = self.fresh(&key, self.config.snapshot_ttl);
        if let Some(CachedPayload::Snapshot(snapshot)) = cached {
            tracing::debug!("Snapshot cache hit for {}", asset_id);
            return Ok(snapshot);
        }

        self.upstream_requests.fetch_add(1, Ordering::Relaxed);
        let result = tokio::time::timeout(
            self.config.request_timeout,
            self.provider.fetch_asset(&asset_id),
        )
        .await
        .unwrap_or_else(|_| {
            Err(FetchError::Transient(format!(
                "Request for {} timed out after {:?}",
                asset_id, self.config.request_timeout
            )))
        });

        match result {
            Ok(snapshot) => {
                self.store(key, CachedPayload::Snapshot(snapshot.clone()));
                Ok(snapshot)
            }
            Err(e) => {
                tracing::debug!("Snapshot fetch for {} failed: {}", asset_id, e);
                Err(e)
            }
        }
    }

    /// Resolve free-form user input (id, ticker or name) to an asset id
    ///
    /// Match order: exact id, exact symbol or name, partial symbol, partial name.
    /// Returns `Ok(None)` when nothing in the directory matches.
    pub async fn resolve_asset(&self, input: &str) -> Result<Option<String>, FetchError> {
        let needle = normalize(input);
        if needle.is_empty() {
            return Ok(None);
        }

        let directory = self.directory().await?;

        let found = directory
            .iter()
            .find(|a| a.id.to_lowercase() == needle)
            .or_else(|| {
                directory.iter().find(|a| {
                    a.symbol.to_lowercase() == needle || a.name.to_lowercase() == needle
                })
            })
            .or_else(|| directory.iter().find(|a| a.symbol.to_lowercase().contains(&needle)))
            .or_else(|| directory.iter().find(|a| a.name.to_lowercase().contains(&needle)));

        Ok(found.map(|a| a.id.clone()))
    }

    /// Number of entries currently held (fresh or stale)
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Number of upstream requests issued since creation
    pub fn upstream_requests(&self) -> u64 {
        self.upstream_requests.load(Ordering::Relaxed)
    }

    /// Drop the cached snapshot of one asset
    pub fn invalidate(&self, asset_id: &str) -> bool {
        self.cache.remove(&snapshot_key(&normalize(asset_id))).is_some()
    }

    async fn directory(&self) -> Result<Arc<Vec<AssetListing>>, FetchError> {
        if let Some(CachedPayload::Directory(listing)) =
            self.fresh(DIRECTORY_KEY, self.config.directory_ttl)
        {
            return Ok(listing);
        }

        self.upstream_requests.fetch_add(1, Ordering::Relaxed);
        let listing = tokio::time::timeout(
            self.config.request_timeout,
            self.provider.fetch_asset_directory(),
        )
        .await
        .unwrap_or_else(|_| {
            Err(FetchError::Transient(format!(
                "Asset directory request timed out after {:?}",
                self.config.request_timeout
            )))
        })?;

        let listing = Arc::new(listing);
        tracing::info!("Asset directory refreshed: {} assets", listing.len());
        self.store(
            DIRECTORY_KEY.to_string(),
            CachedPayload::Directory(Arc::clone(&listing)),
        );

        Ok(listing)
    }

    fn fresh(&self, key: &str, ttl: Duration) -> Option<CachedPayload> {
        let entry = self.cache.get(key)?;
        if entry.fetched_at.elapsed() <= ttl {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    fn store(&self, key: String, payload: CachedPayload) {
        self.cache.insert(
            key,
            CacheEntry {
                fetched_at: Instant::now(),
                payload,
            },
        );
    }
}

fn normalize(asset_id: &str) -> String {
    asset_id.trim().to_lowercase()
}

fn snapshot_key(asset_id: &str) -> String {
    format!("asset:{}", asset_id)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};

    pub(crate) fn test_snapshot(id: &str, price: f64) -> MarketSnapshot {
        MarketSnapshot {
            id: id.to_string(),
            name: id.to_string(),
            symbol: id.to_uppercase(),
            price: Some(price),
            market_cap: Some(price * 1_000_000.0),
            change_24h: Some(1.5),
            change_7d: Some(-3.0),
            volume_24h: Some(price * 1_000.0),
            rank: Some(1),
            last_updated: Utc::now(),
        }
    }

    /// Provider that replays scripted responses per asset and counts calls
    #[derive(Default)]
    pub(crate) struct ScriptedProvider {
        pub responses: Mutex<HashMap<String, VecDeque<Result<MarketSnapshot, FetchError>>>>,
        pub calls: AtomicU64,
        pub directory: Vec<AssetListing>,
        pub delay: Option<Duration>,
    }

    impl ScriptedProvider {
        pub fn push(&self, asset_id: &str, response: Result<MarketSnapshot, FetchError>) {
            self.responses
                .lock()
                .entry(asset_id.to_string())
                .or_default()
                .push_back(response);
        }
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for ScriptedProvider {
        async fn fetch_asset(&self, asset_id: &str) -> Result<MarketSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .get_mut(asset_id)
                .and_then(|queue| queue.pop_front())
                .unwrap_or_else(|| Err(FetchError::NotFound(asset_id.to_string())))
        }

        async fn fetch_asset_directory(&self) -> Result<Vec<AssetListing>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.directory.clone())
        }
    }

    fn listing(id: &str, symbol: &str, name: &str) -> AssetListing {
        AssetListing {
            id: id.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_within_ttl() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push("bitcoin", Ok(test_snapshot("bitcoin", 100.0)));
        let fetcher = SnapshotFetcher::new(provider.clone(), FetcherConfig::default());

        let first = fetcher.get("bitcoin").await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        let second = fetcher.get(" Bitcoin ").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.upstream_requests(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_refetches() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push("bitcoin", Ok(test_snapshot("bitcoin", 100.0)));
        provider.push("bitcoin", Ok(test_snapshot("bitcoin", 110.0)));
        let fetcher = SnapshotFetcher::new(provider.clone(), FetcherConfig::default());

        fetcher.get("bitcoin").await.unwrap();
        tokio::time::advance(Duration::from_secs(121)).await;
        let refreshed = fetcher.get("bitcoin").await.unwrap();

        assert_eq!(refreshed.price, Some(110.0));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_stale_entry_but_does_not_serve_it() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push("bitcoin", Ok(test_snapshot("bitcoin", 100.0)));
        provider.push("bitcoin", Err(FetchError::Transient("503".to_string())));
        provider.push("bitcoin", Ok(test_snapshot("bitcoin", 120.0)));
        let fetcher = SnapshotFetcher::new(provider.clone(), FetcherConfig::default());

        fetcher.get("bitcoin").await.unwrap();
        tokio::time::advance(Duration::from_secs(200)).await;

        let err = fetcher.get("bitcoin").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(fetcher.cached_entries(), 1);

        let recovered = fetcher.get("bitcoin").await.unwrap();
        assert_eq!(recovered.price, Some(120.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_as_transient() {
        let provider = Arc::new(ScriptedProvider {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        provider.push("bitcoin", Ok(test_snapshot("bitcoin", 100.0)));
        let fetcher = SnapshotFetcher::new(provider.clone(), FetcherConfig::default());

        let err = fetcher.get("bitcoin").await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(fetcher.cached_entries(), 0);
    }

    #[tokio::test]
    async fn test_not_found_is_passed_through() {
        let provider = Arc::new(ScriptedProvider::default());
        let fetcher = SnapshotFetcher::new(provider, FetcherConfig::default());

        let err = fetcher.get("doesnotexist").await.unwrap_err();
        assert_eq!(err, FetchError::NotFound("doesnotexist".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_asset_match_order() {
        let provider = Arc::new(ScriptedProvider {
            directory: vec![
                listing("bitcoin-cash", "bch", "Bitcoin Cash"),
                listing("bitcoin", "btc", "Bitcoin"),
                listing("ethereum", "eth", "Ethereum"),
                listing("wrapped-bitcoin", "wbtc", "Wrapped Bitcoin"),
            ],
            ..Default::default()
        });
        let fetcher = SnapshotFetcher::new(provider.clone(), FetcherConfig::default());

        assert_eq!(fetcher.resolve_asset("BTC").await.unwrap().as_deref(), Some("bitcoin"));
        assert_eq!(fetcher.resolve_asset("ethereum").await.unwrap().as_deref(), Some("ethereum"));
        assert_eq!(fetcher.resolve_asset("Bitcoin").await.unwrap().as_deref(), Some("bitcoin"));
        assert_eq!(fetcher.resolve_asset("wbt").await.unwrap().as_deref(), Some("wrapped-bitcoin"));
        assert_eq!(fetcher.resolve_asset("cash").await.unwrap().as_deref(), Some("bitcoin-cash"));
        assert_eq!(fetcher.resolve_asset("dogecoin").await.unwrap(), None);
        assert_eq!(fetcher.resolve_asset("   ").await.unwrap(), None);

        // Directory was fetched once and served from the long-lived entry after that
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push("bitcoin", Ok(test_snapshot("bitcoin", 100.0)));
        let fetcher = SnapshotFetcher::new(provider, FetcherConfig::default());

        fetcher.get("bitcoin").await.unwrap();
        assert!(fetcher.invalidate("BITCOIN"));
        assert!(!fetcher.invalidate("bitcoin"));
        assert_eq!(fetcher.cached_entries(), 0);
    }
}
