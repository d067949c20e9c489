use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::models::{AssetListing, MarketSnapshot};

use super::errors::FetchError;
use super::provider::MarketDataProvider;

const QUOTE_CURRENCY: &str = "usd";

/// CoinGecko REST client
#[derive(Clone)]
pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    /// Create a client with a bounded per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("coin-pulse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Base URL plus path segments, each percent-encoded on its own
    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FetchError::Transient(format!("Invalid CoinGecko URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Transient("CoinGecko URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match &self.api_key {
            Some(key) => request.header("x-cg-demo-api-key", key),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for CoinGeckoClient {
    async fn fetch_asset(&self, asset_id: &str) -> Result<MarketSnapshot, FetchError> {
        let res = self
            .get(self.endpoint(&["coins", asset_id])?)
            .query(&[
                ("localization", "false"),
                ("tickers", "false"),
                ("market_data", "true"),
                ("community_data", "false"),
                ("developer_data", "false"),
                ("sparkline", "false"),
            ])
            .send()
            .await?;

        match res.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound(asset_id.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(FetchError::Transient("CoinGecko rate limit reached".to_string()))
            }
            status => {
                let body = res.text().await.unwrap_or_default();
                tracing::warn!("CoinGecko /coins/{} returned {}: {}", asset_id, status, body);
                return Err(FetchError::Transient(format!("CoinGecko returned {}", status)));
            }
        }

        let coin = res.json::<CoinResponse>().await?;
        coin.into_snapshot()
    }

    async fn fetch_asset_directory(&self) -> Result<Vec<AssetListing>, FetchError> {
        let res = self.get(self.endpoint(&["coins", "list"])?).send().await?;

        if !res.status().is_success() {
            let status = res.status();
            tracing::warn!("CoinGecko /coins/list returned {}", status);
            return Err(FetchError::Transient(format!("CoinGecko returned {}", status)));
        }

        Ok(res.json::<Vec<AssetListing>>().await?)
    }
}

/// Subset of `GET /coins/{id}` we care about
#[derive(Debug, Deserialize)]
struct CoinResponse {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    market_cap_rank: Option<u32>,
    market_data: Option<CoinMarketData>,
}

#[derive(Debug, Deserialize)]
struct CoinMarketData {
    #[serde(default)]
    current_price: HashMap<String, Option<f64>>,
    #[serde(default)]
    market_cap: HashMap<String, Option<f64>>,
    #[serde(default)]
    total_volume: HashMap<String, Option<f64>>,
    #[serde(default)]
    price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    price_change_percentage_7d: Option<f64>,
    #[serde(default)]
    market_cap_rank: Option<u32>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

fn quoted(values: &HashMap<String, Option<f64>>) -> Option<f64> {
    values.get(QUOTE_CURRENCY).copied().flatten()
}

impl CoinResponse {
    fn into_snapshot(self) -> Result<MarketSnapshot, FetchError> {
        // A coin page without market data is useless for a price notification
        let md = self
            .market_data
            .ok_or_else(|| FetchError::Transient(format!("No market data for {}", self.id)))?;

        Ok(MarketSnapshot {
            price: quoted(&md.current_price),
            market_cap: quoted(&md.market_cap),
            volume_24h: quoted(&md.total_volume),
            change_24h: md.price_change_percentage_24h,
            change_7d: md.price_change_percentage_7d,
            rank: md.market_cap_rank.or(self.market_cap_rank),
            last_updated: md.last_updated.unwrap_or_else(Utc::now),
            symbol: self.symbol.to_uppercase(),
            id: self.id,
            name: self.name,
        })
    }
}
