use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Point-in-time market readout for one asset
///
/// Numeric fields are optional because providers report `null` for thinly
/// traded or freshly listed assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MarketSnapshot {
    pub id: String,
    pub name: String,
    /// Upper-cased ticker (e.g. "BTC")
    pub symbol: String,
    /// Price in USD
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    /// Percent change over 24 hours
    pub change_24h: Option<f64>,
    /// Percent change over 7 days
    pub change_7d: Option<f64>,
    pub volume_24h: Option<f64>,
    pub rank: Option<u32>,
    pub last_updated: DateTime<Utc>,
}

/// Entry of the provider's asset directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AssetListing {
    pub id: String,
    pub symbol: String,
    pub name: String,
}
