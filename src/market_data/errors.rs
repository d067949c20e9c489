//! Error types for market-data lookups

use thiserror::Error;

/// Failure to obtain a market snapshot
///
/// Both variants are surfaced to users identically (a one-line "unavailable"
/// notice). Neither cancels a subscription: the next tick tries again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Upstream unavailable, timed out, rate limited or returned garbage
    #[error("Market data temporarily unavailable: {0}")]
    Transient(String),

    /// The provider does not know this asset identifier
    #[error("Asset not found: {0}")]
    NotFound(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transient(err.without_url().to_string())
    }
}
