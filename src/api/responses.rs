use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Locale, NotificationInterval};
use crate::notifications::DispatcherStats;
use crate::scheduler::{ArmedTimerInfo, SchedulerStats};

/// Request to subscribe a user to an asset
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    /// Asset id, ticker or name ("bitcoin", "BTC", "Bitcoin")
    #[schema(example = "btc")]
    pub asset: String,
    /// Interval tag
    #[schema(example = "15m")]
    pub interval: String,
}

/// Result of a subscribe call
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscribeResponse {
    pub user_id: String,
    /// Resolved asset id
    pub asset_id: String,
    pub interval: NotificationInterval,
    /// Interval of the subscription this one replaced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<NotificationInterval>,
    /// Localized confirmation text
    pub message: String,
}

/// One subscription with its live timer
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionEntry {
    pub asset_id: String,
    pub interval: NotificationInterval,
    pub interval_minutes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<ArmedTimerInfo>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionListResponse {
    pub user_id: String,
    pub language: Locale,
    pub subscriptions: Vec<SubscriptionEntry>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnsubscribeResponse {
    pub user_id: String,
    pub asset_id: String,
    /// Localized confirmation text
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClearSubscriptionsResponse {
    pub user_id: String,
    /// Number of subscriptions removed
    pub removed: usize,
}

/// Request to change a user's language
#[derive(Debug, Deserialize, ToSchema)]
pub struct LanguageRequest {
    #[schema(example = "en")]
    pub locale: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LanguageResponse {
    pub user_id: String,
    pub locale: Locale,
}

/// Supported interval
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IntervalResponse {
    pub tag: NotificationInterval,
    pub minutes: u64,
}

/// Runtime counters of the notification engine
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub scheduler: SchedulerStats,
    pub dispatcher: DispatcherStats,
    /// Persisted subscriptions across all users
    pub subscriptions: usize,
    /// Live entries in the market data cache
    pub cached_entries: usize,
    /// Requests sent to the market data provider since start
    pub upstream_requests: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub scheduler_running: bool,
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
