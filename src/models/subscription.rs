use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use super::interval::NotificationInterval;

/// A user's standing request to be notified about one asset on a fixed cadence
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    pub user_id: String,
    pub asset_id: String,
    pub interval: NotificationInterval,
}

impl Subscription {
    pub fn new(
        user_id: impl Into<String>,
        asset_id: impl Into<String>,
        interval: NotificationInterval,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            asset_id: asset_id.into(),
            interval,
        }
    }

    pub fn key(&self) -> PairKey {
        PairKey::new(&self.user_id, &self.asset_id)
    }
}

/// Identity of a (user, asset) pair; also the identity of its timer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub user_id: String,
    pub asset_id: String,
}

impl PairKey {
    pub fn new(user_id: &str, asset_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            asset_id: asset_id.to_string(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.user_id, self.asset_id)
    }
}
