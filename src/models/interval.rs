use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use utoipa::ToSchema;

/// Refresh period a user can pick for a recurring notification
///
/// Persisted as its tag (`"15m"`, `"1h"`, ...). The tag → minutes table below is
/// the only place a user-facing choice is turned into a scheduler duration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub enum NotificationInterval {
    #[serde(rename = "15m")]
    Minutes15,
    #[serde(rename = "30m")]
    Minutes30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "3h")]
    Hours3,
    #[serde(rename = "6h")]
    Hours6,
    #[serde(rename = "12h")]
    Hours12,
    #[serde(rename = "24h")]
    Hours24,
}

impl NotificationInterval {
    /// Every interval, shortest first
    pub const ALL: [NotificationInterval; 7] = [
        NotificationInterval::Minutes15,
        NotificationInterval::Minutes30,
        NotificationInterval::Hour1,
        NotificationInterval::Hours3,
        NotificationInterval::Hours6,
        NotificationInterval::Hours12,
        NotificationInterval::Hours24,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            NotificationInterval::Minutes15 => "15m",
            NotificationInterval::Minutes30 => "30m",
            NotificationInterval::Hour1 => "1h",
            NotificationInterval::Hours3 => "3h",
            NotificationInterval::Hours6 => "6h",
            NotificationInterval::Hours12 => "12h",
            NotificationInterval::Hours24 => "24h",
        }
    }

    pub fn minutes(self) -> u64 {
        match self {
            NotificationInterval::Minutes15 => 15,
            NotificationInterval::Minutes30 => 30,
            NotificationInterval::Hour1 => 60,
            NotificationInterval::Hours3 => 180,
            NotificationInterval::Hours6 => 360,
            NotificationInterval::Hours12 => 720,
            NotificationInterval::Hours24 => 1440,
        }
    }

    /// Period between two ticks of a timer armed with this interval
    pub fn duration(self) -> Duration {
        Duration::from_secs(self.minutes() * 60)
    }
}

impl fmt::Display for NotificationInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Returned when a tag is not part of the interval table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown interval tag: {0}")]
pub struct UnknownIntervalTag(pub String);

impl FromStr for NotificationInterval {
    type Err = UnknownIntervalTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        NotificationInterval::ALL
            .iter()
            .copied()
            .find(|interval| interval.tag() == tag)
            .ok_or_else(|| UnknownIntervalTag(tag.to_string()))
    }
}
