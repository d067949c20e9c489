pub mod interval;
pub mod locale;
pub mod snapshot;
pub mod subscription;

pub use interval::{NotificationInterval, UnknownIntervalTag};
pub use locale::{Locale, UnknownLocale};
pub use snapshot::{AssetListing, MarketSnapshot};
pub use subscription::{PairKey, Subscription};
