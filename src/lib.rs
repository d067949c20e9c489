// Library crate root; main.rs wires these modules into the running service
pub mod api;
pub mod config;
pub mod formatting;
pub mod market_data;
pub mod models;
pub mod notifications;
pub mod persistence;
pub mod scheduler;
pub mod transport;

// pub use = re-export at crate root
pub use api::{create_router, AppState};
pub use config::{AppConfig, ConfigError};
pub use market_data::{CoinGeckoClient, FetchError, SnapshotFetcher};
pub use models::{Locale, MarketSnapshot, NotificationInterval, Subscription};
pub use notifications::{NotificationDispatcher, NotificationService};
pub use persistence::{PersistenceError, SubscriptionStore};
pub use scheduler::{RecurringScheduler, TickHandler};
pub use transport::{ChatTransport, DeliveryError, LogTransport, TelegramTransport};
