/// Durable subscription and preference storage
///
/// A single JSON state file, rewritten atomically after every mutation.

pub mod errors;
pub mod store;

pub use errors::PersistenceError;
pub use store::{Preferences, StoreState, SubscriptionStore, Subscriptions};
