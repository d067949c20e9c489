pub mod dispatcher;
pub mod service;

pub use dispatcher::{DispatcherStats, NotificationDispatcher};
pub use service::NotificationService;
