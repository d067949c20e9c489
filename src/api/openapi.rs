use utoipa::OpenApi;

use crate::api::handlers;
use crate::api::responses::*;
use crate::models::{Locale, NotificationInterval};
use crate::notifications::DispatcherStats;
use crate::scheduler::{ArmedTimerInfo, SchedulerStats};

/// OpenAPI v1 specification
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Coin Pulse API",
        version = "1.0.0",
        description = "Control surface of the recurring crypto market notification engine",
        license(
            name = "MIT"
        )
    ),
    paths(
        handlers::health_check,
        handlers::list_intervals,
        handlers::get_stats,
        handlers::list_subscriptions,
        handlers::subscribe,
        handlers::unsubscribe,
        handlers::clear_subscriptions,
        handlers::set_language,
    ),
    components(
        schemas(
            NotificationInterval,
            Locale,
            ArmedTimerInfo,
            SchedulerStats,
            DispatcherStats,
            SubscribeRequest,
            SubscribeResponse,
            SubscriptionEntry,
            SubscriptionListResponse,
            UnsubscribeResponse,
            ClearSubscriptionsResponse,
            LanguageRequest,
            LanguageResponse,
            IntervalResponse,
            StatsResponse,
            HealthResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Subscriptions", description = "Recurring notification management"),
        (name = "Users", description = "User preferences"),
        (name = "Stats", description = "Scheduler and dispatcher counters"),
    )
)]
pub struct ApiDoc;
