use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;

use crate::formatting;
use crate::market_data::SnapshotFetcher;
use crate::models::{Locale, NotificationInterval, UnknownIntervalTag, UnknownLocale};
use crate::notifications::NotificationService;
use crate::persistence::PersistenceError;

use super::responses::*;

/// Shared application state
pub struct AppState {
    pub service: Arc<NotificationService>,
    pub fetcher: Arc<SnapshotFetcher>,
}

pub type SharedState = Arc<AppState>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Asset '{0}' was not found")]
    AssetNotFound(String),

    #[error("Asset must not be empty")]
    EmptyAsset,

    #[error("User {user_id} has no subscription for {asset_id}")]
    SubscriptionNotFound { user_id: String, asset_id: String },

    #[error(transparent)]
    InvalidInterval(#[from] UnknownIntervalTag),

    #[error(transparent)]
    InvalidLocale(#[from] UnknownLocale),

    #[error("Could not save subscriptions: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Storage task failed: {0}")]
    Storage(#[from] JoinError),
}

/// Convert ApiError to HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::AssetNotFound(_) => (StatusCode::NOT_FOUND, "asset_not_found"),
            ApiError::EmptyAsset => (StatusCode::BAD_REQUEST, "invalid_asset"),
            ApiError::SubscriptionNotFound { .. } => {
                (StatusCode::NOT_FOUND, "subscription_not_found")
            }
            ApiError::InvalidInterval(_) => (StatusCode::BAD_REQUEST, "invalid_interval"),
            ApiError::InvalidLocale(_) => (StatusCode::BAD_REQUEST, "invalid_locale"),
            ApiError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "could_not_save"),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Run a service edit on the blocking pool
///
/// Every edit rewrites and fsyncs the state file while holding the edit lock.
async fn edit_blocking<T, F>(service: &Arc<NotificationService>, edit: F) -> Result<T, ApiError>
where
    F: FnOnce(&NotificationService) -> Result<T, PersistenceError> + Send + 'static,
    T: Send + 'static,
{
    let service = Arc::clone(service);

    match tokio::task::spawn_blocking(move || edit(&service)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::error!("❌ Failed to save subscriptions: {}", e);
            Err(e.into())
        }
        Err(e) => {
            tracing::error!("❌ Failed to run storage task: {}", e);
            Err(e.into())
        }
    }
}

fn normalize_asset(asset: &str) -> String {
    asset.trim().to_lowercase()
}

/// Map user input to a provider asset id
///
/// When the directory itself cannot be fetched the input is taken as an id;
/// a wrong id then shows up as "data unavailable" on the first tick.
async fn resolve_asset(fetcher: &SnapshotFetcher, input: &str) -> Result<String, ApiError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ApiError::EmptyAsset);
    }

    match fetcher.resolve_asset(input).await {
        Ok(Some(asset_id)) => Ok(asset_id),
        Ok(None) => Err(ApiError::AssetNotFound(input.to_string())),
        Err(e) => {
            tracing::warn!("⚠️  Asset directory unavailable ({}), using '{}' as id", e, input);
            Ok(normalize_asset(input))
        }
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        scheduler_running: state.service.scheduler().is_running(),
        timestamp: Utc::now(),
    })
}

/// List supported notification intervals
#[utoipa::path(
    get,
    path = "/api/v1/intervals",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Supported intervals", body = Vec<IntervalResponse>)
    )
)]
pub async fn list_intervals() -> Json<Vec<IntervalResponse>> {
    Json(
        NotificationInterval::ALL
            .iter()
            .map(|interval| IntervalResponse {
                tag: *interval,
                minutes: interval.minutes(),
            })
            .collect(),
    )
}

/// Scheduler, dispatcher and cache counters
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "Stats",
    responses(
        (status = 200, description = "Engine statistics", body = StatsResponse)
    )
)]
pub async fn get_stats(State(state): State<SharedState>) -> Json<StatsResponse> {
    let service = &state.service;

    Json(StatsResponse {
        scheduler: service.scheduler().stats(),
        dispatcher: service.dispatcher().stats(),
        subscriptions: service.store().snapshot().subscription_count(),
        cached_entries: state.fetcher.cached_entries(),
        upstream_requests: state.fetcher.upstream_requests(),
    })
}

/// List a user's subscriptions
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/subscriptions",
    tag = "Subscriptions",
    params(
        ("user_id" = String, Path, description = "Chat user id")
    ),
    responses(
        (status = 200, description = "Subscriptions of the user", body = SubscriptionListResponse)
    )
)]
pub async fn list_subscriptions(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Json<SubscriptionListResponse> {
    let service = &state.service;

    let subscriptions: Vec<SubscriptionEntry> = service
        .list_for(&user_id)
        .into_iter()
        .map(|(asset_id, interval)| SubscriptionEntry {
            timer: service.scheduler().armed(&user_id, &asset_id),
            interval_minutes: interval.minutes(),
            asset_id,
            interval,
        })
        .collect();

    Json(SubscriptionListResponse {
        language: service.language(&user_id),
        count: subscriptions.len(),
        subscriptions,
        user_id,
    })
}

/// Subscribe a user to an asset, replacing any existing interval
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/subscriptions",
    tag = "Subscriptions",
    params(
        ("user_id" = String, Path, description = "Chat user id")
    ),
    request_body = SubscribeRequest,
    responses(
        (status = 201, description = "Subscription created", body = SubscribeResponse),
        (status = 200, description = "Subscription replaced", body = SubscribeResponse),
        (status = 400, description = "Invalid interval or asset", body = ErrorResponse),
        (status = 404, description = "Unknown asset", body = ErrorResponse),
        (status = 500, description = "Could not save", body = ErrorResponse)
    )
)]
pub async fn subscribe(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Json(request): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscribeResponse>), ApiError> {
    let interval: NotificationInterval = request.interval.parse()?;
    let asset_id = resolve_asset(&state.fetcher, &request.asset).await?;

    let replaced = {
        let (user_id, asset_id) = (user_id.clone(), asset_id.clone());
        edit_blocking(&state.service, move |service| {
            service.subscribe(&user_id, &asset_id, interval)
        })
        .await?
    };
    let message =
        formatting::notification_set(state.service.language(&user_id), &asset_id, interval);

    let status = if replaced.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(SubscribeResponse {
            user_id,
            asset_id,
            interval,
            replaced,
            message,
        }),
    ))
}

/// Remove one subscription
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}/subscriptions/{asset_id}",
    tag = "Subscriptions",
    params(
        ("user_id" = String, Path, description = "Chat user id"),
        ("asset_id" = String, Path, description = "Asset id")
    ),
    responses(
        (status = 200, description = "Subscription removed", body = UnsubscribeResponse),
        (status = 404, description = "No such subscription", body = ErrorResponse),
        (status = 500, description = "Could not save", body = ErrorResponse)
    )
)]
pub async fn unsubscribe(
    State(state): State<SharedState>,
    Path((user_id, asset_id)): Path<(String, String)>,
) -> Result<Json<UnsubscribeResponse>, ApiError> {
    let asset_id = normalize_asset(&asset_id);

    let removed = {
        let (user_id, asset_id) = (user_id.clone(), asset_id.clone());
        edit_blocking(&state.service, move |service| {
            service.unsubscribe(&user_id, &asset_id)
        })
        .await?
    };

    if !removed {
        return Err(ApiError::SubscriptionNotFound { user_id, asset_id });
    }

    let message = formatting::notification_removed(state.service.language(&user_id), &asset_id);
    Ok(Json(UnsubscribeResponse {
        user_id,
        asset_id,
        message,
    }))
}

/// Remove every subscription of a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}/subscriptions",
    tag = "Subscriptions",
    params(
        ("user_id" = String, Path, description = "Chat user id")
    ),
    responses(
        (status = 200, description = "Subscriptions removed", body = ClearSubscriptionsResponse),
        (status = 500, description = "Could not save", body = ErrorResponse)
    )
)]
pub async fn clear_subscriptions(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<ClearSubscriptionsResponse>, ApiError> {
    let removed = {
        let user_id = user_id.clone();
        edit_blocking(&state.service, move |service| service.clear_all(&user_id)).await?
    };
    Ok(Json(ClearSubscriptionsResponse { user_id, removed }))
}

/// Set the language a user is notified in
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/language",
    tag = "Users",
    params(
        ("user_id" = String, Path, description = "Chat user id")
    ),
    request_body = LanguageRequest,
    responses(
        (status = 200, description = "Language saved", body = LanguageResponse),
        (status = 400, description = "Unsupported locale", body = ErrorResponse),
        (status = 500, description = "Could not save", body = ErrorResponse)
    )
)]
pub async fn set_language(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Json(request): Json<LanguageRequest>,
) -> Result<Json<LanguageResponse>, ApiError> {
    let locale: Locale = request.locale.parse()?;
    {
        let user_id = user_id.clone();
        edit_blocking(&state.service, move |service| {
            service.set_language(&user_id, locale)
        })
        .await?;
    }
    Ok(Json(LanguageResponse { user_id, locale }))
}
