use axum::{
    routing::{delete, get, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::*;
use super::openapi::ApiDoc;

/// Create the API router with Swagger UI
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health_check))
        .route("/api/v1/intervals", get(list_intervals))
        .route("/api/v1/stats", get(get_stats))
        .route(
            "/api/v1/users/:user_id/subscriptions",
            get(list_subscriptions)
                .post(subscribe)
                .delete(clear_subscriptions),
        )
        .route(
            "/api/v1/users/:user_id/subscriptions/:asset_id",
            delete(unsubscribe),
        )
        .route("/api/v1/users/:user_id/language", put(set_language))
        .with_state(state)
}
