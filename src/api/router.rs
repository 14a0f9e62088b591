//! Route table and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{
    ApiDoc, activity_feed_handler, create_deposit_handler, health_check_handler,
    list_deposits_handler, list_strategies_handler, liveness_handler, network_stats_handler,
    readiness_handler, rebalance_handler, update_deposit_status_handler, update_strategy_handler,
};
use crate::app::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the application router. The browser UI is served from another
/// origin, so CORS is permissive.
#[allow(deprecated)]
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/deposits",
            get(list_deposits_handler)
                .post(create_deposit_handler)
                .patch(update_deposit_status_handler),
        )
        .route(
            "/strategies",
            get(list_strategies_handler).put(update_strategy_handler),
        )
        .route("/rebalance", post(rebalance_handler))
        .route("/solana/stats", get(network_stats_handler))
        .route("/solana/feed", get(activity_feed_handler))
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
