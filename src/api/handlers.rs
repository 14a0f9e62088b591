//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequest, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, warn};
use utoipa::OpenApi;

use crate::app::AppState;
use crate::domain::{
    ActivityItem, AppError, BlockchainError, DatabaseError, Deposit, DepositStatus, ErrorResponse,
    HealthResponse, HealthStatus, IdQuery, NetworkStats, NewDeposit, RebalanceEvent,
    RebalanceRequest, RebalanceResponse, Strategy, StrategyUpdate, UpdateDepositStatusRequest,
    ValidationError, WalletQuery,
};

/// JSON body extractor whose rejections use the API error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Field named by a body deserialization error, if any.
fn rejected_field(detail: &str) -> Option<String> {
    if let Some(rest) = detail.split("missing field `").nth(1) {
        return rest.split('`').next().map(str::to_string);
    }
    let detail = detail.rsplit("target type: ").next().unwrap_or(detail);
    let (path, _) = detail.split_once(": ")?;
    let is_path = !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    is_path.then(|| path.to_string())
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let detail = rejection.body_text();
        warn!(error = %detail, "Rejected request body");
        let message = detail
            .rsplit("target type: ")
            .next()
            .unwrap_or(&detail)
            .to_string();

        let validation = match (&rejection, rejected_field(&detail)) {
            (JsonRejection::JsonDataError(_), Some(field)) if message.starts_with("missing field") => {
                ValidationError::MissingField(field)
            }
            (JsonRejection::JsonDataError(_), Some(field)) => {
                ValidationError::InvalidField { field, message }
            }
            _ => ValidationError::Multiple(message),
        };
        AppError::Validation(validation)
    }
}

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Solana Yield Aggregator API",
        version = "0.1.0",
        description = "Deposits, strategies and rebalancing for a Solana yield aggregator",
        license(
            name = "MIT"
        )
    ),
    paths(
        list_deposits_handler,
        create_deposit_handler,
        update_deposit_status_handler,
        list_strategies_handler,
        update_strategy_handler,
        rebalance_handler,
        network_stats_handler,
        activity_feed_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            Deposit,
            NewDeposit,
            DepositStatus,
            UpdateDepositStatusRequest,
            Strategy,
            StrategyUpdate,
            RebalanceRequest,
            RebalanceResponse,
            RebalanceEvent,
            NetworkStats,
            ActivityItem,
            HealthResponse,
            HealthStatus,
            ErrorResponse,
        )
    ),
    tags(
        (name = "deposits", description = "Deposit records"),
        (name = "strategies", description = "Yield strategies"),
        (name = "rebalance", description = "Simulated rebalancing"),
        (name = "solana", description = "Network dashboard data"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Active deposits of a wallet
///
/// Withdrawn deposits are never returned.
#[utoipa::path(
    get,
    path = "/deposits",
    tag = "deposits",
    params(WalletQuery),
    responses(
        (status = 200, description = "Active deposits, newest first", body = Vec<Deposit>),
        (status = 400, description = "walletAddress missing", body = ErrorResponse),
        (status = 503, description = "Database unavailable", body = ErrorResponse)
    )
)]
pub async fn list_deposits_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WalletQuery>,
) -> Result<Json<Vec<Deposit>>, AppError> {
    let deposits = state
        .service
        .list_deposits(query.wallet_address.as_deref())
        .await?;
    Ok(Json(deposits))
}

/// Record a deposit
#[utoipa::path(
    post,
    path = "/deposits",
    tag = "deposits",
    request_body = NewDeposit,
    responses(
        (status = 201, description = "Deposit created", body = Deposit),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 503, description = "Database unavailable", body = ErrorResponse)
    )
)]
pub async fn create_deposit_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<NewDeposit>,
) -> Result<(StatusCode, Json<Deposit>), AppError> {
    let deposit = state.service.create_deposit(&payload).await?;
    Ok((StatusCode::CREATED, Json(deposit)))
}

/// Change the status of a deposit
///
/// The withdraw flow calls this with `withdrawn`. Repeating a status is a no-op.
#[utoipa::path(
    patch,
    path = "/deposits",
    tag = "deposits",
    params(IdQuery),
    request_body = UpdateDepositStatusRequest,
    responses(
        (status = 200, description = "Deposit updated", body = Deposit),
        (status = 400, description = "Missing id or unknown status", body = ErrorResponse),
        (status = 404, description = "Deposit not found", body = ErrorResponse)
    )
)]
pub async fn update_deposit_status_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
    ApiJson(payload): ApiJson<UpdateDepositStatusRequest>,
) -> Result<Json<Deposit>, AppError> {
    let deposit = state
        .service
        .update_deposit_status(query.id, &payload.status)
        .await?;
    Ok(Json(deposit))
}

/// All strategies, highest APY first
#[utoipa::path(
    get,
    path = "/strategies",
    tag = "strategies",
    responses(
        (status = 200, description = "Strategies ordered by APY descending", body = Vec<Strategy>),
        (status = 503, description = "Database unavailable", body = ErrorResponse)
    )
)]
pub async fn list_strategies_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Strategy>>, AppError> {
    let strategies = state.service.list_strategies().await?;
    Ok(Json(strategies))
}

/// Partially update a strategy
#[utoipa::path(
    put,
    path = "/strategies",
    tag = "strategies",
    params(IdQuery),
    request_body = StrategyUpdate,
    responses(
        (status = 200, description = "Strategy updated", body = Strategy),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Strategy not found", body = ErrorResponse)
    )
)]
pub async fn update_strategy_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
    ApiJson(payload): ApiJson<StrategyUpdate>,
) -> Result<Json<Strategy>, AppError> {
    let strategy = state.service.update_strategy(query.id, &payload).await?;
    Ok(Json(strategy))
}

/// Log rebalance events toward the highest-APY strategy
///
/// Bookkeeping only; no funds move.
#[utoipa::path(
    post,
    path = "/rebalance",
    tag = "rebalance",
    request_body = RebalanceRequest,
    responses(
        (status = 200, description = "Rebalance evaluated", body = RebalanceResponse),
        (status = 400, description = "walletAddress missing", body = ErrorResponse)
    )
)]
pub async fn rebalance_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RebalanceRequest>,
) -> Result<Json<RebalanceResponse>, AppError> {
    let response = state
        .service
        .execute_rebalance(&payload.wallet_address)
        .await?;
    Ok(Json(response))
}

/// Network version, slot, epoch and TPS
///
/// Reports `isOnline: false` rather than failing when the RPC is unreachable.
#[utoipa::path(
    get,
    path = "/solana/stats",
    tag = "solana",
    responses(
        (status = 200, description = "Network snapshot", body = NetworkStats)
    )
)]
pub async fn network_stats_handler(State(state): State<Arc<AppState>>) -> Json<NetworkStats> {
    Json(state.service.network_stats().await)
}

/// Recent protocol activity
#[utoipa::path(
    get,
    path = "/solana/feed",
    tag = "solana",
    responses(
        (status = 200, description = "Activity items", body = Vec<ActivityItem>),
        (status = 503, description = "RPC unavailable", body = ErrorResponse)
    )
)]
pub async fn activity_feed_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ActivityItem>>, AppError> {
    let feed = state.service.activity_feed().await?;
    Ok(Json(feed))
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health_check().await;
    Json(health)
}

/// Kubernetes liveness check
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness check
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Application is not ready")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.service.health_check().await;
    match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type) = match &self {
            AppError::Database(db_err) => match db_err {
                DatabaseError::Connection(_) => (StatusCode::SERVICE_UNAVAILABLE, "database_error"),
                DatabaseError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                DatabaseError::Duplicate(_) => (StatusCode::CONFLICT, "duplicate"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            },
            AppError::Blockchain(bc_err) => match bc_err {
                BlockchainError::Connection(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "blockchain_error")
                }
                BlockchainError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                BlockchainError::InsufficientFunds => {
                    (StatusCode::PAYMENT_REQUIRED, "insufficient_funds")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "blockchain_error"),
            },
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            AppError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            AppError::NotSupported(_) => (StatusCode::NOT_IMPLEMENTED, "not_supported"),
        };

        let field = match &self {
            AppError::Validation(v) => v.field().map(str::to_string),
            _ => None,
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            r#type: error_type.to_string(),
            message,
            field,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(err: AppError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_error_carries_field() {
        let (status, body) = body_of(AppError::Validation(ValidationError::InvalidField {
            field: "amount".to_string(),
            message: "Amount must be greater than zero".to_string(),
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.r#type, "validation_error");
        assert_eq!(body.field.as_deref(), Some("amount"));
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let cases = [
            (
                AppError::Database(DatabaseError::NotFound("deposit 1".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Database(DatabaseError::Connection("refused".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Blockchain(BlockchainError::Connection("refused".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Blockchain(BlockchainError::Timeout("30s".into())),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let (status, body) = body_of(err).await;
            assert_eq!(status, expected);
            assert!(body.field.is_none());
        }
    }

    #[test]
    fn test_rejected_field() {
        assert_eq!(
            rejected_field("Failed to deserialize the JSON body into the target type: missing field `walletAddress` at line 1 column 40"),
            Some("walletAddress".to_string())
        );
        assert_eq!(
            rejected_field("Failed to deserialize the JSON body into the target type: amount: invalid value: string \"abc\" at line 1 column 16"),
            Some("amount".to_string())
        );
        assert_eq!(
            rejected_field("Failed to parse the request body as JSON: expected value at line 1 column 1"),
            None
        );
    }
}
