//! Integration tests for the API.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;
use serde_json::json;
use tower::ServiceExt;

use solana_yield_aggregator::api::create_router;
use solana_yield_aggregator::app::AppState;
use solana_yield_aggregator::domain::{
    ActivityItem, Deposit, DepositStatus, ErrorResponse, HealthResponse, HealthStatus,
    NetworkStats, RebalanceResponse, Strategy,
};
use solana_yield_aggregator::test_utils::{MockBlockchainClient, MockDatabaseClient};

const WALLET: &str = "HvwC9QSAzwEXkUkwqNNGhfNHoVqXJYfPvPZfQvJmHWcF";

fn create_test_state(
    db: &Arc<MockDatabaseClient>,
    blockchain: &Arc<MockBlockchainClient>,
) -> Arc<AppState> {
    Arc::new(AppState::new(db.clone() as _, blockchain.clone() as _))
}

fn router_with(db: &Arc<MockDatabaseClient>) -> Router {
    create_router(create_test_state(db, &Arc::new(MockBlockchainClient::new())))
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body_bytes).unwrap()
}

#[tokio::test]
async fn test_list_deposits_requires_wallet_address() {
    let router = router_with(&Arc::new(MockDatabaseClient::new()));

    let response = router.oneshot(get("/deposits")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.r#type, "validation_error");
    assert_eq!(error.field.as_deref(), Some("walletAddress"));
}

#[tokio::test]
async fn test_list_deposits_hides_withdrawn() {
    let db = Arc::new(MockDatabaseClient::new());
    let active = db.seed_deposit(WALLET, dec!(1.5), DepositStatus::Confirmed);
    db.seed_deposit(WALLET, dec!(2), DepositStatus::Withdrawn);
    let router = router_with(&db);

    let response = router
        .oneshot(get(&format!("/deposits?walletAddress={}", WALLET)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let deposits: Vec<Deposit> = read_json(response).await;
    assert_eq!(deposits.len(), 1);
    assert_eq!(deposits[0].id, active.id);
}

#[tokio::test]
async fn test_create_deposit() {
    let db = Arc::new(MockDatabaseClient::new());
    let router = router_with(&db);

    let payload = json!({
        "walletAddress": WALLET,
        "strategyId": 2,
        "amount": "1.5",
        "tokenSymbol": "SOL",
        "txHash": "SIG123",
        "status": "confirmed"
    });
    let response = router
        .oneshot(json_request("POST", "/deposits", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let deposit: Deposit = read_json(response).await;
    assert_eq!(deposit.amount, dec!(1.5));
    assert_eq!(deposit.tx_hash.as_deref(), Some("SIG123"));
    assert_eq!(deposit.status, DepositStatus::Confirmed);
    assert_eq!(db.deposits().len(), 1);
}

#[tokio::test]
async fn test_create_deposit_validation_error_names_field() {
    let db = Arc::new(MockDatabaseClient::new());
    let router = router_with(&db);

    let payload = json!({
        "walletAddress": WALLET,
        "amount": "0",
        "tokenSymbol": "SOL"
    });
    let response = router
        .oneshot(json_request("POST", "/deposits", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.field.as_deref(), Some("amount"));
    assert!(error.message.contains("greater than zero"));
    assert!(db.deposits().is_empty());
}

#[tokio::test]
async fn test_malformed_deposit_bodies_are_validation_errors() {
    let db = Arc::new(MockDatabaseClient::new());

    let response = router_with(&db)
        .oneshot(json_request(
            "POST",
            "/deposits",
            json!({"amount": "1.5", "tokenSymbol": "SOL"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.r#type, "validation_error");
    assert_eq!(error.field.as_deref(), Some("walletAddress"));

    let response = router_with(&db)
        .oneshot(json_request(
            "POST",
            "/deposits",
            json!({"walletAddress": WALLET, "amount": "abc", "tokenSymbol": "SOL"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.field.as_deref(), Some("amount"));

    let deposit = db.seed_deposit(WALLET, dec!(1), DepositStatus::Confirmed);
    let response = router_with(&db)
        .oneshot(json_request(
            "PATCH",
            &format!("/deposits?id={}", deposit.id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.field.as_deref(), Some("status"));
    assert_eq!(db.deposit(deposit.id).unwrap().status, DepositStatus::Confirmed);

    let response = router_with(&db)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/deposits")
                .header("Content-Type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.r#type, "validation_error");
    assert_eq!(db.deposits().len(), 1);
}

#[tokio::test]
async fn test_patch_deposit_status() {
    let db = Arc::new(MockDatabaseClient::new());
    let deposit = db.seed_deposit(WALLET, dec!(1), DepositStatus::Confirmed);

    let response = router_with(&db)
        .oneshot(json_request(
            "PATCH",
            &format!("/deposits?id={}", deposit.id),
            json!({"status": "withdrawn"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Deposit = read_json(response).await;
    assert_eq!(updated.status, DepositStatus::Withdrawn);

    let response = router_with(&db)
        .oneshot(json_request(
            "PATCH",
            &format!("/deposits?id={}", deposit.id),
            json!({"status": "refunded"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.field.as_deref(), Some("status"));

    let response = router_with(&db)
        .oneshot(json_request(
            "PATCH",
            "/deposits?id=9999",
            json!({"status": "withdrawn"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_strategies_ordered_by_apy() {
    let db = Arc::new(MockDatabaseClient::new());
    db.seed_strategy("Solend USDC", dec!(4.1), true);
    db.seed_strategy("Raydium SOL-USDC", dec!(18.25), true);
    db.seed_strategy("Marinade", dec!(7.2), true);

    let response = router_with(&db).oneshot(get("/strategies")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let strategies: Vec<Strategy> = read_json(response).await;
    let names: Vec<&str> = strategies.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Raydium SOL-USDC", "Marinade", "Solend USDC"]);
}

#[tokio::test]
async fn test_update_strategy() {
    let db = Arc::new(MockDatabaseClient::new());
    let strategy = db.seed_strategy("Orca", dec!(9), true);

    let response = router_with(&db)
        .oneshot(json_request(
            "PUT",
            &format!("/strategies?id={}", strategy.id),
            json!({"apy": "11.5", "isActive": false}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Strategy = read_json(response).await;
    assert_eq!(updated.apy, dec!(11.5));
    assert!(!updated.is_active);

    let response = router_with(&db)
        .oneshot(json_request(
            "PUT",
            &format!("/strategies?id={}", strategy.id),
            json!({"riskScore": 11}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.field.as_deref(), Some("riskScore"));

    let response = router_with(&db)
        .oneshot(json_request("PUT", "/strategies?id=777", json!({"apy": "1"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rebalance() {
    let db = Arc::new(MockDatabaseClient::new());
    let low = db.seed_strategy("Solend USDC", dec!(4.1), true);
    let high = db.seed_strategy("Raydium SOL-USDC", dec!(18.25), true);
    db.seed_deposit_in(WALLET, dec!(5), Some(low.id));

    let response = router_with(&db)
        .oneshot(json_request("POST", "/rebalance", json!({"walletAddress": WALLET})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let result: RebalanceResponse = read_json(response).await;
    assert_eq!(result.message, "Rebalancing optimization complete");
    assert_eq!(result.events.len(), 1);
    assert_eq!(result.events[0].to_strategy_id, Some(high.id));
    assert_eq!(db.rebalance_events().len(), 1);

    let response = router_with(&db)
        .oneshot(json_request("POST", "/rebalance", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_network_stats_offline_is_still_ok() {
    let db = Arc::new(MockDatabaseClient::new());
    let blockchain = Arc::new(MockBlockchainClient::failing("rpc down"));
    let router = create_router(create_test_state(&db, &blockchain));

    let response = router.oneshot(get("/solana/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stats: NetworkStats = read_json(response).await;
    assert_eq!(stats, NetworkStats::offline());
}

#[tokio::test]
async fn test_activity_feed() {
    let db = Arc::new(MockDatabaseClient::new());
    let router = router_with(&db);

    let response = router.oneshot(get("/solana/feed")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let items: Vec<ActivityItem> = read_json(response).await;
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|item| item.hash.starts_with("...")));
    assert_eq!(items[2].r#type, "LIQUIDATION");

    let blockchain = Arc::new(MockBlockchainClient::failing("rpc down"));
    let response = create_router(create_test_state(&db, &blockchain))
        .oneshot(get("/solana/feed"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health_endpoints() {
    let db = Arc::new(MockDatabaseClient::new());
    let blockchain = Arc::new(MockBlockchainClient::new());
    let state = create_test_state(&db, &blockchain);

    let response = create_router(state.clone())
        .oneshot(get("/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = read_json(response).await;
    assert_eq!(health.status, HealthStatus::Healthy);

    let response = create_router(state.clone())
        .oneshot(get("/health/live"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    db.set_healthy(false);
    let response = create_router(state)
        .oneshot(get("/health/ready"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let router = router_with(&Arc::new(MockDatabaseClient::new()));

    let response = router.oneshot(get("/api-docs/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc: serde_json::Value = read_json(response).await;
    assert!(doc["paths"]["/deposits"].is_object());
    assert!(doc["paths"]["/solana/stats"].is_object());
}
