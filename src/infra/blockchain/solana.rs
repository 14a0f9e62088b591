//! Blockchain RPC client implementation for Solana.
//!
//! All calls go through a [`SolanaRpcProvider`], so the retry and response
//! parsing logic can be exercised without a network.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    AppError, BlockchainClient, BlockchainError, NetworkStats, SignatureStatusInfo,
};

/// JSON-RPC error code for a failed preflight simulation
const SEND_TRANSACTION_PREFLIGHT_FAILURE: i64 = -32002;

/// Configuration for the RPC client
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub timeout: Duration,
    /// Extra attempts after a transient (connection/timeout) failure
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Abstract provider for Solana RPC interactions to enable testing
#[async_trait]
pub trait SolanaRpcProvider: Send + Sync {
    /// Send a JSON-RPC request and return its `result`
    async fn send_request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AppError>;
}

/// HTTP-based Solana RPC provider
pub struct HttpSolanaRpcProvider {
    http_client: Client,
    rpc_url: String,
}

impl HttpSolanaRpcProvider {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Blockchain(BlockchainError::Connection(e.to_string())))?;

        Ok(Self {
            http_client,
            rpc_url: rpc_url.to_string(),
        })
    }
}

#[async_trait]
impl SolanaRpcProvider for HttpSolanaRpcProvider {
    async fn send_request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, AppError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: method.to_string(),
            params,
        };

        let response = self
            .http_client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Blockchain(BlockchainError::Timeout(e.to_string()))
                } else {
                    AppError::Blockchain(BlockchainError::Connection(e.to_string()))
                }
            })?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::Blockchain(BlockchainError::Connection(format!(
                "RPC endpoint returned HTTP {}",
                status
            ))));
        }

        let rpc_response: JsonRpcResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| AppError::Blockchain(BlockchainError::RpcError(e.to_string())))?;

        if let Some(error) = rpc_response.error {
            return Err(map_rpc_error(error));
        }

        rpc_response.result.ok_or_else(|| {
            AppError::Blockchain(BlockchainError::RpcError("Empty response".to_string()))
        })
    }
}

fn map_rpc_error(error: JsonRpcError) -> AppError {
    let lowered = error.message.to_lowercase();
    if lowered.contains("insufficient funds") || lowered.contains("insufficientfunds") {
        return AppError::Blockchain(BlockchainError::InsufficientFunds);
    }
    if error.code == SEND_TRANSACTION_PREFLIGHT_FAILURE {
        return AppError::Blockchain(BlockchainError::TransactionFailed(error.message));
    }
    AppError::Blockchain(BlockchainError::RpcError(format!(
        "{}: {}",
        error.code, error.message
    )))
}

/// Solana RPC blockchain client
pub struct RpcBlockchainClient {
    provider: Box<dyn SolanaRpcProvider>,
    config: RpcClientConfig,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<T: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    params: T,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// `{ context, value }` envelope used by most commitment-aware methods
#[derive(Debug, Deserialize)]
struct ContextResult<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct BlockhashResponse {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
struct SignatureStatus {
    err: Option<serde_json::Value>,
    #[serde(rename = "confirmationStatus")]
    confirmation_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionResult {
    #[serde(rename = "solana-core")]
    solana_core: String,
}

#[derive(Debug, Deserialize)]
struct EpochInfoResult {
    epoch: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerformanceSample {
    num_transactions: u64,
    sample_period_secs: u64,
}

impl RpcBlockchainClient {
    /// Create a new RPC blockchain client with custom configuration
    pub fn new(rpc_url: &str, config: RpcClientConfig) -> Result<Self, AppError> {
        let provider = HttpSolanaRpcProvider::new(rpc_url, config.timeout)?;
        info!(rpc_url = %rpc_url, "Created blockchain client");
        Ok(Self {
            provider: Box::new(provider),
            config,
        })
    }

    /// Create a new RPC blockchain client with default configuration
    pub fn with_defaults(rpc_url: &str) -> Result<Self, AppError> {
        Self::new(rpc_url, RpcClientConfig::default())
    }

    /// Create a new client with a specific provider (useful for testing)
    pub fn with_provider(provider: Box<dyn SolanaRpcProvider>, config: RpcClientConfig) -> Self {
        Self { provider, config }
    }

    /// Make an RPC call, retrying transport failures only
    #[instrument(skip(self, params))]
    async fn rpc_call<P: Serialize + Send + Sync, R: DeserializeOwned + Send>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, AppError> {
        let params_value = serde_json::to_value(params).map_err(|e| {
            AppError::Blockchain(BlockchainError::RpcError(format!(
                "Serialization error: {}",
                e
            )))
        })?;

        let mut attempt = 0;
        loop {
            match self
                .provider
                .send_request(method, params_value.clone())
                .await
            {
                Ok(result_value) => {
                    return serde_json::from_value(result_value).map_err(|e| {
                        AppError::Blockchain(BlockchainError::RpcError(format!(
                            "Deserialization error: {}",
                            e
                        )))
                    });
                }
                Err(AppError::Blockchain(err))
                    if err.is_transient() && attempt < self.config.max_retries =>
                {
                    warn!(attempt = attempt, error = %err, method = %method, "RPC call failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    warn!(attempt = attempt, error = %e, method = %method, "RPC call failed");
                    return Err(e);
                }
            }
        }
    }
}

/// Transactions per second over one performance sample, rounded.
fn tps_from_samples(samples: &[PerformanceSample]) -> u64 {
    match samples.first() {
        Some(sample) if sample.sample_period_secs > 0 => {
            (sample.num_transactions as f64 / sample.sample_period_secs as f64).round() as u64
        }
        _ => 0,
    }
}

#[async_trait]
impl BlockchainClient for RpcBlockchainClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let _: u64 = self.rpc_call("getSlot", Vec::<()>::new()).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_balance(&self, address: &str) -> Result<u64, AppError> {
        let params = json!([address, {"commitment": "confirmed"}]);
        let result: ContextResult<u64> = self.rpc_call("getBalance", params).await?;
        debug!(address = %address, lamports = result.value, "Fetched balance");
        Ok(result.value)
    }

    #[instrument(skip(self))]
    async fn get_latest_blockhash(&self) -> Result<String, AppError> {
        let params = json!([{"commitment": "confirmed"}]);
        let result: ContextResult<BlockhashResponse> =
            self.rpc_call("getLatestBlockhash", params).await?;
        Ok(result.value.blockhash)
    }

    #[instrument(skip(self, message_base64))]
    async fn get_fee_for_message(&self, message_base64: &str) -> Result<Option<u64>, AppError> {
        let params = json!([message_base64, {"commitment": "confirmed"}]);
        let result: ContextResult<Option<u64>> = self.rpc_call("getFeeForMessage", params).await?;
        Ok(result.value)
    }

    #[instrument(skip(self, transaction_base64))]
    async fn send_transaction(&self, transaction_base64: &str) -> Result<String, AppError> {
        let params = json!([
            transaction_base64,
            {"encoding": "base64", "preflightCommitment": "confirmed"}
        ]);
        let signature: String = self.rpc_call("sendTransaction", params).await?;
        info!(signature = %signature, "Transaction broadcast");
        Ok(signature)
    }

    #[instrument(skip(self))]
    async fn get_signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatusInfo>, AppError> {
        let params = json!([[signature], {"searchTransactionHistory": true}]);
        let result: ContextResult<Vec<Option<SignatureStatus>>> =
            self.rpc_call("getSignatureStatuses", params).await?;

        Ok(result
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| SignatureStatusInfo {
                confirmation_status: status
                    .confirmation_status
                    .as_deref()
                    .and_then(|level| level.parse().ok()),
                err: status.err,
            }))
    }

    #[instrument(skip(self))]
    async fn get_network_stats(&self) -> Result<NetworkStats, AppError> {
        let (version, epoch_info, slot, samples) = tokio::try_join!(
            self.rpc_call::<_, VersionResult>("getVersion", Vec::<()>::new()),
            self.rpc_call::<_, EpochInfoResult>("getEpochInfo", Vec::<()>::new()),
            self.rpc_call::<_, u64>("getSlot", Vec::<()>::new()),
            self.rpc_call::<_, Vec<PerformanceSample>>("getRecentPerformanceSamples", [1]),
        )?;

        Ok(NetworkStats {
            version: version.solana_core,
            slot,
            epoch: epoch_info.epoch,
            tps: tps_from_samples(&samples),
            is_online: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CommitmentLevel, ConfirmationStatus};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone)]
    enum MockErrorKind {
        Timeout,
        Connection,
        RpcError(String),
        InsufficientFunds,
    }

    impl MockErrorKind {
        fn to_error(&self) -> AppError {
            match self {
                Self::Timeout => AppError::Blockchain(BlockchainError::Timeout(
                    "Connection timed out".to_string(),
                )),
                Self::Connection => AppError::Blockchain(BlockchainError::Connection(
                    "connection refused".to_string(),
                )),
                Self::RpcError(msg) => {
                    AppError::Blockchain(BlockchainError::RpcError(msg.clone()))
                }
                Self::InsufficientFunds => {
                    AppError::Blockchain(BlockchainError::InsufficientFunds)
                }
            }
        }
    }

    /// Scripted responses per method, consumed in order; the last one repeats.
    struct ScriptedProvider {
        scripts: Mutex<HashMap<String, Vec<Result<serde_json::Value, MockErrorKind>>>>,
        calls: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl ScriptedProvider {
        fn new() -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn on(self, method: &str, responses: Vec<Result<serde_json::Value, MockErrorKind>>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(method.to_string(), responses);
            self
        }
    }

    #[async_trait]
    impl SolanaRpcProvider for std::sync::Arc<ScriptedProvider> {
        async fn send_request(
            &self,
            method: &str,
            params: serde_json::Value,
        ) -> Result<serde_json::Value, AppError> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params));
            let mut scripts = self.scripts.lock().unwrap();
            let Some(queue) = scripts.get_mut(method) else {
                return Ok(serde_json::Value::Null);
            };
            let next = if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue[0].clone()
            };
            next.map_err(|kind| kind.to_error())
        }
    }

    fn client_with(provider: ScriptedProvider) -> (RpcBlockchainClient, std::sync::Arc<ScriptedProvider>) {
        let provider = std::sync::Arc::new(provider);
        let config = RpcClientConfig {
            max_retries: 3,
            retry_delay: Duration::from_millis(1),
            ..Default::default()
        };
        (
            RpcBlockchainClient::with_provider(Box::new(std::sync::Arc::clone(&provider)), config),
            provider,
        )
    }

    fn call_count(provider: &ScriptedProvider, method: &str) -> usize {
        provider
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    #[test]
    fn test_rpc_client_config_default() {
        let config = RpcClientConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry_delay, Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_retry_logic_success_after_transient_failures() {
        let (client, provider) = client_with(ScriptedProvider::new().on(
            "getSlot",
            vec![
                Err(MockErrorKind::Timeout),
                Err(MockErrorKind::Connection),
                Ok(json!(12345u64)),
            ],
        ));

        assert!(client.health_check().await.is_ok());
        assert_eq!(call_count(&provider, "getSlot"), 3);
    }

    #[tokio::test]
    async fn test_retry_logic_gives_up_after_max_retries() {
        let (client, provider) =
            client_with(ScriptedProvider::new().on("getSlot", vec![Err(MockErrorKind::Timeout)]));

        let result = client.health_check().await;
        assert!(matches!(
            result,
            Err(AppError::Blockchain(BlockchainError::Timeout(_)))
        ));
        assert_eq!(call_count(&provider, "getSlot"), 4);
    }

    #[tokio::test]
    async fn test_no_retry_on_rpc_rejection() {
        let (client, provider) = client_with(ScriptedProvider::new().on(
            "sendTransaction",
            vec![Err(MockErrorKind::RpcError(
                "-32602: invalid transaction".to_string(),
            ))],
        ));

        let result = client.send_transaction("AQ==").await;
        assert!(matches!(
            result,
            Err(AppError::Blockchain(BlockchainError::RpcError(_)))
        ));
        assert_eq!(call_count(&provider, "sendTransaction"), 1);
    }

    #[tokio::test]
    async fn test_no_retry_on_insufficient_funds() {
        let (client, provider) = client_with(
            ScriptedProvider::new().on("sendTransaction", vec![Err(MockErrorKind::InsufficientFunds)]),
        );

        let result = client.send_transaction("AQ==").await;
        assert!(matches!(
            result,
            Err(AppError::Blockchain(BlockchainError::InsufficientFunds))
        ));
        assert_eq!(call_count(&provider, "sendTransaction"), 1);
    }

    #[tokio::test]
    async fn test_send_transaction_uses_base64_encoding() {
        let (client, provider) =
            client_with(ScriptedProvider::new().on("sendTransaction", vec![Ok(json!("SIG123"))]));

        let signature = client.send_transaction("AQID").await.unwrap();
        assert_eq!(signature, "SIG123");

        let calls = provider.calls.lock().unwrap();
        let (_, params) = &calls[0];
        assert_eq!(params[0], "AQID");
        assert_eq!(params[1]["encoding"], "base64");
    }

    #[tokio::test]
    async fn test_get_balance_and_blockhash() {
        let (client, _) = client_with(
            ScriptedProvider::new()
                .on(
                    "getBalance",
                    vec![Ok(json!({"context": {"slot": 1}, "value": 2_500_000_000u64}))],
                )
                .on(
                    "getLatestBlockhash",
                    vec![Ok(json!({
                        "context": {"slot": 1},
                        "value": {
                            "blockhash": "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N",
                            "lastValidBlockHeight": 3090
                        }
                    }))],
                ),
        );

        assert_eq!(
            client.get_balance("HvwC9QSAzwEXkUkwqNNGhfNHoVqXJYfPvPZfQvJmHWcF").await.unwrap(),
            2_500_000_000
        );
        assert_eq!(
            client.get_latest_blockhash().await.unwrap(),
            "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N"
        );
    }

    #[tokio::test]
    async fn test_get_fee_for_message_null_value() {
        let (client, _) = client_with(ScriptedProvider::new().on(
            "getFeeForMessage",
            vec![
                Ok(json!({"context": {"slot": 1}, "value": 5000})),
                Ok(json!({"context": {"slot": 2}, "value": null})),
            ],
        ));

        assert_eq!(client.get_fee_for_message("AQ==").await.unwrap(), Some(5000));
        assert_eq!(client.get_fee_for_message("AQ==").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_signature_status_variants() {
        let (client, _) = client_with(ScriptedProvider::new().on(
            "getSignatureStatuses",
            vec![
                Ok(json!({"context": {"slot": 1}, "value": [null]})),
                Ok(json!({"context": {"slot": 2}, "value": [{
                    "slot": 2, "confirmations": 0, "err": null, "confirmationStatus": "processed"
                }]})),
                Ok(json!({"context": {"slot": 3}, "value": [{
                    "slot": 3, "confirmations": null, "err": null, "confirmationStatus": "finalized"
                }]})),
                Ok(json!({"context": {"slot": 4}, "value": [{
                    "slot": 4, "confirmations": null,
                    "err": {"InstructionError": [0, {"Custom": 1}]},
                    "confirmationStatus": "confirmed"
                }]})),
            ],
        ));

        assert!(client.get_signature_status("SIG").await.unwrap().is_none());

        let processed = client.get_signature_status("SIG").await.unwrap().unwrap();
        assert_eq!(
            processed.confirmation_status,
            Some(CommitmentLevel::Processed)
        );
        assert_eq!(processed.classify(), ConfirmationStatus::Pending);

        let finalized = client.get_signature_status("SIG").await.unwrap().unwrap();
        assert_eq!(finalized.classify(), ConfirmationStatus::Confirmed);

        let failed = client.get_signature_status("SIG").await.unwrap().unwrap();
        assert!(matches!(failed.classify(), ConfirmationStatus::Failed(raw) if raw.contains("Custom")));
    }

    #[tokio::test]
    async fn test_get_network_stats() {
        let (client, _) = client_with(
            ScriptedProvider::new()
                .on("getVersion", vec![Ok(json!({"solana-core": "2.0.14", "feature-set": 1}))])
                .on(
                    "getEpochInfo",
                    vec![Ok(json!({
                        "absoluteSlot": 166598, "blockHeight": 166500, "epoch": 27,
                        "slotIndex": 2790, "slotsInEpoch": 8192
                    }))],
                )
                .on("getSlot", vec![Ok(json!(166600u64))])
                .on(
                    "getRecentPerformanceSamples",
                    vec![Ok(json!([{
                        "slot": 348125, "numTransactions": 12650, "numSlots": 126,
                        "samplePeriodSecs": 60, "numNonVoteTransactions": 1000
                    }]))],
                ),
        );

        let stats = client.get_network_stats().await.unwrap();
        assert_eq!(stats.version, "2.0.14");
        assert_eq!(stats.epoch, 27);
        assert_eq!(stats.slot, 166600);
        assert_eq!(stats.tps, 211);
        assert!(stats.is_online);
    }

    #[test]
    fn test_tps_without_samples_is_zero() {
        assert_eq!(tps_from_samples(&[]), 0);
        assert_eq!(
            tps_from_samples(&[PerformanceSample {
                num_transactions: 10,
                sample_period_secs: 0
            }]),
            0
        );
    }

    #[test]
    fn test_map_rpc_error() {
        let err = map_rpc_error(JsonRpcError {
            code: -32002,
            message: "Transaction simulation failed: Attempt to debit an account but found no record of a prior credit.".to_string(),
        });
        assert!(matches!(
            err,
            AppError::Blockchain(BlockchainError::TransactionFailed(_))
        ));

        let err = map_rpc_error(JsonRpcError {
            code: -32002,
            message: "Transaction simulation failed: insufficient funds for rent".to_string(),
        });
        assert!(matches!(
            err,
            AppError::Blockchain(BlockchainError::InsufficientFunds)
        ));

        let err = map_rpc_error(JsonRpcError {
            code: -32601,
            message: "Method not found".to_string(),
        });
        assert!(matches!(err, AppError::Blockchain(BlockchainError::RpcError(m)) if m.contains("-32601")));
    }
}
