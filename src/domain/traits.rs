//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use solana_sdk::transaction::Transaction;

use super::error::{AppError, TransactionError};
use super::transaction::SignatureStatusInfo;
use super::types::{
    Deposit, DepositStatus, NetworkStats, NewDeposit, NewRebalanceEvent, RebalanceEvent,
    Strategy, StrategyUpdate,
};

/// Deposit persistence used by the transaction flow.
///
/// Implemented by the server-side database client and by the HTTP-backed
/// store the CLI uses.
#[async_trait]
pub trait DepositStore: Send + Sync {
    /// Persist a new deposit record
    async fn create_deposit(&self, deposit: &NewDeposit) -> Result<Deposit, AppError>;

    /// Set the status of an existing deposit; `NotFound` if the id is unknown.
    /// Setting the status it already has is a no-op.
    async fn update_deposit_status(
        &self,
        id: i32,
        status: DepositStatus,
    ) -> Result<Deposit, AppError>;

    /// Non-withdrawn deposits of a wallet, newest first
    async fn list_active_deposits(&self, wallet_address: &str) -> Result<Vec<Deposit>, AppError>;

    /// Drop any cached listing for a wallet. Uncached stores have nothing to do.
    async fn invalidate_cached_listing(&self, wallet_address: &str) {
        let _ = wallet_address;
    }
}

/// Database client trait for persistence operations
#[async_trait]
pub trait DatabaseClient: DepositStore {
    /// Check database connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Active and inactive strategies, highest APY first
    async fn list_strategies_by_apy(&self) -> Result<Vec<Strategy>, AppError>;

    async fn get_strategy(&self, id: i32) -> Result<Option<Strategy>, AppError>;

    /// Apply a partial update; `NotFound` if the id is unknown
    async fn update_strategy(&self, id: i32, update: &StrategyUpdate)
    -> Result<Strategy, AppError>;

    /// Append to the rebalance log
    async fn log_rebalance(&self, event: &NewRebalanceEvent) -> Result<RebalanceEvent, AppError>;
}

/// Blockchain client trait for ledger RPC operations
#[async_trait]
pub trait BlockchainClient: Send + Sync {
    /// Check blockchain RPC connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Balance of an address in lamports
    async fn get_balance(&self, address: &str) -> Result<u64, AppError>;

    /// Latest blockhash for transaction construction (base58)
    async fn get_latest_blockhash(&self) -> Result<String, AppError>;

    /// Fee for a serialized, base64-encoded message. `None` when the node
    /// cannot price it (e.g. the blockhash expired).
    async fn get_fee_for_message(&self, message_base64: &str) -> Result<Option<u64>, AppError> {
        let _ = message_base64;
        Err(AppError::NotSupported(
            "get_fee_for_message not implemented".to_string(),
        ))
    }

    /// Broadcast a signed, base64-encoded transaction; returns its signature
    async fn send_transaction(&self, transaction_base64: &str) -> Result<String, AppError>;

    /// Status of a signature; `None` when the node has not seen it yet
    async fn get_signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatusInfo>, AppError>;

    /// Version, slot, epoch and throughput of the network
    async fn get_network_stats(&self) -> Result<NetworkStats, AppError> {
        Err(AppError::NotSupported(
            "get_network_stats not implemented".to_string(),
        ))
    }
}

/// The wallet capability that holds key material and signs on approval.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Base58 public key of the connected wallet, `None` when disconnected
    fn address(&self) -> Option<String>;

    /// Sign a transaction whose fee payer is this wallet.
    ///
    /// Fails with `UserRejected` when the holder declines and
    /// `WalletNotConnected` when no key is available.
    async fn sign_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<Transaction, TransactionError>;
}
