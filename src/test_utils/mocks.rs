//! Mock implementations for testing.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use chrono::Utc;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rust_decimal::Decimal;
use solana_sdk::{hash::Hash, transaction::Transaction};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{
    AppError, BlockchainClient, BlockchainError, CommitmentLevel, DatabaseClient, DatabaseError,
    Deposit, DepositStatus, DepositStore, NetworkStats, NewDeposit, NewRebalanceEvent,
    RebalanceEvent, SignatureStatusInfo, Strategy, StrategyUpdate, TransactionError, WalletSigner,
};
use crate::infra::KeypairWallet;

/// Configuration for mock behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    pub should_fail: bool,
    pub error_message: Option<String>,
}

impl MockConfig {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }

    fn message(&self) -> String {
        self.error_message
            .clone()
            .unwrap_or_else(|| "Mock error".to_string())
    }
}

/// In-memory deposits, strategies and rebalance log
pub struct MockDatabaseClient {
    deposits: Arc<Mutex<Vec<Deposit>>>,
    strategies: Arc<Mutex<Vec<Strategy>>>,
    events: Arc<Mutex<Vec<RebalanceEvent>>>,
    next_id: AtomicI32,
    config: MockConfig,
    is_healthy: AtomicBool,
    update_outage: AtomicBool,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl MockDatabaseClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            deposits: Arc::new(Mutex::new(Vec::new())),
            strategies: Arc::new(Mutex::new(Vec::new())),
            events: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicI32::new(1),
            config,
            is_healthy: AtomicBool::new(true),
            update_outage: AtomicBool::new(false),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Make deposit status updates fail with a connection error.
    pub fn set_update_outage(&self, outage: bool) {
        self.update_outage.store(outage, Ordering::Relaxed);
    }

    /// All stored deposits, including withdrawn ones
    pub fn deposits(&self) -> Vec<Deposit> {
        self.deposits.lock().unwrap().clone()
    }

    pub fn deposit(&self, id: i32) -> Option<Deposit> {
        self.deposits.lock().unwrap().iter().find(|d| d.id == id).cloned()
    }

    pub fn rebalance_events(&self) -> Vec<RebalanceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::Relaxed)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::Relaxed)
    }

    fn allocate_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn seed_deposit_with_id(
        &self,
        id: i32,
        wallet_address: &str,
        amount: Decimal,
        status: DepositStatus,
    ) -> Deposit {
        let deposit = Deposit {
            id,
            wallet_address: wallet_address.to_string(),
            strategy_id: None,
            amount,
            token_symbol: "SOL".to_string(),
            tx_hash: Some(format!("seeded-{}", id)),
            status,
            timestamp: Utc::now(),
        };
        self.deposits.lock().unwrap().push(deposit.clone());
        deposit
    }

    pub fn seed_deposit(&self, wallet_address: &str, amount: Decimal, status: DepositStatus) -> Deposit {
        let id = self.allocate_id();
        self.seed_deposit_with_id(id, wallet_address, amount, status)
    }

    /// Confirmed deposit placed in a strategy
    pub fn seed_deposit_in(
        &self,
        wallet_address: &str,
        amount: Decimal,
        strategy_id: Option<i32>,
    ) -> Deposit {
        let mut deposit = self.seed_deposit(wallet_address, amount, DepositStatus::Confirmed);
        let mut deposits = self.deposits.lock().unwrap();
        if let Some(stored) = deposits.iter_mut().find(|d| d.id == deposit.id) {
            stored.strategy_id = strategy_id;
        }
        deposit.strategy_id = strategy_id;
        deposit
    }

    pub fn seed_strategy(&self, name: &str, apy: Decimal, is_active: bool) -> Strategy {
        let strategy = Strategy {
            id: self.allocate_id(),
            name: name.to_string(),
            protocol: "Mock".to_string(),
            apy,
            tvl: Decimal::new(1_000_000, 0),
            risk_score: 3,
            is_active,
            last_updated: Utc::now(),
        };
        self.strategies.lock().unwrap().push(strategy.clone());
        strategy
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            return Err(AppError::Database(DatabaseError::Query(
                self.config.message(),
            )));
        }
        Ok(())
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DepositStore for MockDatabaseClient {
    async fn create_deposit(&self, deposit: &NewDeposit) -> Result<Deposit, AppError> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        self.check_should_fail()?;
        let created = Deposit {
            id: self.allocate_id(),
            wallet_address: deposit.wallet_address.clone(),
            strategy_id: deposit.strategy_id,
            amount: deposit.amount,
            token_symbol: deposit.token_symbol.clone(),
            tx_hash: deposit.tx_hash.clone(),
            status: deposit.status,
            timestamp: Utc::now(),
        };
        self.deposits.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_deposit_status(
        &self,
        id: i32,
        status: DepositStatus,
    ) -> Result<Deposit, AppError> {
        self.update_calls.fetch_add(1, Ordering::Relaxed);
        self.check_should_fail()?;
        if self.update_outage.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Simulated outage".to_string(),
            )));
        }
        let mut deposits = self.deposits.lock().unwrap();
        let deposit = deposits
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| AppError::Database(DatabaseError::NotFound(format!("deposit {}", id))))?;
        deposit.status = status;
        Ok(deposit.clone())
    }

    async fn list_active_deposits(&self, wallet_address: &str) -> Result<Vec<Deposit>, AppError> {
        self.check_should_fail()?;
        let mut active: Vec<Deposit> = self
            .deposits
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.wallet_address == wallet_address && d.status.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(active)
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        self.check_should_fail()
    }

    async fn list_strategies_by_apy(&self) -> Result<Vec<Strategy>, AppError> {
        self.check_should_fail()?;
        let mut strategies = self.strategies.lock().unwrap().clone();
        strategies.sort_by(|a, b| b.apy.cmp(&a.apy));
        Ok(strategies)
    }

    async fn get_strategy(&self, id: i32) -> Result<Option<Strategy>, AppError> {
        self.check_should_fail()?;
        Ok(self.strategies.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn update_strategy(
        &self,
        id: i32,
        update: &StrategyUpdate,
    ) -> Result<Strategy, AppError> {
        self.check_should_fail()?;
        let mut strategies = self.strategies.lock().unwrap();
        let strategy = strategies
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::Database(DatabaseError::NotFound(format!("strategy {}", id))))?;
        if let Some(name) = &update.name {
            strategy.name = name.clone();
        }
        if let Some(protocol) = &update.protocol {
            strategy.protocol = protocol.clone();
        }
        if let Some(apy) = update.apy {
            strategy.apy = apy;
        }
        if let Some(tvl) = update.tvl {
            strategy.tvl = tvl;
        }
        if let Some(risk_score) = update.risk_score {
            strategy.risk_score = risk_score;
        }
        if let Some(is_active) = update.is_active {
            strategy.is_active = is_active;
        }
        strategy.last_updated = Utc::now();
        Ok(strategy.clone())
    }

    async fn log_rebalance(&self, event: &NewRebalanceEvent) -> Result<RebalanceEvent, AppError> {
        self.check_should_fail()?;
        let logged = RebalanceEvent {
            id: self.allocate_id(),
            wallet_address: event.wallet_address.clone(),
            from_strategy_id: event.from_strategy_id,
            to_strategy_id: event.to_strategy_id,
            amount: event.amount,
            reason: event.reason.clone(),
            timestamp: Utc::now(),
        };
        self.events.lock().unwrap().push(logged.clone());
        Ok(logged)
    }
}

/// Scriptable ledger gateway.
///
/// Every blockhash request returns a new hash. Broadcasts echo the
/// transaction's own signature unless one is fixed with [`Self::set_signature`].
/// Status queries drain a scripted queue, then fall back to a default that
/// reports `confirmed`.
pub struct MockBlockchainClient {
    config: MockConfig,
    is_healthy: AtomicBool,
    balance: Mutex<u64>,
    fee: Mutex<Option<u64>>,
    signature: Mutex<Option<String>>,
    blockhash_calls: AtomicUsize,
    send_calls: AtomicUsize,
    status_calls: AtomicUsize,
    send_failures: Mutex<VecDeque<BlockchainError>>,
    status_failures: AtomicUsize,
    statuses: Mutex<VecDeque<Option<SignatureStatusInfo>>>,
    default_status: Mutex<Option<SignatureStatusInfo>>,
    sent_blockhashes: Mutex<Vec<Hash>>,
}

impl MockBlockchainClient {
    /// Ten SOL in the wallet
    pub const DEFAULT_BALANCE: u64 = 10_000_000_000;

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            is_healthy: AtomicBool::new(true),
            balance: Mutex::new(Self::DEFAULT_BALANCE),
            fee: Mutex::new(Some(5_000)),
            signature: Mutex::new(None),
            blockhash_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            send_failures: Mutex::new(VecDeque::new()),
            status_failures: AtomicUsize::new(0),
            statuses: Mutex::new(VecDeque::new()),
            default_status: Mutex::new(Some(SignatureStatusInfo {
                confirmation_status: Some(CommitmentLevel::Confirmed),
                err: None,
            })),
            sent_blockhashes: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with a connection error
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn set_balance(&self, lamports: u64) {
        *self.balance.lock().unwrap() = lamports;
    }

    pub fn set_fee(&self, fee: Option<u64>) {
        *self.fee.lock().unwrap() = fee;
    }

    pub fn set_signature(&self, signature: impl Into<String>) {
        *self.signature.lock().unwrap() = Some(signature.into());
    }

    /// Fail the next broadcast with `error`; queued failures apply in order.
    pub fn fail_next_send(&self, error: BlockchainError) {
        self.send_failures.lock().unwrap().push_back(error);
    }

    /// Fail the next `count` status queries with a timeout.
    pub fn fail_status_queries(&self, count: usize) {
        self.status_failures.store(count, Ordering::Relaxed);
    }

    pub fn push_statuses(&self, statuses: Vec<Option<SignatureStatusInfo>>) {
        self.statuses.lock().unwrap().extend(statuses);
    }

    /// Status reported once the scripted queue is empty; `None` means unseen.
    pub fn set_default_status(&self, status: Option<SignatureStatusInfo>) {
        *self.default_status.lock().unwrap() = status;
    }

    pub fn blockhash_calls(&self) -> usize {
        self.blockhash_calls.load(Ordering::Relaxed)
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::Relaxed)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::Relaxed)
    }

    /// Blockhash of every broadcast attempt, in order
    pub fn sent_blockhashes(&self) -> Vec<Hash> {
        self.sent_blockhashes.lock().unwrap().clone()
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            return Err(AppError::Blockchain(BlockchainError::Connection(
                self.config.message(),
            )));
        }
        Ok(())
    }

    fn decode(transaction_base64: &str) -> Result<Transaction, AppError> {
        let bytes = BASE64_STANDARD
            .decode(transaction_base64)
            .map_err(|e| AppError::Blockchain(BlockchainError::RpcError(e.to_string())))?;
        bincode::deserialize(&bytes)
            .map_err(|e| AppError::Blockchain(BlockchainError::RpcError(e.to_string())))
    }
}

impl Default for MockBlockchainClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlockchainClient for MockBlockchainClient {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Blockchain(BlockchainError::Connection(
                "Unhealthy".to_string(),
            )));
        }
        self.check_should_fail()
    }

    async fn get_balance(&self, _address: &str) -> Result<u64, AppError> {
        self.check_should_fail()?;
        Ok(*self.balance.lock().unwrap())
    }

    async fn get_latest_blockhash(&self) -> Result<String, AppError> {
        self.check_should_fail()?;
        let n = self.blockhash_calls.fetch_add(1, Ordering::Relaxed);
        let seed = u8::try_from(n % 255).unwrap_or(0) + 1;
        Ok(Hash::new_from_array([seed; 32]).to_string())
    }

    async fn get_fee_for_message(&self, _message_base64: &str) -> Result<Option<u64>, AppError> {
        self.check_should_fail()?;
        Ok(*self.fee.lock().unwrap())
    }

    async fn send_transaction(&self, transaction_base64: &str) -> Result<String, AppError> {
        self.send_calls.fetch_add(1, Ordering::Relaxed);
        self.check_should_fail()?;
        let transaction = Self::decode(transaction_base64)?;
        self.sent_blockhashes
            .lock()
            .unwrap()
            .push(transaction.message.recent_blockhash);

        if let Some(error) = self.send_failures.lock().unwrap().pop_front() {
            return Err(AppError::Blockchain(error));
        }
        if let Some(signature) = self.signature.lock().unwrap().clone() {
            return Ok(signature);
        }
        Ok(transaction
            .signatures
            .first()
            .map(|s| s.to_string())
            .unwrap_or_default())
    }

    async fn get_signature_status(
        &self,
        _signature: &str,
    ) -> Result<Option<SignatureStatusInfo>, AppError> {
        self.status_calls.fetch_add(1, Ordering::Relaxed);
        self.check_should_fail()?;
        let pending_failures = self.status_failures.load(Ordering::Relaxed);
        if pending_failures > 0 {
            self.status_failures.store(pending_failures - 1, Ordering::Relaxed);
            return Err(AppError::Blockchain(BlockchainError::Timeout(
                "status query".to_string(),
            )));
        }
        if let Some(scripted) = self.statuses.lock().unwrap().pop_front() {
            return Ok(scripted);
        }
        Ok(self.default_status.lock().unwrap().clone())
    }

    async fn get_network_stats(&self) -> Result<NetworkStats, AppError> {
        self.check_should_fail()?;
        Ok(NetworkStats {
            version: "2.0.14".to_string(),
            slot: 301_245_118,
            epoch: 712,
            tps: 2_914,
            is_online: true,
        })
    }
}

enum SignerBehavior {
    Approve,
    Reject,
    Disconnected,
    Unresponsive,
}

/// Wallet stand-in that signs with a throwaway key
pub struct MockWalletSigner {
    wallet: KeypairWallet,
    behavior: SignerBehavior,
    sign_calls: AtomicUsize,
}

impl MockWalletSigner {
    fn with_behavior(behavior: SignerBehavior) -> Self {
        let wallet = KeypairWallet::from_signing_key(&SigningKey::generate(&mut OsRng))
            .expect("generated key is a valid keypair");
        Self {
            wallet,
            behavior,
            sign_calls: AtomicUsize::new(0),
        }
    }

    /// Approves every request
    #[must_use]
    pub fn new() -> Self {
        Self::with_behavior(SignerBehavior::Approve)
    }

    /// Declines every request
    #[must_use]
    pub fn rejecting() -> Self {
        Self::with_behavior(SignerBehavior::Reject)
    }

    #[must_use]
    pub fn disconnected() -> Self {
        Self::with_behavior(SignerBehavior::Disconnected)
    }

    /// Never answers a signing request
    #[must_use]
    pub fn unresponsive() -> Self {
        Self::with_behavior(SignerBehavior::Unresponsive)
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::Relaxed)
    }
}

impl Default for MockWalletSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletSigner for MockWalletSigner {
    fn address(&self) -> Option<String> {
        match self.behavior {
            SignerBehavior::Disconnected => None,
            _ => Some(self.wallet.public_key()),
        }
    }

    async fn sign_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<Transaction, TransactionError> {
        self.sign_calls.fetch_add(1, Ordering::Relaxed);
        match self.behavior {
            SignerBehavior::Approve => self.wallet.sign_transaction(transaction).await,
            SignerBehavior::Reject => Err(TransactionError::UserRejected(
                "User rejected the request".to_string(),
            )),
            SignerBehavior::Disconnected => Err(TransactionError::WalletNotConnected),
            SignerBehavior::Unresponsive => std::future::pending().await,
        }
    }
}
