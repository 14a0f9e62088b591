//! Deposit/withdraw state machine.
//!
//! One orchestrator drives at most one attempt at a time through
//! `idle -> signing -> sending -> confirming -> confirmed | failed` and
//! publishes every transition on a watch channel.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{Mutex, watch};
use tracing::{error, info, instrument, warn};

use super::builder::{SignedTransfer, TransactionBuilder};
use super::ledger::DepositLedger;
use super::poller::{ConfirmationPoller, PollConfig};
use super::submitter::TransactionSubmitter;
use crate::domain::{
    BlockchainClient, Cluster, Deposit, DepositStatus, DepositStore, StatusMessage, TransactionError,
    TransactionIntent, TransactionKind, TransactionRecord, TransactionStatus, WalletSigner,
    is_valid_ledger_address, sol_to_lamports,
};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay before a confirmed deposit returns to idle
    pub auto_reset_delay: Duration,
    /// How long the wallet may take to approve
    pub signing_timeout: Duration,
    pub cluster: Cluster,
    pub poll: PollConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            auto_reset_delay: Duration::from_secs(2),
            signing_timeout: Duration::from_secs(120),
            cluster: Cluster::default(),
            poll: PollConfig::default(),
        }
    }
}

/// Outcome of a confirmed attempt.
#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    pub kind: TransactionKind,
    pub signature: String,
    /// Row written or updated after confirmation, if bookkeeping succeeded
    pub deposit: Option<Deposit>,
    /// Set when the transfer confirmed but the local record could not be
    /// written
    pub bookkeeping_warning: Option<String>,
}

pub struct TransactionOrchestrator {
    builder: TransactionBuilder,
    submitter: TransactionSubmitter,
    poller: ConfirmationPoller,
    ledger: DepositLedger,
    blockchain: Arc<dyn BlockchainClient>,
    wallet: Arc<dyn WalletSigner>,
    config: OrchestratorConfig,
    status: Arc<watch::Sender<TransactionStatus>>,
    attempt: Mutex<()>,
    cancel: watch::Sender<bool>,
}

impl TransactionOrchestrator {
    pub fn new(
        blockchain: Arc<dyn BlockchainClient>,
        wallet: Arc<dyn WalletSigner>,
        store: Arc<dyn DepositStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let (status, _) = watch::channel(TransactionStatus::Idle);
        let (cancel, _) = watch::channel(false);
        Self {
            builder: TransactionBuilder::new(Arc::clone(&blockchain)),
            submitter: TransactionSubmitter::new(Arc::clone(&blockchain)),
            poller: ConfirmationPoller::new(Arc::clone(&blockchain), config.poll.clone()),
            ledger: DepositLedger::new(store),
            blockchain,
            wallet,
            config,
            status: Arc::new(status),
            attempt: Mutex::new(()),
            cancel,
        }
    }

    pub fn with_defaults(
        blockchain: Arc<dyn BlockchainClient>,
        wallet: Arc<dyn WalletSigner>,
        store: Arc<dyn DepositStore>,
    ) -> Self {
        Self::new(blockchain, wallet, store, OrchestratorConfig::default())
    }

    /// Watch every status transition.
    pub fn subscribe(&self) -> watch::Receiver<TransactionStatus> {
        self.status.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn status_message(&self, kind: TransactionKind) -> StatusMessage {
        self.status().message(kind, self.config.cluster)
    }

    #[must_use]
    pub fn builder(&self) -> &TransactionBuilder {
        &self.builder
    }

    /// Deposit `amount` SOL into the pool backing `strategy_id`.
    pub async fn deposit(
        &self,
        amount: Decimal,
        pool_address: &str,
        strategy_id: Option<i32>,
    ) -> Result<TransactionReceipt, TransactionError> {
        self.execute(TransactionIntent::deposit(amount, pool_address, strategy_id))
            .await
    }

    /// Withdraw a deposit back to the connected wallet. `on_complete` runs
    /// once the withdrawal is confirmed, even if bookkeeping failed.
    /// A deposit already marked withdrawn is refused before signing.
    pub async fn withdraw<F>(
        &self,
        deposit: &Deposit,
        on_complete: F,
    ) -> Result<TransactionReceipt, TransactionError>
    where
        F: FnOnce(&TransactionReceipt) + Send,
    {
        let wallet_address = self
            .wallet
            .address()
            .ok_or(TransactionError::WalletNotConnected)?;
        if deposit.status == DepositStatus::Withdrawn {
            warn!(deposit_id = deposit.id, "Deposit already withdrawn");
            return Err(TransactionError::AlreadyWithdrawn(deposit.id));
        }
        let intent = TransactionIntent::withdraw(deposit.id, deposit.amount, wallet_address);
        let receipt = self.execute(intent).await?;
        on_complete(&receipt);
        Ok(receipt)
    }

    /// Run one attempt to a terminal state.
    ///
    /// Guard rejections return before `signing` and leave the status as it
    /// was. Every later failure ends in `failed`.
    #[instrument(skip(self, intent), fields(kind = %intent.kind, amount = %intent.amount))]
    pub async fn execute(
        &self,
        intent: TransactionIntent,
    ) -> Result<TransactionReceipt, TransactionError> {
        let _attempt = self
            .attempt
            .try_lock()
            .map_err(|_| TransactionError::AttemptInProgress)?;

        let wallet_address = self.check_guards(&intent).await?;

        self.transition(TransactionStatus::Signing);
        let signed = match self.build_and_sign(&wallet_address, &intent).await {
            Ok(signed) => signed,
            Err(e) => return Err(self.fail(e, None)),
        };

        self.transition(TransactionStatus::Sending);
        let record = match self.submitter.submit(signed).await {
            Ok(record) => record,
            Err(e) => return Err(self.fail(e, None)),
        };
        let signature = record.signature.clone();

        self.transition(TransactionStatus::Confirming(record.clone()));
        let mut cancel = self.cancel.subscribe();
        if let Err(e) = self.poller.await_confirmation(&signature, &mut cancel).await {
            return Err(self.fail(e, Some(signature)));
        }

        let receipt = self.settle(&wallet_address, &intent, signature).await;
        self.transition(TransactionStatus::Confirmed(record.clone()));

        if intent.kind == TransactionKind::Deposit {
            self.schedule_reset(record);
        }
        Ok(receipt)
    }

    /// Return to idle. Refused while an attempt is in flight.
    pub fn close(&self) -> Result<(), TransactionError> {
        if !self.status.borrow().can_close() {
            return Err(TransactionError::AttemptInProgress);
        }
        self.transition(TransactionStatus::Idle);
        Ok(())
    }

    /// Stop any confirmation polling, now and for later attempts.
    pub fn shutdown(&self) {
        self.cancel.send_replace(true);
    }

    async fn check_guards(&self, intent: &TransactionIntent) -> Result<String, TransactionError> {
        let wallet_address = self
            .wallet
            .address()
            .ok_or(TransactionError::WalletNotConnected)?;
        let lamports = sol_to_lamports(intent.amount)?;
        if !is_valid_ledger_address(&intent.counterparty_address) {
            return Err(TransactionError::InvalidAddress(format!(
                "recipient address '{}'",
                intent.counterparty_address
            )));
        }

        if intent.kind == TransactionKind::Deposit {
            let available = self
                .blockchain
                .get_balance(&wallet_address)
                .await
                .map_err(|e| TransactionError::NetworkUnavailable(e.to_string()))?;
            if available < lamports {
                warn!(
                    required_lamports = lamports,
                    available_lamports = available,
                    "Deposit exceeds wallet balance"
                );
                return Err(TransactionError::InsufficientBalance {
                    required_lamports: lamports,
                    available_lamports: available,
                });
            }
        }
        Ok(wallet_address)
    }

    async fn build_and_sign(
        &self,
        wallet_address: &str,
        intent: &TransactionIntent,
    ) -> Result<SignedTransfer, TransactionError> {
        let unsigned = self
            .builder
            .build(wallet_address, &intent.counterparty_address, intent.amount)
            .await?;

        let signed = tokio::time::timeout(
            self.config.signing_timeout,
            self.wallet.sign_transaction(unsigned.transaction),
        )
        .await
        .map_err(|_| TransactionError::UserRejected("signing timed out".to_string()))??;

        SignedTransfer::new(signed).ok_or_else(|| {
            TransactionError::UserRejected("wallet returned an unsigned transaction".to_string())
        })
    }

    /// Post-confirmation bookkeeping. Failures here never undo the
    /// confirmation; they surface as a warning on the receipt.
    async fn settle(
        &self,
        wallet_address: &str,
        intent: &TransactionIntent,
        signature: String,
    ) -> TransactionReceipt {
        let outcome = match (intent.kind, intent.source_deposit_id) {
            (TransactionKind::Deposit, _) => self
                .ledger
                .record_deposit(wallet_address, intent, &signature)
                .await
                .map_err(|e| e.to_string()),
            (TransactionKind::Withdraw, Some(deposit_id)) => self
                .ledger
                .record_withdrawal(deposit_id)
                .await
                .map_err(|e| e.to_string()),
            (TransactionKind::Withdraw, None) => {
                Err("withdrawal has no source deposit".to_string())
            }
        };

        let (deposit, bookkeeping_warning) = match outcome {
            Ok(deposit) => (Some(deposit), None),
            Err(message) => {
                error!(
                    signature = %signature,
                    kind = %intent.kind,
                    error = %message,
                    "Transfer confirmed but deposit record was not updated"
                );
                (None, Some(message))
            }
        };

        TransactionReceipt {
            kind: intent.kind,
            signature,
            deposit,
            bookkeeping_warning,
        }
    }

    fn schedule_reset(&self, record: TransactionRecord) {
        let status = Arc::clone(&self.status);
        let delay = self.config.auto_reset_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let reset = status.send_if_modified(|current| match current {
                TransactionStatus::Confirmed(confirmed) if *confirmed == record => {
                    *current = TransactionStatus::Idle;
                    true
                }
                _ => false,
            });
            if reset {
                info!(signature = %record.signature, "Deposit flow reset to idle");
            }
        });
    }

    fn fail(&self, error: TransactionError, signature: Option<String>) -> TransactionError {
        warn!(error = %error, signature = ?signature, "Transaction attempt failed");
        self.transition(TransactionStatus::Failed {
            error: error.clone(),
            signature,
        });
        error
    }

    fn transition(&self, next: TransactionStatus) {
        let to = next.as_str();
        let previous = self.status.send_replace(next);
        info!(from = previous.as_str(), to, "Transaction status changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockBlockchainClient, MockDatabaseClient, MockWalletSigner};
    use rust_decimal_macros::dec;

    const POOL: &str = "DRpbCBMxVnDK7maPM5tGv6MvB3v1sRMC86PZ8okm21hy";

    fn orchestrator(
        blockchain: &Arc<MockBlockchainClient>,
        wallet: &Arc<MockWalletSigner>,
        db: &Arc<MockDatabaseClient>,
    ) -> TransactionOrchestrator {
        TransactionOrchestrator::with_defaults(blockchain.clone(), wallet.clone(), db.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_deposit_reaches_confirmed() {
        let blockchain = Arc::new(MockBlockchainClient::new());
        let wallet = Arc::new(MockWalletSigner::new());
        let db = Arc::new(MockDatabaseClient::new());
        let orch = orchestrator(&blockchain, &wallet, &db);

        let receipt = orch.deposit(dec!(1.5), POOL, Some(1)).await.unwrap();
        assert_eq!(receipt.kind, TransactionKind::Deposit);
        assert!(receipt.bookkeeping_warning.is_none());
        assert!(matches!(orch.status(), TransactionStatus::Confirmed(r) if r.signature == receipt.signature));
        assert_eq!(
            orch.status_message(TransactionKind::Deposit).title,
            "Transaction Confirmed!"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_wallet_never_leaves_idle() {
        let blockchain = Arc::new(MockBlockchainClient::new());
        let wallet = Arc::new(MockWalletSigner::disconnected());
        let db = Arc::new(MockDatabaseClient::new());
        let orch = orchestrator(&blockchain, &wallet, &db);

        let result = orch.deposit(dec!(1), POOL, None).await;
        assert_eq!(result.unwrap_err(), TransactionError::WalletNotConnected);
        assert_eq!(orch.status(), TransactionStatus::Idle);
        assert_eq!(blockchain.blockhash_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_pool_address_is_a_guard_rejection() {
        let blockchain = Arc::new(MockBlockchainClient::new());
        let wallet = Arc::new(MockWalletSigner::new());
        let db = Arc::new(MockDatabaseClient::new());
        let orch = orchestrator(&blockchain, &wallet, &db);

        let err = orch.deposit(dec!(1), "pool", None).await.unwrap_err();
        assert!(matches!(err, TransactionError::InvalidAddress(_)));
        assert!(err.is_guard_rejection());
        assert_eq!(orch.status(), TransactionStatus::Idle);
        assert_eq!(wallet.sign_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_failure_keeps_signature() {
        let blockchain = Arc::new(MockBlockchainClient::new());
        blockchain.push_statuses(vec![Some(crate::domain::SignatureStatusInfo {
            confirmation_status: None,
            err: Some(serde_json::json!("AccountInUse")),
        })]);
        let wallet = Arc::new(MockWalletSigner::new());
        let db = Arc::new(MockDatabaseClient::new());
        let orch = orchestrator(&blockchain, &wallet, &db);

        let err = orch.deposit(dec!(0.5), POOL, None).await.unwrap_err();
        assert!(matches!(err, TransactionError::ConfirmationFailed(_)));
        let status = orch.status();
        assert!(status.signature().is_some());
        assert_eq!(
            status.message(TransactionKind::Deposit, Cluster::Devnet).title,
            "Transaction Not Confirmed"
        );
        assert!(db.deposits().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signing_timeout() {
        let blockchain = Arc::new(MockBlockchainClient::new());
        let wallet = Arc::new(MockWalletSigner::unresponsive());
        let db = Arc::new(MockDatabaseClient::new());
        let orch = orchestrator(&blockchain, &wallet, &db);

        let err = orch.deposit(dec!(1), POOL, None).await.unwrap_err();
        assert_eq!(
            err,
            TransactionError::UserRejected("signing timed out".to_string())
        );
        assert_eq!(blockchain.send_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_withdraw_invokes_completion_callback() {
        let blockchain = Arc::new(MockBlockchainClient::new());
        let wallet = Arc::new(MockWalletSigner::new());
        let db = Arc::new(MockDatabaseClient::new());
        let wallet_address = wallet.address().unwrap();
        let deposit = db.seed_deposit(&wallet_address, dec!(2), DepositStatus::Confirmed);
        let orch = orchestrator(&blockchain, &wallet, &db);

        let mut completed = None;
        let receipt = orch
            .withdraw(&deposit, |r| completed = Some(r.signature.clone()))
            .await
            .unwrap();

        assert_eq!(completed, Some(receipt.signature.clone()));
        assert_eq!(
            receipt.deposit.map(|d| d.status),
            Some(DepositStatus::Withdrawn)
        );
        // withdrawals do not auto-reset
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(matches!(orch.status(), TransactionStatus::Confirmed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_withdrawn_deposit_is_refused_before_signing() {
        let blockchain = Arc::new(MockBlockchainClient::new());
        let wallet = Arc::new(MockWalletSigner::new());
        let db = Arc::new(MockDatabaseClient::new());
        let wallet_address = wallet.address().unwrap();
        let deposit = db.seed_deposit(&wallet_address, dec!(2), DepositStatus::Withdrawn);
        let orch = orchestrator(&blockchain, &wallet, &db);

        let mut completed = false;
        let err = orch
            .withdraw(&deposit, |_| completed = true)
            .await
            .unwrap_err();

        assert_eq!(err, TransactionError::AlreadyWithdrawn(deposit.id));
        assert!(!completed);
        assert_eq!(orch.status(), TransactionStatus::Idle);
        assert_eq!(wallet.sign_calls(), 0);
        assert_eq!(blockchain.send_calls(), 0);
        assert_eq!(db.update_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_polling() {
        let blockchain = Arc::new(MockBlockchainClient::new());
        let wallet = Arc::new(MockWalletSigner::new());
        let db = Arc::new(MockDatabaseClient::new());
        let orch = orchestrator(&blockchain, &wallet, &db);

        orch.shutdown();
        let err = orch.deposit(dec!(1), POOL, None).await.unwrap_err();
        assert!(matches!(err, TransactionError::ConfirmationFailed(msg) if msg.contains("cancelled")));
        assert!(db.deposits().is_empty());
    }
}
