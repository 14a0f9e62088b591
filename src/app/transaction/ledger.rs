//! Bookkeeping that follows an on-chain confirmation.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::domain::{AppError, Deposit, DepositStatus, DepositStore, NewDeposit, TransactionIntent};

pub struct DepositLedger {
    store: Arc<dyn DepositStore>,
}

impl DepositLedger {
    #[must_use]
    pub fn new(store: Arc<dyn DepositStore>) -> Self {
        Self { store }
    }

    /// Record a confirmed deposit with the full wallet address and the
    /// signature as its transaction hash.
    #[instrument(skip(self, intent), fields(amount = %intent.amount))]
    pub async fn record_deposit(
        &self,
        wallet_address: &str,
        intent: &TransactionIntent,
        signature: &str,
    ) -> Result<Deposit, AppError> {
        let new_deposit = NewDeposit::confirmed(
            wallet_address.to_string(),
            intent.strategy_id,
            intent.amount,
            signature.to_string(),
        );
        let deposit = self.store.create_deposit(&new_deposit).await?;
        info!(deposit_id = deposit.id, "Deposit recorded");
        Ok(deposit)
    }

    /// Mark a deposit withdrawn and drop its owner's cached listing.
    /// Repeating this for an already withdrawn deposit changes nothing.
    #[instrument(skip(self))]
    pub async fn record_withdrawal(&self, deposit_id: i32) -> Result<Deposit, AppError> {
        let deposit = self
            .store
            .update_deposit_status(deposit_id, DepositStatus::Withdrawn)
            .await?;
        self.store
            .invalidate_cached_listing(&deposit.wallet_address)
            .await;
        info!(deposit_id, "Deposit marked withdrawn");
        Ok(deposit)
    }

    #[instrument(skip(self))]
    pub async fn active_deposits(&self, wallet_address: &str) -> Result<Vec<Deposit>, AppError> {
        self.store.list_active_deposits(wallet_address).await
    }
}
