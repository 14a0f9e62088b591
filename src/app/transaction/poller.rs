//! Confirmation polling with bounded exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::domain::{BlockchainClient, ConfirmationStatus, TransactionError};

#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Wait before the first status query
    pub settle_delay: Duration,
    pub initial_interval: Duration,
    pub backoff_multiplier: u32,
    pub max_interval: Duration,
    /// Total polling budget after the settle delay; zero means a single check
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            initial_interval: Duration::from_millis(500),
            backoff_multiplier: 2,
            max_interval: Duration::from_secs(4),
            max_wait: Duration::from_secs(30),
        }
    }
}

impl PollConfig {
    /// One query after the settle delay; still pending counts as failure.
    #[must_use]
    pub fn single_check(settle_delay: Duration) -> Self {
        Self {
            settle_delay,
            max_wait: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Stand-in deadline for budgets too large to add to the clock
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(now: Instant, budget: Duration) -> Instant {
    now.checked_add(budget).unwrap_or_else(|| now + FAR_FUTURE)
}

pub struct ConfirmationPoller {
    blockchain: Arc<dyn BlockchainClient>,
    config: PollConfig,
}

/// Resolves once `cancel` flips to true; never resolves if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let sender_dropped = cancel.wait_for(|stop| *stop).await.is_err();
    if sender_dropped {
        std::future::pending::<()>().await;
    }
}

impl ConfirmationPoller {
    #[must_use]
    pub fn new(blockchain: Arc<dyn BlockchainClient>, config: PollConfig) -> Self {
        Self { blockchain, config }
    }

    #[must_use]
    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    fn next_interval(&self, interval: Duration) -> Duration {
        interval
            .saturating_mul(self.config.backoff_multiplier)
            .min(self.config.max_interval)
    }

    /// Single status query.
    #[instrument(skip(self))]
    pub async fn poll_status(&self, signature: &str) -> Result<ConfirmationStatus, TransactionError> {
        match self.blockchain.get_signature_status(signature).await {
            Ok(Some(info)) => Ok(info.classify()),
            Ok(None) => Ok(ConfirmationStatus::Pending),
            Err(e) => Err(TransactionError::NetworkUnavailable(e.to_string())),
        }
    }

    async fn pause(
        &self,
        duration: Duration,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<(), TransactionError> {
        tokio::select! {
            biased;
            _ = cancelled(cancel) => Err(TransactionError::ConfirmationFailed(
                "confirmation polling cancelled".to_string(),
            )),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Poll until the signature is confirmed, fails on-chain, the budget runs
    /// out, or `cancel` is set.
    #[instrument(skip(self, cancel))]
    pub async fn await_confirmation(
        &self,
        signature: &str,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<(), TransactionError> {
        self.pause(self.config.settle_delay, cancel).await?;

        let deadline = deadline_after(Instant::now(), self.config.max_wait);
        let mut interval = self.config.initial_interval;
        let mut checks = 0u32;

        loop {
            checks += 1;
            let last_seen = match self.poll_status(signature).await {
                Ok(ConfirmationStatus::Confirmed) => {
                    info!(signature = %signature, checks, "Transaction confirmed");
                    return Ok(());
                }
                Ok(ConfirmationStatus::Failed(reason)) => {
                    warn!(signature = %signature, reason = %reason, "Transaction failed on-chain");
                    return Err(TransactionError::ConfirmationFailed(reason));
                }
                Ok(ConfirmationStatus::Pending) => "still pending".to_string(),
                // A flaky status query is not a verdict on the transaction
                Err(e) => {
                    warn!(signature = %signature, error = %e, "Status query failed");
                    e.to_string()
                }
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(TransactionError::ConfirmationFailed(format!(
                    "not confirmed after {} check(s): {}",
                    checks, last_seen
                )));
            }

            let wait = interval.min(deadline - now);
            debug!(signature = %signature, wait_ms = wait.as_millis() as u64, "Waiting before next status check");
            self.pause(wait, cancel).await?;
            interval = self.next_interval(interval);
        }
    }
}
