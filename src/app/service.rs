//! Application service layer with graceful degradation.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    ActivityItem, AppError, BlockchainClient, DatabaseClient, Deposit, DepositStatus,
    HealthResponse, HealthStatus, NetworkStats, NewDeposit, NewRebalanceEvent, RebalanceResponse,
    Strategy, StrategyUpdate, ValidationError,
};

/// Application service containing business logic
pub struct AppService {
    db_client: Arc<dyn DatabaseClient>,
    blockchain_client: Arc<dyn BlockchainClient>,
}

fn require_wallet(wallet_address: Option<&str>) -> Result<&str, AppError> {
    match wallet_address.map(str::trim) {
        Some(address) if !address.is_empty() => Ok(address),
        _ => Err(AppError::Validation(ValidationError::MissingField(
            "walletAddress".to_string(),
        ))),
    }
}

fn require_id(id: Option<i32>) -> Result<i32, AppError> {
    id.ok_or_else(|| AppError::Validation(ValidationError::MissingField("id".to_string())))
}

/// Characters `[start, end)` of a blockhash, shortened for display.
fn short_hash(blockhash: &str, start: usize, end: usize) -> String {
    let slice: String = blockhash.chars().skip(start).take(end - start).collect();
    format!("...{}", slice)
}

impl AppService {
    #[must_use]
    pub fn new(
        db_client: Arc<dyn DatabaseClient>,
        blockchain_client: Arc<dyn BlockchainClient>,
    ) -> Self {
        Self {
            db_client,
            blockchain_client,
        }
    }

    /// Active deposits of a wallet, newest first.
    #[instrument(skip(self))]
    pub async fn list_deposits(&self, wallet_address: Option<&str>) -> Result<Vec<Deposit>, AppError> {
        let wallet_address = require_wallet(wallet_address)?;
        self.db_client.list_active_deposits(wallet_address).await
    }

    #[instrument(skip(self, deposit), fields(wallet = %deposit.wallet_address, amount = %deposit.amount))]
    pub async fn create_deposit(&self, deposit: &NewDeposit) -> Result<Deposit, AppError> {
        deposit.validate().map_err(|e| {
            warn!(error = %e, "Deposit validation failed");
            AppError::Validation(ValidationError::from(e))
        })?;

        let created = self.db_client.create_deposit(deposit).await?;
        info!(deposit_id = created.id, status = %created.status, "Deposit created");
        Ok(created)
    }

    /// Parse and apply a status change. Unknown status strings are rejected
    /// before the store is touched.
    #[instrument(skip(self))]
    pub async fn update_deposit_status(
        &self,
        id: Option<i32>,
        raw_status: &str,
    ) -> Result<Deposit, AppError> {
        let id = require_id(id)?;
        let status: DepositStatus = raw_status
            .parse()
            .map_err(|_| AppError::Validation(ValidationError::InvalidStatus(raw_status.to_string())))?;

        let updated = self.db_client.update_deposit_status(id, status).await?;
        info!(deposit_id = id, status = %status, "Deposit status updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn list_strategies(&self) -> Result<Vec<Strategy>, AppError> {
        self.db_client.list_strategies_by_apy().await
    }

    #[instrument(skip(self, update))]
    pub async fn update_strategy(
        &self,
        id: Option<i32>,
        update: &StrategyUpdate,
    ) -> Result<Strategy, AppError> {
        let id = require_id(id)?;
        update.validate().map_err(|e| {
            warn!(strategy_id = id, error = %e, "Strategy update validation failed");
            AppError::Validation(ValidationError::from(e))
        })?;

        let strategy = self.db_client.update_strategy(id, update).await?;
        info!(strategy_id = id, apy = %strategy.apy, "Strategy updated");
        Ok(strategy)
    }

    /// Log a simulated move of every active deposit that is not already in
    /// the highest-APY active strategy. No funds move.
    #[instrument(skip(self))]
    pub async fn execute_rebalance(&self, wallet_address: &str) -> Result<RebalanceResponse, AppError> {
        let wallet_address = require_wallet(Some(wallet_address))?;

        let strategies: Vec<Strategy> = self
            .db_client
            .list_strategies_by_apy()
            .await?
            .into_iter()
            .filter(|s| s.is_active)
            .collect();
        let deposits = self.db_client.list_active_deposits(wallet_address).await?;

        let best = match strategies.first() {
            Some(best) if strategies.len() >= 2 && !deposits.is_empty() => best,
            _ => {
                info!(
                    strategies = strategies.len(),
                    deposits = deposits.len(),
                    "Not enough data to rebalance"
                );
                return Ok(RebalanceResponse {
                    message: "Not enough data to rebalance".to_string(),
                    events: Vec::new(),
                });
            }
        };

        let mut events = Vec::new();
        for deposit in deposits.iter().filter(|d| d.strategy_id != Some(best.id)) {
            let event = NewRebalanceEvent {
                wallet_address: wallet_address.to_string(),
                from_strategy_id: deposit.strategy_id,
                to_strategy_id: Some(best.id),
                amount: deposit.amount,
                reason: Some(format!(
                    "Moving to {} for higher APY ({}%)",
                    best.name, best.apy
                )),
            };
            events.push(self.db_client.log_rebalance(&event).await?);
        }

        info!(events = events.len(), target = %best.name, "Rebalance complete");
        Ok(RebalanceResponse {
            message: "Rebalancing optimization complete".to_string(),
            events,
        })
    }

    /// Network snapshot; an unreachable RPC reports the network offline.
    #[instrument(skip(self))]
    pub async fn network_stats(&self) -> NetworkStats {
        match self.blockchain_client.get_network_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Network stats unavailable");
                NetworkStats::offline()
            }
        }
    }

    /// Dashboard activity feed keyed off the latest blockhash.
    #[instrument(skip(self))]
    pub async fn activity_feed(&self) -> Result<Vec<ActivityItem>, AppError> {
        let blockhash = self.blockchain_client.get_latest_blockhash().await?;
        let now = Utc::now();

        let item = |id: u32, kind: &str, protocol: &str, amount: &str, hash: String| ActivityItem {
            id,
            r#type: kind.to_string(),
            protocol: protocol.to_string(),
            amount: amount.to_string(),
            time: now,
            hash,
        };

        Ok(vec![
            item(1, "SWAP", "Raydium", "Swap 10 SOL → USDC", short_hash(&blockhash, 0, 8)),
            item(2, "DEPOSIT", "Orca", "Deposit 500 USDC", short_hash(&blockhash, 10, 18)),
            item(3, "LIQUIDATION", "Solend", "Liquidated 2.5 SOL", short_hash(&blockhash, 20, 28)),
        ])
    }

    /// Perform health check on all dependencies
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let db_health = match self.db_client.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        };
        let blockchain_health = match self.blockchain_client.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy,
        };
        HealthResponse::new(db_health, blockchain_health)
    }
}
