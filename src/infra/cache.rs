//! Read-through cache for per-wallet deposit listings.

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::domain::{AppError, Deposit, DepositStatus, DepositStore, NewDeposit};

#[derive(Debug, Clone)]
pub struct DepositCacheConfig {
    /// Number of wallets kept
    pub max_capacity: u64,
    pub time_to_live: Duration,
}

impl Default for DepositCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1_000,
            time_to_live: Duration::from_secs(30),
        }
    }
}

/// Wraps any [`DepositStore`] and caches `list_active_deposits` by wallet.
///
/// Writes made through this store drop the affected wallet's entry.
pub struct CachedDepositStore {
    inner: Arc<dyn DepositStore>,
    listings: Cache<String, Vec<Deposit>>,
}

impl CachedDepositStore {
    #[must_use]
    pub fn new(inner: Arc<dyn DepositStore>, config: DepositCacheConfig) -> Self {
        let listings = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.time_to_live)
            .build();
        Self { inner, listings }
    }

    #[must_use]
    pub fn with_defaults(inner: Arc<dyn DepositStore>) -> Self {
        Self::new(inner, DepositCacheConfig::default())
    }

    /// Whether a listing for the wallet is currently cached.
    #[must_use]
    pub fn is_cached(&self, wallet_address: &str) -> bool {
        self.listings.contains_key(wallet_address)
    }
}

#[async_trait]
impl DepositStore for CachedDepositStore {
    async fn create_deposit(&self, deposit: &NewDeposit) -> Result<Deposit, AppError> {
        let created = self.inner.create_deposit(deposit).await?;
        self.listings.invalidate(&created.wallet_address).await;
        Ok(created)
    }

    async fn update_deposit_status(
        &self,
        id: i32,
        status: DepositStatus,
    ) -> Result<Deposit, AppError> {
        let updated = self.inner.update_deposit_status(id, status).await?;
        self.listings.invalidate(&updated.wallet_address).await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn list_active_deposits(&self, wallet_address: &str) -> Result<Vec<Deposit>, AppError> {
        if let Some(cached) = self.listings.get(wallet_address).await {
            debug!(wallet = %wallet_address, "Deposit listing cache hit");
            return Ok(cached);
        }

        let deposits = self.inner.list_active_deposits(wallet_address).await?;
        self.listings
            .insert(wallet_address.to_string(), deposits.clone())
            .await;
        Ok(deposits)
    }

    async fn invalidate_cached_listing(&self, wallet_address: &str) {
        debug!(wallet = %wallet_address, "Invalidating deposit listing");
        self.listings.invalidate(wallet_address).await;
    }
}
