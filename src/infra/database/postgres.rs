//! PostgreSQL database client implementation.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use crate::domain::{
    AppError, DatabaseClient, DatabaseError, Deposit, DepositStatus, DepositStore,
    NewDeposit, NewRebalanceEvent, RebalanceEvent, Strategy, StrategyUpdate,
};

const DEPOSIT_COLUMNS: &str =
    "id, wallet_address, strategy_id, amount, token_symbol, tx_hash, status, timestamp";

const STRATEGY_COLUMNS: &str =
    "id, name, protocol, apy, tvl, risk_score, is_active, last_updated";

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL database client with connection pooling
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client with default configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Migration(e.to_string())))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_deposit(row: &sqlx::postgres::PgRow) -> Result<Deposit, AppError> {
        let status_str: String = row.get("status");
        let status = status_str
            .parse::<DepositStatus>()
            .map_err(|e| AppError::Database(DatabaseError::Query(e)))?;

        Ok(Deposit {
            id: row.get("id"),
            wallet_address: row.get("wallet_address"),
            strategy_id: row.get("strategy_id"),
            amount: row.get("amount"),
            token_symbol: row.get("token_symbol"),
            tx_hash: row.get("tx_hash"),
            status,
            timestamp: row.get("timestamp"),
        })
    }

    fn row_to_strategy(row: &sqlx::postgres::PgRow) -> Strategy {
        Strategy {
            id: row.get("id"),
            name: row.get("name"),
            protocol: row.get("protocol"),
            apy: row.get("apy"),
            tvl: row.get("tvl"),
            risk_score: row.get("risk_score"),
            is_active: row.get("is_active"),
            last_updated: row.get("last_updated"),
        }
    }

    fn row_to_rebalance_event(row: &sqlx::postgres::PgRow) -> RebalanceEvent {
        RebalanceEvent {
            id: row.get("id"),
            wallet_address: row.get("wallet_address"),
            from_strategy_id: row.get("from_strategy_id"),
            to_strategy_id: row.get("to_strategy_id"),
            amount: row.get("amount"),
            reason: row.get("reason"),
            timestamp: row.get("timestamp"),
        }
    }
}

#[async_trait]
impl DepositStore for PostgresClient {
    #[instrument(skip(self, deposit), fields(wallet = %deposit.wallet_address, amount = %deposit.amount))]
    async fn create_deposit(&self, deposit: &NewDeposit) -> Result<Deposit, AppError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO deposits (wallet_address, strategy_id, amount, token_symbol, tx_hash, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {DEPOSIT_COLUMNS}
            "#
        ))
        .bind(&deposit.wallet_address)
        .bind(deposit.strategy_id)
        .bind(deposit.amount)
        .bind(&deposit.token_symbol)
        .bind(&deposit.tx_hash)
        .bind(deposit.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        let created = Self::row_to_deposit(&row)?;
        info!(deposit_id = created.id, "Deposit recorded");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn update_deposit_status(
        &self,
        id: i32,
        status: DepositStatus,
    ) -> Result<Deposit, AppError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE deposits SET status = $2
            WHERE id = $1
            RETURNING {DEPOSIT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        match row {
            Some(row) => Self::row_to_deposit(&row),
            None => Err(AppError::Database(DatabaseError::NotFound(format!(
                "deposit {}",
                id
            )))),
        }
    }

    #[instrument(skip(self))]
    async fn list_active_deposits(&self, wallet_address: &str) -> Result<Vec<Deposit>, AppError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DEPOSIT_COLUMNS}
            FROM deposits
            WHERE wallet_address = $1 AND status <> 'withdrawn'
            ORDER BY timestamp DESC, id DESC
            "#
        ))
        .bind(wallet_address)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        rows.iter().map(Self::row_to_deposit).collect()
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_strategies_by_apy(&self) -> Result<Vec<Strategy>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {STRATEGY_COLUMNS} FROM strategies ORDER BY apy DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        Ok(rows.iter().map(Self::row_to_strategy).collect())
    }

    #[instrument(skip(self))]
    async fn get_strategy(&self, id: i32) -> Result<Option<Strategy>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {STRATEGY_COLUMNS} FROM strategies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        Ok(row.as_ref().map(Self::row_to_strategy))
    }

    #[instrument(skip(self, update))]
    async fn update_strategy(
        &self,
        id: i32,
        update: &StrategyUpdate,
    ) -> Result<Strategy, AppError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE strategies SET
                name = COALESCE($2, name),
                protocol = COALESCE($3, protocol),
                apy = COALESCE($4, apy),
                tvl = COALESCE($5, tvl),
                risk_score = COALESCE($6, risk_score),
                is_active = COALESCE($7, is_active),
                last_updated = NOW()
            WHERE id = $1
            RETURNING {STRATEGY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.protocol)
        .bind(update.apy)
        .bind(update.tvl)
        .bind(update.risk_score)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        row.as_ref().map(Self::row_to_strategy).ok_or_else(|| {
            AppError::Database(DatabaseError::NotFound(format!("strategy {}", id)))
        })
    }

    #[instrument(skip(self, event), fields(wallet = %event.wallet_address))]
    async fn log_rebalance(&self, event: &NewRebalanceEvent) -> Result<RebalanceEvent, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO rebalance_events (wallet_address, from_strategy_id, to_strategy_id, amount, reason)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, wallet_address, from_strategy_id, to_strategy_id, amount, reason, timestamp
            "#,
        )
        .bind(&event.wallet_address)
        .bind(event.from_strategy_id)
        .bind(event.to_strategy_id)
        .bind(event.amount)
        .bind(&event.reason)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::from(e)))?;

        Ok(Self::row_to_rebalance_event(&row))
    }
}
