//! Domain types with validation support.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError as FieldError};

/// Lifecycle status of a persisted deposit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    /// Recorded but not yet seen on-chain
    #[default]
    Pending,
    /// Transfer confirmed on-chain
    Confirmed,
    /// Transfer failed
    Failed,
    /// Position closed by the withdraw flow
    Withdrawn,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Withdrawn => "withdrawn",
        }
    }

    /// Active deposits are everything except withdrawn ones.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Withdrawn)
    }
}

impl FromStr for DepositStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "failed" => Ok(Self::Failed),
            "withdrawn" => Ok(Self::Withdrawn),
            _ => Err(format!("Invalid deposit status: {}", s)),
        }
    }
}

impl std::fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's recorded position against a strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    pub id: i32,
    /// Full base58 wallet address of the depositor
    #[schema(example = "HvwC9QSAzwEXkUkwqNNGhfNHoVqXJYfPvPZfQvJmHWcF")]
    pub wallet_address: String,
    pub strategy_id: Option<i32>,
    /// Amount in major units, serialized as a decimal string
    #[schema(value_type = String, example = "1.5")]
    pub amount: Decimal,
    #[schema(example = "SOL")]
    pub token_symbol: String,
    /// Signature of the confirming transaction
    pub tx_hash: Option<String>,
    pub status: DepositStatus,
    pub timestamp: DateTime<Utc>,
}

/// Insert payload for a deposit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewDeposit {
    #[validate(custom(function = "validate_ledger_address"))]
    #[schema(example = "HvwC9QSAzwEXkUkwqNNGhfNHoVqXJYfPvPZfQvJmHWcF")]
    pub wallet_address: String,
    #[serde(default)]
    pub strategy_id: Option<i32>,
    #[validate(custom(function = "validate_positive_amount"))]
    #[schema(value_type = String, example = "1.5")]
    pub amount: Decimal,
    #[validate(length(min = 1, max = 16, message = "Token symbol is required"))]
    #[schema(example = "SOL")]
    pub token_symbol: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub status: DepositStatus,
}

impl NewDeposit {
    /// A confirmed SOL deposit anchored to an on-chain signature.
    #[must_use]
    pub fn confirmed(
        wallet_address: String,
        strategy_id: Option<i32>,
        amount: Decimal,
        signature: String,
    ) -> Self {
        Self {
            wallet_address,
            strategy_id,
            amount,
            token_symbol: "SOL".to_string(),
            tx_hash: Some(signature),
            status: DepositStatus::Confirmed,
        }
    }
}

/// Body of `PATCH /deposits`. The raw status is parsed by the service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateDepositStatusRequest {
    #[schema(example = "withdrawn")]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct WalletQuery {
    /// Base58 wallet address
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct IdQuery {
    pub id: Option<i32>,
}

/// A yield-bearing pool/protocol record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: i32,
    #[schema(example = "SOL-USDC LP")]
    pub name: String,
    #[schema(example = "Raydium")]
    pub protocol: String,
    #[schema(value_type = String, example = "12.50")]
    pub apy: Decimal,
    #[schema(value_type = String, example = "1500000.00")]
    pub tvl: Decimal,
    /// 1 (lowest) to 10 (highest)
    pub risk_score: i32,
    pub is_active: bool,
    pub last_updated: DateTime<Utc>,
}

/// Partial strategy update; absent fields keep their stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StrategyUpdate {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Protocol cannot be empty"))]
    pub protocol: Option<String>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub apy: Option<Decimal>,
    #[validate(custom(function = "validate_non_negative"))]
    #[schema(value_type = Option<String>)]
    pub tvl: Option<Decimal>,
    #[validate(range(min = 1, max = 10, message = "Risk score must be between 1 and 10"))]
    pub risk_score: Option<i32>,
    pub is_active: Option<bool>,
}

/// Append-only log entry of a simulated move between strategies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceEvent {
    pub id: i32,
    pub wallet_address: String,
    pub from_strategy_id: Option<i32>,
    pub to_strategy_id: Option<i32>,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRebalanceEvent {
    pub wallet_address: String,
    pub from_strategy_id: Option<i32>,
    pub to_strategy_id: Option<i32>,
    pub amount: Decimal,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceRequest {
    #[serde(default)]
    pub wallet_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct RebalanceResponse {
    pub message: String,
    pub events: Vec<RebalanceEvent>,
}

/// Snapshot of the ledger network, as shown on the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    #[schema(example = "2.0.14")]
    pub version: String,
    pub slot: u64,
    pub epoch: u64,
    pub tps: u64,
    pub is_online: bool,
}

impl NetworkStats {
    /// Reported when the RPC endpoint cannot be reached.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            version: "Unknown".to_string(),
            slot: 0,
            epoch: 0,
            tps: 0,
            is_online: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ActivityItem {
    pub id: u32,
    #[schema(example = "SWAP")]
    pub r#type: String,
    #[schema(example = "Raydium")]
    pub protocol: String,
    #[schema(example = "Swap 10 SOL → USDC")]
    pub amount: String,
    pub time: DateTime<Utc>,
    #[schema(example = "...4sGjMW1s")]
    pub hash: String,
}

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub database: HealthStatus,
    pub blockchain: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    #[must_use]
    pub fn new(database: HealthStatus, blockchain: HealthStatus) -> Self {
        // RPC loss only degrades the service.
        let status = match (database, blockchain) {
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        };
        Self {
            status,
            database,
            blockchain,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// API error response body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error kind
    #[schema(example = "validation_error")]
    pub r#type: String,
    pub message: String,
    /// Offending request field, for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Whether `address` parses as a ledger public key.
#[must_use]
pub fn is_valid_ledger_address(address: &str) -> bool {
    Pubkey::from_str(address).is_ok()
}

fn validate_ledger_address(address: &str) -> Result<(), FieldError> {
    if is_valid_ledger_address(address) {
        Ok(())
    } else {
        let mut err = FieldError::new("invalid_address");
        err.message = Some("Invalid Solana address".into());
        Err(err)
    }
}

fn validate_positive_amount(amount: &Decimal) -> Result<(), FieldError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        let mut err = FieldError::new("non_positive");
        err.message = Some("Amount must be greater than zero".into());
        Err(err)
    }
}

fn validate_non_negative(value: &Decimal) -> Result<(), FieldError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = FieldError::new("negative");
        err.message = Some("Value cannot be negative".into());
        Err(err)
    } else {
        Ok(())
    }
}
