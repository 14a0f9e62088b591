//! Error types for the application.

use thiserror::Error;

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Blockchain error: {0}")]
    Blockchain(#[from] BlockchainError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Connection(err.to_string())
            }
            sqlx::Error::Database(db_err) => match db_err.kind() {
                sqlx::error::ErrorKind::UniqueViolation => Self::Duplicate(err.to_string()),
                _ => Self::Query(err.to_string()),
            },
            _ => Self::Query(err.to_string()),
        }
    }
}

/// Ledger RPC gateway errors
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl BlockchainError {
    /// Transport-level failures that are worth another attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }
}

/// Input validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid deposit status: {0}")]
    InvalidStatus(String),

    #[error("{0}")]
    Multiple(String),
}

impl ValidationError {
    /// Name of the offending field, when the error is tied to one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField(field) => Some(field),
            Self::InvalidField { field, .. } => Some(field),
            Self::InvalidStatus(_) => Some("status"),
            Self::Multiple(_) => None,
        }
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors
            .field_errors()
            .into_iter()
            .next()
            .and_then(|(field, errs)| errs.first().map(|e| (field.to_string(), e.clone())));

        match first {
            Some((field, err)) => Self::InvalidField {
                field: json_field_name(&field),
                message: err
                    .message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string()),
            },
            None => Self::Multiple(errors.to_string()),
        }
    }
}

/// Validator reports struct field names; the API speaks camelCase.
fn json_field_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for c in field.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

/// Failure kinds of a single deposit/withdraw attempt.
///
/// Every variant is terminal for the attempt it occurred in.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Transaction rejected in wallet: {0}")]
    UserRejected(String),

    #[error("Insufficient balance: need {required_lamports} lamports, wallet holds {available_lamports}")]
    InsufficientBalance {
        required_lamports: u64,
        available_lamports: u64,
    },

    #[error("Broadcast rejected: {0}")]
    BroadcastRejected(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Confirmation failed: {0}")]
    ConfirmationFailed(String),

    #[error("Another transaction is already in progress")]
    AttemptInProgress,

    #[error("Deposit #{0} is already withdrawn")]
    AlreadyWithdrawn(i32),
}

impl TransactionError {
    /// Guard failures are raised before the state machine leaves `idle`.
    #[must_use]
    pub fn is_guard_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_)
                | Self::InvalidAmount(_)
                | Self::WalletNotConnected
                | Self::InsufficientBalance { .. }
                | Self::AttemptInProgress
                | Self::AlreadyWithdrawn(_)
        )
    }

    /// Whether a fresh attempt (starting again from build) may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkUnavailable(_))
    }
}

impl From<AppError> for TransactionError {
    /// Collapses gateway failures onto the flow taxonomy.
    fn from(err: AppError) -> Self {
        match err {
            AppError::Blockchain(BlockchainError::InsufficientFunds) => {
                Self::BroadcastRejected("insufficient funds".to_string())
            }
            AppError::Blockchain(BlockchainError::TransactionFailed(msg)) => {
                Self::BroadcastRejected(msg)
            }
            other => Self::NetworkUnavailable(other.to_string()),
        }
    }
}
