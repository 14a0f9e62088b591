//! Domain layer containing core business types, traits, and error definitions.

pub mod error;
pub mod traits;
pub mod transaction;
pub mod types;

pub use error::{
    AppError, BlockchainError, ConfigError, DatabaseError, TransactionError, ValidationError,
};
pub use traits::{BlockchainClient, DatabaseClient, DepositStore, WalletSigner};
pub use transaction::{
    Cluster, CommitmentLevel, ConfirmationStatus, LAMPORTS_PER_SOL, SignatureStatusInfo,
    StatusMessage, TransactionIntent, TransactionKind, TransactionRecord, TransactionStatus,
    explorer_url, lamports_to_sol, sol_to_lamports,
};
pub use types::{
    ActivityItem, Deposit, DepositStatus, ErrorResponse, HealthResponse, HealthStatus, IdQuery,
    NetworkStats, NewDeposit, NewRebalanceEvent, RebalanceEvent, RebalanceRequest,
    RebalanceResponse, Strategy, StrategyUpdate, UpdateDepositStatusRequest, WalletQuery,
    is_valid_ledger_address,
};
