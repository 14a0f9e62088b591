//! Application layer containing business logic, shared state and the
//! client-side transaction flow.

pub mod service;
pub mod state;
pub mod transaction;

pub use service::AppService;
pub use state::AppState;
pub use transaction::{
    ConfirmationPoller, DepositLedger, OrchestratorConfig, PollConfig, TransactionBuilder,
    TransactionOrchestrator, TransactionReceipt, TransactionSubmitter,
};
