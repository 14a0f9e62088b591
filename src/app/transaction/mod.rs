//! Client-side deposit/withdraw flow: build, sign, submit, confirm, record.

pub mod builder;
pub mod ledger;
pub mod orchestrator;
pub mod poller;
pub mod submitter;

pub use builder::{DEFAULT_FEE_LAMPORTS, SignedTransfer, TransactionBuilder, UnsignedTransfer};
pub use ledger::DepositLedger;
pub use orchestrator::{OrchestratorConfig, TransactionOrchestrator, TransactionReceipt};
pub use poller::{ConfirmationPoller, PollConfig};
pub use submitter::TransactionSubmitter;
