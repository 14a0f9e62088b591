//! Broadcast of signed transfers.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use tracing::{info, instrument, warn};

use super::builder::SignedTransfer;
use crate::domain::{AppError, BlockchainClient, TransactionError, TransactionRecord};

pub struct TransactionSubmitter {
    blockchain: Arc<dyn BlockchainClient>,
}

/// Transport failures may succeed on a fresh attempt; anything the node
/// answered is a rejection of this transaction.
fn classify_broadcast_error(err: AppError) -> TransactionError {
    match err {
        AppError::Blockchain(e) if e.is_transient() => {
            TransactionError::NetworkUnavailable(e.to_string())
        }
        AppError::Blockchain(e) => TransactionError::BroadcastRejected(e.to_string()),
        other => TransactionError::NetworkUnavailable(other.to_string()),
    }
}

impl TransactionSubmitter {
    #[must_use]
    pub fn new(blockchain: Arc<dyn BlockchainClient>) -> Self {
        Self { blockchain }
    }

    #[instrument(skip(self, signed))]
    pub async fn submit(&self, signed: SignedTransfer) -> Result<TransactionRecord, TransactionError> {
        let transaction = signed.into_transaction();
        let wire = bincode::serialize(&transaction).map_err(|e| {
            TransactionError::BroadcastRejected(format!("malformed transaction: {}", e))
        })?;
        let encoded = BASE64_STANDARD.encode(wire);

        match self.blockchain.send_transaction(&encoded).await {
            Ok(signature) => {
                info!(signature = %signature, "Transfer broadcast");
                Ok(TransactionRecord::new(signature))
            }
            Err(e) => {
                warn!(error = %e, "Broadcast failed");
                Err(classify_broadcast_error(e))
            }
        }
    }
}
