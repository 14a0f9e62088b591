//! Unsigned transfer construction.

use std::str::FromStr;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use rust_decimal::Decimal;
use solana_sdk::{hash::Hash, message::Message, pubkey::Pubkey, transaction::Transaction};
use solana_system_interface::instruction as system_instruction;
use tracing::{debug, instrument, warn};

use crate::domain::{BlockchainClient, TransactionError, sol_to_lamports};

/// Fee assumed when the node cannot price a message (one signature)
pub const DEFAULT_FEE_LAMPORTS: u64 = 5_000;

/// A transfer anchored to a recent blockhash, ready for the wallet.
#[derive(Debug, Clone)]
pub struct UnsignedTransfer {
    pub transaction: Transaction,
    pub lamports: u64,
    pub blockhash: Hash,
}

/// A signed transfer. Consumed by the submitter on broadcast.
#[derive(Debug)]
pub struct SignedTransfer {
    transaction: Transaction,
}

impl SignedTransfer {
    /// Wraps a wallet-signed transaction; `None` if a signature is missing.
    #[must_use]
    pub fn new(transaction: Transaction) -> Option<Self> {
        transaction
            .is_signed()
            .then_some(Self { transaction })
    }

    /// First signature, which is the transaction id on the ledger.
    #[must_use]
    pub fn signature(&self) -> Option<String> {
        self.transaction.signatures.first().map(|s| s.to_string())
    }

    pub(crate) fn into_transaction(self) -> Transaction {
        self.transaction
    }
}

pub struct TransactionBuilder {
    blockchain: Arc<dyn BlockchainClient>,
}

fn parse_address(label: &str, address: &str) -> Result<Pubkey, TransactionError> {
    Pubkey::from_str(address)
        .map_err(|_| TransactionError::InvalidAddress(format!("{} address '{}'", label, address)))
}

impl TransactionBuilder {
    #[must_use]
    pub fn new(blockchain: Arc<dyn BlockchainClient>) -> Self {
        Self { blockchain }
    }

    /// Build a native SOL transfer paid for by `payer`.
    ///
    /// Every call fetches a fresh blockhash; nothing is reused across attempts.
    #[instrument(skip(self))]
    pub async fn build(
        &self,
        payer: &str,
        recipient: &str,
        amount: Decimal,
    ) -> Result<UnsignedTransfer, TransactionError> {
        let lamports = sol_to_lamports(amount)?;
        let payer = parse_address("payer", payer)?;
        let recipient = parse_address("recipient", recipient)?;

        let blockhash = self
            .blockchain
            .get_latest_blockhash()
            .await
            .map_err(|e| TransactionError::NetworkUnavailable(e.to_string()))?;
        let blockhash = Hash::from_str(&blockhash).map_err(|_| {
            TransactionError::NetworkUnavailable(format!("malformed blockhash '{}'", blockhash))
        })?;

        let instruction = system_instruction::transfer(&payer, &recipient, lamports);
        let mut message = Message::new(&[instruction], Some(&payer));
        message.recent_blockhash = blockhash;

        debug!(lamports, blockhash = %blockhash, "Built unsigned transfer");
        Ok(UnsignedTransfer {
            transaction: Transaction::new_unsigned(message),
            lamports,
            blockhash,
        })
    }

    /// Network fee for the transfer in lamports, falling back to
    /// [`DEFAULT_FEE_LAMPORTS`] when the node gives no answer.
    #[instrument(skip(self, unsigned))]
    pub async fn estimate_fee(&self, unsigned: &UnsignedTransfer) -> u64 {
        let message = BASE64_STANDARD.encode(unsigned.transaction.message_data());
        match self.blockchain.get_fee_for_message(&message).await {
            Ok(Some(fee)) => fee,
            Ok(None) => {
                debug!("Node could not price message, using default fee");
                DEFAULT_FEE_LAMPORTS
            }
            Err(e) => {
                warn!(error = %e, "Fee estimation failed, using default fee");
                DEFAULT_FEE_LAMPORTS
            }
        }
    }
}
