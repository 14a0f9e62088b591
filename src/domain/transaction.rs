//! Types describing one deposit/withdraw attempt as it moves through
//! signing, broadcast and confirmation.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::error::TransactionError;

/// 1 SOL = 1_000_000_000 lamports
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Converts a major-unit SOL amount to lamports.
///
/// The conversion is exact: amounts that are not positive, overflow `u64`,
/// or carry precision below one lamport are rejected.
pub fn sol_to_lamports(amount: Decimal) -> Result<u64, TransactionError> {
    if amount.is_zero() || amount.is_sign_negative() {
        return Err(TransactionError::InvalidAmount(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }
    let scaled = amount
        .checked_mul(Decimal::from(LAMPORTS_PER_SOL))
        .ok_or_else(|| TransactionError::InvalidAmount(format!("amount {} is too large", amount)))?;
    if !scaled.fract().is_zero() {
        return Err(TransactionError::InvalidAmount(format!(
            "amount {} is finer than one lamport",
            amount
        )));
    }
    scaled
        .to_u64()
        .ok_or_else(|| TransactionError::InvalidAmount(format!("amount {} is too large", amount)))
}

/// Lamports back to a normalized major-unit amount.
#[must_use]
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(lamports), 9).normalize()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-initiated action, consumed by the orchestrator and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionIntent {
    pub kind: TransactionKind,
    /// Amount in major units (SOL)
    pub amount: Decimal,
    /// Recipient of the transfer: the pool for deposits, the wallet itself
    /// for withdrawals
    pub counterparty_address: String,
    /// Deposit being closed (withdraw only)
    pub source_deposit_id: Option<i32>,
    /// Strategy the deposit is recorded against (deposit only)
    pub strategy_id: Option<i32>,
}

impl TransactionIntent {
    #[must_use]
    pub fn deposit(amount: Decimal, pool_address: impl Into<String>, strategy_id: Option<i32>) -> Self {
        Self {
            kind: TransactionKind::Deposit,
            amount,
            counterparty_address: pool_address.into(),
            source_deposit_id: None,
            strategy_id,
        }
    }

    #[must_use]
    pub fn withdraw(deposit_id: i32, amount: Decimal, wallet_address: impl Into<String>) -> Self {
        Self {
            kind: TransactionKind::Withdraw,
            amount,
            counterparty_address: wallet_address.into(),
            source_deposit_id: Some(deposit_id),
            strategy_id: None,
        }
    }
}

/// A broadcast transaction awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub signature: String,
    pub submitted_at: DateTime<Utc>,
}

impl TransactionRecord {
    #[must_use]
    pub fn new(signature: String) -> Self {
        Self {
            signature,
            submitted_at: Utc::now(),
        }
    }
}

/// Status of the in-flight attempt owned by one orchestrator.
///
/// Signatures only exist in the states that can have one, so a confirmed
/// attempt without a signature cannot be constructed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TransactionStatus {
    #[default]
    Idle,
    Signing,
    Sending,
    Confirming(TransactionRecord),
    Confirmed(TransactionRecord),
    Failed {
        error: TransactionError,
        /// Present when the failure happened after broadcast
        signature: Option<String>,
    },
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Signing => "signing",
            Self::Sending => "sending",
            Self::Confirming(_) => "confirming",
            Self::Confirmed(_) => "confirmed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Signing, sending or confirming.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Signing | Self::Sending | Self::Confirming(_))
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed(_) | Self::Failed { .. })
    }

    /// Dismissal is only allowed from idle or a terminal state.
    #[must_use]
    pub fn can_close(&self) -> bool {
        !self.is_in_flight()
    }

    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        match self {
            Self::Confirming(record) | Self::Confirmed(record) => Some(&record.signature),
            Self::Failed { signature, .. } => signature.as_deref(),
            _ => None,
        }
    }

    /// User-facing title and description for this state.
    #[must_use]
    pub fn message(&self, kind: TransactionKind, cluster: Cluster) -> StatusMessage {
        let explorer_url = self.signature().map(|sig| explorer_url(sig, cluster));
        let (title, description, detail) = match self {
            Self::Idle => ("Ready", "Review the details and confirm".to_string(), None),
            Self::Signing => (
                "Waiting for Signature",
                "Please approve the transaction in your wallet".to_string(),
                None,
            ),
            Self::Sending => (
                "Sending Transaction",
                "Broadcasting to Solana network...".to_string(),
                None,
            ),
            Self::Confirming(_) => (
                "Confirming Transaction",
                "Waiting for network confirmation...".to_string(),
                None,
            ),
            Self::Confirmed(_) => (
                "Transaction Confirmed!",
                format!("Your {} was successful", kind),
                None,
            ),
            Self::Failed { error, .. } => {
                let title = match error {
                    TransactionError::ConfirmationFailed(_) => "Transaction Not Confirmed",
                    _ => "Transaction Failed",
                };
                (title, error.to_string(), Some(format!("{:?}", error)))
            }
        };
        StatusMessage {
            title: title.to_string(),
            description,
            detail,
            explorer_url,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub title: String,
    pub description: String,
    /// Raw error detail, failures only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

/// Outcome of a signature status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    /// Raw on-chain error payload
    Failed(String),
}

/// Commitment level reported by the RPC node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    Processed,
    Confirmed,
    Finalized,
}

impl FromStr for CommitmentLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Self::Processed),
            "confirmed" => Ok(Self::Confirmed),
            "finalized" => Ok(Self::Finalized),
            _ => Err(format!("Invalid commitment level: {}", s)),
        }
    }
}

/// One entry of a `getSignatureStatuses` response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureStatusInfo {
    pub confirmation_status: Option<CommitmentLevel>,
    /// On-chain execution error, verbatim
    pub err: Option<serde_json::Value>,
}

impl SignatureStatusInfo {
    /// Execution errors win over commitment; `processed` is still pending.
    #[must_use]
    pub fn classify(&self) -> ConfirmationStatus {
        if let Some(err) = &self.err {
            return ConfirmationStatus::Failed(err.to_string());
        }
        match self.confirmation_status {
            Some(level) if level >= CommitmentLevel::Confirmed => ConfirmationStatus::Confirmed,
            _ => ConfirmationStatus::Pending,
        }
    }
}

/// Cluster the explorer links point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Mainnet,
    #[default]
    Testnet,
    Devnet,
}

impl Cluster {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
        }
    }

    /// Best-effort guess from an RPC endpoint URL.
    #[must_use]
    pub fn from_rpc_url(url: &str) -> Self {
        let url = url.to_lowercase();
        if url.contains("devnet") {
            Self::Devnet
        } else if url.contains("mainnet") {
            Self::Mainnet
        } else {
            Self::Testnet
        }
    }
}

impl FromStr for Cluster {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" | "mainnet-beta" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "devnet" => Ok(Self::Devnet),
            _ => Err(format!("Invalid cluster: {}", s)),
        }
    }
}

/// Public block explorer link for a transaction signature.
#[must_use]
pub fn explorer_url(signature: &str, cluster: Cluster) -> String {
    match cluster {
        Cluster::Mainnet => format!("https://explorer.solana.com/tx/{}", signature),
        other => format!(
            "https://explorer.solana.com/tx/{}?cluster={}",
            signature,
            other.as_str()
        ),
    }
}
