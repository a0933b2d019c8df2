//! Error types for the deployer

use crate::tx::Receipt;

use ethers::types::H256;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why a node refused (or failed to acknowledge) a broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    InsufficientFunds,
    NonceConflict,
    Underpriced,
    /// The broadcast did not return in time; the node may still have it
    Timeout,
    Other,
}

impl RejectionKind {
    /// Classify a node error message
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("insufficient funds") {
            RejectionKind::InsufficientFunds
        } else if message.contains("nonce too low")
            || message.contains("nonce too high")
            || message.contains("already known")
        {
            RejectionKind::NonceConflict
        } else if message.contains("underpriced") {
            RejectionKind::Underpriced
        } else {
            RejectionKind::Other
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RejectionKind::InsufficientFunds => "insufficient funds",
            RejectionKind::NonceConflict => "nonce conflict",
            RejectionKind::Underpriced => "underpriced",
            RejectionKind::Timeout => "timeout",
            RejectionKind::Other => "rejected",
        };
        f.write_str(label)
    }
}

/// Main error type for the deployer
#[derive(Error, Debug)]
pub enum DeployerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain connection error: {0}")]
    ChainConnection(String),

    #[error("Chain ID mismatch: request targets {expected}, node reports {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Submission failed ({kind}): {message}")]
    Submission { kind: RejectionKind, message: String },

    #[error("Transaction reverted: {receipt}")]
    Reverted { receipt: Box<Receipt> },

    #[error("Timed out after {waited:?} waiting for receipt of {tx_hash:?}")]
    ConfirmationTimeout { tx_hash: H256, waited: Duration },

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl DeployerError {
    /// The transaction definitely did not (and will not) take effect
    pub fn is_definitive_failure(&self) -> bool {
        match self {
            DeployerError::Reverted { .. } | DeployerError::ChainMismatch { .. } => true,
            DeployerError::Submission { kind, .. } => *kind != RejectionKind::Timeout,
            _ => false,
        }
    }

    /// The transaction may still land; caller should re-poll or treat as unknown
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(
            self,
            DeployerError::ConfirmationTimeout { .. }
                | DeployerError::Submission {
                    kind: RejectionKind::Timeout,
                    ..
                }
        )
    }

    /// Receipt attached to a revert, if any
    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            DeployerError::Reverted { receipt } => Some(receipt.as_ref()),
            _ => None,
        }
    }
}

/// Result type for deployer operations
pub type DeployerResult<T> = Result<T, DeployerError>;
