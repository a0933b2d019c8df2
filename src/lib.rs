//! Anvil Deployer - confirmed transaction submission for EVM development nodes
//!
//! Signs and broadcasts transactions through a `NodeClient`, then polls for
//! receipts with a deadline, distinguishing reverted transactions from ones
//! whose outcome is still unknown.

pub mod chain;
pub mod config;
pub mod contract;
pub mod error;
pub mod metrics;
pub mod signer;
pub mod tx;
pub mod workflow;

pub use chain::{ChainProvider, NodeClient};
pub use error::{DeployerError, DeployerResult, RejectionKind};
pub use signer::{TxSigner, WalletSigner};
pub use tx::{Receipt, ReceiptStatus, SubmittedTransaction, TransactionSubmitter, TxRequest};
