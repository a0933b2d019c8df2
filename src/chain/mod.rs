//! Chain module - the node operations the submitter depends on
//!
//! This module provides:
//! - The `NodeClient` seam used by the submitter, gas estimator and contracts
//! - An HTTP JSON-RPC implementation backed by ethers

pub mod provider;

pub use provider::ChainProvider;

use crate::error::DeployerResult;
use crate::tx::Receipt;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256, U256};

/// Operations a node must expose for submit-and-confirm
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Chain ID the node reports
    async fn chain_id(&self) -> DeployerResult<u64>;

    /// Suggested legacy gas price in wei
    async fn suggest_gas_price(&self) -> DeployerResult<U256>;

    /// Latest balance in wei
    async fn balance_of(&self, address: Address) -> DeployerResult<U256>;

    /// Next nonce including pending transactions
    async fn pending_nonce(&self, address: Address) -> DeployerResult<u64>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> DeployerResult<U256>;

    /// Execute a read-only call against latest state
    async fn call(&self, tx: &TypedTransaction) -> DeployerResult<Bytes>;

    /// Broadcast signed RLP bytes, returning the transaction hash
    async fn broadcast(&self, signed: Bytes) -> DeployerResult<H256>;

    /// Receipt for a mined transaction, `None` while pending or unknown
    async fn receipt_for(&self, tx_hash: H256) -> DeployerResult<Option<Receipt>>;
}
