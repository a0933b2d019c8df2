//! Transaction request, submission and receipt types

use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256, U64};
use std::fmt;
use std::time::{Duration, Instant};

/// Default time to wait for a receipt
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// A transaction the caller wants included on chain
///
/// `to = None` is a contract creation; `data` then carries the init code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Option<Address>,
    pub data: Bytes,
    pub gas_price: U256,
    pub chain_id: u64,
    pub deadline: Duration,
    pub value: U256,
    /// Estimated by the node when absent
    pub gas_limit: Option<U256>,
    /// Node's pending nonce for the signer when absent
    pub nonce: Option<u64>,
}

impl TxRequest {
    /// Call an existing contract or account
    pub fn call(to: Address, data: impl Into<Bytes>, gas_price: U256, chain_id: u64) -> Self {
        Self {
            to: Some(to),
            data: data.into(),
            gas_price,
            chain_id,
            deadline: DEFAULT_DEADLINE,
            value: U256::zero(),
            gas_limit: None,
            nonce: None,
        }
    }

    /// Create a contract from init code
    pub fn create(init_code: impl Into<Bytes>, gas_price: U256, chain_id: u64) -> Self {
        Self {
            to: None,
            ..Self::call(Address::zero(), init_code, gas_price, chain_id)
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: U256) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn is_creation(&self) -> bool {
        self.to.is_none()
    }
}

/// A transaction accepted by the node, awaiting a receipt
#[derive(Debug, Clone)]
pub struct SubmittedTransaction {
    pub id: H256,
    pub request: TxRequest,
    pub from: Address,
    pub nonce: u64,
    pub gas_limit: U256,
    pub submitted_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failed,
}

/// Block a receipt was included in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub number: u64,
    pub hash: Option<H256>,
}

/// Inclusion record for a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: H256,
    pub status: ReceiptStatus,
    /// Only set for contract creation
    pub contract_address: Option<Address>,
    pub block: BlockRef,
    pub gas_used: Option<U256>,
}

impl Receipt {
    /// Convert a node receipt; `None` while it has no block number or status
    ///
    /// Pre-Byzantium receipts carry no status and are never reported.
    pub fn from_node(receipt: TransactionReceipt) -> Option<Self> {
        let number = receipt.block_number?.as_u64();
        let status = if receipt.status? == U64::from(1) {
            ReceiptStatus::Success
        } else {
            ReceiptStatus::Failed
        };

        Some(Self {
            transaction_hash: receipt.transaction_hash,
            status,
            contract_address: receipt.contract_address,
            block: BlockRef {
                number,
                hash: receipt.block_hash,
            },
            gas_used: receipt.gas_used,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tx {:?} {:?} in block {}",
            self.transaction_hash, self.status, self.block.number
        )
    }
}
