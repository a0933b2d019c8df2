//! Transaction submission and confirmation

mod gas;
mod submitter;
mod types;

pub use gas::GasEstimator;
pub use submitter::TransactionSubmitter;
pub use types::{
    BlockRef, Receipt, ReceiptStatus, SubmittedTransaction, TxRequest, DEFAULT_DEADLINE,
};
