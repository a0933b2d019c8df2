//! Transaction signing

use crate::error::{DeployerError, DeployerResult};

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes};

/// Produces signed, broadcastable transaction bytes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TxSigner: Send + Sync {
    /// Sign `tx` for `chain_id`, returning RLP-encoded signed bytes
    async fn sign(&self, tx: &TypedTransaction, chain_id: u64) -> DeployerResult<Bytes>;

    fn address(&self) -> Address;
}

/// Signer backed by an in-memory private key
#[derive(Debug, Clone)]
pub struct WalletSigner {
    wallet: LocalWallet,
}

impl WalletSigner {
    /// Parse a hex private key, with or without `0x`
    pub fn from_private_key(key: &str) -> DeployerResult<Self> {
        let key = key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        let wallet = key
            .parse::<LocalWallet>()
            .map_err(|e| DeployerError::Wallet(format!("Invalid private key: {}", e)))?;

        Ok(Self { wallet })
    }

    /// Load the private key from an environment variable
    pub fn from_env(var: &str) -> DeployerResult<Self> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Self::from_private_key(&key),
            _ => Err(DeployerError::Wallet(format!("{} is not set", var))),
        }
    }
}

#[async_trait]
impl TxSigner for WalletSigner {
    async fn sign(&self, tx: &TypedTransaction, chain_id: u64) -> DeployerResult<Bytes> {
        let wallet = self.wallet.clone().with_chain_id(chain_id);

        let mut tx = tx.clone();
        tx.set_chain_id(chain_id);
        if tx.from().is_none() {
            tx.set_from(wallet.address());
        }

        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| DeployerError::Signing(e.to_string()))?;

        Ok(tx.rlp_signed(&signature))
    }

    fn address(&self) -> Address {
        self.wallet.address()
    }
}
