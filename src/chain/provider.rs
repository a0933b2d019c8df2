//! JSON-RPC node client over HTTP

use super::NodeClient;
use crate::config::NodeConfig;
use crate::error::{DeployerError, DeployerResult, RejectionKind};
use crate::tx::Receipt;

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::time::Duration;
use tracing::{debug, error};

/// Node connection over a single HTTP endpoint
pub struct ChainProvider {
    /// Endpoint URL, for logging
    rpc_url: String,
    http: Provider<Http>,
}

impl ChainProvider {
    /// Create a provider for the configured endpoint
    pub fn new(config: &NodeConfig) -> DeployerResult<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str()).map_err(|e| {
            DeployerError::Config(format!("Invalid RPC URL {}: {}", config.rpc_url, e))
        })?;
        let http = provider.interval(Duration::from_millis(config.request_interval_ms));

        debug!("Created HTTP provider for {}", config.rpc_url);

        Ok(Self {
            rpc_url: config.rpc_url.clone(),
            http,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get current block number
    pub async fn get_block_number(&self) -> DeployerResult<u64> {
        self.http
            .get_block_number()
            .await
            .map(|b| b.as_u64())
            .map_err(|e| self.connection_error(e))
    }

    /// Health check
    pub async fn health_check(&self) -> bool {
        match self.get_block_number().await {
            Ok(block) => {
                debug!("Node {} at block {}", self.rpc_url, block);
                true
            }
            Err(e) => {
                error!("Health check failed for {}: {}", self.rpc_url, e);
                false
            }
        }
    }

    fn connection_error(&self, e: ProviderError) -> DeployerError {
        DeployerError::ChainConnection(format!("{}: {}", self.rpc_url, e))
    }

    /// Narrow a node quantity that must fit in 64 bits
    fn to_u64(&self, value: U256, what: &str) -> DeployerResult<u64> {
        u64::try_from(value).map_err(|_| {
            DeployerError::ChainConnection(format!(
                "{}: {} {} out of range",
                self.rpc_url, what, value
            ))
        })
    }
}

#[async_trait]
impl NodeClient for ChainProvider {
    async fn chain_id(&self) -> DeployerResult<u64> {
        let id = self
            .http
            .get_chainid()
            .await
            .map_err(|e| self.connection_error(e))?;
        self.to_u64(id, "chain id")
    }

    async fn suggest_gas_price(&self) -> DeployerResult<U256> {
        self.http
            .get_gas_price()
            .await
            .map_err(|e| DeployerError::GasEstimation(e.to_string()))
    }

    async fn balance_of(&self, address: Address) -> DeployerResult<U256> {
        self.http
            .get_balance(address, None)
            .await
            .map_err(|e| self.connection_error(e))
    }

    async fn pending_nonce(&self, address: Address) -> DeployerResult<u64> {
        let nonce = self
            .http
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| self.connection_error(e))?;
        self.to_u64(nonce, "nonce")
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> DeployerResult<U256> {
        self.http
            .estimate_gas(tx, None)
            .await
            .map_err(|e| DeployerError::GasEstimation(e.to_string()))
    }

    async fn call(&self, tx: &TypedTransaction) -> DeployerResult<Bytes> {
        self.http
            .call(tx, None)
            .await
            .map_err(|e| DeployerError::Contract(e.to_string()))
    }

    async fn broadcast(&self, signed: Bytes) -> DeployerResult<H256> {
        match self.http.send_raw_transaction(signed).await {
            Ok(pending) => Ok(pending.tx_hash()),
            Err(e) => {
                let message = e.to_string();
                Err(DeployerError::Submission {
                    kind: RejectionKind::classify(&message),
                    message,
                })
            }
        }
    }

    async fn receipt_for(&self, tx_hash: H256) -> DeployerResult<Option<Receipt>> {
        let receipt = self
            .http
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| self.connection_error(e))?;

        Ok(receipt.and_then(Receipt::from_node))
    }
}
