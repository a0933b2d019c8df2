//! Gas price and gas limit estimation

use crate::chain::NodeClient;
use crate::config::SubmitterConfig;
use crate::error::DeployerResult;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::U256;
use tracing::debug;

/// Gas estimator for transactions
#[derive(Debug, Clone)]
pub struct GasEstimator {
    /// Buffer percentage for gas limit (e.g., 20 = 20% buffer)
    gas_limit_buffer_percent: u64,
    /// Buffer percentage for gas price
    gas_price_buffer_percent: u64,
}

impl GasEstimator {
    pub fn new(gas_limit_buffer_percent: u64, gas_price_buffer_percent: u64) -> Self {
        Self {
            gas_limit_buffer_percent,
            gas_price_buffer_percent,
        }
    }

    pub fn from_config(config: &SubmitterConfig) -> Self {
        Self::new(
            config.gas_limit_buffer_percent,
            config.gas_price_buffer_percent,
        )
    }

    /// Node-suggested gas price plus buffer
    pub async fn gas_price(&self, client: &dyn NodeClient) -> DeployerResult<U256> {
        let suggested = client.suggest_gas_price().await?;
        let buffered = with_buffer(suggested, self.gas_price_buffer_percent);
        debug!("Gas price: suggested {}, using {}", suggested, buffered);
        Ok(buffered)
    }

    /// Node gas estimate for `tx` plus buffer
    pub async fn gas_limit(
        &self,
        client: &dyn NodeClient,
        tx: &TypedTransaction,
    ) -> DeployerResult<U256> {
        let estimated = client.estimate_gas(tx).await?;
        let buffered = with_buffer(estimated, self.gas_limit_buffer_percent);
        debug!("Gas limit: estimated {}, using {}", estimated, buffered);
        Ok(buffered)
    }

    /// Calculate worst-case cost in wei
    pub fn calculate_cost(gas_limit: U256, gas_price: U256) -> U256 {
        gas_limit.saturating_mul(gas_price)
    }
}

fn with_buffer(value: U256, percent: u64) -> U256 {
    value.saturating_add(value.saturating_mul(U256::from(percent)) / 100)
}
