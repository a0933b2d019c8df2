//! ABI bound to a deployed contract address

use crate::chain::NodeClient;
use crate::error::{DeployerError, DeployerResult};
use crate::tx::TxRequest;

use ethers::abi::{Abi, Function, Token};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct BoundContract {
    address: Address,
    abi: Abi,
}

impl BoundContract {
    pub fn new(address: Address, abi: Abi) -> Self {
        Self { address, abi }
    }

    fn function(&self, method: &str) -> DeployerResult<&Function> {
        self.abi
            .function(method)
            .map_err(|e| DeployerError::Contract(format!("{}: {}", method, e)))
    }

    /// Selector plus ABI-encoded arguments
    pub fn encode_call(&self, method: &str, args: &[Token]) -> DeployerResult<Bytes> {
        self.function(method)?
            .encode_input(args)
            .map(Bytes::from)
            .map_err(|e| DeployerError::Contract(format!("Encoding {}: {}", method, e)))
    }

    /// Run `method` as an `eth_call` and decode its outputs
    pub async fn call(
        &self,
        client: &dyn NodeClient,
        from: Option<Address>,
        method: &str,
        args: &[Token],
    ) -> DeployerResult<Vec<Token>> {
        let data = self.encode_call(method, args)?;

        let mut request = TransactionRequest::new().to(self.address).data(data);
        if let Some(from) = from {
            request = request.from(from);
        }

        let output = client.call(&TypedTransaction::Legacy(request)).await?;
        debug!("{}() returned {} bytes", method, output.len());

        self.function(method)?
            .decode_output(&output)
            .map_err(|e| DeployerError::Contract(format!("Decoding {} output: {}", method, e)))
    }

    /// State-changing request invoking `method`
    pub fn transact(
        &self,
        method: &str,
        args: &[Token],
        gas_price: U256,
        chain_id: u64,
    ) -> DeployerResult<TxRequest> {
        let data = self.encode_call(method, args)?;
        Ok(TxRequest::call(self.address, data, gas_price, chain_id))
    }
}
