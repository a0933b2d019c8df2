//! Compiled contract artifacts

use super::BoundContract;
use crate::error::{DeployerError, DeployerResult};
use crate::tx::TxRequest;

use ethers::abi::{Abi, Token};
use ethers::types::{Address, Bytes, U256};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Deserialize)]
struct RawArtifact {
    abi: Abi,
    bytecode: RawBytecode,
}

/// Foundry nests the hex under `object`; Hardhat stores it directly
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Object { object: String },
    Hex(String),
}

impl RawBytecode {
    fn hex(&self) -> &str {
        match self {
            RawBytecode::Object { object } => object,
            RawBytecode::Hex(hex) => hex,
        }
    }
}

/// ABI and creation bytecode of a compiled contract
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// Read an artifact JSON file such as `out/HelloWorld.sol/HelloWorld.json`
    pub fn load(path: &Path) -> DeployerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DeployerError::Artifact(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let artifact = Self::from_json(&raw)?;
        debug!(
            "Loaded artifact {} ({} bytes of init code)",
            path.display(),
            artifact.bytecode.len()
        );
        Ok(artifact)
    }

    pub fn from_json(json: &str) -> DeployerResult<Self> {
        let raw: RawArtifact = serde_json::from_str(json)
            .map_err(|e| DeployerError::Artifact(format!("Invalid artifact JSON: {}", e)))?;

        let hex_code = raw.bytecode.hex().trim();
        let hex_code = hex_code.strip_prefix("0x").unwrap_or(hex_code);
        if hex_code.is_empty() {
            return Err(DeployerError::Artifact(
                "Artifact has no creation bytecode (abstract contract or interface?)".to_string(),
            ));
        }

        let bytecode = hex::decode(hex_code)
            .map_err(|e| DeployerError::Artifact(format!("Invalid bytecode hex: {}", e)))?;

        Ok(Self {
            abi: raw.abi,
            bytecode: bytecode.into(),
        })
    }

    /// Init code followed by ABI-encoded constructor arguments
    pub fn deploy_data(&self, args: &[Token]) -> DeployerResult<Bytes> {
        match self.abi.constructor() {
            Some(constructor) => constructor
                .encode_input(self.bytecode.to_vec(), args)
                .map(Bytes::from)
                .map_err(|e| DeployerError::Contract(format!("Constructor encoding: {}", e))),
            None if args.is_empty() => Ok(self.bytecode.clone()),
            None => Err(DeployerError::Contract(format!(
                "Contract has no constructor but {} arguments were given",
                args.len()
            ))),
        }
    }

    /// Contract-creation request for this artifact
    pub fn deploy_request(
        &self,
        args: &[Token],
        gas_price: U256,
        chain_id: u64,
    ) -> DeployerResult<TxRequest> {
        Ok(TxRequest::create(
            self.deploy_data(args)?,
            gas_price,
            chain_id,
        ))
    }

    /// Bind the ABI to a deployed instance
    pub fn at(&self, address: Address) -> BoundContract {
        BoundContract::new(address, self.abi.clone())
    }
}
