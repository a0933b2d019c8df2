//! Greeter deployment workflow
//!
//! Deploys the greeter artifact, reads `greet()`, submits `setGreeting` and
//! reads the result back. Every transaction goes through the submitter and
//! must be confirmed before the next step starts.

use crate::config::Settings;
use crate::contract::{BoundContract, ContractArtifact};
use crate::error::{DeployerError, DeployerResult};
use crate::tx::TransactionSubmitter;

use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use ethers::utils::get_contract_address;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of a full workflow run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub chain_id: u64,
    pub contract_address: Address,
    pub deploy_tx: H256,
    pub update_tx: H256,
    pub initial_greeting: String,
    pub updated_greeting: String,
    pub deployer: Address,
    pub balance: U256,
}

pub struct GreeterWorkflow {
    submitter: TransactionSubmitter,
    artifact: ContractArtifact,
    initial_greeting: String,
    updated_greeting: String,
    expected_chain_id: Option<u64>,
    deadline: Duration,
}

impl GreeterWorkflow {
    pub fn new(submitter: TransactionSubmitter, artifact: ContractArtifact, settings: &Settings) -> Self {
        Self {
            submitter,
            artifact,
            initial_greeting: settings.contract.initial_greeting.clone(),
            updated_greeting: settings.contract.updated_greeting.clone(),
            expected_chain_id: settings.node.expected_chain_id,
            deadline: settings.submitter.confirmation_timeout(),
        }
    }

    pub async fn run(&self) -> DeployerResult<DeploymentReport> {
        let client = self.submitter.client();
        let deployer = self.submitter.signer().address();

        let chain_id = client.chain_id().await?;
        if let Some(expected) = self.expected_chain_id {
            if expected != chain_id {
                return Err(DeployerError::ChainMismatch {
                    expected,
                    actual: chain_id,
                });
            }
        }
        info!("Connected. Chain ID: {}", chain_id);

        // Deploy
        let gas_price = self.submitter.gas_estimator().gas_price(client.as_ref()).await?;
        let request = self
            .artifact
            .deploy_request(
                &[Token::String(self.initial_greeting.clone())],
                gas_price,
                chain_id,
            )?
            .with_deadline(self.deadline);

        let submitted = self.submitter.submit(&request).await?;
        let predicted = get_contract_address(submitted.from, submitted.nonce);
        info!("Deploy tx: {:?}", submitted.id);
        info!("Contract address (pending): {:?}", predicted);

        let receipt = self.submitter.confirm(&submitted, request.deadline).await?;
        let contract_address = receipt.contract_address.ok_or_else(|| {
            DeployerError::Contract("Deployment receipt has no contract address".to_string())
        })?;
        if contract_address != predicted {
            warn!(
                "Node reported contract at {:?}, expected {:?}",
                contract_address, predicted
            );
        }
        info!("Contract deployed at: {:?}", contract_address);

        let contract = self.artifact.at(contract_address);
        let initial_greeting = self.greet(&contract, deployer).await?;
        info!("greet(): {}", initial_greeting);

        // Update
        let gas_price = self.submitter.gas_estimator().gas_price(client.as_ref()).await?;
        let request = contract
            .transact(
                "setGreeting",
                &[Token::String(self.updated_greeting.clone())],
                gas_price,
                chain_id,
            )?
            .with_deadline(self.deadline);
        let update = self.submitter.submit_and_confirm(&request).await?;
        info!("setGreeting tx: {:?}", update.transaction_hash);

        let updated_greeting = self.greet(&contract, deployer).await?;
        info!("greet() after update: {}", updated_greeting);

        let balance = client.balance_of(deployer).await?;
        info!("Deployer: {:?}  Balance: {} wei", deployer, balance);

        Ok(DeploymentReport {
            chain_id,
            contract_address,
            deploy_tx: receipt.transaction_hash,
            update_tx: update.transaction_hash,
            initial_greeting,
            updated_greeting,
            deployer,
            balance,
        })
    }

    async fn greet(&self, contract: &BoundContract, from: Address) -> DeployerResult<String> {
        let output = contract
            .call(self.submitter.client().as_ref(), Some(from), "greet", &[])
            .await?;

        output
            .into_iter()
            .next()
            .and_then(Token::into_string)
            .ok_or_else(|| DeployerError::Contract("greet() did not return a string".to_string()))
    }
}
