//! Anvil Deployer - deploy and exercise the greeter contract on a local node
//!
//! Connects to the configured node, deploys the compiled artifact, calls
//! `greet()`, updates the greeting through a confirmed transaction and reads
//! it back.

use anvil_deployer::chain::ChainProvider;
use anvil_deployer::config::Settings;
use anvil_deployer::contract::ContractArtifact;
use anvil_deployer::metrics;
use anvil_deployer::signer::WalletSigner;
use anvil_deployer::tx::TransactionSubmitter;
use anvil_deployer::workflow::GreeterWorkflow;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Anvil Deployer v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!("Using node {}", settings.node.rpc_url);

    let provider = Arc::new(ChainProvider::new(&settings.node)?);
    if !provider.health_check().await {
        anyhow::bail!("Node at {} is not reachable", settings.node.rpc_url);
    }

    let signer = Arc::new(
        WalletSigner::from_env(&settings.wallet.private_key_env)
            .context("Failed to load deployer key")?,
    );

    let artifact = ContractArtifact::load(&settings.contract.artifact_path)?;

    let submitter = TransactionSubmitter::new(provider, signer, &settings.submitter);
    let workflow = GreeterWorkflow::new(submitter, artifact, &settings);

    let result = tokio::select! {
        result = workflow.run() => result,
        _ = shutdown_signal() => {
            warn!("Interrupted; pending transactions may still be mined");
            anyhow::bail!("Interrupted before the deployment finished");
        }
    };

    match metrics::render() {
        Ok(text) => debug!("Metrics:\n{}", text),
        Err(e) => warn!("Failed to render metrics: {}", e),
    }

    match result {
        Ok(report) => {
            info!(
                "Done: {:?} on chain {} now greets {:?}",
                report.contract_address, report.chain_id, report.updated_greeting
            );
            Ok(())
        }
        Err(e) => {
            if e.is_outcome_unknown() {
                error!("Outcome unknown, check the node before retrying: {}", e);
            } else {
                error!("Deployment failed: {}", e);
            }
            Err(e.into())
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,anvil_deployer=debug,hyper=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json_logging(std::env::var("LOG_FORMAT").ok().as_deref()) {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

/// `LOG_FORMAT=json` switches to one JSON object per line
fn json_logging(format: Option<&str>) -> bool {
    format.map_or(false, |f| f.trim().eq_ignore_ascii_case("json"))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
