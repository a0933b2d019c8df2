//! Prometheus metrics for transaction submission
//!
//! Exposes metrics for:
//! - Submitted, confirmed, reverted and timed-out transactions
//! - Submit-to-receipt latency

use crate::error::{DeployerError, DeployerResult};

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "deployer_transactions_submitted_total",
        "Total transactions accepted by the node",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_CONFIRMED: CounterVec = register_counter_vec!(
        "deployer_transactions_confirmed_total",
        "Total transactions mined with success status",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_REVERTED: CounterVec = register_counter_vec!(
        "deployer_transactions_reverted_total",
        "Total transactions mined with failed status",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_TIMED_OUT: CounterVec = register_counter_vec!(
        "deployer_confirmation_timeouts_total",
        "Total confirmation waits that hit their deadline",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_LATENCY: HistogramVec = register_histogram_vec!(
        "deployer_confirmation_latency_seconds",
        "Time from broadcast to receipt",
        &["chain_id"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();
}

/// Text exposition of all registered metrics
pub fn render() -> DeployerResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| DeployerError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| DeployerError::Metrics(e.to_string()))
}

// Helper functions to record metrics

pub fn record_tx_submitted(chain_id: u64) {
    TX_SUBMITTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_confirmed(chain_id: u64) {
    TX_CONFIRMED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_reverted(chain_id: u64) {
    TX_REVERTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_timed_out(chain_id: u64) {
    TX_TIMED_OUT
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_tx_latency(chain_id: u64, latency_secs: f64) {
    TX_LATENCY
        .with_label_values(&[&chain_id.to_string()])
        .observe(latency_secs);
}
