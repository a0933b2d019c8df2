//! Transaction submitter: sign, broadcast and wait for a receipt

use super::gas::GasEstimator;
use super::types::{Receipt, ReceiptStatus, SubmittedTransaction, TxRequest};
use crate::chain::NodeClient;
use crate::config::SubmitterConfig;
use crate::error::{DeployerError, DeployerResult, RejectionKind};
use crate::metrics;
use crate::signer::TxSigner;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, H256, U256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Submits transactions through one node connection and confirms them
///
/// Nonces are not tracked between calls. Callers issuing transactions in
/// parallel must set distinct nonces on their requests.
pub struct TransactionSubmitter {
    client: Arc<dyn NodeClient>,
    signer: Arc<dyn TxSigner>,
    gas_estimator: GasEstimator,
    poll_interval: Duration,
    broadcast_timeout: Duration,
}

impl TransactionSubmitter {
    pub fn new(
        client: Arc<dyn NodeClient>,
        signer: Arc<dyn TxSigner>,
        config: &SubmitterConfig,
    ) -> Self {
        Self {
            client,
            signer,
            gas_estimator: GasEstimator::from_config(config),
            poll_interval: config.poll_interval(),
            broadcast_timeout: config.broadcast_timeout(),
        }
    }

    pub fn client(&self) -> &Arc<dyn NodeClient> {
        &self.client
    }

    pub fn signer(&self) -> &Arc<dyn TxSigner> {
        &self.signer
    }

    pub fn gas_estimator(&self) -> &GasEstimator {
        &self.gas_estimator
    }

    /// Sign and broadcast `request`
    ///
    /// Fails with `ChainMismatch` before touching the signer or the network
    /// when the node serves a different chain than the request targets.
    pub async fn submit(&self, request: &TxRequest) -> DeployerResult<SubmittedTransaction> {
        let node_chain_id = self.client.chain_id().await?;
        if node_chain_id != request.chain_id {
            return Err(DeployerError::ChainMismatch {
                expected: request.chain_id,
                actual: node_chain_id,
            });
        }

        let from = self.signer.address();
        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => self.client.pending_nonce(from).await?,
        };

        let mut tx = build_transaction(request, from, nonce);
        let gas_limit = match request.gas_limit {
            Some(gas_limit) => gas_limit,
            None => self.gas_estimator.gas_limit(self.client.as_ref(), &tx).await?,
        };
        tx.set_gas(gas_limit);
        debug!(
            "Built transaction nonce={} gas={} max_cost={}",
            nonce,
            gas_limit,
            GasEstimator::calculate_cost(gas_limit, request.gas_price)
        );

        let signed = self.signer.sign(&tx, request.chain_id).await?;
        debug!("Signed transaction nonce={} ({} bytes)", nonce, signed.len());

        let id = match timeout(self.broadcast_timeout, self.client.broadcast(signed)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(DeployerError::Submission {
                    kind: RejectionKind::Timeout,
                    message: format!("no response within {:?}", self.broadcast_timeout),
                })
            }
        };

        metrics::record_tx_submitted(request.chain_id);
        info!(
            "Transaction submitted: {:?} (nonce {}, {})",
            id,
            nonce,
            if request.is_creation() { "create" } else { "call" }
        );

        Ok(SubmittedTransaction {
            id,
            request: request.clone(),
            from,
            nonce,
            gas_limit,
            submitted_at: Instant::now(),
        })
    }

    /// Poll for the receipt of `submitted` until found or `deadline` elapses
    ///
    /// A timeout does not mean the transaction failed; it may still be mined.
    /// Dropping the returned future stops polling.
    pub async fn confirm(
        &self,
        submitted: &SubmittedTransaction,
        deadline: Duration,
    ) -> DeployerResult<Receipt> {
        let chain_id = submitted.request.chain_id;

        let receipt = match timeout(deadline, self.poll_receipt(submitted.id)).await {
            Ok(receipt) => receipt,
            Err(_) => {
                warn!(
                    "No receipt for {:?} after {:?}, outcome unknown",
                    submitted.id, deadline
                );
                metrics::record_tx_timed_out(chain_id);
                return Err(DeployerError::ConfirmationTimeout {
                    tx_hash: submitted.id,
                    waited: deadline,
                });
            }
        };

        metrics::record_tx_latency(chain_id, submitted.submitted_at.elapsed().as_secs_f64());

        match receipt.status {
            ReceiptStatus::Success => {
                metrics::record_tx_confirmed(chain_id);
                info!(
                    "Transaction {:?} confirmed in block {}",
                    receipt.transaction_hash, receipt.block.number
                );
                Ok(receipt)
            }
            ReceiptStatus::Failed => {
                metrics::record_tx_reverted(chain_id);
                warn!(
                    "Transaction {:?} reverted in block {}",
                    receipt.transaction_hash, receipt.block.number
                );
                Err(DeployerError::Reverted {
                    receipt: Box::new(receipt),
                })
            }
        }
    }

    /// Submit `request` and wait up to `request.deadline` for its receipt
    pub async fn submit_and_confirm(&self, request: &TxRequest) -> DeployerResult<Receipt> {
        let submitted = self.submit(request).await?;
        self.confirm(&submitted, request.deadline).await
    }

    async fn poll_receipt(&self, tx_hash: H256) -> Receipt {
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);

            match self.client.receipt_for(tx_hash).await {
                Ok(Some(receipt)) => {
                    debug!("Receipt for {:?} after {} polls", tx_hash, attempts);
                    return receipt;
                }
                Ok(None) => {
                    debug!("Transaction {:?} pending (poll {})", tx_hash, attempts);
                }
                Err(e) => {
                    warn!("Receipt lookup for {:?} failed: {}", tx_hash, e);
                }
            }

            sleep(self.poll_interval).await;
        }
    }
}

/// Unsigned legacy transaction for `request`, gas limit left unset
fn build_transaction(
    request: &TxRequest,
    from: Address,
    nonce: u64,
) -> TypedTransaction {
    let mut tx = TransactionRequest::new()
        .from(from)
        .data(request.data.clone())
        .value(request.value)
        .gas_price(request.gas_price)
        .nonce(U256::from(nonce))
        .chain_id(request.chain_id);

    if let Some(to) = request.to {
        tx = tx.to(to);
    }

    TypedTransaction::Legacy(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockNodeClient;
    use crate::signer::MockTxSigner;
    use crate::tx::BlockRef;

    use ethers::types::Bytes;
    use mockall::predicate::eq;
    use tokio_test::{assert_err, assert_ok};

    const CHAIN_ID: u64 = 31337;

    fn config() -> SubmitterConfig {
        SubmitterConfig {
            poll_interval_ms: 10,
            confirmation_timeout_secs: 5,
            broadcast_timeout_secs: 1,
            gas_limit_buffer_percent: 20,
            gas_price_buffer_percent: 0,
        }
    }

    fn signer() -> MockTxSigner {
        let mut signer = MockTxSigner::new();
        signer
            .expect_address()
            .return_const(Address::repeat_byte(0xaa));
        signer
            .expect_sign()
            .returning(|_, _| Ok(Bytes::from(vec![0xf8, 0x01, 0x02])));
        signer
    }

    /// Node on `CHAIN_ID` that accepts any broadcast as `tx_hash`
    fn accepting_node(tx_hash: H256) -> MockNodeClient {
        let mut node = MockNodeClient::new();
        node.expect_chain_id().returning(|| Ok(CHAIN_ID));
        node.expect_pending_nonce().returning(|_| Ok(7));
        node.expect_estimate_gas()
            .returning(|_| Ok(U256::from(100_000)));
        node.expect_broadcast().returning(move |_| Ok(tx_hash));
        node
    }

    fn receipt(tx_hash: H256, status: ReceiptStatus) -> Receipt {
        Receipt {
            transaction_hash: tx_hash,
            status,
            contract_address: None,
            block: BlockRef {
                number: 3,
                hash: Some(H256::repeat_byte(0xbb)),
            },
            gas_used: Some(U256::from(21_000)),
        }
    }

    fn submitter(node: MockNodeClient, signer: MockTxSigner) -> TransactionSubmitter {
        TransactionSubmitter::new(Arc::new(node), Arc::new(signer), &config())
    }

    fn request() -> TxRequest {
        TxRequest::call(
            Address::repeat_byte(0x01),
            vec![0xa4, 0x13, 0x68, 0x62],
            U256::from(1_000_000_000u64),
            CHAIN_ID,
        )
        .with_deadline(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn submit_returns_node_hash_and_resolved_fields() {
        let tx_hash = H256::repeat_byte(0x42);
        let submitter = submitter(accepting_node(tx_hash), signer());

        let submitted = assert_ok!(submitter.submit(&request()).await);

        assert_eq!(submitted.id, tx_hash);
        assert!(!submitted.id.is_zero());
        assert_eq!(submitted.nonce, 7);
        assert_eq!(submitted.gas_limit, U256::from(120_000));
        assert_eq!(submitted.from, Address::repeat_byte(0xaa));
    }

    #[tokio::test]
    async fn explicit_nonce_and_gas_limit_skip_node_lookups() {
        let mut node = MockNodeClient::new();
        node.expect_chain_id().returning(|| Ok(CHAIN_ID));
        node.expect_pending_nonce().never();
        node.expect_estimate_gas().never();
        node.expect_broadcast()
            .times(1)
            .returning(|_| Ok(H256::repeat_byte(1)));

        let mut signer = MockTxSigner::new();
        signer.expect_address().return_const(Address::zero());
        signer
            .expect_sign()
            .withf(|tx, chain_id| {
                *chain_id == CHAIN_ID
                    && tx.nonce() == Some(&U256::from(11))
                    && tx.gas() == Some(&U256::from(50_000))
            })
            .returning(|_, _| Ok(Bytes::from(vec![1])));

        let submitter = submitter(node, signer);
        let request = request().with_nonce(11).with_gas_limit(U256::from(50_000));

        let submitted = assert_ok!(submitter.submit(&request).await);
        assert_eq!(submitted.nonce, 11);
    }

    #[tokio::test]
    async fn chain_mismatch_fails_before_any_write() {
        let mut node = MockNodeClient::new();
        node.expect_chain_id().returning(|| Ok(CHAIN_ID));
        node.expect_broadcast().never();

        let mut signer = MockTxSigner::new();
        signer.expect_sign().never();

        let submitter = submitter(node, signer);
        let mut request = request();
        request.chain_id = 1;

        let err = assert_err!(submitter.submit(&request).await);
        assert!(matches!(
            err,
            DeployerError::ChainMismatch {
                expected: 1,
                actual: CHAIN_ID
            }
        ));
    }

    #[tokio::test]
    async fn signing_failure_is_reported_without_broadcast() {
        let mut node = MockNodeClient::new();
        node.expect_chain_id().returning(|| Ok(CHAIN_ID));
        node.expect_pending_nonce().returning(|_| Ok(0));
        node.expect_estimate_gas()
            .returning(|_| Ok(U256::from(21_000)));
        node.expect_broadcast().never();

        let mut signer = MockTxSigner::new();
        signer.expect_address().return_const(Address::zero());
        signer
            .expect_sign()
            .returning(|_, _| Err(DeployerError::Signing("hsm offline".to_string())));

        let submitter = submitter(node, signer);
        let err = assert_err!(submitter.submit(&request()).await);
        assert!(matches!(err, DeployerError::Signing(_)));
    }

    #[tokio::test]
    async fn node_rejection_is_a_submission_error() {
        let mut node = MockNodeClient::new();
        node.expect_chain_id().returning(|| Ok(CHAIN_ID));
        node.expect_pending_nonce().returning(|_| Ok(0));
        node.expect_estimate_gas()
            .returning(|_| Ok(U256::from(21_000)));
        node.expect_broadcast().returning(|_| {
            Err(DeployerError::Submission {
                kind: RejectionKind::InsufficientFunds,
                message: "insufficient funds for gas * price + value".to_string(),
            })
        });
        node.expect_receipt_for().never();

        let submitter = submitter(node, signer());
        let err = assert_err!(submitter.submit_and_confirm(&request()).await);

        assert!(matches!(
            err,
            DeployerError::Submission {
                kind: RejectionKind::InsufficientFunds,
                ..
            }
        ));
        assert!(err.is_definitive_failure());
    }

    #[tokio::test]
    async fn confirm_returns_receipt_for_submitted_id() {
        let tx_hash = H256::repeat_byte(0x42);
        let mut node = accepting_node(tx_hash);
        node.expect_receipt_for()
            .returning(|hash| Ok(Some(receipt(hash, ReceiptStatus::Success))));

        let submitter = submitter(node, signer());
        let submitted = submitter.submit(&request()).await.unwrap();
        let receipt = assert_ok!(submitter.confirm(&submitted, Duration::from_secs(1)).await);

        assert_eq!(receipt.transaction_hash, submitted.id);
        assert!(receipt.is_success());
    }

    #[tokio::test]
    async fn confirm_polls_until_mined() {
        let tx_hash = H256::repeat_byte(0x42);
        let mut node = accepting_node(tx_hash);
        let mut seq = mockall::Sequence::new();
        node.expect_receipt_for()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        node.expect_receipt_for()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DeployerError::ChainConnection("reset".to_string())));
        node.expect_receipt_for()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|hash| Ok(Some(receipt(hash, ReceiptStatus::Success))));

        let submitter = submitter(node, signer());
        let receipt = assert_ok!(submitter.submit_and_confirm(&request()).await);
        assert_eq!(receipt.transaction_hash, tx_hash);
    }

    #[tokio::test]
    async fn confirm_is_idempotent_for_terminal_receipt() {
        let tx_hash = H256::repeat_byte(0x42);
        let mut node = accepting_node(tx_hash);
        node.expect_receipt_for()
            .with(eq(tx_hash))
            .times(2)
            .returning(|hash| Ok(Some(receipt(hash, ReceiptStatus::Success))));

        let submitter = submitter(node, signer());
        let submitted = submitter.submit(&request()).await.unwrap();

        let first = submitter
            .confirm(&submitted, Duration::from_secs(1))
            .await
            .unwrap();
        let second = submitter
            .confirm(&submitted, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn failed_receipt_becomes_reverted_error() {
        let tx_hash = H256::repeat_byte(0x42);
        let mut node = accepting_node(tx_hash);
        node.expect_receipt_for()
            .returning(|hash| Ok(Some(receipt(hash, ReceiptStatus::Failed))));

        let submitter = submitter(node, signer());
        let err = assert_err!(submitter.submit_and_confirm(&request()).await);

        let reverted = err.receipt().expect("revert carries receipt");
        assert_eq!(reverted.transaction_hash, tx_hash);
        assert_eq!(reverted.status, ReceiptStatus::Failed);
        assert!(err.is_definitive_failure());
    }

    #[tokio::test]
    async fn missing_receipt_times_out_promptly() {
        let tx_hash = H256::repeat_byte(0x42);
        let mut node = accepting_node(tx_hash);
        node.expect_receipt_for().returning(|_| Ok(None));

        let submitter = submitter(node, signer());
        let submitted = submitter.submit(&request()).await.unwrap();

        let started = Instant::now();
        let err = assert_err!(
            submitter
                .confirm(&submitted, Duration::from_millis(100))
                .await
        );
        let elapsed = started.elapsed();

        assert!(matches!(
            err,
            DeployerError::ConfirmationTimeout { tx_hash: hash, .. } if hash == tx_hash
        ));
        assert!(err.is_outcome_unknown());
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(150), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn dropping_confirm_stops_polling() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let tx_hash = H256::repeat_byte(0x42);
        let polls = Arc::new(AtomicUsize::new(0));
        let mut node = accepting_node(tx_hash);
        let counter = polls.clone();
        node.expect_receipt_for().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });

        let submitter = submitter(node, signer());
        let submitted = submitter.submit(&request()).await.unwrap();

        let started = Instant::now();
        tokio::select! {
            result = submitter.confirm(&submitted, Duration::from_secs(10)) => {
                panic!("confirm finished before cancellation: {:?}", result);
            }
            _ = sleep(Duration::from_millis(50)) => {}
        }
        assert!(started.elapsed() < Duration::from_secs(1));

        let at_cancel = polls.load(Ordering::SeqCst);
        assert!(at_cancel > 0);

        sleep(Duration::from_millis(100)).await;
        assert_eq!(polls.load(Ordering::SeqCst), at_cancel);
    }

    #[test]
    fn creation_transaction_has_no_recipient() {
        let request = TxRequest::create(vec![0x60, 0x80], U256::from(5), CHAIN_ID);
        let tx = build_transaction(&request, Address::repeat_byte(2), 3);

        assert!(tx.to().is_none());
        assert_eq!(tx.nonce(), Some(&U256::from(3)));
        assert_eq!(tx.gas_price(), Some(U256::from(5)));
        assert_eq!(tx.data().map(|d| d.to_vec()), Some(vec![0x60, 0x80]));
    }
}
