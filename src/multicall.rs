use crate::call_builder::CallDescriptor;
use crate::contracts::multicall3::{aggregate3_function, aggregate3_output};
use crate::metrics;
use crate::types::{RawResults, RawValue};
use anyhow::Result;
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::prelude::*;
use log::{debug, warn};
use std::sync::Arc;

/// Result of one call inside a batch, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub success: bool,
    pub return_data: Bytes,
}

impl CallOutcome {
    pub fn ok(return_data: impl Into<Bytes>) -> Self {
        Self {
            success: true,
            return_data: return_data.into(),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            return_data: Bytes::default(),
        }
    }
}

/// One remote round-trip carrying a whole batch of read-only calls.
///
/// Implementations must return exactly one [`CallOutcome`] per call, in input
/// order, or an error for the whole batch.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn aggregate(&self, calls: &[CallDescriptor]) -> Result<Vec<CallOutcome>>;
}

#[async_trait]
impl<T: BatchTransport + ?Sized> BatchTransport for Arc<T> {
    async fn aggregate(&self, calls: &[CallDescriptor]) -> Result<Vec<CallOutcome>> {
        (**self).aggregate(calls).await
    }
}

/// Multicall3 `aggregate3` transport.
///
/// Every call is sent with `allowFailure = true`, so a reverting strategy only
/// loses its own result.
///
/// ## Example
///
/// ```rust,ignore
/// let provider = Arc::new(Provider::<Http>::try_from(rpc_url)?);
/// let transport = Multicall3Transport::new(provider, MULTICALL3_ADDRESS.parse()?);
/// let executor = BatchExecutor::new(1, transport);
/// let response = executor.execute(&calls, 50).await?;
/// ```
#[derive(Clone)]
pub struct Multicall3Transport<M: Middleware> {
    pub provider: Arc<M>,
    multicall_address: Address,
    block: Option<BlockId>,
}

impl<M: Middleware + 'static> Multicall3Transport<M> {
    pub fn new(provider: Arc<M>, multicall_address: Address) -> Self {
        Self {
            provider,
            multicall_address,
            block: None,
        }
    }

    /// Pin every batch to a specific block instead of `latest`
    pub fn at_block(mut self, block: BlockId) -> Self {
        self.block = Some(block);
        self
    }
}

#[async_trait]
impl<M: Middleware + 'static> BatchTransport for Multicall3Transport<M> {
    async fn aggregate(&self, calls: &[CallDescriptor]) -> Result<Vec<CallOutcome>> {
        // Call3 struct: (address target, bool allowFailure, bytes callData)
        let call_tokens: Vec<Token> = calls
            .iter()
            .map(|call| {
                Token::Tuple(vec![
                    Token::Address(call.target),
                    Token::Bool(true),
                    Token::Bytes(call.call_data.to_vec()),
                ])
            })
            .collect();

        let calldata = aggregate3_function().encode_input(&[Token::Array(call_tokens)])?;

        let tx_request = TransactionRequest::new()
            .to(self.multicall_address)
            .data(calldata);
        let typed_tx: ethers::types::transaction::eip2718::TypedTransaction = tx_request.into();
        let response = self
            .provider
            .call(&typed_tx, self.block)
            .await
            .map_err(|e| anyhow::anyhow!("aggregate3 eth_call failed: {}", e))?;

        let decoded = ethers::abi::decode(&[aggregate3_output()], &response)?;
        let results_array = decoded
            .into_iter()
            .next()
            .and_then(|t| t.into_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid multicall response format"))?;

        // Result struct: (bool success, bytes returnData)
        let outcomes = results_array
            .into_iter()
            .map(|result_token| match result_token {
                Token::Tuple(fields) => match fields.as_slice() {
                    [Token::Bool(success), Token::Bytes(data)] => CallOutcome {
                        success: *success,
                        return_data: Bytes::from(data.clone()),
                    },
                    _ => CallOutcome::failed(),
                },
                _ => CallOutcome::failed(),
            })
            .collect();

        Ok(outcomes)
    }
}

/// A batch-level failure. Per-call failures never surface here; they only
/// leave their key absent from [`RawResults`].
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("batch {batch_index} ({size} calls) failed: {source}")]
    Transport {
        batch_index: usize,
        size: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("batch {batch_index} returned {got} results for {expected} calls")]
    ResponseLength {
        batch_index: usize,
        expected: usize,
        got: usize,
    },
}

/// Merged output of a whole pass.
#[derive(Debug, Clone, Default)]
pub struct BatchResponse {
    pub results: RawResults,
    pub batches: usize,
    /// Calls that reverted, returned nothing, or could not be decoded
    pub failed_calls: usize,
}

/// Contiguous, order-preserving batches of at most `max_batch_size` calls.
///
/// A cap of zero is treated as one.
pub fn partition_calls<T>(calls: &[T], max_batch_size: usize) -> std::slice::Chunks<'_, T> {
    calls.chunks(max_batch_size.max(1))
}

/// Splits a pass into bounded batches, runs them one after the other and
/// decodes every call against the ABI carried by its descriptor.
pub struct BatchExecutor<T: BatchTransport> {
    chain_id: u64,
    transport: T,
}

impl<T: BatchTransport> BatchExecutor<T> {
    pub fn new(chain_id: u64, transport: T) -> Self {
        Self { chain_id, transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn execute(
        &self,
        calls: &[CallDescriptor],
        max_batch_size: usize,
    ) -> Result<BatchResponse, BatchError> {
        let mut response = BatchResponse::default();
        if calls.is_empty() {
            return Ok(response);
        }

        for (batch_index, batch) in partition_calls(calls, max_batch_size).enumerate() {
            metrics::record_multicall_batch_size(batch.len() as f64);

            let outcomes = match self.transport.aggregate(batch).await {
                Ok(outcomes) => outcomes,
                Err(source) => {
                    metrics::increment_multicall_batch_failure(self.chain_id);
                    return Err(BatchError::Transport {
                        batch_index,
                        size: batch.len(),
                        source,
                    });
                }
            };

            if outcomes.len() != batch.len() {
                metrics::increment_multicall_batch_failure(self.chain_id);
                return Err(BatchError::ResponseLength {
                    batch_index,
                    expected: batch.len(),
                    got: outcomes.len(),
                });
            }

            for (call, outcome) in batch.iter().zip(outcomes.iter()) {
                match decode_outcome(call, outcome) {
                    Some(values) => response.results.insert(call.key(), values),
                    None => {
                        response.failed_calls += 1;
                        metrics::increment_call_decode_failure(self.chain_id, call.method.abi_name());
                    }
                }
            }
            response.batches += 1;
        }

        if response.failed_calls > 0 {
            warn!(
                "Chain {}: {} of {} calls returned no usable result",
                self.chain_id,
                response.failed_calls,
                calls.len()
            );
        }
        debug!(
            "Chain {}: executed {} calls in {} batches",
            self.chain_id,
            calls.len(),
            response.batches
        );

        Ok(response)
    }
}

fn decode_outcome(call: &CallDescriptor, outcome: &CallOutcome) -> Option<Vec<RawValue>> {
    if !outcome.success || outcome.return_data.is_empty() {
        return None;
    }
    match call.function.decode_output(&outcome.return_data) {
        Ok(tokens) => Some(tokens.into_iter().map(RawValue::from).collect()),
        Err(e) => {
            debug!("Failed to decode {} for {}: {}", call.method, call.name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_builder::build_call;
    use crate::types::{StrategyMethod, VaultVersion};
    use ethers::abi::encode;
    use std::sync::Mutex;

    struct EchoTransport {
        seen: Mutex<Vec<usize>>,
        fail_batch: Option<usize>,
        drop_last: bool,
    }

    impl EchoTransport {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail_batch: None,
                drop_last: false,
            }
        }
    }

    #[async_trait]
    impl BatchTransport for EchoTransport {
        async fn aggregate(&self, calls: &[CallDescriptor]) -> Result<Vec<CallOutcome>> {
            let index = {
                let mut seen = self.seen.lock().unwrap();
                seen.push(calls.len());
                seen.len() - 1
            };
            if self.fail_batch == Some(index) {
                anyhow::bail!("connection reset");
            }
            let mut outcomes: Vec<CallOutcome> = calls
                .iter()
                .map(|c| match c.method {
                    StrategyMethod::IsActive => CallOutcome::ok(encode(&[Token::Bool(true)])),
                    StrategyMethod::KeepCrv => CallOutcome::failed(),
                    _ => CallOutcome::ok(encode(&[Token::Uint(U256::from(1u64))])),
                })
                .collect();
            if self.drop_last {
                outcomes.pop();
            }
            Ok(outcomes)
        }
    }

    fn calls(count: usize) -> Vec<CallDescriptor> {
        (0..count)
            .map(|i| {
                build_call(
                    &format!("s{i}"),
                    Address::from_low_u64_be(1),
                    Address::from_low_u64_be(2 + i as u64),
                    VaultVersion::Current,
                    StrategyMethod::CreditAvailable,
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn partition_sizes_follow_cap() {
        let items: Vec<usize> = (0..120).collect();
        let sizes: Vec<usize> = partition_calls(&items, 50).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![50, 50, 20]);

        let flattened: Vec<usize> = partition_calls(&items, 50).flatten().copied().collect();
        assert_eq!(flattened, items, "batches must preserve input order");
    }

    #[test]
    fn partition_count_is_ceil_division() {
        let items: Vec<u8> = vec![0; 101];
        for cap in [1usize, 7, 10, 50, 100, 101, 500] {
            let expected = (items.len() + cap - 1) / cap;
            assert_eq!(partition_calls(&items, cap).count(), expected, "cap {cap}");
        }
        assert_eq!(partition_calls(&items, usize::MAX).count(), 1);
        assert_eq!(partition_calls(&items, 0).count(), 101);
    }

    #[tokio::test]
    async fn empty_input_skips_transport() {
        let executor = BatchExecutor::new(1, EchoTransport::new());
        let response = executor.execute(&[], 50).await.unwrap();
        assert_eq!(response.batches, 0);
        assert!(response.results.is_empty());
        assert!(executor.transport().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batches_are_executed_in_order_and_merged() {
        let executor = BatchExecutor::new(1, EchoTransport::new());
        let response = executor.execute(&calls(120), 50).await.unwrap();
        assert_eq!(*executor.transport().seen.lock().unwrap(), vec![50, 50, 20]);
        assert_eq!(response.batches, 3);
        assert_eq!(response.results.len(), 120);
        assert_eq!(
            response.results.get("s119", StrategyMethod::CreditAvailable),
            Some(&[RawValue::Uint(U256::from(1u64))][..])
        );
    }

    #[tokio::test]
    async fn failed_calls_are_absent_not_errors() {
        let executor = BatchExecutor::new(1, EchoTransport::new());
        let descriptors: Vec<_> = [StrategyMethod::IsActive, StrategyMethod::KeepCrv]
            .into_iter()
            .map(|m| build_call("s", Address::zero(), Address::from_low_u64_be(9), VaultVersion::Current, m).unwrap())
            .collect();
        let response = executor.execute(&descriptors, 10).await.unwrap();
        assert_eq!(response.failed_calls, 1);
        assert!(response.results.get("s", StrategyMethod::KeepCrv).is_none());
        assert_eq!(
            response.results.get("s", StrategyMethod::IsActive),
            Some(&[RawValue::Bool(true)][..])
        );
    }

    #[tokio::test]
    async fn transport_failure_aborts_the_pass() {
        let mut transport = EchoTransport::new();
        transport.fail_batch = Some(1);
        let executor = BatchExecutor::new(1, transport);
        let err = executor.execute(&calls(120), 50).await.unwrap_err();
        assert!(matches!(err, BatchError::Transport { batch_index: 1, size: 50, .. }));
        // nothing after the failing batch is attempted
        assert_eq!(executor.transport().seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn short_response_is_a_batch_error() {
        let mut transport = EchoTransport::new();
        transport.drop_last = true;
        let executor = BatchExecutor::new(1, transport);
        let err = executor.execute(&calls(3), 50).await.unwrap_err();
        assert!(matches!(err, BatchError::ResponseLength { expected: 3, got: 2, .. }));
    }

    #[test]
    fn undecodable_return_data_is_dropped() {
        let call = &calls(1)[0];
        let garbage = CallOutcome::ok(vec![0u8; 3]);
        assert!(decode_outcome(call, &garbage).is_none());
        assert!(decode_outcome(call, &CallOutcome::ok(Vec::<u8>::new())).is_none());
    }
}
