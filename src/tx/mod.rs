//! Transaction confirmation tracking.
//!
//! [`wait_for_confirms`] polls the chain until a submitted transaction is mined
//! and buried under the requested number of blocks. The tracked transaction ends
//! up in one of the four states:
//!
//! * mined and confirmed, the receipt is returned;
//! * mined and reverted, the original call is replayed at the block it was mined
//!   in to recover the revert reason, and [`DexError::Call`] is returned;
//! * dropped, neither the receipt nor the transaction itself is known to the node,
//!   which is typically the result of being replaced by another transaction with
//!   the same nonce, see [`find_tx_by_nonce`];
//! * timed out.
//!
//! Poll interval grows by half after every poll, up to [`MAX_POLL_INTERVAL`].

mod oracle;

use std::time::Duration;

use alloy::{
    primitives::{Address, Bytes, TxHash},
    rpc::types::TransactionRequest,
};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use oracle::*;

use crate::{
    error::DexError,
    revert::{CallFailure, DroppedTx, FailureKind, Invocation, RevertDecoder},
};

pub const DEFAULT_CONFIRMATIONS: u64 = 1;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);
const BACKOFF_FACTOR: f64 = 1.5;

/// Number of the most recent blocks [`find_tx_by_nonce`] looks into.
pub const NONCE_SCAN_BLOCKS: u64 = 5;

/// Options of [`wait_for_confirms`].
#[derive(derive_more::Debug)]
pub struct WaitOptions {
    /// Number of blocks including the one with transaction, at least 1.
    pub confirmations: u64,
    /// `None` to wait indefinitely.
    pub timeout: Option<Duration>,
    /// Initial poll interval.
    pub poll_interval: Duration,
    /// Called with the current number of confirmations on every poll
    /// after the transaction is mined.
    #[debug(skip)]
    pub on_progress: Option<Box<dyn Fn(u64) + Send + Sync>>,
    pub cancel: Option<CancellationToken>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            confirmations: DEFAULT_CONFIRMATIONS,
            timeout: Some(DEFAULT_TIMEOUT),
            poll_interval: DEFAULT_POLL_INTERVAL,
            on_progress: None,
            cancel: None,
        }
    }
}

impl WaitOptions {
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Transaction being tracked, with whatever is known about it.
#[derive(Clone, Debug)]
pub struct TrackedTx {
    hash: TxHash,
    call: Option<(TransactionRequest, Invocation)>,
    sender: Option<(Address, u64)>,
    observed: Option<TxSummary>,
}

impl TrackedTx {
    pub fn new(hash: TxHash) -> Self {
        Self {
            hash,
            call: None,
            sender: None,
            observed: None,
        }
    }

    /// Original request, used to replay the transaction if it reverts.
    pub fn with_call(mut self, request: TransactionRequest, invocation: Invocation) -> Self {
        self.call = Some((request, invocation));
        self
    }

    pub fn with_sender(mut self, from: Address, nonce: u64) -> Self {
        self.sender = Some((from, nonce));
        self
    }

    pub fn hash(&self) -> TxHash {
        self.hash
    }

    fn observe(&mut self, tx: TxSummary) {
        self.sender = Some((tx.from, tx.nonce));
        self.observed = Some(tx);
    }

    fn invocation(&self, decoder: &RevertDecoder) -> Option<Invocation> {
        match (&self.call, &self.observed) {
            (Some((_, invocation)), _) => Some(invocation.clone()),
            (None, Some(tx)) => Some(describe(decoder, &tx.input)),
            (None, None) => None,
        }
    }

    fn dropped(&self, decoder: &RevertDecoder) -> DroppedTx {
        DroppedTx {
            hash: self.hash,
            invocation: self.invocation(decoder),
            from: self.sender.map(|(from, _)| from),
            nonce: self.sender.map(|(_, nonce)| nonce),
        }
    }
}

fn describe(decoder: &RevertDecoder, calldata: &Bytes) -> Invocation {
    decoder
        .invocation_from_calldata(calldata)
        .unwrap_or_else(|| Invocation::opaque(calldata))
}

/// Waits for the transaction known only by its hash.
///
/// If the transaction reverts, its calldata is fetched from the node to replay it
/// and describe the failed call.
pub async fn wait<O: ChainOracle>(
    oracle: &O,
    decoder: &RevertDecoder,
    hash: TxHash,
    options: WaitOptions,
) -> Result<O::Receipt, DexError> {
    wait_for_confirms(oracle, decoder, TrackedTx::new(hash), options).await
}

/// Polls the chain until the transaction gets the requested number of confirmations.
pub async fn wait_for_confirms<O: ChainOracle>(
    oracle: &O,
    decoder: &RevertDecoder,
    mut tx: TrackedTx,
    options: WaitOptions,
) -> Result<O::Receipt, DexError> {
    let WaitOptions {
        confirmations,
        timeout,
        poll_interval,
        on_progress,
        cancel,
    } = options;
    let required = confirmations.max(1);
    let started = Instant::now();
    let mut poll = poll_interval;
    let mut confirmed = 0;

    loop {
        if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(DexError::Cancelled(tx.hash));
        }

        let receipt = oracle.receipt(tx.hash).await?;
        let mined = receipt.is_some();
        if let Some(receipt) = receipt {
            let block = receipt.mined_in();
            if !receipt.succeeded() {
                warn!(hash = %tx.hash, block, "Transaction reverted");
                return Err(execution_failure(oracle, decoder, &tx, block).await);
            }

            let head = oracle.block_number().await?;
            confirmed = confirmed.max((head + 1).saturating_sub(block));
            debug!(hash = %tx.hash, block, confirmed, required, "Transaction mined");
            if let Some(callback) = &on_progress {
                callback(confirmed);
            }
            if confirmed >= required {
                info!(hash = %tx.hash, block, confirmed, "Transaction confirmed");
                return Ok(receipt);
            }
        }

        let elapsed = started.elapsed();
        if timeout.is_some_and(|t| elapsed >= t) {
            return Err(DexError::Timeout {
                hash: tx.hash,
                elapsed,
            });
        }

        if !mined {
            match oracle.transaction(tx.hash).await? {
                Some(pending) => tx.observe(pending),
                None => {
                    warn!(hash = %tx.hash, "Transaction dropped or replaced");
                    return Err(DexError::Dropped(Box::new(tx.dropped(decoder))));
                }
            }
        }

        let nap = match timeout {
            Some(t) => poll.min(t.saturating_sub(elapsed)),
            None => poll,
        };
        debug!(hash = %tx.hash, ?nap, "Waiting for the next poll");
        match &cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(DexError::Cancelled(tx.hash)),
                _ = sleep(nap) => {}
            },
            None => sleep(nap).await,
        }
        poll = poll.mul_f64(BACKOFF_FACTOR).min(MAX_POLL_INTERVAL);
    }
}

/// Replays the reverted transaction at the block it was mined in to recover
/// the revert data, which receipts do not carry.
async fn execution_failure<O: ChainOracle>(
    oracle: &O,
    decoder: &RevertDecoder,
    tx: &TrackedTx,
    block: u64,
) -> DexError {
    let replay = match (&tx.call, &tx.observed) {
        (Some((request, invocation)), _) => Some((request.clone(), invocation.clone())),
        (None, Some(observed)) => Some((observed.replay_request(), describe(decoder, &observed.input))),
        (None, None) => match oracle.transaction(tx.hash).await {
            Ok(Some(fetched)) => Some((fetched.replay_request(), describe(decoder, &fetched.input))),
            Ok(None) => None,
            Err(err) => {
                debug!(hash = %tx.hash, %err, "Failed to fetch reverted transaction");
                None
            }
        },
    };

    let (invocation, revert) = match replay {
        Some((request, invocation)) => {
            let revert = match oracle.replay(request, Some(block)).await {
                Ok(data) => data.and_then(|data| decoder.decode(&data)),
                Err(err) => {
                    debug!(hash = %tx.hash, %err, "Replay did not return revert data");
                    None
                }
            };
            (invocation, revert)
        }
        None => (Invocation::opaque(&[]), None),
    };

    DexError::Call(Box::new(CallFailure {
        kind: FailureKind::Execution,
        invocation,
        revert,
        code: None,
        cause: DexError::Reverted(format!("transaction {} reverted in block {block}", tx.hash)),
    }))
}

/// Looks for the transaction of `from` with `nonce` in the last
/// [`NONCE_SCAN_BLOCKS`] blocks, newest first.
///
/// Meant for recovery after [`DexError::Dropped`], to find the transaction
/// that replaced the tracked one.
pub async fn find_tx_by_nonce<O: ChainOracle>(
    oracle: &O,
    from: Address,
    nonce: u64,
) -> Result<Option<TxSummary>, DexError> {
    let head = oracle.block_number().await?;
    let oldest = head.saturating_sub(NONCE_SCAN_BLOCKS - 1);
    for number in (oldest..=head).rev() {
        let found = oracle
            .block_transactions(number)
            .await?
            .into_iter()
            .find(|tx| tx.from == from && tx.nonce == nonce);
        if found.is_some() {
            debug!(%from, nonce, block = number, "Found transaction by nonce");
            return Ok(found);
        }
    }
    Ok(None)
}
