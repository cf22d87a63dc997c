//! Test utilities.
//!
//! [`MockChain`] is a scripted [`ChainOracle`] to exercise transaction tracking
//! deterministically, without a node. Responses are queued per poll, the last
//! queued response of each kind is repeated once the queue is drained.
//!
//! [`TestNode`] spins up local Anvil instance with a funded wallet attached to
//! the provider, and allows to put arbitrary bytecode at the exchange address.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use alloy::{
    node_bindings::{Anvil, AnvilInstance},
    primitives::{Address, Bytes, TxHash, address},
    providers::{DynProvider, ProviderBuilder, ext::AnvilApi},
    rpc::{client::RpcClient, types::TransactionRequest},
};

use crate::{
    error::DexError,
    network::{self, NetworkConfig, NetworkRegistry},
    tx::{ChainOracle, MinedReceipt, TxSummary},
};

/// Receipt returned by [`MockChain`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockReceipt {
    pub block_number: u64,
    pub success: bool,
}

impl MockReceipt {
    pub fn success(block_number: u64) -> Self {
        Self {
            block_number,
            success: true,
        }
    }

    pub fn reverted(block_number: u64) -> Self {
        Self {
            block_number,
            success: false,
        }
    }
}

impl MinedReceipt for MockReceipt {
    fn succeeded(&self) -> bool {
        self.success
    }

    fn mined_in(&self) -> u64 {
        self.block_number
    }
}

/// Queue repeating its last element.
#[derive(Debug)]
struct Script<T>(VecDeque<T>);

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self(VecDeque::new())
    }
}

impl<T: Clone> Script<T> {
    fn push(&mut self, item: T) {
        self.0.push_back(item);
    }

    fn next(&mut self) -> Option<T> {
        if self.0.len() > 1 {
            self.0.pop_front()
        } else {
            self.0.front().cloned()
        }
    }
}

#[derive(Debug, Default)]
struct ChainState {
    receipts: HashMap<TxHash, Script<Option<MockReceipt>>>,
    pending: HashMap<TxHash, Script<Option<TxSummary>>>,
    heads: Script<u64>,
    blocks: BTreeMap<u64, Vec<TxSummary>>,
    revert_data: Option<Bytes>,
    receipt_polls: usize,
    replays: Vec<(TransactionRequest, Option<u64>)>,
}

/// Scripted chain.
///
/// Unknown transactions have neither receipt nor pending entry, the chain head
/// is at block 0 until scripted otherwise.
#[derive(Debug, Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues the receipt returned by the next poll of `hash`.
    pub fn push_receipt(&self, hash: TxHash, receipt: Option<MockReceipt>) {
        self.state().receipts.entry(hash).or_default().push(receipt);
    }

    /// Queues the mempool lookup result of `hash`.
    pub fn push_pending(&self, hash: TxHash, tx: Option<TxSummary>) {
        self.state().pending.entry(hash).or_default().push(tx);
    }

    /// Queues the chain head returned by the next block number request.
    pub fn push_head(&self, block_number: u64) {
        self.state().heads.push(block_number);
    }

    pub fn add_block(&self, block_number: u64, txs: Vec<TxSummary>) {
        self.state().blocks.insert(block_number, txs);
    }

    /// Makes every replayed call revert with `data`.
    pub fn set_revert_data(&self, data: Bytes) {
        self.state().revert_data = Some(data);
    }

    pub fn receipt_polls(&self) -> usize {
        self.state().receipt_polls
    }

    /// Replayed requests with the blocks they were replayed at.
    pub fn replays(&self) -> Vec<(TransactionRequest, Option<u64>)> {
        self.state().replays.clone()
    }
}

impl ChainOracle for MockChain {
    type Receipt = MockReceipt;

    async fn receipt(&self, hash: TxHash) -> Result<Option<MockReceipt>, DexError> {
        let mut state = self.state();
        state.receipt_polls += 1;
        Ok(state
            .receipts
            .get_mut(&hash)
            .and_then(Script::next)
            .flatten())
    }

    async fn transaction(&self, hash: TxHash) -> Result<Option<TxSummary>, DexError> {
        Ok(self
            .state()
            .pending
            .get_mut(&hash)
            .and_then(Script::next)
            .flatten())
    }

    async fn block_number(&self) -> Result<u64, DexError> {
        Ok(self.state().heads.next().unwrap_or_default())
    }

    async fn block_transactions(&self, number: u64) -> Result<Vec<TxSummary>, DexError> {
        Ok(self
            .state()
            .blocks
            .get(&number)
            .cloned()
            .unwrap_or_default())
    }

    async fn replay(
        &self,
        request: TransactionRequest,
        block: Option<u64>,
    ) -> Result<Option<Bytes>, DexError> {
        let mut state = self.state();
        state.replays.push((request, block));
        Ok(state.revert_data.clone())
    }
}

const CHAIN_ID: u64 = 1337;
const BLOCK_TIME_SEC: f64 = 0.2;
const POLL_INTERVAL_MS: u64 = 50;

/// Address the exchange is expected at on the test node.
pub const EXCHANGE: Address = address!("0x00000000000000000000000000000000000e1e1e");

/// Local Anvil node.
#[derive(Debug)]
pub struct TestNode {
    pub chain_id: u64,
    pub rpc_url: String,
    /// Provider with the first Anvil account's wallet attached.
    pub provider: DynProvider,
    pub trader: Address,
    anvil: AnvilInstance,
}

impl TestNode {
    /// Spawns the node, `None` if Anvil can not be spawned, e.g. it is not installed.
    pub async fn try_new() -> Option<Self> {
        let anvil = Anvil::new()
            .block_time_f64(BLOCK_TIME_SEC)
            .chain_id(CHAIN_ID)
            .try_spawn()
            .ok()?;
        let client = RpcClient::builder().http(anvil.endpoint_url());
        client.set_poll_interval(Duration::from_millis(POLL_INTERVAL_MS));
        let provider = DynProvider::new(
            ProviderBuilder::new()
                .wallet(anvil.wallet()?)
                .connect_client(client),
        );
        Some(Self {
            chain_id: anvil.chain_id(),
            rpc_url: anvil.endpoint_url().to_string(),
            provider,
            trader: anvil.addresses()[0],
            anvil,
        })
    }

    /// Registry with a single `testnet` network pointing at [`EXCHANGE`].
    pub fn registry(&self) -> NetworkRegistry {
        NetworkRegistry::new([NetworkConfig::new(
            "testnet",
            self.chain_id,
            [
                (network::GENIDEX, Some(EXCHANGE)),
                (network::REWARDER, None),
            ],
        )])
    }

    /// Puts raw runtime bytecode at `address`.
    pub async fn set_code(&self, address: Address, code: Bytes) {
        self.provider.anvil_set_code(address, code).await.unwrap();
    }

    pub fn anvil(&self) -> &AnvilInstance {
        &self.anvil
    }

    /// Runtime bytecode always reverting with `selector` followed by a single
    /// 32-byte word `arg`.
    pub fn reverting_code(selector: [u8; 4], arg: u8) -> Bytes {
        let mut code = vec![0x7f]; // PUSH32 selector
        code.extend_from_slice(&selector);
        code.extend_from_slice(&[0; 28]);
        code.extend_from_slice(&[
            0x60, 0x00, 0x52, // MSTORE at 0
            0x60, arg, 0x60, 0x04, 0x52, // MSTORE arg at 4
            0x60, 0x24, 0x60, 0x00, 0xfd, // REVERT(0, 36)
        ]);
        code.into()
    }

    /// Runtime bytecode accepting any call.
    pub fn accepting_code() -> Bytes {
        Bytes::from_static(&[0x00])
    }
}
