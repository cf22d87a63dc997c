use alloy::{
    consensus::Transaction as ConsensusTx,
    eips::{BlockId, BlockNumberOrTag},
    network::{ReceiptResponse, TransactionBuilder, TransactionResponse},
    primitives::{Address, Bytes, TxHash, U256},
    providers::Provider,
    rpc::types::{Transaction, TransactionReceipt, TransactionRequest},
};

use crate::{error::DexError, revert};

/// Receipt of a mined transaction, as far as the tracker is concerned.
pub trait MinedReceipt {
    /// `false` if the transaction reverted.
    fn succeeded(&self) -> bool;

    /// Number of the block the transaction was mined in.
    fn mined_in(&self) -> u64;
}

impl MinedReceipt for TransactionReceipt {
    fn succeeded(&self) -> bool {
        ReceiptResponse::status(self)
    }

    fn mined_in(&self) -> u64 {
        ReceiptResponse::block_number(self).unwrap_or_default()
    }
}

/// Transaction as seen in the mempool or in a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxSummary {
    pub hash: TxHash,
    pub from: Address,
    pub nonce: u64,
    pub to: Option<Address>,
    pub input: Bytes,
    pub value: U256,
}

impl TxSummary {
    pub fn new(hash: TxHash, from: Address, nonce: u64) -> Self {
        Self {
            hash,
            from,
            nonce,
            to: None,
            input: Bytes::new(),
            value: U256::ZERO,
        }
    }

    pub fn with_call(mut self, to: Address, input: Bytes) -> Self {
        self.to = Some(to);
        self.input = input;
        self
    }

    /// Static call request reproducing the transaction.
    pub fn replay_request(&self) -> TransactionRequest {
        let request = TransactionRequest::default()
            .with_from(self.from)
            .with_input(self.input.clone())
            .with_value(self.value);
        match self.to {
            Some(to) => request.with_to(to),
            None => request,
        }
    }
}

impl From<&Transaction> for TxSummary {
    fn from(tx: &Transaction) -> Self {
        Self {
            hash: TransactionResponse::tx_hash(tx),
            from: TransactionResponse::from(tx),
            nonce: ConsensusTx::nonce(tx),
            to: ConsensusTx::to(tx),
            input: ConsensusTx::input(tx).clone(),
            value: ConsensusTx::value(tx),
        }
    }
}

/// Source of the chain state the transaction tracker polls.
pub trait ChainOracle: Sync {
    type Receipt: MinedReceipt + Send;

    /// Receipt of a mined transaction, `None` while it is pending or unknown.
    fn receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<Option<Self::Receipt>, DexError>> + Send;

    /// Transaction from the mempool or the chain, `None` if the node does not know it.
    fn transaction(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<Option<TxSummary>, DexError>> + Send;

    fn block_number(&self) -> impl Future<Output = Result<u64, DexError>> + Send;

    /// Transactions included in the block, empty if the block is not known.
    fn block_transactions(
        &self,
        number: u64,
    ) -> impl Future<Output = Result<Vec<TxSummary>, DexError>> + Send;

    /// Runs `request` as a static call at `block` (latest if `None`) and
    /// returns the revert data if it reverts with any.
    fn replay(
        &self,
        request: TransactionRequest,
        block: Option<u64>,
    ) -> impl Future<Output = Result<Option<Bytes>, DexError>> + Send;
}

/// [`ChainOracle`] backed by a node [`Provider`].
#[derive(Clone, Copy, Debug)]
pub struct RpcOracle<'a, P>(&'a P);

impl<'a, P: Provider> RpcOracle<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self(provider)
    }
}

impl<P: Provider> ChainOracle for RpcOracle<'_, P> {
    type Receipt = TransactionReceipt;

    async fn receipt(&self, hash: TxHash) -> Result<Option<TransactionReceipt>, DexError> {
        Ok(self.0.get_transaction_receipt(hash).await?)
    }

    async fn transaction(&self, hash: TxHash) -> Result<Option<TxSummary>, DexError> {
        Ok(self
            .0
            .get_transaction_by_hash(hash)
            .await?
            .as_ref()
            .map(TxSummary::from))
    }

    async fn block_number(&self) -> Result<u64, DexError> {
        Ok(self.0.get_block_number().await?)
    }

    async fn block_transactions(&self, number: u64) -> Result<Vec<TxSummary>, DexError> {
        let block = self
            .0
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full()
            .await?;
        Ok(block
            .map(|b| b.transactions.txns().map(TxSummary::from).collect())
            .unwrap_or_default())
    }

    async fn replay(
        &self,
        request: TransactionRequest,
        block: Option<u64>,
    ) -> Result<Option<Bytes>, DexError> {
        let block = block.map(BlockId::number).unwrap_or_else(BlockId::latest);
        match self.0.call(request).block(block).await {
            Ok(_) => Ok(None),
            Err(err) => match revert::revert_data(&err) {
                Some(data) => Ok(Some(data)),
                None => Err(err.into()),
            },
        }
    }
}
