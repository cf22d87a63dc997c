//! Contract call gateway.
//!
//! Every read and write to a contract goes through [`Gateway`]:
//!
//! * methods are resolved against the runtime ABI ([`MethodTable`]), unknown
//!   methods fail with [`DexError::MethodNotFound`] before anything is sent;
//! * reads that fail, or return output that does not decode, are followed by
//!   a deployment check, so a call to an empty address is reported as
//!   [`DexError::ContractNotDeployed`];
//! * writes are preceded by three concurrent checks: the contract is deployed,
//!   the signer is connected to the expected chain, and a static call of the exact
//!   transaction succeeds. Only then the transaction is sent, with the nonce
//!   resolved upfront so that a replaced transaction can be looked up later.
//!
//! Call failures are decorated with the decoded invocation and revert reason,
//! see [`crate::revert`].

mod call;
mod methods;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use alloy::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
    json_abi::{Function, JsonAbi},
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxHash},
    providers::Provider,
    rpc::types::{TransactionReceipt, TransactionRequest},
    sol_types::SolCall,
};
use tracing::{debug, info, warn};

pub use call::*;
pub use methods::MethodTable;

use crate::{
    error::DexError,
    revert::{FailureKind, Invocation, RevertDecoder},
    tx::{self, RpcOracle, TxSummary, WaitOptions},
    types::DecodedLog,
};

/// Checked access to a single deployed contract.
///
/// Cheap to clone, clones share the deployment and network verification state.
#[derive(Clone, derive_more::Debug)]
pub struct Gateway<P> {
    address: Address,
    chain_id: u64,
    #[debug(skip)]
    provider: P,
    #[debug(skip)]
    methods: Arc<MethodTable>,
    #[debug(skip)]
    decoder: RevertDecoder,
    deployed: Arc<AtomicBool>,
    network_verified: Arc<AtomicBool>,
}

impl<P: Provider + Clone> Gateway<P> {
    /// Creates a gateway to the contract at `address` on the chain `chain_id`,
    /// described by the runtime `abi`.
    pub fn new(provider: P, address: Address, chain_id: u64, abi: JsonAbi) -> Self {
        let methods = Arc::new(MethodTable::new(&abi));
        Self {
            address,
            chain_id,
            provider,
            methods,
            decoder: RevertDecoder::new(Arc::new(abi)),
            deployed: Arc::new(AtomicBool::new(false)),
            network_verified: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    pub fn decoder(&self) -> &RevertDecoder {
        &self.decoder
    }

    /// Checks that the gateway provider is connected to the expected chain.
    /// Checked once per gateway.
    pub async fn ensure_provider_network(&self) -> Result<(), DexError> {
        if self.network_verified.load(Ordering::Acquire) {
            return Ok(());
        }
        self.ensure_chain(&self.provider).await?;
        self.network_verified.store(true, Ordering::Release);
        Ok(())
    }

    /// Checks that there is a contract code at the address.
    /// Checked once per gateway, only the positive result is cached.
    pub async fn ensure_deployed(&self) -> Result<(), DexError> {
        if self.deployed.load(Ordering::Acquire) {
            return Ok(());
        }
        let code = self.provider.get_code_at(self.address).await?;
        if code.is_empty() {
            return Err(DexError::not_deployed(self.address));
        }
        self.deployed.store(true, Ordering::Release);
        Ok(())
    }

    async fn ensure_chain<S: Provider>(&self, provider: &S) -> Result<(), DexError> {
        let actual = provider.get_chain_id().await?;
        if actual != self.chain_id {
            return Err(DexError::ChainMismatch {
                expected: self.chain_id,
                actual,
            });
        }
        Ok(())
    }

    fn encode(&self, method: &str, args: &[DynSolValue]) -> Result<(&Function, Bytes), DexError> {
        let function = self.methods.get(method)?;
        let calldata = function
            .abi_encode_input(args)
            .map_err(|e| DexError::InvalidArguments {
                method: method.to_string(),
                reason: e.to_string(),
            })?;
        Ok((function, calldata.into()))
    }

    fn invocation(&self, function: &Function, args: &[DynSolValue]) -> Invocation {
        Invocation::from_params(
            &function.name,
            function.signature(),
            &function.inputs,
            args.to_vec(),
        )
    }

    /// Read-only call of `method`, returns decoded outputs.
    pub async fn read(
        &self,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, DexError> {
        let (function, calldata) = self.encode(method, args)?;
        self.eth_call(
            calldata,
            || self.invocation(function, args),
            |output| Ok(function.abi_decode_output(output)?),
        )
        .await
    }

    /// Read-only typed call. The method still has to be present in the runtime ABI.
    pub async fn read_typed<C: SolCall>(&self, call: &C) -> Result<C::Return, DexError> {
        let method = C::SIGNATURE.split('(').next().unwrap_or(C::SIGNATURE);
        self.methods.get(method)?;
        let calldata = Bytes::from(call.abi_encode());
        self.eth_call(
            calldata.clone(),
            || {
                self.decoder
                    .invocation_from_calldata(&calldata)
                    .unwrap_or_else(|| Invocation::opaque(&calldata))
            },
            |output| Ok(C::abi_decode_returns(output)?),
        )
        .await
    }

    async fn eth_call<T>(
        &self,
        calldata: Bytes,
        invocation: impl FnOnce() -> Invocation,
        decode: impl FnOnce(&[u8]) -> Result<T, DexError>,
    ) -> Result<T, DexError> {
        let request = TransactionRequest::default()
            .with_to(self.address)
            .with_input(calldata);
        let failure = match self.provider.call(request).await {
            Ok(output) => match decode(&output) {
                Ok(decoded) => return Ok(decoded),
                Err(err) => err,
            },
            Err(err) => self.decoder.failure(FailureKind::Read, invocation(), err),
        };
        // Empty address answers calls with empty output or generic RPC errors,
        // report it as missing contract keeping the original failure as the source
        match self.ensure_deployed().await {
            Err(DexError::ContractNotDeployed { address, .. }) => {
                Err(DexError::ContractNotDeployed {
                    address,
                    source: Some(Box::new(failure)),
                })
            }
            _ => Err(failure),
        }
    }

    /// Sends the transaction calling `method` after the pre-flight checks.
    pub async fn write<S: Provider>(
        &self,
        call: WriteCall<'_, S>,
    ) -> Result<SubmittedTx<P>, DexError> {
        let (function, calldata) = self.encode(&call.method, &call.args)?;
        let invocation = self.invocation(function, &call.args);
        let signer = call.signer;

        let mut request = TransactionRequest::default()
            .with_from(signer.address())
            .with_to(self.address)
            .with_input(calldata);
        call.overrides.apply(&mut request);

        debug!(invocation = %invocation.message, "Running pre-flight checks");
        futures::try_join!(
            self.ensure_deployed(),
            self.ensure_chain(signer.provider()),
            self.simulate(signer.provider(), &request, &invocation),
        )?;

        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => {
                let nonce = signer
                    .provider()
                    .get_transaction_count(signer.address())
                    .pending()
                    .await?;
                request.set_nonce(nonce);
                nonce
            }
        };

        let pending = signer
            .provider()
            .send_transaction(request.clone())
            .await
            .map_err(|err| {
                self.decoder
                    .failure(FailureKind::Submission, invocation.clone(), err)
            })?;
        let hash = *pending.tx_hash();
        info!(%hash, nonce, method = %call.method, "Transaction submitted");

        Ok(SubmittedTx::new(
            hash,
            signer.address(),
            nonce,
            request,
            invocation,
            self.clone(),
        ))
    }

    async fn simulate<S: Provider>(
        &self,
        provider: &S,
        request: &TransactionRequest,
        invocation: &Invocation,
    ) -> Result<(), DexError> {
        provider
            .call(request.clone())
            .await
            .map(|_| ())
            .map_err(|err| {
                warn!(invocation = %invocation.message, "Pre-flight call failed");
                self.decoder
                    .failure(FailureKind::Simulation, invocation.clone(), err)
            })
    }

    /// Waits for confirmations of a transaction known only by its hash.
    pub async fn wait(
        &self,
        hash: TxHash,
        options: WaitOptions,
    ) -> Result<TransactionReceipt, DexError> {
        tx::wait(&RpcOracle::new(&self.provider), &self.decoder, hash, options).await
    }

    /// Looks up a recent transaction of `from` with `nonce`, see [`tx::find_tx_by_nonce`].
    pub async fn find_tx_by_nonce(
        &self,
        from: Address,
        nonce: u64,
    ) -> Result<Option<TxSummary>, DexError> {
        tx::find_tx_by_nonce(&RpcOracle::new(&self.provider), from, nonce).await
    }

    /// Decodes logs of the receipt emitted by this contract.
    pub fn decode_logs(&self, receipt: &TransactionReceipt) -> Vec<DecodedLog> {
        receipt
            .inner
            .logs()
            .iter()
            .filter(|log| log.address() == self.address)
            .filter_map(|log| DecodedLog::decode(self.decoder.abi(), log))
            .collect()
    }
}
