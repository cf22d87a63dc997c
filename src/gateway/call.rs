use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, TxHash, U256},
    providers::Provider,
    rpc::types::{TransactionReceipt, TransactionRequest},
};

use super::Gateway;
use crate::{
    error::DexError,
    revert::Invocation,
    tx::{self, RpcOracle, TrackedTx, WaitOptions},
};

/// Provider with a wallet attached, able to sign and send transactions
/// on behalf of `address`.
#[derive(Clone, Debug)]
pub struct Signer<P> {
    provider: P,
    address: Address,
}

impl<P: Provider> Signer<P> {
    pub fn new(provider: P, address: Address) -> Self {
        Self { provider, address }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

/// Transaction parameters overriding the ones filled by the provider.
///
/// Setting the `nonce` of a pending transaction allows to replace it,
/// e.g. with a higher fee.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Overrides {
    pub value: Option<U256>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub nonce: Option<u64>,
}

impl Overrides {
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub(crate) fn apply(&self, request: &mut TransactionRequest) {
        if let Some(value) = self.value {
            request.value = Some(value);
        }
        if let Some(gas) = self.gas_limit {
            request.gas = Some(gas);
        }
        if let Some(gas_price) = self.gas_price {
            request.gas_price = Some(gas_price);
        }
        if let Some(max_fee) = self.max_fee_per_gas {
            request.max_fee_per_gas = Some(max_fee);
        }
        if let Some(max_priority_fee) = self.max_priority_fee_per_gas {
            request.max_priority_fee_per_gas = Some(max_priority_fee);
        }
        if let Some(nonce) = self.nonce {
            request.nonce = Some(nonce);
        }
    }
}

/// State-changing contract call.
#[derive(Debug)]
pub struct WriteCall<'s, S> {
    pub(crate) signer: &'s Signer<S>,
    pub(crate) method: String,
    pub(crate) args: Vec<DynSolValue>,
    pub(crate) overrides: Overrides,
}

impl<'s, S: Provider> WriteCall<'s, S> {
    pub fn new(signer: &'s Signer<S>, method: impl Into<String>, args: Vec<DynSolValue>) -> Self {
        Self {
            signer,
            method: method.into(),
            args,
            overrides: Overrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Transaction accepted by the node.
///
/// Keeps the original request and its decoded invocation so that the revert
/// reason can be recovered if it fails on-chain.
#[derive(Clone, Debug)]
pub struct SubmittedTx<P> {
    hash: TxHash,
    from: Address,
    nonce: u64,
    request: TransactionRequest,
    invocation: Invocation,
    gateway: Gateway<P>,
}

impl<P: Provider + Clone> SubmittedTx<P> {
    pub(crate) fn new(
        hash: TxHash,
        from: Address,
        nonce: u64,
        request: TransactionRequest,
        invocation: Invocation,
        gateway: Gateway<P>,
    ) -> Self {
        Self {
            hash,
            from,
            nonce,
            request,
            invocation,
            gateway,
        }
    }

    pub fn hash(&self) -> TxHash {
        self.hash
    }

    pub fn sender(&self) -> Address {
        self.from
    }

    /// Nonce, either set by [`Overrides`] or the sender's pending nonce at submission.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn request(&self) -> &TransactionRequest {
        &self.request
    }

    /// Waits until the transaction gets the requested number of confirmations.
    ///
    /// Fails with decoded revert reason if the transaction reverts, with
    /// [`DexError::Dropped`] if it disappears (e.g. gets replaced), and with
    /// [`DexError::Timeout`] if the timeout elapses first.
    pub async fn wait_for_confirms(
        &self,
        options: WaitOptions,
    ) -> Result<TransactionReceipt, DexError> {
        let tracked = TrackedTx::new(self.hash)
            .with_call(self.request.clone(), self.invocation.clone())
            .with_sender(self.from, self.nonce);
        tx::wait_for_confirms(
            &RpcOracle::new(self.gateway.provider()),
            self.gateway.decoder(),
            tracked,
            options,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let mut request = TransactionRequest::default();
        request.gas_price = Some(7);
        Overrides::default()
            .with_value(U256::from(10))
            .with_nonce(3)
            .apply(&mut request);
        assert_eq!(request.value, Some(U256::from(10)));
        assert_eq!(request.nonce, Some(3));
        assert_eq!(request.gas_price, Some(7));
        assert_eq!(request.gas, None);
    }
}
