use std::{fmt::Display, time::Duration};

use alloy::{
    dyn_abi,
    primitives::{Address, TxHash},
    sol_types, transports,
};

use crate::revert::{CallFailure, DecodedError, DroppedTx, Invocation};

/// Errors of the GeniDex client.
///
/// Configuration and precondition failures get dedicated variants so callers can
/// branch on them, failed calls and transactions are reported as [`DexError::Call`]
/// with the decoded invocation and revert reason attached.
#[derive(Debug, thiserror::Error)]
pub enum DexError {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("contract {contract} is not deployed on network {network}")]
    MissingContract { network: String, contract: String },

    #[error("invalid network configuration: {0}")]
    Config(String),

    #[error("method not found in contract ABI: {0}")]
    MethodNotFound(String),

    #[error("invalid arguments for {method}: {reason}")]
    InvalidArguments { method: String, reason: String },

    #[error("chain mismatch, expected chain ID: {expected}, connected to: {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("no contract deployed at {address}")]
    ContractNotDeployed {
        address: Address,
        #[source]
        source: Option<Box<DexError>>,
    },

    #[error("{}", .0.message())]
    Call(Box<CallFailure>),

    #[error("transaction {} was dropped or replaced", .0.hash)]
    Dropped(Box<DroppedTx>),

    #[error("transaction {hash} was not confirmed within {elapsed:?}")]
    Timeout { hash: TxHash, elapsed: Duration },

    #[error("waiting for transaction {0} was cancelled")]
    Cancelled(TxHash),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unexpected empty RPC response")]
    NullResp,

    #[error("transaction ran out of gas")]
    OutOfGas,

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl DexError {
    /// Decoded revert reason, if the error is a failed call with recoverable revert data.
    pub fn revert(&self) -> Option<&DecodedError> {
        match self {
            DexError::Call(failure) => failure.revert.as_ref(),
            _ => None,
        }
    }

    /// Decoded call the error was raised for, if known.
    pub fn invocation(&self) -> Option<&Invocation> {
        match self {
            DexError::Call(failure) => Some(&failure.invocation),
            DexError::Dropped(dropped) => dropped.invocation.as_ref(),
            _ => None,
        }
    }

    /// JSON-RPC error code of the underlying failure.
    pub fn code(&self) -> Option<i64> {
        match self {
            DexError::Call(failure) => failure.code,
            _ => None,
        }
    }

    pub fn is_dropped(&self) -> bool {
        matches!(self, DexError::Dropped(_))
    }

    pub(crate) fn not_deployed(address: Address) -> Self {
        DexError::ContractNotDeployed {
            address,
            source: None,
        }
    }
}

impl<E: Display> From<transports::RpcError<E>> for DexError {
    fn from(value: transports::RpcError<E>) -> Self {
        match value {
            transports::RpcError::ErrorResp(ref resp) => {
                // Heuristic to determine if eth_call failed due to OutOfGas or
                // if transaction was reverted during the gas estimation
                let msg = resp.message.to_ascii_lowercase();
                if (resp.code == -32603) && (msg.contains("gas") || msg.contains("oog")) {
                    Self::OutOfGas
                } else if ((resp.code == -32600 || resp.code == -32601 || resp.code == -32602)
                    && (msg.contains("invalid") || msg.contains("not found")))
                    || (resp.code == -32603
                        && (msg.contains("block by number") || msg.contains("getting block")))
                {
                    Self::InvalidRequest(msg)
                } else if resp.code == 3 || msg.contains("revert") {
                    Self::Reverted(resp.message.to_string())
                } else {
                    Self::Transport(value.to_string())
                }
            }
            transports::RpcError::NullResp => Self::NullResp,
            _ => Self::Transport(value.to_string()),
        }
    }
}

impl From<sol_types::Error> for DexError {
    fn from(value: sol_types::Error) -> Self {
        Self::Fatal(value.to_string())
    }
}

impl From<dyn_abi::Error> for DexError {
    fn from(value: dyn_abi::Error) -> Self {
        Self::Fatal(value.to_string())
    }
}
