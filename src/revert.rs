//! Revert decoding and decorated call failures.
//!
//! Revert payloads are matched against the target contract ABI first and against
//! the standard ERC-20 errors second, so contract specific errors always win.
//! Standard `Error(string)` and `Panic(uint256)` payloads are decoded last.

use std::{fmt::Display, sync::Arc};

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt},
    hex,
    json_abi::{JsonAbi, Param},
    primitives::{Address, Bytes, TxHash},
    sol_types::{Panic, Revert, SolError},
    transports::RpcError,
};
use itertools::Itertools;
use serde_json::{Value, json};

use crate::{LIBRARY_NAME, abi, error::DexError};

/// Named argument of a decoded call or error.
/// Unnamed parameters are named by their position.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedValue {
    pub name: String,
    pub value: DynSolValue,
}

/// Human-readable form of an ABI-encoded call or error.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded {
    pub name: String,
    pub signature: String,
    pub args: Vec<NamedValue>,
    pub message: String,
}

/// Call that was attempted.
pub type Invocation = Decoded;

/// Custom error the call reverted with.
pub type DecodedError = Decoded;

impl Decoded {
    pub fn new<'a>(
        name: impl Into<String>,
        signature: impl Into<String>,
        names: impl IntoIterator<Item = &'a str>,
        values: Vec<DynSolValue>,
    ) -> Self {
        let name = name.into();
        let mut names = names.into_iter();
        let args = values
            .into_iter()
            .enumerate()
            .map(|(idx, value)| NamedValue {
                name: names
                    .next()
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| idx.to_string()),
                value,
            })
            .collect::<Vec<_>>();
        let message = format!(
            "{name}({})",
            args.iter()
                .map(|arg| format!("{}: {}", arg.name, format_value(&arg.value)))
                .join(", ")
        );
        Self {
            name,
            signature: signature.into(),
            args,
            message,
        }
    }

    pub(crate) fn from_params(
        name: &str,
        signature: String,
        params: &[Param],
        values: Vec<DynSolValue>,
    ) -> Self {
        Self::new(name, signature, params.iter().map(|p| p.name.as_str()), values)
    }

    /// Call that could not be matched against the ABI.
    pub fn opaque(calldata: &[u8]) -> Self {
        Self {
            name: "<unknown>".to_string(),
            signature: String::new(),
            args: vec![],
            message: format!("unknown call {}", hex::encode_prefixed(calldata)),
        }
    }

    pub fn arg(&self, name: &str) -> Option<&DynSolValue> {
        self.args.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "signature": self.signature,
            "args": self
                .args
                .iter()
                .map(|a| (a.name.clone(), json_value(&a.value)))
                .collect::<serde_json::Map<_, _>>(),
            "message": self.message,
        })
    }
}

/// Renders ABI value for diagnostics, integers in decimal.
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::FixedBytes(word, size) => hex::encode_prefixed(&word[..*size]),
        DynSolValue::Address(a) => a.to_string(),
        DynSolValue::Function(f) => f.to_string(),
        DynSolValue::Bytes(b) => hex::encode_prefixed(b),
        DynSolValue::String(s) => format!("{s:?}"),
        DynSolValue::Array(values) | DynSolValue::FixedArray(values) => {
            format!("[{}]", values.iter().map(format_value).join(", "))
        }
        DynSolValue::Tuple(values) => {
            format!("({})", values.iter().map(format_value).join(", "))
        }
        #[allow(unreachable_patterns)]
        other => format!("{other:?}"),
    }
}

/// JSON form of ABI value with big integers stringified.
pub fn json_value(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(values)
        | DynSolValue::FixedArray(values)
        | DynSolValue::Tuple(values) => Value::Array(values.iter().map(json_value).collect()),
        other => Value::String(format_value(other)),
    }
}

/// Stage a call failed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Read-only contract call.
    Read,
    /// Pre-flight static call of a transaction.
    Simulation,
    /// Transaction submission.
    Submission,
    /// Transaction mined but reverted.
    Execution,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Read => "read",
            FailureKind::Simulation => "simulation",
            FailureKind::Submission => "submission",
            FailureKind::Execution => "execution",
        }
    }
}

/// Failed contract call with the decoded context attached.
#[derive(Debug)]
pub struct CallFailure {
    pub kind: FailureKind,
    pub invocation: Invocation,
    pub revert: Option<DecodedError>,
    /// JSON-RPC error code, if the failure came from an RPC error response.
    pub code: Option<i64>,
    /// Underlying failure.
    pub cause: DexError,
}

impl CallFailure {
    /// `"GeniDex Error:\n<invocation>\n<revert>"` if the revert reason is known,
    /// JSON dump of the failure otherwise.
    pub fn message(&self) -> String {
        match &self.revert {
            Some(revert) => format!(
                "{LIBRARY_NAME} Error:\n{}\n{}",
                self.invocation.message, revert.message
            ),
            None => json!({
                "kind": self.kind.as_str(),
                "code": self.code,
                "invocation": self.invocation.to_json(),
                "cause": self.cause.to_string(),
            })
            .to_string(),
        }
    }
}

/// Transaction that disappeared from both the mempool and the chain.
///
/// `from` and `nonce` are what the tracker last observed while the transaction
/// was pending; use them with [`crate::tx::find_tx_by_nonce`] to locate the
/// replacing transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct DroppedTx {
    pub hash: TxHash,
    pub invocation: Option<Invocation>,
    pub from: Option<Address>,
    pub nonce: Option<u64>,
}

/// Raw revert data of an RPC error response, if any.
pub fn revert_data<E>(err: &RpcError<E>) -> Option<Bytes> {
    err.as_error_resp().and_then(|payload| payload.as_revert_data())
}

/// Decodes revert payloads and calldata of a contract.
#[derive(Clone, Debug)]
pub struct RevertDecoder {
    contract: Arc<JsonAbi>,
    fallback: Arc<JsonAbi>,
}

impl RevertDecoder {
    pub fn new(contract: Arc<JsonAbi>) -> Self {
        Self {
            contract,
            fallback: Arc::new(abi::erc20_errors_abi()),
        }
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.contract
    }

    /// Decodes revert payload, trying the contract ABI, then ERC-20 errors,
    /// then standard `Error(string)`/`Panic(uint256)`.
    pub fn decode(&self, data: &[u8]) -> Option<DecodedError> {
        if data.len() < 4 {
            return None;
        }
        [&self.contract, &self.fallback]
            .into_iter()
            .find_map(|abi| decode_custom_error(abi, data))
            .or_else(|| decode_standard_revert(data))
    }

    /// Decodes revert data carried by the RPC error, if any.
    pub fn decode_rpc<E>(&self, err: &RpcError<E>) -> Option<DecodedError> {
        revert_data(err).and_then(|data| self.decode(&data))
    }

    /// Describes a call by its calldata, matching the selector against the contract ABI.
    pub fn invocation_from_calldata(&self, calldata: &[u8]) -> Option<Invocation> {
        let (selector, args) = calldata.split_first_chunk::<4>()?;
        let function = self
            .contract
            .functions()
            .find(|f| f.selector().as_slice() == selector)?;
        let values = function.abi_decode_input(args).ok()?;
        Some(Decoded::from_params(
            &function.name,
            function.signature(),
            &function.inputs,
            values,
        ))
    }

    /// Wraps the RPC error into decorated [`DexError::Call`].
    /// The original error is kept as the failure cause.
    pub fn failure<E: Display>(
        &self,
        kind: FailureKind,
        invocation: Invocation,
        err: RpcError<E>,
    ) -> DexError {
        let revert = self.decode_rpc(&err);
        let code = err.as_error_resp().map(|payload| payload.code);
        DexError::Call(Box::new(CallFailure {
            kind,
            invocation,
            revert,
            code,
            cause: DexError::from(err),
        }))
    }
}

fn decode_custom_error(abi: &JsonAbi, data: &[u8]) -> Option<DecodedError> {
    let (selector, args) = data.split_first_chunk::<4>()?;
    abi.errors()
        .filter(|e| e.selector().as_slice() == selector)
        .find_map(|error| {
            error.abi_decode_input(args).ok().map(|values| {
                Decoded::from_params(&error.name, error.signature(), &error.inputs, values)
            })
        })
}

fn decode_standard_revert(data: &[u8]) -> Option<DecodedError> {
    if let Ok(revert) = Revert::abi_decode(data) {
        return Some(Decoded::new(
            "Error",
            Revert::SIGNATURE,
            ["reason"],
            vec![DynSolValue::String(revert.reason)],
        ));
    }
    Panic::abi_decode(data).ok().map(|panic| {
        Decoded::new(
            "Panic",
            Panic::SIGNATURE,
            ["code"],
            vec![DynSolValue::Uint(panic.code, 256)],
        )
    })
}
