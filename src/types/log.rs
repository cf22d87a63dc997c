use alloy::{
    dyn_abi::{DynSolValue, EventExt},
    json_abi::JsonAbi,
    primitives::{Address, TxHash},
    rpc::types::Log,
};
use serde_json::{Map, Value};

use crate::revert::{Decoded, NamedValue, json_value};

/// Event log decoded against the contract ABI.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedLog {
    pub name: String,
    pub signature: String,
    /// Arguments in declaration order, indexed ones included.
    pub args: Vec<NamedValue>,
    pub log_index: Option<u64>,
    pub transaction_hash: Option<TxHash>,
    pub address: Address,
}

impl DecodedLog {
    /// Decodes the log, `None` if no event of the ABI matches it.
    pub fn decode(abi: &JsonAbi, log: &Log) -> Option<Self> {
        let topic0 = log.topics().first()?;
        let event = abi
            .events()
            .find(|e| !e.anonymous && e.selector() == *topic0)?;
        let decoded = event.decode_log(&log.inner.data).ok()?;

        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let values = event
            .inputs
            .iter()
            .map(|p| if p.indexed { indexed.next() } else { body.next() })
            .collect::<Option<Vec<_>>>()?;
        let decoded = Decoded::new(
            &event.name,
            event.signature(),
            event.inputs.iter().map(|p| p.name.as_str()),
            values,
        );

        Some(Self {
            name: decoded.name,
            signature: decoded.signature,
            args: decoded.args,
            log_index: log.log_index,
            transaction_hash: log.transaction_hash,
            address: log.address(),
        })
    }

    pub fn arg(&self, name: &str) -> Option<&DynSolValue> {
        self.args.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    /// Arguments keyed by parameter name, or by position if unnamed.
    pub fn args_object(&self) -> Map<String, Value> {
        self.args
            .iter()
            .map(|a| (a.name.clone(), json_value(&a.value)))
            .collect()
    }
}
