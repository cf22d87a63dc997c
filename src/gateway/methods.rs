use std::collections::HashMap;

use alloy::{
    json_abi::{Function, JsonAbi},
    primitives::Selector,
};
use tracing::warn;

use crate::error::DexError;

/// Contract methods indexed by name, built once from the runtime ABI.
///
/// Overloaded methods are not supported, only the first overload of
/// a name is dispatched to.
#[derive(Clone, Debug, Default)]
pub struct MethodTable {
    by_name: HashMap<String, Function>,
    by_selector: HashMap<Selector, String>,
}

impl MethodTable {
    pub fn new(abi: &JsonAbi) -> Self {
        let mut by_name = HashMap::new();
        let mut by_selector = HashMap::new();
        for (name, overloads) in &abi.functions {
            let Some(function) = overloads.first() else {
                continue;
            };
            if overloads.len() > 1 {
                warn!(%name, overloads = overloads.len(), "Overloaded method, using the first one");
            }
            by_selector.insert(function.selector(), name.clone());
            by_name.insert(name.clone(), function.clone());
        }
        Self {
            by_name,
            by_selector,
        }
    }

    pub fn get(&self, method: &str) -> Result<&Function, DexError> {
        self.by_name
            .get(method)
            .ok_or_else(|| DexError::MethodNotFound(method.to_string()))
    }

    pub fn contains(&self, method: &str) -> bool {
        self.by_name.contains_key(method)
    }

    pub fn by_selector(&self, selector: Selector) -> Option<&Function> {
        self.by_selector
            .get(&selector)
            .and_then(|name| self.by_name.get(name))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use alloy::sol_types::SolCall;

    use super::*;
    use crate::abi::{self, genidex::GeniDex};

    #[test]
    fn test_method_lookup() {
        let methods = MethodTable::new(&abi::genidex_abi());
        assert!(methods.contains("placeSellOrder"));
        assert_eq!(
            methods.get("getBuyOrders").unwrap().signature(),
            "getBuyOrders(uint256)"
        );
        assert!(matches!(
            methods.get("placeMarketOrder"),
            Err(DexError::MethodNotFound(ref m)) if m == "placeMarketOrder"
        ));
        assert_eq!(
            methods
                .by_selector(GeniDex::cancelSellOrderCall::SELECTOR.into())
                .map(|f| f.name.as_str()),
            Some("cancelSellOrder")
        );
    }

    #[test]
    fn test_overloads_keep_first() {
        let abi = JsonAbi::parse([
            "function transfer(address to, uint256 amount)",
            "function transfer(address to, uint256 amount, bytes data)",
        ])
        .unwrap();
        let methods = MethodTable::new(&abi);
        assert_eq!(methods.len(), 1);
        assert_eq!(methods.get("transfer").unwrap().inputs.len(), 2);
    }
}
