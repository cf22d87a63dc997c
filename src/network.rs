//! Networks the exchange is deployed on and the addresses of its contracts.
//!
//! The registry is a plain value owned by the caller. It is usually loaded once
//! from a JSON document:
//!
//! ```json
//! {
//!   "testnet": {
//!     "chainId": 1337,
//!     "contracts": { "GeniDex": "0xAAA…", "Rewarder": null }
//!   }
//! }
//! ```
//!
//! A `null` address means the contract is not deployed on that network yet.

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use alloy::primitives::Address;
use serde::Deserialize;

use crate::error::DexError;

/// Exchange contract.
pub const GENIDEX: &str = "GeniDex";
/// Trading rewards contract, optional.
pub const REWARDER: &str = "Rewarder";
/// Role/access manager contract, optional.
pub const ACCESS_MANAGER: &str = "AccessManager";

/// Deployment of the exchange on a particular chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    chain_id: u64,
    name: String,
    contracts: BTreeMap<String, Option<Address>>,
}

impl NetworkConfig {
    pub fn new<I, S>(name: impl Into<String>, chain_id: u64, contracts: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<Address>)>,
        S: Into<String>,
    {
        Self {
            chain_id,
            name: name.into(),
            contracts: contracts
                .into_iter()
                .map(|(contract, address)| (contract.into(), address))
                .collect(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contracts(&self) -> &BTreeMap<String, Option<Address>> {
        &self.contracts
    }

    /// Address of the contract, `None` if it is not deployed on this network.
    pub fn contract_address(&self, contract: &str) -> Option<Address> {
        self.contracts.get(contract).copied().flatten()
    }

    /// Address of the contract that must be deployed to proceed.
    pub fn contract(&self, contract: &str) -> Result<Address, DexError> {
        self.contract_address(contract)
            .ok_or_else(|| DexError::MissingContract {
                network: self.name.clone(),
                contract: contract.to_string(),
            })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNetwork {
    chain_id: u64,
    #[serde(default)]
    contracts: BTreeMap<String, Option<String>>,
}

/// Set of known networks, looked up by name.
#[derive(Clone, Debug, Default)]
pub struct NetworkRegistry {
    networks: HashMap<String, NetworkConfig>,
}

impl NetworkRegistry {
    pub fn new(networks: impl IntoIterator<Item = NetworkConfig>) -> Self {
        Self {
            networks: networks
                .into_iter()
                .map(|network| (network.name.clone(), network))
                .collect(),
        }
    }

    /// Parses the registry from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, DexError> {
        let raw: BTreeMap<String, RawNetwork> =
            serde_json::from_str(json).map_err(|e| DexError::Config(e.to_string()))?;
        let mut networks = Vec::with_capacity(raw.len());
        for (name, network) in raw {
            let mut contracts = BTreeMap::new();
            for (contract, address) in network.contracts {
                let address = address
                    .map(|a| {
                        a.parse::<Address>().map_err(|e| {
                            DexError::Config(format!("{name}.{contract}: {a}: {e}"))
                        })
                    })
                    .transpose()?;
                contracts.insert(contract, address);
            }
            networks.push(NetworkConfig {
                chain_id: network.chain_id,
                name,
                contracts,
            });
        }
        Ok(Self::new(networks))
    }

    /// Reads and parses the registry from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DexError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| DexError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn get_network(&self, name: &str) -> Result<&NetworkConfig, DexError> {
        self.networks
            .get(name)
            .ok_or_else(|| DexError::UnknownNetwork(name.to_string()))
    }

    pub fn networks(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.values()
    }
}
