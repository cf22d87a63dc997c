//! Configuration of the command line client.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): network registry, node, key
//! - CLI arguments: the command and its parameters

use std::time::Duration;

use alloy::{
    primitives::{Address, TxHash},
    signers::local::{LocalSignerError, PrivateKeySigner},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use genidex_sdk::{
    Overrides, PlaceOrder, WaitOptions,
    num::parse_canonical,
    types::{MarketId, OrderSide},
};
use url::Url;

/// Environment configuration.
#[derive(Debug, serde::Deserialize)]
pub struct EnvConfig {
    /// Path of the JSON network registry
    pub genidex_networks_path: String,

    /// Network to connect to (default: testnet)
    #[serde(default = "default_network")]
    pub genidex_network: String,

    /// RPC URL for the node
    pub node_rpc_url: String,

    /// Private key for signing transactions, read-only commands work without it
    pub private_key: Option<String>,
}

fn default_network() -> String {
    "testnet".to_string()
}

impl EnvConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn rpc_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.node_rpc_url)
    }

    pub fn signer(&self) -> Result<Option<PrivateKeySigner>, LocalSignerError> {
        self.private_key.as_deref().map(str::parse).transpose()
    }
}

#[derive(Debug, Parser)]
#[command(name = "genidex")]
#[command(about = "Command line client of the GeniDex exchange")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    /// Confirmations to wait for
    #[arg(long, global = true, default_value_t = 1)]
    pub confirmations: u64,

    /// Seconds to wait for confirmations, 0 to wait indefinitely
    #[arg(long, global = true, default_value_t = 120)]
    pub timeout_secs: u64,
}

impl CliConfig {
    pub fn wait_options(&self) -> WaitOptions {
        let options = WaitOptions::default().with_confirmations(self.confirmations);
        match self.timeout_secs {
            0 => options.without_timeout(),
            secs => options.with_timeout(Duration::from_secs(secs)),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List orders of the market
    Orders {
        market_id: MarketId,
        /// Only orders of this side
        #[arg(long, value_enum)]
        side: Option<Side>,
    },
    /// Show the market
    Market { market_id: MarketId },
    /// Wait for confirmations of the transaction
    Wait { hash: TxHash },
    /// Find recent transaction of the sender with the nonce
    FindTx { from: Address, nonce: u64 },
    /// Place buy limit order
    Buy(OrderArgs),
    /// Place sell limit order
    Sell(OrderArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Side {
    Buy,
    Sell,
}

impl From<Side> for OrderSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => OrderSide::Buy,
            Side::Sell => OrderSide::Sell,
        }
    }
}

#[derive(Debug, Args)]
pub struct OrderArgs {
    pub market_id: MarketId,

    /// Limit price (e.g., 1.25)
    pub price: String,

    /// Quantity of the base token (e.g., 100)
    pub quantity: String,

    #[arg(long)]
    pub referrer: Option<Address>,

    /// Nonce, to replace the pending transaction
    #[arg(long)]
    pub nonce: Option<u64>,
}

impl OrderArgs {
    pub fn to_place_order(&self) -> Result<PlaceOrder, ConfigError> {
        let price = parse_canonical(&self.price)
            .map_err(|_| ConfigError::InvalidAmount("price", self.price.clone()))?;
        let quantity = parse_canonical(&self.quantity)
            .map_err(|_| ConfigError::InvalidAmount("quantity", self.quantity.clone()))?;
        if quantity.is_zero() {
            return Err(ConfigError::ZeroQuantity);
        }

        let mut overrides = Overrides::default();
        overrides.nonce = self.nonce;
        Ok(PlaceOrder::new(self.market_id, price, quantity)
            .with_referrer(self.referrer.unwrap_or_default())
            .with_overrides(overrides))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {0} value: {1}")]
    InvalidAmount(&'static str, String),

    #[error("quantity cannot be zero")]
    ZeroQuantity,
}
