use alloy::primitives::{Address, U256};

use super::MarketId;
use crate::{abi::genidex::GeniDex, num};

/// Snapshot of the market state, prices are in canonical units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Market {
    id: MarketId,
    symbol: String,
    price: U256,
    last_update_price: U256,
    base: Address,
    quote: Address,
    creator: Address,
    rewardable: bool,
}

impl Market {
    pub fn id(&self) -> MarketId {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Last traded price.
    pub fn price(&self) -> U256 {
        self.price
    }

    pub fn last_update_price(&self) -> U256 {
        self.last_update_price
    }

    pub fn base(&self) -> Address {
        self.base
    }

    pub fn quote(&self) -> Address {
        self.quote
    }

    pub fn creator(&self) -> Address {
        self.creator
    }

    /// Whether trading on the market earns rewards.
    pub fn is_rewardable(&self) -> bool {
        self.rewardable
    }
}

impl From<GeniDex::Market> for Market {
    fn from(market: GeniDex::Market) -> Self {
        Self {
            id: market.id.saturating_to(),
            symbol: market.symbol,
            price: market.price,
            last_update_price: market.lastUpdatePrice,
            base: market.baseAddress,
            quote: market.quoteAddress,
            creator: market.creator,
            rewardable: market.isRewardable,
        }
    }
}

/// Metadata of a token listed on the exchange.
///
/// Symbol and decimals never change on-chain, so token info is safe to cache
/// for the lifetime of the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
    address: Address,
    symbol: String,
    usd_market_id: MarketId,
    min_order_amount: U256,
    decimals: u8,
    usd: bool,
}

impl TokenInfo {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Market quoting the token in USD.
    pub fn usd_market_id(&self) -> MarketId {
        self.usd_market_id
    }

    /// Minimal order value, canonical units.
    pub fn min_order_amount(&self) -> U256 {
        self.min_order_amount
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn is_usd(&self) -> bool {
        self.usd
    }

    /// Converts raw token amount into canonical units.
    pub fn to_canonical(&self, raw: U256) -> U256 {
        num::to_canonical(raw, self.decimals)
    }

    /// Converts canonical amount into raw token units, truncating.
    pub fn to_raw(&self, canonical: U256) -> U256 {
        num::to_raw(canonical, self.decimals)
    }
}

impl From<GeniDex::TokenInfo> for TokenInfo {
    fn from(info: GeniDex::TokenInfo) -> Self {
        Self {
            address: info.tokenAddress,
            symbol: info.symbol,
            usd_market_id: info.usdMarketID.saturating_to(),
            min_order_amount: info.minOrderAmount,
            decimals: info.decimals,
            usd: info.isUSD,
        }
    }
}
