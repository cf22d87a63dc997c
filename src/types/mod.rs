mod log;
mod market;
mod order;

pub use log::DecodedLog;
pub use market::{Market, TokenInfo};
pub use order::*;

/// ID of the market, index in the exchange market list.
pub type MarketId = u64;

/// Slot index of the order in the market order list of its side.
///
/// Slots of filled orders are reused by new orders, so the ID is unique only
/// within particular market and side at the exact point in time.
pub type OrderId = u64;
