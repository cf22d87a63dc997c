//! GeniDex client SDK.
//!
//! # Overview
//!
//! Client for the GeniDex order book contract and its rewarder.
//!
//! Use [`network::NetworkRegistry`] to resolve the deployment of a network, then
//! [`client::GeniDex::connect`] to get a client bound to the exchange contract.
//!
//! Every contract call goes through [`gateway::Gateway`], which resolves methods
//! against the runtime ABI, checks that the contract is deployed and that the signer
//! is connected to the right chain, and simulates every transaction before sending it.
//! Submitted transactions are tracked by [`tx::wait_for_confirms`] until they reach
//! the requested confirmation depth, revert, get dropped or time out.
//!
//! Limit orders need the IDs of the counter-orders they are allowed to match,
//! see [`types::select_matching_order_ids`] and [`types::find_filled_slot`].
//!
//! Failures carry the decoded invocation and, when recoverable, the decoded
//! revert reason, see [`revert::CallFailure`].
//!
//! # Amounts
//!
//! All amounts crossing the client boundary are canonical 18-decimal fixed-point
//! integers, see [`num`] for conversions to and from token native precision.
//!
//! # Testing
//!
//! [`testing`] module provides a scripted chain to exercise transaction tracking
//! without a node, and a local Anvil node for end-to-end tests.

pub mod abi;
pub mod client;
pub mod error;
pub mod gateway;
pub mod network;
pub mod num;
pub mod revert;
pub mod testing;
pub mod tx;
pub mod types;

/// Name used as a prefix of decorated error messages.
pub const LIBRARY_NAME: &str = "GeniDex";

pub use client::{GeniDex, PlaceOrder, Rewarder};
pub use error::DexError;
pub use gateway::{Gateway, Overrides, Signer, SubmittedTx, WriteCall};
pub use network::{NetworkConfig, NetworkRegistry};
pub use tx::WaitOptions;
