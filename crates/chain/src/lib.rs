//! Keeper chain interaction layer.
//!
//! This crate provides:
//! - The [`ChainClient`] trait every keeper task talks to
//! - An alloy-backed HTTP implementation with a local signer
//! - Typed call descriptors ([`CallSpec`]) and the Rodeo contract catalog
//! - Catalog-driven fee pricing (legacy `gasPrice` or EIP-1559)

pub mod call;
pub mod client;
pub mod contracts;
pub mod error;
pub mod gas;
mod provider;
mod signer;

pub use call::{CallSpec, Mutability};
pub use client::{ChainClient, ChainLog, Confirmation, LogQuery, WriteOptions};
pub use contracts::{EarnEvent, InvestorEvent, PoolView, PositionView};
pub use error::ChainError;
pub use gas::{FeeQuote, GasPricing};
pub use provider::AlloyChainClient;
pub use signer::KeeperWallet;
