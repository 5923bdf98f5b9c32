//! NestYield Common Library
//!
//! Shared types, constants, and utilities for all NestYield contracts.
//! This crate provides the foundation for the pooled-deposit collection
//! yield protocol:
//!
//! - **Core Data Model**: Collection records, epochs, subsidy claims
//! - **Safe Math**: Checked arithmetic and fixed-point index helpers
//! - **Events**: Typed protocol events with an in-memory event log
//! - **Access Control**: Explicit role tables consulted per operation
//! - **Pause Controls**: Selective operation pausing
//! - **Asset Ledger**: Underlying-asset balance bookkeeping
//!
//! This crate is `no_std` compatible for embedded/WASM targets when built
//! without the default `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Re-export collection types for submodules based on feature
#[cfg(not(feature = "std"))]
pub use alloc::collections::{BTreeMap, BTreeSet};
#[cfg(not(feature = "std"))]
pub use alloc::vec::Vec;
#[cfg(feature = "std")]
pub use std::collections::{BTreeMap, BTreeSet};
#[cfg(feature = "std")]
pub use std::vec::Vec;

pub mod access_control;
pub mod constants;
pub mod errors;
pub mod events;
pub mod math;
pub mod pause;
pub mod token_ledger;
pub mod types;

// Re-exports for convenience
pub use access_control::*;
pub use constants::*;
pub use errors::*;
pub use events::*;
pub use math::*;
pub use pause::*;
pub use token_ledger::*;
pub use types::*;
