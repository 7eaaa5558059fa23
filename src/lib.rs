//! Krist Miner - multi-threaded proof-of-work miner for krist sync nodes
//!
//! This crate provides:
//! - A concurrent mining engine splitting the nonce space across worker threads
//! - Automatic restarts on exhausted ranges, new blocks and solved blocks
//! - Hash-rate sampling and console reporting
//! - A blocking HTTP client for the krist sync node

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Miner core implementation including hashing, workers and coordination
pub mod miner;

/// Ledger access
pub mod network;

/// Statistics collection and reporting functionality
pub mod stats;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

#[cfg(test)]
mod testing;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use miner::{Coordinator, HashProbe, MinerSettings, MiningListener, Sha256Probe};
pub use network::{Ledger, LedgerClient};
pub use stats::{RateSampler, StatsReporter};
pub use types::{CoreMask, MinerState, WorkTarget};
pub use utils::{MinerError, init_logging};
