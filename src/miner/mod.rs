// src/miner/mod.rs
//! Core mining functionality
//!
//! This module contains all components of the concurrent mining engine:
//! - Hash probes (what a nonce hashes to)
//! - Nonce range scheduling
//! - Worker threads and their cancellation and start signals
//! - The coordinator that runs pools against the ledger

/// Hash probe implementations
pub mod algorithm;

/// Pool lifecycle and restart decisions
pub mod coordinator;

/// Events the engine reports to its user interface
pub mod listener;

/// Nonce range partitioning
pub mod scheduler;

/// Cancellation flag and start gate
pub mod signal;

/// Worker thread implementation
///
/// Workers search one nonce range each and report completion to the
/// coordinator.
pub mod worker;

// Re-export main components for cleaner imports
pub use self::algorithm::{HashProbe, Sha256Probe};
pub use self::coordinator::{Coordinator, MinerSettings, MiningSession};
pub use self::listener::MiningListener;
pub use self::scheduler::{NonceRange, partition};
pub use self::signal::{MiningFlag, StartGate};
pub use self::worker::{Outcome, Worker, WorkerProgress, WorkerReport};
