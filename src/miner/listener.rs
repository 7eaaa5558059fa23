// src/miner/listener.rs
//! Notifications from the mining engine to its user interface
//!
//! Callbacks arrive on engine threads (sampler, supervisor, or whichever
//! thread called `start`), so implementations must be cheap and thread safe.

use crate::types::MinerState;

/// Receiver of mining progress events
pub trait MiningListener: Send + Sync {
    /// Aggregate hash rate of the live pool; `0.0` once it stops
    fn on_rate_update(&self, hashes_per_second: f64);

    /// A worker solved `block_id` and the solution was handed to the ledger
    fn on_block_solved(&self, block_id: &str);

    /// A pool started hashing `block_id` from `nonce_offset`
    fn on_session_restarted(&self, block_id: &str, nonce_offset: u64);

    /// Something went wrong that the user should see
    fn on_error(&self, message: &str);

    /// Fresh balance for the mining address
    fn on_balance_update(&self, _balance: &str) {}

    /// The coordinator changed state
    fn on_state_change(&self, _state: MinerState) {}
}
