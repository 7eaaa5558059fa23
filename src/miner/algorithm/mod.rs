// src/miner/algorithm/mod.rs
//! Hash probe implementations
//!
//! A probe turns `(address, block, nonce)` into the numeric value that is
//! compared against the ledger's work target. The default probe is
//! [`sha256::Sha256Probe`]; tests plug in their own.

/// SHA-256 probe used by the krist ledger
pub mod sha256;

use crate::types::WorkTarget;

/// Common interface for hash probes
///
/// Implementations must be pure: the same input always yields the same
/// value, and no state is shared between calls.
pub trait HashProbe: Send + Sync {
    /// Compute the numeric hash value for `address ∥ block ∥ nonce`
    fn value(&self, address: &str, block: &str, nonce: u64) -> u64;

    /// Check whether the nonce solves the block for `target`
    ///
    /// # Returns
    /// `true` if the hash value is strictly below a valid target
    fn meets(&self, address: &str, block: &str, nonce: u64, target: WorkTarget) -> bool {
        target.is_met_by(self.value(address, block, nonce))
    }

    /// Printable form of the compared value, for logs
    ///
    /// Defaults to the value as 12 hex digits.
    fn short_hex(&self, address: &str, block: &str, nonce: u64) -> String {
        format!("{:012x}", self.value(address, block, nonce))
    }
}

pub use sha256::Sha256Probe;
