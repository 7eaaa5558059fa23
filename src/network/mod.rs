// src/network/mod.rs
//! Network communication components
//!
//! The mining engine only talks to the ledger through the [`Ledger`] trait.
//! [`LedgerClient`] is the HTTP implementation for a krist sync node; tests
//! substitute in-memory ledgers.

/// HTTP client for the krist sync node
pub mod ledger;

pub use ledger::{LedgerClient, LedgerConfig};

use crate::types::WorkTarget;
use crate::utils::error::MinerError;
use std::time::Duration;

/// Synchronous view of the remote ledger
///
/// Every call may block on the network. Implementations must be usable
/// from several threads at once: workers submit solutions from their own
/// threads while the coordinator fetches blocks.
pub trait Ledger: Send + Sync {
    /// Id of the block currently being mined
    fn last_block(&self) -> Result<String, MinerError>;

    /// Current work target; malformed answers yield [`WorkTarget::Invalid`]
    fn work_target(&self) -> Result<WorkTarget, MinerError>;

    /// Balance of `address` as the ledger prints it
    fn balance(&self, address: &str) -> Result<String, MinerError>;

    /// Hands a winning nonce to the ledger
    fn submit_solution(&self, address: &str, nonce: u64) -> Result<(), MinerError>;

    /// Whether the ledger knows `address`
    ///
    /// The default probes the balance lookup: an address without a balance
    /// page does not exist.
    fn is_address_valid(&self, address: &str) -> bool {
        !address.is_empty()
            && self
                .balance(address)
                .map(|balance| !balance.is_empty())
                .unwrap_or(false)
    }
}

/// How often, and how long, to retry a failing ledger call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between attempts
    pub delay: Duration,
    /// Give up after this many failed attempts; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            delay: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

/// Runs `op` until it succeeds, fails permanently, or `cancelled` turns true
///
/// Only transient errors (see [`MinerError::is_transient`]) are retried.
///
/// # Errors
/// - `MinerError::Cancelled` once `cancelled()` returns `true`
/// - the last transient error when `max_attempts` is exhausted
/// - any non-transient error straight away
pub fn retry<T, F>(
    policy: &RetryPolicy,
    what: &str,
    cancelled: &dyn Fn() -> bool,
    mut op: F,
) -> Result<T, MinerError>
where
    F: FnMut() -> Result<T, MinerError>,
{
    let mut failures = 0u32;
    loop {
        if cancelled() {
            return Err(MinerError::Cancelled);
        }

        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                failures += 1;
                if policy.max_attempts.is_some_and(|max| failures >= max) {
                    log::error!("{} failed after {} attempts: {}", what, failures, e);
                    return Err(e);
                }
                log::warn!(
                    "{} failed (attempt {}): {}; retrying in {:?}",
                    what,
                    failures,
                    e,
                    policy.delay
                );
                std::thread::sleep(policy.delay);
            }
            Err(e) => return Err(e),
        }
    }
}
