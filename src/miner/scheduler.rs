// src/miner/scheduler.rs
//! Nonce range scheduling
//!
//! Splits the nonce space of one session into contiguous, disjoint chunks,
//! one per worker, and computes where the next session continues.

use crate::utils::error::MinerError;

/// Contiguous block of nonces assigned to a single worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRange {
    /// First nonce of the range
    pub start: u64,
    /// Number of nonces in the range
    pub len: u64,
}

impl NonceRange {
    /// One past the last nonce of the range
    pub fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// Assigns worker `i` the range `[base + i * range_size, base + (i + 1) * range_size)`
///
/// # Arguments
/// * `nonce_base` - First nonce of the session
/// * `range_size` - Nonces per worker
/// * `workers` - Pool size
///
/// # Errors
/// Returns `MinerError::InputError` for an empty pool, an empty range, or
/// a session that would run past `u64::MAX`.
pub fn partition(
    nonce_base: u64,
    range_size: u64,
    workers: usize,
) -> Result<Vec<NonceRange>, MinerError> {
    if workers == 0 || range_size == 0 {
        return Err(MinerError::InputError(format!(
            "Cannot partition {} nonces across {} workers",
            range_size, workers
        )));
    }

    (workers as u64)
        .checked_mul(range_size)
        .and_then(|span| nonce_base.checked_add(span))
        .ok_or_else(|| {
            MinerError::InputError(format!("Nonce space exhausted past {}", nonce_base))
        })?;

    Ok((0..workers as u64)
        .map(|i| NonceRange {
            start: nonce_base + i * range_size,
            len: range_size,
        })
        .collect())
}

/// First nonce after every range of a session
pub fn next_base(ranges: &[NonceRange]) -> u64 {
    ranges.iter().map(NonceRange::end).max().unwrap_or(0)
}
