// src/miner/algorithm/sha256.rs
//! SHA-256 hash probe
//!
//! The ledger hashes the UTF-8 concatenation of the address, the block id
//! and the decimal nonce, then reads the first 12 hex digits of the digest
//! as an integer. That is the first 6 digest bytes, big-endian.

use crate::miner::algorithm::HashProbe;
use sha2::{Digest, Sha256};

/// Number of digest bytes that make up the compared value
pub const VALUE_BYTES: usize = 6;

/// Stateless SHA-256 probe
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Probe;

impl Sha256Probe {
    /// Creates a new probe
    pub fn new() -> Self {
        Sha256Probe
    }

    /// Full digest of `address ∥ block ∥ nonce`
    pub fn digest(&self, address: &str, block: &str, nonce: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(address.as_bytes());
        hasher.update(block.as_bytes());
        hasher.update(nonce.to_string().as_bytes());
        hasher.finalize().into()
    }
}

/// Reads the compared value out of a digest
pub fn leading_value(digest: &[u8; 32]) -> u64 {
    digest[..VALUE_BYTES]
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

impl HashProbe for Sha256Probe {
    fn value(&self, address: &str, block: &str, nonce: u64) -> u64 {
        leading_value(&self.digest(address, block, nonce))
    }

    /// Hex form of the compared digest prefix, as the ledger displays it
    fn short_hex(&self, address: &str, block: &str, nonce: u64) -> String {
        hex::encode(&self.digest(address, block, nonce)[..VALUE_BYTES])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkTarget;
    use hex_literal::hex;

    const ABC: [u8; 32] = hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");

    #[test]
    fn leading_value_reads_twelve_hex_digits() {
        let digest: [u8; 32] = Sha256::digest(b"abc").into();
        assert_eq!(digest, ABC);
        assert_eq!(leading_value(&ABC), 0xba78_16bf_8f01);
    }

    #[test]
    fn probe_hashes_concatenated_input() {
        let probe = Sha256Probe::new();
        let mut manual = Sha256::new();
        manual.update(b"kre3dMligq");
        manual.update(b"0000000000");
        manual.update(b"1432");
        let manual: [u8; 32] = manual.finalize().into();
        let oneshot: [u8; 32] = Sha256::digest(b"kre3dMligq00000000001432").into();
        assert_eq!(manual, oneshot);

        assert_eq!(probe.digest("kre3dMligq", "0000000000", 1432), manual);
        assert_eq!(probe.value("kre3dMligq", "0000000000", 1432), leading_value(&manual));
    }

    #[test]
    fn nonce_is_appended_in_decimal() {
        let probe = Sha256Probe::new();
        assert_eq!(probe.digest("ab", "c", 7), probe.digest("a", "bc", 7));
        assert_eq!(probe.digest("a", "b", 12), probe.digest("a", "b1", 2));
    }

    #[test]
    fn short_hex_matches_value() {
        let probe = Sha256Probe::new();
        let hex = probe.short_hex("kre3dMligq", "0000000000", 99);
        assert_eq!(hex.len(), 12);
        assert_eq!(
            u64::from_str_radix(&hex, 16).unwrap(),
            probe.value("kre3dMligq", "0000000000", 99)
        );
    }

    #[test]
    fn meets_respects_target() {
        let probe = Sha256Probe::new();
        let value = probe.value("kre3dMligq", "0000000000", 5);
        assert!(probe.meets("kre3dMligq", "0000000000", 5, WorkTarget::Numeric(value + 1)));
        assert!(!probe.meets("kre3dMligq", "0000000000", 5, WorkTarget::Numeric(value)));
        assert!(!probe.meets("kre3dMligq", "0000000000", 5, WorkTarget::Invalid));
    }
}
