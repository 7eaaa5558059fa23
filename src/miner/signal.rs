// src/miner/signal.rs
//! Cross-thread signals shared by a pool
//!
//! - [`MiningFlag`]: cooperative cancellation, polled before every hash
//! - [`StartGate`]: one-shot gate holding workers until the pool is built

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Session-wide "is mining" flag
///
/// Every pool gets a fresh flag, so clearing it can never resurrect or
/// disturb a later pool. Clones share the same flag.
#[derive(Debug, Clone)]
pub struct MiningFlag {
    active: Arc<AtomicBool>,
}

impl MiningFlag {
    /// Creates a raised flag
    pub fn new() -> Self {
        MiningFlag {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether workers should keep hashing
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Clears the flag; idempotent
    pub fn cancel(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Clears the flag and reports whether this call was the one to clear it
    ///
    /// A worker that found a solution claims the session with this. Only
    /// one caller per flag can ever get `true`.
    pub fn claim(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }
}

impl Default for MiningFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot start gate
///
/// Workers call [`StartGate::wait`] first thing; the coordinator calls
/// [`StartGate::release`] once every worker and the rate sampler exist.
#[derive(Debug, Clone, Default)]
pub struct StartGate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StartGate {
    /// Creates a closed gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the gate is released
    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut open = lock.lock().unwrap_or_else(|e| e.into_inner());
        while !*open {
            open = cvar.wait(open).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Opens the gate for all current and future waiters
    pub fn release(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner()) = true;
        cvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn flag_clones_share_state() {
        let flag = MiningFlag::new();
        let other = flag.clone();
        assert!(other.is_active());
        flag.cancel();
        flag.cancel();
        assert!(!other.is_active());
    }

    #[test]
    fn only_one_claim_wins() {
        let flag = MiningFlag::new();
        let winners = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let flag = flag.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    if flag.claim() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(!flag.claim());
    }

    #[test]
    fn gate_holds_waiters_until_release() {
        let gate = StartGate::new();
        let passed = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let gate = gate.clone();
                let passed = passed.clone();
                std::thread::spawn(move || {
                    gate.wait();
                    passed.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(passed.load(Ordering::SeqCst), 0);

        gate.release();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(passed.load(Ordering::SeqCst), 3);

        // Late waiters pass straight through.
        gate.wait();
    }
}
