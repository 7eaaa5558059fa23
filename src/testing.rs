// src/testing.rs
//! Test doubles for the ledger, the hash probe, and the UI listener

use crate::miner::algorithm::HashProbe;
use crate::miner::listener::MiningListener;
use crate::miner::signal::MiningFlag;
use crate::network::Ledger;
use crate::types::{MinerState, WorkTarget};
use crate::utils::error::MinerError;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// In-memory ledger serving a scripted sequence of block ids
///
/// Each `last_block` call pops the next id; the last one repeats forever.
/// A window of `last_block` calls can be made to fail.
pub struct ScriptedLedger {
    blocks: Mutex<VecDeque<String>>,
    block_calls: AtomicU32,
    block_failures: (u32, u32),
    target: WorkTarget,
    valid_address: bool,
    fail_submissions: bool,
    submissions: Mutex<Vec<(String, u64)>>,
}

impl ScriptedLedger {
    pub fn new(blocks: &[&str]) -> Self {
        ScriptedLedger {
            blocks: Mutex::new(blocks.iter().map(|b| b.to_string()).collect()),
            block_calls: AtomicU32::new(0),
            block_failures: (0, 0),
            target: WorkTarget::Numeric(5000),
            valid_address: true,
            fail_submissions: false,
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_target(mut self, target: WorkTarget) -> Self {
        self.target = target;
        self
    }

    pub fn rejecting_addresses(mut self) -> Self {
        self.valid_address = false;
        self
    }

    pub fn failing_submissions(mut self) -> Self {
        self.fail_submissions = true;
        self
    }

    /// Lets the first `after` block lookups through, then fails `times`
    pub fn failing_blocks(mut self, after: u32, times: u32) -> Self {
        self.block_failures = (after, times);
        self
    }

    pub fn block_calls(&self) -> u32 {
        self.block_calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<(String, u64)> {
        self.submissions.lock().unwrap().clone()
    }
}

impl Ledger for ScriptedLedger {
    fn last_block(&self) -> Result<String, MinerError> {
        let call = self.block_calls.fetch_add(1, Ordering::SeqCst);
        let (after, times) = self.block_failures;
        if call >= after && call - after < times {
            return Err(MinerError::ConnectionError("sync node unreachable".into()));
        }

        let mut blocks = self.blocks.lock().unwrap();
        if blocks.len() > 1 {
            Ok(blocks.pop_front().unwrap())
        } else {
            blocks
                .front()
                .cloned()
                .ok_or_else(|| MinerError::ConnectionError("no blocks scripted".into()))
        }
    }

    fn work_target(&self) -> Result<WorkTarget, MinerError> {
        Ok(self.target)
    }

    fn balance(&self, _address: &str) -> Result<String, MinerError> {
        if self.valid_address {
            Ok("42".into())
        } else {
            Err(MinerError::ProtocolError("unknown address".into()))
        }
    }

    fn submit_solution(&self, address: &str, nonce: u64) -> Result<(), MinerError> {
        self.submissions
            .lock()
            .unwrap()
            .push((address.to_string(), nonce));
        if self.fail_submissions {
            Err(MinerError::ConnectionError("submission refused".into()))
        } else {
            Ok(())
        }
    }

    fn is_address_valid(&self, _address: &str) -> bool {
        self.valid_address
    }
}

/// Probe that solves exactly one `(block, nonce)` pair
///
/// Every other input hashes to `u64::MAX`. An optional per-hash delay
/// makes workers slow enough to observe cancellation.
pub struct RiggedProbe {
    winner: Option<(String, u64)>,
    delay: Duration,
    claim_first: Option<MiningFlag>,
    claimed: AtomicBool,
}

impl RiggedProbe {
    pub fn never() -> Self {
        RiggedProbe {
            winner: None,
            delay: Duration::ZERO,
            claim_first: None,
            claimed: AtomicBool::new(false),
        }
    }

    pub fn solving(block: &str, nonce: u64) -> Self {
        RiggedProbe {
            winner: Some((block.to_string(), nonce)),
            ..Self::never()
        }
    }

    pub fn slowed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Claims `flag` during the first hash, as a racing sibling would
    pub fn claiming_first(mut self, flag: MiningFlag) -> Self {
        self.claim_first = Some(flag);
        self
    }
}

impl HashProbe for RiggedProbe {
    fn value(&self, _address: &str, block: &str, nonce: u64) -> u64 {
        if let Some(flag) = &self.claim_first {
            if !self.claimed.swap(true, Ordering::SeqCst) {
                flag.claim();
            }
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        match &self.winner {
            Some((b, n)) if b == block && *n == nonce => 0,
            _ => u64::MAX,
        }
    }
}

/// Everything a [`RecordingListener`] saw
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Rate(f64),
    Solved(String),
    Restarted(String, u64),
    Error(String),
    Balance(String),
    State(MinerState),
}

/// Listener that records notices and lets tests wait for them
pub struct RecordingListener {
    log: Mutex<Vec<Notice>>,
    tx: Sender<Notice>,
    rx: Receiver<Notice>,
}

impl RecordingListener {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        RecordingListener {
            log: Mutex::new(Vec::new()),
            tx,
            rx,
        }
    }

    fn record(&self, notice: Notice) {
        self.log.lock().unwrap().push(notice.clone());
        let _ = self.tx.send(notice);
    }

    /// All notices so far, in order
    pub fn notices(&self) -> Vec<Notice> {
        self.log.lock().unwrap().clone()
    }

    /// Consumes notices until one matches, or panics after `timeout`
    pub fn wait_for(&self, timeout: Duration, matches: impl Fn(&Notice) -> bool) -> Notice {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(left) {
                Ok(notice) if matches(&notice) => return notice,
                Ok(_) => continue,
                Err(_) => panic!("timed out; saw {:?}", self.notices()),
            }
        }
    }

    pub fn count(&self, matches: impl Fn(&Notice) -> bool) -> usize {
        self.notices().iter().filter(|n| matches(n)).count()
    }
}

impl MiningListener for RecordingListener {
    fn on_rate_update(&self, hashes_per_second: f64) {
        self.record(Notice::Rate(hashes_per_second));
    }

    fn on_block_solved(&self, block_id: &str) {
        self.record(Notice::Solved(block_id.to_string()));
    }

    fn on_session_restarted(&self, block_id: &str, nonce_offset: u64) {
        self.record(Notice::Restarted(block_id.to_string(), nonce_offset));
    }

    fn on_error(&self, message: &str) {
        self.record(Notice::Error(message.to_string()));
    }

    fn on_balance_update(&self, balance: &str) {
        self.record(Notice::Balance(balance.to_string()));
    }

    fn on_state_change(&self, state: MinerState) {
        self.record(Notice::State(state));
    }
}
