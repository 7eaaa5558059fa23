// src/miner/worker.rs
//! Worker thread implementation
//!
//! A worker owns one contiguous nonce range of a session. It waits on the
//! pool's start gate, then hashes nonce after nonce until it finds a
//! solution, runs out of range, or sees the session flag cleared.

use crate::miner::algorithm::HashProbe;
use crate::miner::scheduler::NonceRange;
use crate::miner::signal::{MiningFlag, StartGate};
use crate::network::Ledger;
use crate::types::WorkTarget;
use crate::utils::error::MinerError;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

/// What every worker of a session hashes against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionJob {
    /// Mining address, first part of the hash input
    pub address: Arc<str>,
    /// Block being mined, second part of the hash input
    pub block_id: Arc<str>,
    /// Threshold a hash value must fall below
    pub target: WorkTarget,
    /// Session number, used to discard reports from replaced pools
    pub generation: u64,
}

/// Progress counter of one worker
///
/// Written only by the owning worker thread and read lock-free by the
/// rate sampler. A stale read is fine for a display metric.
#[derive(Debug)]
pub struct WorkerProgress {
    index: usize,
    start: u64,
    current: AtomicU64,
}

impl WorkerProgress {
    /// Creates a counter positioned at the start of the range
    pub fn new(index: usize, start: u64) -> Self {
        WorkerProgress {
            index,
            start,
            current: AtomicU64::new(start),
        }
    }

    /// Index of the worker within its pool
    pub fn index(&self) -> usize {
        self.index
    }

    /// First nonce of the worker's range
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Next nonce the worker will try
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }

    /// Hashes computed so far
    pub fn hashes(&self) -> u64 {
        self.current().saturating_sub(self.start)
    }

    /// Records that every nonce below `next` has been tried
    pub fn advance(&self, next: u64) {
        self.current.store(next, Ordering::Relaxed);
    }
}

/// Final state of a worker that ran out of range or solved the block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// Index of the worker within its pool
    pub worker_index: usize,
    /// Session the worker belonged to
    pub generation: u64,
    /// Whether the worker found the solution
    pub solved: bool,
    /// Winning nonce when `solved`
    pub nonce: Option<u64>,
    /// Next nonce the worker would have tried
    pub current_nonce: u64,
}

/// Messages drained by the coordinator's supervisor thread
#[derive(Debug)]
pub enum Event {
    /// A worker completed (solved or exhausted)
    Finished(WorkerReport),
    /// The user asked to stop mining
    Stop,
}

/// How a worker's run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Found a hash below target at this nonce
    Solved(u64),
    /// Tried every nonce of the range
    Exhausted,
    /// The session flag was cleared first
    Cancelled,
}

/// Everything a pool's workers share
#[derive(Clone)]
pub struct PoolContext {
    /// Session parameters
    pub job: Arc<SessionJob>,
    /// Hash function
    pub probe: Arc<dyn HashProbe>,
    /// Where solutions are submitted
    pub ledger: Arc<dyn Ledger>,
    /// Session cancellation flag
    pub flag: MiningFlag,
    /// Gate released once the pool is built
    pub gate: StartGate,
    /// Completion reports go here
    pub events: Sender<Event>,
}

/// Worker that searches one nonce range
pub struct Worker {
    index: usize,
    range: NonceRange,
    progress: Arc<WorkerProgress>,
    ctx: PoolContext,
}

impl Worker {
    /// Creates a worker for `range`
    ///
    /// # Arguments
    /// * `index` - Position in the pool
    /// * `range` - Nonces this worker is responsible for
    /// * `ctx` - Shared pool state
    pub fn new(index: usize, range: NonceRange, ctx: PoolContext) -> Self {
        Worker {
            index,
            range,
            progress: Arc::new(WorkerProgress::new(index, range.start)),
            ctx,
        }
    }

    /// Handle to the worker's progress counter
    pub fn progress(&self) -> Arc<WorkerProgress> {
        self.progress.clone()
    }

    /// Runs the worker on a dedicated, named OS thread
    pub fn spawn(self) -> Result<JoinHandle<Outcome>, MinerError> {
        std::thread::Builder::new()
            .name(format!("miner-{}", self.index))
            .spawn(move || self.run())
            .map_err(|e| MinerError::TaskError(format!("Failed to spawn worker: {}", e)))
    }

    /// Searches the range on the current thread
    ///
    /// Blocks on the start gate first. The session flag is checked before
    /// every hash, so a cleared flag costs at most one more hash.
    pub fn run(self) -> Outcome {
        self.ctx.gate.wait();

        let job = &self.ctx.job;
        log::debug!(
            "Worker {} starting at {} from nonce {}",
            self.index,
            job.block_id,
            self.range.start
        );

        let mut outcome = Outcome::Exhausted;
        for nonce in self.range.start..self.range.end() {
            if !self.ctx.flag.is_active() {
                log::debug!("Worker {} cancelled at nonce {}", self.index, nonce);
                return Outcome::Cancelled;
            }

            let solved = self
                .ctx
                .probe
                .meets(&job.address, &job.block_id, nonce, job.target);
            self.progress.advance(nonce + 1);

            if solved {
                // A sibling or the user got there first.
                if !self.ctx.flag.claim() {
                    return Outcome::Cancelled;
                }
                outcome = Outcome::Solved(nonce);
                break;
            }
        }

        if let Outcome::Solved(nonce) = outcome {
            log::info!(
                "Worker {} found a solution for {} at nonce {} (hash {})",
                self.index,
                job.block_id,
                nonce,
                self.ctx.probe.short_hex(&job.address, &job.block_id, nonce)
            );
            if let Err(e) = self.ctx.ledger.submit_solution(&job.address, nonce) {
                log::error!("Submitting nonce {} failed: {}", nonce, e);
            }
        }

        self.report(outcome);
        outcome
    }

    fn report(&self, outcome: Outcome) {
        let nonce = match outcome {
            Outcome::Solved(nonce) => Some(nonce),
            _ => None,
        };
        let report = WorkerReport {
            worker_index: self.index,
            generation: self.ctx.job.generation,
            solved: nonce.is_some(),
            nonce,
            current_nonce: self.progress.current(),
        };

        if self.ctx.events.send(Event::Finished(report)).is_err() {
            log::warn!("Worker {} finished after the coordinator went away", self.index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RiggedProbe, ScriptedLedger};
    use crossbeam_channel::{Receiver, unbounded};
    use std::time::Duration;

    const ADDRESS: &str = "kre3dMligq";
    const BLOCK: &str = "0000000000";

    fn context(
        probe: RiggedProbe,
        ledger: Arc<ScriptedLedger>,
    ) -> (PoolContext, Receiver<Event>) {
        let (events, rx) = unbounded();
        let ctx = PoolContext {
            job: Arc::new(SessionJob {
                address: ADDRESS.into(),
                block_id: BLOCK.into(),
                target: WorkTarget::Numeric(5000),
                generation: 7,
            }),
            probe: Arc::new(probe),
            ledger,
            flag: MiningFlag::new(),
            gate: StartGate::new(),
            events,
        };
        (ctx, rx)
    }

    fn finished(rx: &Receiver<Event>) -> WorkerReport {
        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Event::Finished(report)) => report,
            other => panic!("expected a report, got {:?}", other),
        }
    }

    #[test]
    fn exhausted_range_reports_once() {
        let ledger = Arc::new(ScriptedLedger::new(&[BLOCK]));
        let (ctx, rx) = context(RiggedProbe::never(), ledger.clone());
        ctx.gate.release();

        let worker = Worker::new(1, NonceRange { start: 1000, len: 1000 }, ctx);
        let progress = worker.progress();
        assert_eq!(worker.run(), Outcome::Exhausted);

        let report = finished(&rx);
        assert_eq!(report.worker_index, 1);
        assert_eq!(report.generation, 7);
        assert!(!report.solved);
        assert_eq!(report.current_nonce, 2000);
        assert_eq!(progress.hashes(), 1000);
        assert!(rx.try_recv().is_err());
        assert!(ledger.submissions().is_empty());
    }

    #[test]
    fn solution_is_submitted_and_clears_flag() {
        let ledger = Arc::new(ScriptedLedger::new(&[BLOCK]));
        let (ctx, rx) = context(RiggedProbe::solving(BLOCK, 1432), ledger.clone());
        let flag = ctx.flag.clone();
        ctx.gate.release();

        let worker = Worker::new(1, NonceRange { start: 1000, len: 1000 }, ctx);
        assert_eq!(worker.run(), Outcome::Solved(1432));

        let report = finished(&rx);
        assert!(report.solved);
        assert_eq!(report.nonce, Some(1432));
        assert_eq!(report.current_nonce, 1433);
        assert!(!flag.is_active());
        assert_eq!(ledger.submissions(), vec![(ADDRESS.to_string(), 1432)]);
    }

    #[test]
    fn failed_submission_still_reports_solution() {
        let ledger = Arc::new(ScriptedLedger::new(&[BLOCK]).failing_submissions());
        let (ctx, rx) = context(RiggedProbe::solving(BLOCK, 3), ledger.clone());
        ctx.gate.release();

        let worker = Worker::new(0, NonceRange { start: 0, len: 10 }, ctx);
        assert_eq!(worker.run(), Outcome::Solved(3));
        assert!(finished(&rx).solved);
        assert_eq!(ledger.submissions().len(), 1);
    }

    #[test]
    fn cancelled_worker_stays_silent() {
        let ledger = Arc::new(ScriptedLedger::new(&[BLOCK]));
        let (ctx, rx) = context(RiggedProbe::never(), ledger);
        ctx.flag.cancel();
        ctx.gate.release();

        let worker = Worker::new(0, NonceRange { start: 0, len: 1000 }, ctx);
        let progress = worker.progress();
        assert_eq!(worker.run(), Outcome::Cancelled);
        assert_eq!(progress.hashes(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn worker_waits_for_gate() {
        let ledger = Arc::new(ScriptedLedger::new(&[BLOCK]));
        let (ctx, rx) = context(RiggedProbe::never(), ledger);
        let gate = ctx.gate.clone();

        let worker = Worker::new(0, NonceRange { start: 0, len: 100 }, ctx);
        let progress = worker.progress();
        let handle = worker.spawn().unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(progress.hashes(), 0);

        gate.release();
        assert_eq!(handle.join().unwrap(), Outcome::Exhausted);
        assert!(!finished(&rx).solved);
    }

    #[test]
    fn losing_the_claim_counts_as_cancelled() {
        let ledger = Arc::new(ScriptedLedger::new(&[BLOCK]));
        let (ctx, rx) = context(RiggedProbe::solving(BLOCK, 0), ledger.clone());
        ctx.gate.release();
        let flag = ctx.flag.clone();

        // Sibling claimed between our flag check and the hash.
        let probe = RiggedProbe::solving(BLOCK, 0).claiming_first(flag);
        let ctx = PoolContext {
            probe: Arc::new(probe),
            ..ctx
        };

        let worker = Worker::new(0, NonceRange { start: 0, len: 10 }, ctx);
        assert_eq!(worker.run(), Outcome::Cancelled);
        assert!(rx.try_recv().is_err());
        assert!(ledger.submissions().is_empty());
    }
}
