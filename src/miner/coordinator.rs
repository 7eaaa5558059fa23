// src/miner/coordinator.rs
//! Mining coordinator
//!
//! Owns the lifecycle of worker pools: validates the address, fetches the
//! block and target, partitions the nonce space, starts workers and the
//! rate sampler behind a start gate, and decides after every completion
//! whether to continue the same block at a higher nonce offset or move to
//! a new block.
//!
//! Completion reports from all workers funnel into a single channel that a
//! supervisor thread drains in order, so only one restart can ever happen
//! per session.

use crate::miner::algorithm::HashProbe;
use crate::miner::listener::MiningListener;
use crate::miner::scheduler::{self, NonceRange};
use crate::miner::signal::{MiningFlag, StartGate};
use crate::miner::worker::{Event, Outcome, PoolContext, SessionJob, Worker, WorkerProgress};
use crate::network::{self, Ledger, RetryPolicy};
use crate::stats::sampler::RateSampler;
use crate::types::{CoreMask, DEFAULT_CORE_LIMIT, MAX_CORE_LIMIT, MinerState, WorkTarget};
use crate::utils::error::MinerError;
use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// Tuning knobs of the mining engine
#[derive(Debug, Clone, PartialEq)]
pub struct MinerSettings {
    /// Highest number of workers a pool may use (1..=8)
    pub core_limit: usize,
    /// Nonces each worker searches per session
    pub range_size: u64,
    /// Rate sampler period
    pub sample_interval: Duration,
    /// Retry behaviour for ledger fetches
    pub retry: RetryPolicy,
}

impl Default for MinerSettings {
    fn default() -> Self {
        MinerSettings {
            core_limit: DEFAULT_CORE_LIMIT,
            range_size: 10_000_000,
            sample_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}

/// Read-only view of the live session
#[derive(Debug)]
pub struct MiningSession {
    job: Arc<SessionJob>,
    nonce_base: u64,
    ranges: Vec<NonceRange>,
    progress: Vec<Arc<WorkerProgress>>,
    flag: MiningFlag,
}

impl MiningSession {
    /// Block being mined
    pub fn block_id(&self) -> &str {
        &self.job.block_id
    }

    /// Work target of the block
    pub fn target(&self) -> WorkTarget {
        self.job.target
    }

    /// Mining address
    pub fn address(&self) -> &str {
        &self.job.address
    }

    /// First nonce of the session
    pub fn nonce_base(&self) -> u64 {
        self.nonce_base
    }

    /// Session number
    pub fn generation(&self) -> u64 {
        self.job.generation
    }

    /// Nonce ranges, indexed by worker
    pub fn ranges(&self) -> &[NonceRange] {
        &self.ranges
    }

    /// Current nonce of every worker
    pub fn worker_nonces(&self) -> Vec<u64> {
        self.progress.iter().map(|p| p.current()).collect()
    }

    /// Whether the session's workers are still allowed to hash
    pub fn is_active(&self) -> bool {
        self.flag.is_active()
    }
}

/// Where the next session should start
enum NextSession {
    /// Fetch a new block and target, refresh the balance, start at 0
    Fresh,
    /// Same block and target, continue after the previous session
    Continue { block_id: Arc<str>, target: WorkTarget, nonce_base: u64 },
    /// A block id already fetched, with a target still to fetch
    NewBlock { block_id: String },
}

/// A pool that is hashing or about to
struct LivePool {
    session: Arc<MiningSession>,
    gate: StartGate,
    workers: Vec<JoinHandle<Outcome>>,
    sampler: RateSampler,
    finished: usize,
}

impl LivePool {
    /// Cancels the pool and waits for its threads
    fn halt(mut self) {
        self.session.flag.cancel();
        // Workers still parked at the gate must get through to see the flag.
        self.gate.release();
        self.sampler.stop();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("A worker thread panicked");
            }
        }
    }
}

/// Passes `pool` to the thread started by `spawn`
///
/// The pool only leaves this function once the thread exists; if the
/// spawn fails, or the thread is gone before taking it, the pool is halted
/// here.
fn hand_off(
    pool: LivePool,
    spawn: impl FnOnce(Receiver<LivePool>) -> std::io::Result<JoinHandle<()>>,
) -> Result<JoinHandle<()>, MinerError> {
    let (handoff_tx, handoff_rx) = bounded(1);
    let handle = match spawn(handoff_rx) {
        Ok(handle) => handle,
        Err(e) => {
            pool.halt();
            return Err(MinerError::TaskError(format!(
                "Failed to spawn supervisor: {}",
                e
            )));
        }
    };

    if let Err(returned) = handoff_tx.send(pool) {
        returned.0.halt();
        if handle.join().is_err() {
            log::error!("Supervisor panicked");
        }
        return Err(MinerError::TaskError("Supervisor exited early".into()));
    }
    Ok(handle)
}

/// Drives the worker pool on behalf of the user interface
///
/// Cheap to clone; all clones control the same engine.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

struct Shared {
    settings: MinerSettings,
    ledger: Arc<dyn Ledger>,
    probe: Arc<dyn HashProbe>,
    listener: Arc<dyn MiningListener>,
    state: Mutex<MinerState>,
    /// Serializes `start` calls
    lifecycle: Mutex<()>,
    control: Mutex<Option<Sender<Event>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    session: ArcSwapOption<MiningSession>,
    generation: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Coordinator {
    /// Creates an idle coordinator
    ///
    /// # Arguments
    /// * `settings` - Pool tuning; the core limit is clamped to 1..=8
    /// * `ledger` - Ledger used for blocks, targets, balances and submissions
    /// * `probe` - Hash function
    /// * `listener` - User interface receiving progress events
    pub fn new(
        mut settings: MinerSettings,
        ledger: Arc<dyn Ledger>,
        probe: Arc<dyn HashProbe>,
        listener: Arc<dyn MiningListener>,
    ) -> Self {
        settings.core_limit = settings.core_limit.clamp(DEFAULT_CORE_LIMIT, MAX_CORE_LIMIT);
        Coordinator {
            shared: Arc::new(Shared {
                settings,
                ledger,
                probe,
                listener,
                state: Mutex::new(MinerState::Idle),
                lifecycle: Mutex::new(()),
                control: Mutex::new(None),
                supervisor: Mutex::new(None),
                session: ArcSwapOption::empty(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> MinerState {
        *lock(&self.shared.state)
    }

    /// Whether a mining run is active
    pub fn is_mining(&self) -> bool {
        self.state() != MinerState::Idle
    }

    /// Snapshot of the live session, if any
    pub fn session(&self) -> Option<Arc<MiningSession>> {
        self.shared.session.load_full()
    }

    /// Starts mining for `address` on the enabled cores
    ///
    /// Blocks while the balance, block and target are fetched; with an
    /// unbounded retry policy that can take arbitrarily long. Returns once
    /// the first pool is hashing.
    ///
    /// # Errors
    /// - `MinerError::AlreadyMining` unless idle
    /// - `MinerError::InvalidAddress` if the ledger does not know `address`
    /// - `MinerError::InvalidTarget` if the ledger's target is unusable
    /// - `MinerError::Cancelled` if `stop` was called meanwhile
    /// - ledger errors once a bounded retry policy gives up
    pub fn start(&self, address: &str, cores: CoreMask) -> Result<(), MinerError> {
        let _serial = lock(&self.shared.lifecycle);

        if self.is_mining() {
            return Err(MinerError::AlreadyMining);
        }

        if !self.shared.ledger.is_address_valid(address) {
            log::warn!("Rejected address {}", address);
            let e = MinerError::InvalidAddress(address.to_string());
            self.shared.listener.on_error(&e.to_string());
            return Err(e);
        }

        // The previous run has been told to stop; let it finish tearing down
        // while we are still idle, so it cannot restart a pool.
        self.join();

        *lock(&self.shared.state) = MinerState::Starting;
        self.shared.listener.on_state_change(MinerState::Starting);

        match self.launch_first(address, cores) {
            Ok(()) => Ok(()),
            Err(e) => {
                if !matches!(e, MinerError::Cancelled) {
                    self.shared.listener.on_error(&e.to_string());
                }
                self.shared.go_idle();
                Err(e)
            }
        }
    }

    fn launch_first(&self, address: &str, cores: CoreMask) -> Result<(), MinerError> {
        let shared = &self.shared;
        let workers = cores.worker_count(shared.settings.core_limit);
        let address: Arc<str> = address.into();
        let (tx, rx) = unbounded();

        let pool = shared.launch(&address, workers, NextSession::Fresh, &tx)?;
        *lock(&shared.control) = Some(tx.clone());
        // `stop` may have run before the sender was visible to it.
        if shared.is_stopped() {
            let _ = tx.send(Event::Stop);
        }

        let supervisor_shared = shared.clone();
        let handle = hand_off(pool, move |handoff| {
            std::thread::Builder::new()
                .name("mining-supervisor".into())
                .spawn(move || {
                    if let Ok(pool) = handoff.recv() {
                        supervisor_shared.supervise(address, workers, pool, tx, rx);
                    }
                })
        })?;
        *lock(&shared.supervisor) = Some(handle);
        Ok(())
    }

    /// Stops mining
    ///
    /// Clears the live session's flag so every worker quits at its next
    /// check, tells the supervisor to tear the pool down, and returns to
    /// idle without waiting. A no-op when already idle.
    pub fn stop(&self) {
        {
            let mut state = lock(&self.shared.state);
            if *state == MinerState::Idle {
                return;
            }
            *state = MinerState::Idle;
        }
        log::info!("Stopping miner");

        if let Some(session) = self.shared.session.load_full() {
            session.flag.cancel();
        }
        if let Some(control) = lock(&self.shared.control).take() {
            let _ = control.send(Event::Stop);
        }
        self.shared.listener.on_state_change(MinerState::Idle);
    }

    /// Waits until the current run's threads have all exited
    ///
    /// Returns immediately when nothing was started. Call after [`stop`]
    /// (or after an error ended the run).
    ///
    /// [`stop`]: Coordinator::stop
    pub fn join(&self) {
        let handle = lock(&self.shared.supervisor).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Supervisor panicked");
            }
        }
    }
}

impl Shared {
    /// Moves between non-idle states; fails once `stop` has made us idle
    fn advance(&self, next: MinerState) -> bool {
        let mut state = lock(&self.state);
        if *state == MinerState::Idle {
            return false;
        }
        if *state == next {
            return true;
        }
        *state = next;
        drop(state);
        self.listener.on_state_change(next);
        true
    }

    fn is_stopped(&self) -> bool {
        *lock(&self.state) == MinerState::Idle
    }

    fn go_idle(&self) {
        self.session.store(None);
        let changed = {
            let mut state = lock(&self.state);
            let changed = *state != MinerState::Idle;
            *state = MinerState::Idle;
            changed
        };
        lock(&self.control).take();
        if changed {
            self.listener.on_state_change(MinerState::Idle);
        }
    }

    fn fetch<T>(
        &self,
        what: &str,
        op: impl FnMut() -> Result<T, MinerError>,
    ) -> Result<T, MinerError> {
        network::retry(&self.settings.retry, what, &|| self.is_stopped(), op)
    }

    fn refresh_balance(&self, address: &str) -> Result<(), MinerError> {
        let balance = self.fetch("Balance lookup", || self.ledger.balance(address))?;
        log::info!("Balance of {}: {}", address, balance);
        self.listener.on_balance_update(&balance);
        Ok(())
    }

    fn fetch_target(&self) -> Result<WorkTarget, MinerError> {
        match self.fetch("Work target fetch", || self.ledger.work_target())? {
            WorkTarget::Invalid => Err(MinerError::InvalidTarget),
            target => Ok(target),
        }
    }

    /// Builds and starts a pool for the next session
    fn launch(
        &self,
        address: &Arc<str>,
        workers: usize,
        next: NextSession,
        events: &Sender<Event>,
    ) -> Result<LivePool, MinerError> {
        if !self.advance(MinerState::Starting) {
            return Err(MinerError::Cancelled);
        }

        let (block_id, target, nonce_base): (Arc<str>, WorkTarget, u64) = match next {
            NextSession::Fresh => {
                self.refresh_balance(address)?;
                let block = self.fetch("Block fetch", || self.ledger.last_block())?;
                (block.into(), self.fetch_target()?, 0)
            }
            NextSession::NewBlock { block_id } => (block_id.into(), self.fetch_target()?, 0),
            NextSession::Continue {
                block_id,
                target,
                nonce_base,
            } => (block_id, target, nonce_base),
        };

        let ranges = scheduler::partition(nonce_base, self.settings.range_size, workers)?;
        let job = Arc::new(SessionJob {
            address: address.clone(),
            block_id,
            target,
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        });
        let ctx = PoolContext {
            job: job.clone(),
            probe: self.probe.clone(),
            ledger: self.ledger.clone(),
            flag: MiningFlag::new(),
            gate: StartGate::new(),
            events: events.clone(),
        };

        let mut handles = Vec::with_capacity(workers);
        let mut progress = Vec::with_capacity(workers);
        let gate = ctx.gate.clone();
        let flag = ctx.flag.clone();
        let abort = |handles: Vec<JoinHandle<Outcome>>| {
            flag.cancel();
            gate.release();
            for handle in handles {
                let _ = handle.join();
            }
        };

        for (index, range) in ranges.iter().enumerate() {
            let worker = Worker::new(index, *range, ctx.clone());
            progress.push(worker.progress());
            match worker.spawn() {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    abort(handles);
                    return Err(e);
                }
            }
        }

        let sampler = match RateSampler::spawn(
            progress.clone(),
            self.settings.sample_interval,
            ctx.flag.clone(),
            self.listener.clone(),
        ) {
            Ok(sampler) => sampler,
            Err(e) => {
                abort(handles);
                return Err(e);
            }
        };

        let session = Arc::new(MiningSession {
            job,
            nonce_base,
            ranges,
            progress,
            flag: ctx.flag.clone(),
        });
        self.session.store(Some(session.clone()));

        let pool = LivePool {
            session,
            gate: ctx.gate.clone(),
            workers: handles,
            sampler,
            finished: 0,
        };

        if !self.advance(MinerState::Running) {
            pool.halt();
            return Err(MinerError::Cancelled);
        }
        // A stop between the check above and here already cleared the flag,
        // so released workers exit at once.
        ctx.gate.release();

        log::info!(
            "Mining {} from nonce {} with {} worker(s), target {}",
            pool.session.block_id(),
            nonce_base,
            workers,
            target
        );
        self.listener
            .on_session_restarted(pool.session.block_id(), nonce_base);
        Ok(pool)
    }

    /// Drains completion reports and restarts pools until stopped
    fn supervise(
        &self,
        address: Arc<str>,
        workers: usize,
        pool: LivePool,
        events: Sender<Event>,
        rx: Receiver<Event>,
    ) {
        let mut pool = Some(pool);

        while let Ok(event) = rx.recv() {
            let report = match event {
                Event::Stop => break,
                Event::Finished(report) => report,
            };
            let Some(live) = pool.as_mut() else { break };

            if report.generation != live.session.generation() {
                log::debug!(
                    "Ignoring report from worker {} of session {}",
                    report.worker_index,
                    report.generation
                );
                continue;
            }
            live.finished += 1;

            let next = if report.solved {
                let Some(live) = pool.take() else { break };
                if !self.advance(MinerState::Stopping) {
                    live.halt();
                    break;
                }
                let block_id = live.session.block_id().to_string();
                live.halt();
                log::info!(
                    "Block {} solved at nonce {}",
                    block_id,
                    report.nonce.unwrap_or_default()
                );
                self.listener.on_block_solved(&block_id);
                NextSession::Fresh
            } else if live.finished == live.workers.len() {
                let Some(live) = pool.take() else { break };
                if !self.advance(MinerState::Stopping) {
                    live.halt();
                    break;
                }
                let session = live.session.clone();
                live.halt();
                match self.after_exhaustion(&session) {
                    Ok(next) => next,
                    Err(e) => {
                        self.fail(e);
                        return;
                    }
                }
            } else {
                continue;
            };

            match self.launch(&address, workers, next, &events) {
                Ok(next_pool) => pool = Some(next_pool),
                Err(e) => {
                    self.fail(e);
                    return;
                }
            }
        }

        if let Some(live) = pool.take() {
            live.halt();
        }
        self.session.store(None);
        log::info!("Miner halted");
    }

    /// Decides where to go after every worker ran out of range
    fn after_exhaustion(&self, session: &MiningSession) -> Result<NextSession, MinerError> {
        let current = self.fetch("Block fetch", || self.ledger.last_block())?;
        if current == session.block_id() {
            Ok(NextSession::Continue {
                block_id: session.job.block_id.clone(),
                target: session.target(),
                nonce_base: scheduler::next_base(session.ranges()),
            })
        } else {
            log::info!(
                "Last block changed from {} to {}",
                session.block_id(),
                current
            );
            Ok(NextSession::NewBlock { block_id: current })
        }
    }

    /// Ends the run after a failed restart
    fn fail(&self, e: MinerError) {
        if !matches!(e, MinerError::Cancelled) {
            log::error!("Mining stopped: {}", e);
            self.listener.on_error(&e.to_string());
        }
        self.go_idle();
    }
}
