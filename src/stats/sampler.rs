// src/stats/sampler.rs
//! Pool hash-rate sampler
//!
//! Ticks on a fixed interval, sums the progress of every worker in the
//! pool and reports the rate over the last interval. Pushes a final `0`
//! when it stops.

use crate::miner::listener::MiningListener;
use crate::miner::signal::MiningFlag;
use crate::miner::worker::WorkerProgress;
use crate::utils::error::MinerError;
use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Hashes done by a pool during one sampling interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    /// Hashes since the previous tick
    pub total_delta: u64,
    /// Time since the previous tick
    pub elapsed: Duration,
}

impl RateSample {
    /// Average rate over the interval
    pub fn hashes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_delta as f64 / secs
        } else {
            0.0
        }
    }
}

/// Sum of hashes computed by a set of workers
pub fn total_hashes(progress: &[Arc<WorkerProgress>]) -> u64 {
    progress.iter().map(|p| p.hashes()).sum()
}

/// Handle to a running sampler thread
pub struct RateSampler {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RateSampler {
    /// Starts sampling `progress` every `interval`
    ///
    /// The sampler ends on its own once `flag` is cleared, or when
    /// [`RateSampler::stop`] is called.
    pub fn spawn(
        progress: Vec<Arc<WorkerProgress>>,
        interval: Duration,
        flag: MiningFlag,
        listener: Arc<dyn MiningListener>,
    ) -> Result<Self, MinerError> {
        let (stop_tx, stop_rx) = bounded(1);
        let handle = std::thread::Builder::new()
            .name("rate-sampler".into())
            .spawn(move || run(progress, interval, flag, stop_rx, listener))
            .map_err(|e| MinerError::TaskError(format!("Failed to spawn sampler: {}", e)))?;

        Ok(RateSampler {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stops the sampler and waits for its final zero report
    pub fn stop(&mut self) {
        // Dropping the sender disconnects the stop channel.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Rate sampler panicked");
            }
        }
    }
}

impl Drop for RateSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    progress: Vec<Arc<WorkerProgress>>,
    interval: Duration,
    flag: MiningFlag,
    stop_rx: Receiver<()>,
    listener: Arc<dyn MiningListener>,
) {
    let ticker = tick(interval);
    let mut last_total = total_hashes(&progress);
    let mut last_tick = Instant::now();

    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                if !flag.is_active() {
                    break;
                }
                let now = Instant::now();
                let total = total_hashes(&progress);
                let sample = RateSample {
                    total_delta: total.saturating_sub(last_total),
                    elapsed: now.duration_since(last_tick),
                };
                last_total = total;
                last_tick = now;

                log::trace!("Rate sample: {:?}", sample);
                listener.on_rate_update(sample.hashes_per_second());
            }
        }
    }

    listener.on_rate_update(0.0);
}
