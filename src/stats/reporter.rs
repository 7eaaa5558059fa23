// src/stats/reporter.rs
use crate::miner::listener::MiningListener;
use crate::types::MinerState;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use sysinfo::{Components, System};

/// Statistics related to mining progress
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MiningStats {
    /// Blocks solved since the reporter was created
    pub blocks_solved: u64,
    /// Sessions started (first start and every restart)
    pub sessions: u64,
    /// Most recent hash rate (hashes per second)
    pub hashrate: f64,
}

/// Statistics related to hardware performance
#[derive(Debug, Clone)]
pub struct HardwareStats {
    /// Current CPU usage percentage (0-100)
    pub cpu_usage: f32,
    /// Memory currently used by the system (in bytes)
    pub memory_used: u64,
    /// Current CPU temperature in Celsius
    pub temperature: f32,
}

/// Console front-end of the miner
///
/// Logs every engine event and, on each rate update, the hardware stats
/// alongside the hash rate.
pub struct StatsReporter {
    /// Counters updated from engine threads
    blocks_solved: AtomicU64,
    sessions: AtomicU64,
    /// Last reported rate, stored as `f64` bits
    hashrate: AtomicU64,
    /// System information collector
    hardware: Mutex<(System, Components)>,
    /// Log the rate only every n-th update
    rate_log_every: u64,
    rate_updates: AtomicU64,
}

impl StatsReporter {
    /// Creates a reporter that logs every `rate_log_every`-th rate update
    pub fn new(rate_log_every: u64) -> Self {
        StatsReporter {
            blocks_solved: AtomicU64::new(0),
            sessions: AtomicU64::new(0),
            hashrate: AtomicU64::new(0f64.to_bits()),
            hardware: Mutex::new((System::new_all(), Components::new_with_refreshed_list())),
            rate_log_every: rate_log_every.max(1),
            rate_updates: AtomicU64::new(0),
        }
    }

    /// Gets the current mining statistics
    pub fn get_stats(&self) -> MiningStats {
        MiningStats {
            blocks_solved: self.blocks_solved.load(Ordering::Relaxed),
            sessions: self.sessions.load(Ordering::Relaxed),
            hashrate: f64::from_bits(self.hashrate.load(Ordering::Relaxed)),
        }
    }

    /// Gets the current hardware statistics
    ///
    /// This refreshes system information before returning the stats.
    pub fn get_hardware_stats(&self) -> HardwareStats {
        let mut guard = self.hardware.lock().unwrap_or_else(|e| e.into_inner());
        let (system, components) = &mut *guard;
        system.refresh_cpu_all();
        system.refresh_memory();
        components.refresh(true);

        let cpus = system.cpus();
        let cpu_usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        let temperature = components
            .iter()
            .find(|c| c.label().contains("CPU"))
            .and_then(|c| c.temperature())
            .unwrap_or(0.0);

        HardwareStats {
            cpu_usage,
            memory_used: system.used_memory(),
            temperature,
        }
    }
}

impl MiningListener for StatsReporter {
    fn on_rate_update(&self, hashes_per_second: f64) {
        self.hashrate
            .store(hashes_per_second.to_bits(), Ordering::Relaxed);

        let n = self.rate_updates.fetch_add(1, Ordering::Relaxed);
        if hashes_per_second == 0.0 || n % self.rate_log_every == 0 {
            let hw = self.get_hardware_stats();
            log::info!(
                "Hashrate: {:.0} H/s | Solved: {} | CPU: {:.1}% | Temp: {:.1}°C",
                hashes_per_second,
                self.blocks_solved.load(Ordering::Relaxed),
                hw.cpu_usage,
                hw.temperature
            );
        }
    }

    fn on_block_solved(&self, block_id: &str) {
        let solved = self.blocks_solved.fetch_add(1, Ordering::Relaxed) + 1;
        log::info!("Solved block {} ({} so far)", block_id, solved);
    }

    fn on_session_restarted(&self, block_id: &str, nonce_offset: u64) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
        log::info!("Starting at {} from {}", block_id, nonce_offset);
    }

    fn on_error(&self, message: &str) {
        log::error!("{}", message);
    }

    fn on_balance_update(&self, balance: &str) {
        log::info!("Balance: {} KST", balance);
    }

    fn on_state_change(&self, state: MinerState) {
        log::debug!("Miner is {}", state);
    }
}
