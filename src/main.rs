// src/main.rs
use clap::Parser;
use krist_miner_rs::miner::{MiningFlag, WorkerProgress};
use krist_miner_rs::stats::sampler::total_hashes;
use krist_miner_rs::utils::init_bench_logging;
use krist_miner_rs::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

/// How often `start` checks whether the engine gave up on its own
const IDLE_POLL: Duration = Duration::from_millis(500);

/// Main entry point for the krist miner
///
/// # Returns
/// - `Ok(())` on successful execution
/// - `Err(MinerError)` if any operation fails
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Start(opts) => start_mining(opts),
        cli::Action::Balance(opts) => show_balance(opts),
        cli::Action::Benchmark(opts) => run_benchmark(opts),
        cli::Action::Config(opts) => generate_config(opts),
    }
}

/// Mines for the given address until Ctrl-C or a fatal engine error
///
/// # Operations
/// 1. Initializes logging
/// 2. Loads the configuration, creating a default file if needed
/// 3. Connects to the sync node
/// 4. Starts the coordinator with a console reporter attached
/// 5. Stops and joins every engine thread on exit
fn start_mining(opts: cli::StartOptions) -> Result<(), MinerError> {
    utils::init_logging();

    let config = config::load(&opts.config)?;
    let ledger = Arc::new(LedgerClient::new(&config.ledger)?);
    log::info!("Using sync node {}", ledger.base_url());

    let reporter = Arc::new(StatsReporter::new(10));
    let coordinator = Coordinator::new(
        config.settings(),
        ledger,
        Arc::new(Sha256Probe::new()),
        reporter.clone(),
    );

    let cores = opts.cores.unwrap_or_else(CoreMask::all);
    coordinator.start(&opts.address, cores)?;

    let rt = Runtime::new()?;
    let interrupted = rt.block_on(async {
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| true),
            _ = wait_until_idle(&coordinator) => Ok(false),
        }
    })?;

    if interrupted {
        log::info!("Interrupted, stopping miner");
    }
    coordinator.stop();
    coordinator.join();

    let stats = reporter.get_stats();
    log::info!(
        "Solved {} block(s) over {} session(s)",
        stats.blocks_solved,
        stats.sessions
    );

    if interrupted {
        Ok(())
    } else {
        Err(MinerError::TaskError("Mining stopped after an error".into()))
    }
}

async fn wait_until_idle(coordinator: &Coordinator) {
    while coordinator.is_mining() {
        tokio::time::sleep(IDLE_POLL).await;
    }
}

/// Prints the balance of an address
fn show_balance(opts: cli::BalanceOptions) -> Result<(), MinerError> {
    utils::init_logging();

    let config = config::load(&opts.config)?;
    let ledger = LedgerClient::new(&config.ledger)?;
    let balance = ledger.balance(&opts.address)?;
    if balance.is_empty() {
        return Err(MinerError::InvalidAddress(opts.address));
    }

    println!("{}: {} KST", opts.address, balance);
    Ok(())
}

/// Measures how fast this machine computes krist hashes
///
/// # Operations
/// 1. Initializes benchmark-specific logging
/// 2. Spawns hashing threads over disjoint nonce ranges
/// 3. Samples their rate with the same sampler the miner uses
/// 4. Reports the average once the duration has elapsed
fn run_benchmark(opts: cli::BenchmarkOptions) -> Result<(), MinerError> {
    init_bench_logging();

    let threads = opts.threads.max(1);
    let probe = Arc::new(Sha256Probe::new());
    let reporter = Arc::new(StatsReporter::new(1));
    let flag = MiningFlag::new();

    log::info!(
        "Starting benchmark on {} thread(s) for {} seconds",
        threads,
        opts.duration
    );

    let progress: Vec<_> = (0..threads)
        .map(|i| Arc::new(WorkerProgress::new(i, i as u64 * u32::MAX as u64)))
        .collect();

    let handles = progress
        .iter()
        .map(|counter| {
            let counter = counter.clone();
            let probe = probe.clone();
            let flag = flag.clone();
            std::thread::Builder::new()
                .name(format!("bench-{}", counter.index()))
                .spawn(move || {
                    let mut nonce = counter.start();
                    while flag.is_active() {
                        std::hint::black_box(probe.value("k0000000000", "000000000000", nonce));
                        nonce += 1;
                        counter.advance(nonce);
                    }
                })
                .map_err(|e| MinerError::TaskError(format!("Failed to spawn thread: {}", e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let started = Instant::now();
    let mut sampler = RateSampler::spawn(
        progress.clone(),
        Duration::from_secs(1),
        flag.clone(),
        reporter.clone(),
    )?;

    std::thread::sleep(Duration::from_secs(opts.duration));
    flag.cancel();
    for handle in handles {
        handle
            .join()
            .map_err(|_| MinerError::TaskError("Benchmark thread panicked".into()))?;
    }
    sampler.stop();

    let elapsed = started.elapsed().as_secs_f64();
    let total = total_hashes(&progress);
    log::info!("Benchmark results:");
    log::info!("Total hashes: {}", total);
    if elapsed > 0.0 {
        log::info!("Average hashrate: {:.2} H/s", total as f64 / elapsed);
    }
    log::logger().flush();

    Ok(())
}

/// Writes a commented configuration template
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    let template = config::generate_template()?;
    std::fs::write(&opts.output, template)?;
    println!("Wrote {}", opts.output.display());
    Ok(())
}
