// src/cli/commands.rs
use crate::types::CoreMask;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Krist Miner CLI - multi-threaded krist proof-of-work miner in Rust
#[derive(Parser, Debug)]
#[command(name = "krist-miner-rs")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The action to perform (mine, check a balance, benchmark, or generate config)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the miner application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Start mining for an address until interrupted
    Start(StartOptions),

    /// Print the balance of an address
    Balance(BalanceOptions),

    /// Measure local hashing speed
    Benchmark(BenchmarkOptions),

    /// Generate configuration file template
    Config(ConfigOptions),
}

/// Options for starting the mining operation
#[derive(Parser, Debug)]
pub struct StartOptions {
    /// Path to configuration file (created with defaults if missing)
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Address that receives the block rewards
    #[arg(short, long)]
    pub address: String,

    /// Cores to enable, e.g. `1,2,4` (core 1 is always enabled)
    #[arg(long)]
    pub cores: Option<CoreMask>,
}

/// Options for querying a balance
#[derive(Parser, Debug)]
pub struct BalanceOptions {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Address to look up
    #[arg(short, long)]
    pub address: String,
}

/// Options for running the hashing benchmark
#[derive(Parser, Debug)]
pub struct BenchmarkOptions {
    /// Duration of benchmark in seconds
    #[arg(short, long, default_value_t = 10)]
    pub duration: u64,

    /// Number of threads to use
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub threads: usize,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "config.toml")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_parses_core_list() {
        let cli = Commands::try_parse_from([
            "krist-miner-rs",
            "start",
            "--address",
            "kre3dMligq",
            "--cores",
            "1,3",
        ])
        .unwrap();

        match cli.action {
            Action::Start(opts) => {
                assert_eq!(opts.address, "kre3dMligq");
                assert_eq!(opts.config, PathBuf::from("config.toml"));
                assert_eq!(opts.cores.map(|c| c.bits()), Some(0b101));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn start_requires_address() {
        assert!(Commands::try_parse_from(["krist-miner-rs", "start"]).is_err());
    }

    #[test]
    fn out_of_range_core_is_rejected() {
        assert!(
            Commands::try_parse_from([
                "krist-miner-rs",
                "start",
                "--address",
                "kre3dMligq",
                "--cores",
                "9",
            ])
            .is_err()
        );
    }
}
