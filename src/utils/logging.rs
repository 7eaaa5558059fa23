// src/utils/logging.rs
//! Logging configuration and utilities
//!
//! This module handles logging setup for the miner application:
//! - Standard logging configuration for the `start` command
//! - Benchmark-specific logging
//!
//! Uses `env_logger` under the hood with custom formatting and filtering.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;

/// Initializes the logging subsystem with sensible defaults
///
/// # Configuration
/// - Logs to stdout
/// - Default log level: Info
/// - Respects `RUST_LOG` environment variable if set
pub fn init_logging() {
    init_with_default(LevelFilter::Info);
}

/// Configures benchmark-specific logging
///
/// Same as [`init_logging`] but defaults to Debug so per-thread
/// progress lines show up.
pub fn init_bench_logging() {
    init_with_default(LevelFilter::Debug);
}

fn init_with_default(level: LevelFilter) {
    let mut builder = common_log_config();

    if env::var("RUST_LOG").is_err() {
        builder.filter_level(level);
    } else {
        builder.parse_env("RUST_LOG");
    }

    // A second init (tests, embedding) is not an error worth surfacing.
    let _ = builder.try_init();
}

/// Creates and configures a base logger builder with common settings
///
/// Format: `[timestamp level module:line] message`, written to stdout.
fn common_log_config() -> Builder {
    let mut builder = Builder::new();

    builder
        .format(|buf, record| {
            use std::io::Write;
            let ts = buf.timestamp_seconds();
            let level = record.level();
            let module = record.module_path().unwrap_or_default();
            let line = record.line().unwrap_or(0);

            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                ts,
                level,
                module,
                line,
                record.args()
            )
        })
        .target(Target::Stdout);

    builder
}
