//! Statistics collection and reporting module
//!
//! This module provides:
//! - [`RateSampler`], the timer-driven hash-rate sampler of a worker pool
//! - [`StatsReporter`], the console listener that logs engine events along
//!   with hardware statistics (CPU usage, temperature)

/// Pool hash-rate sampling
pub mod sampler;

/// Console reporting of engine events and hardware stats
pub mod reporter;

// Re-export main components
pub use reporter::{HardwareStats, MiningStats, StatsReporter};
pub use sampler::{RateSample, RateSampler};
