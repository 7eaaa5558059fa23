// src/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest number of worker threads a pool may use
pub const MAX_CORE_LIMIT: usize = 8;

/// Core limit used when the configuration is missing or out of range
pub const DEFAULT_CORE_LIMIT: usize = 1;

/// Numeric work target published by the ledger
///
/// A hash value solves the block when it is strictly below the target.
/// The ledger occasionally answers with garbage; that is kept as
/// [`WorkTarget::Invalid`] instead of an error so callers decide what to
/// do with it. Nothing ever satisfies an invalid target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkTarget {
    /// A usable threshold
    Numeric(u64),
    /// The ledger response could not be parsed
    Invalid,
}

impl WorkTarget {
    /// Returns `true` if `value` is strictly below a valid target
    pub fn is_met_by(&self, value: u64) -> bool {
        match self {
            WorkTarget::Numeric(target) => value < *target,
            WorkTarget::Invalid => false,
        }
    }

    /// Whether this target can be mined against
    pub fn is_valid(&self) -> bool {
        matches!(self, WorkTarget::Numeric(_))
    }
}

impl fmt::Display for WorkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkTarget::Numeric(target) => write!(f, "{}", target),
            WorkTarget::Invalid => write!(f, "<invalid>"),
        }
    }
}

impl FromStr for WorkTarget {
    type Err = std::convert::Infallible;

    /// Never fails: unparseable input becomes [`WorkTarget::Invalid`]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.trim()
            .parse::<u64>()
            .map(WorkTarget::Numeric)
            .unwrap_or(WorkTarget::Invalid))
    }
}

/// Set of cores the user enabled for mining
///
/// Bit `n` stands for "Core n+1" in the user interface. The first core is
/// always enabled and cores beyond the configured limit are ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct CoreMask(u8);

impl CoreMask {
    /// Mask with only the first core enabled
    pub fn first() -> Self {
        CoreMask(1)
    }

    /// Mask with every core enabled
    pub fn all() -> Self {
        CoreMask(u8::MAX)
    }

    /// Builds a mask from raw bits
    pub fn from_bits(bits: u8) -> Self {
        CoreMask(bits)
    }

    /// Builds a mask from 1-based core numbers as shown to the user
    ///
    /// # Errors
    /// Returns the offending number if it is 0 or above [`MAX_CORE_LIMIT`].
    pub fn from_cores(cores: &[usize]) -> Result<Self, usize> {
        let mut bits = 0u8;
        for &core in cores {
            if core == 0 || core > MAX_CORE_LIMIT {
                return Err(core);
            }
            bits |= 1 << (core - 1);
        }
        Ok(CoreMask(bits))
    }

    /// Raw bits of the mask
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Number of workers to spawn under the given core limit
    pub fn worker_count(&self, core_limit: usize) -> usize {
        let limit = core_limit.clamp(DEFAULT_CORE_LIMIT, MAX_CORE_LIMIT);
        let allowed = if limit == MAX_CORE_LIMIT {
            u8::MAX
        } else {
            (1u8 << limit) - 1
        };
        ((self.0 | 1) & allowed).count_ones() as usize
    }
}

impl FromStr for CoreMask {
    type Err = String;

    /// Parses a comma separated list of 1-based core numbers, e.g. `1,2,4`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cores = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<usize>()
                    .map_err(|_| format!("Invalid core number: {}", part))
            })
            .collect::<Result<Vec<_>, _>>()?;

        CoreMask::from_cores(&cores).map_err(|core| {
            format!("Core {} is outside 1..={}", core, MAX_CORE_LIMIT)
        })
    }
}

/// Lifecycle state of the mining coordinator
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MinerState {
    /// Nothing is running
    Idle,
    /// A pool is being fetched and built
    Starting,
    /// Workers are hashing
    Running,
    /// The current pool is being torn down
    Stopping,
}

impl fmt::Display for MinerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinerState::Idle => write!(f, "idle"),
            MinerState::Starting => write!(f, "starting"),
            MinerState::Running => write!(f, "running"),
            MinerState::Stopping => write!(f, "stopping"),
        }
    }
}
