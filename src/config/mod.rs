// src/config/mod.rs
//! Configuration management for the krist miner
//!
//! This module handles all configuration-related functionality including:
//! - Loading and parsing configuration files
//! - Creating a default file on first run
//! - Generating configuration templates
//!
//! The configuration uses TOML format.

/// Core configuration implementation
///
/// Contains the [`Config`] struct and related types that define
/// the miner's configuration structure and behavior.
pub mod config;

// Re-export key items for easy access
pub use config::{Config, RetryConfig};

use crate::utils::error::MinerError;
use std::path::PathBuf;

/// Loads miner configuration, creating a default file if it is missing
///
/// # Arguments
/// * `path` - Path to the configuration file (anything convertible to PathBuf)
///
/// # Returns
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(MinerError)` - If the file couldn't be read, parsed or created
pub fn load(path: impl Into<PathBuf>) -> Result<Config, MinerError> {
    Config::load_or_create(path)
}

/// Generates a commented configuration template
pub fn generate_template() -> Result<String, MinerError> {
    Config::generate_template()
}
