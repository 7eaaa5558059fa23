// src/utils/error.rs
use std::io;
use thiserror::Error;

/// Main error type for the mining application
///
/// This enum represents all possible error conditions that can occur
/// while talking to the ledger, loading configuration, or driving the
/// worker pool.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Errors related to network connectivity
    #[error("Network connection error: {0}")]
    ConnectionError(String),

    /// The ledger answered with something we could not interpret
    #[error("Protocol violation: {0}")]
    ProtocolError(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Configuration file or parameter errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid user input or parameter errors
    #[error("Invalid input: {0}")]
    InputError(String),

    /// The ledger does not know the given address
    #[error("Invalid address or timeout: {0}")]
    InvalidAddress(String),

    /// The ledger returned a work target that is not a number
    #[error("Ledger returned an unusable work target")]
    InvalidTarget,

    /// `start` was called while a mining run is already active
    #[error("Mining is already in progress")]
    AlreadyMining,

    /// The operation was abandoned because mining was stopped
    #[error("Mining was stopped")]
    Cancelled,

    /// Thread spawn or join errors
    #[error("Task execution error: {0}")]
    TaskError(String),
}

/// Converts toml parse errors into MinerError
impl From<toml::de::Error> for MinerError {
    fn from(e: toml::de::Error) -> Self {
        MinerError::ConfigError(format!("Invalid config format: {}", e))
    }
}

impl MinerError {
    /// Whether retrying the same ledger call may succeed
    ///
    /// Network, HTTP and malformed-response failures are transient;
    /// everything else is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MinerError::ConnectionError(_)
                | MinerError::ProtocolError(_)
                | MinerError::HttpError(_)
                | MinerError::IoError(_)
        )
    }
}
