//! Error types for the ccdn implementation.

use thiserror::Error;

/// All possible errors that can occur within the ccdn implementation.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to CMP packet encoding/decoding.
    #[error("CMP error: {0}")]
    Cmp(String),

    /// No outbound interface could be computed for a packet.
    #[error("no route: {0}")]
    NoRoute(String),

    /// Error related to topology construction or lookups.
    #[error("topology error: {0}")]
    Topology(String),

    /// Malformed scenario script line.
    #[error("scenario line {line}: {message}")]
    Scenario { line: usize, message: String },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error raised by the configuration loader.
    #[error("configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
