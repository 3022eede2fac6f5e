//! Configuration for a ccdn simulation run.
//!
//! Values come from (lowest precedence first) the built-in defaults, an
//! optional configuration file, and `CCDN_*` environment variables. The
//! command-line front end applies its own flags on top and then calls
//! [`SimulationConfig::validate`].

use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::Error;
use crate::Result;

/// Prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "CCDN";

/// Largest fat-tree port count the address layout can encode.
pub const MAX_PORT: u32 = 126;

/// Simulation configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Switch fan-out (`k` of the fat tree); must be even
    pub port: u32,

    /// Content FIB capacity per switch
    pub fib_size: usize,

    /// Content cache capacity per host
    pub cache_size: usize,

    /// Whether hosts serve cached copies (and switches route by content)
    pub enable_cache: bool,

    /// Retry timeout for pending fetches (in seconds)
    pub timeout: f64,

    /// Interval between task reviews (in seconds)
    pub review_interval: f64,

    /// Stop scheduling reviews after this virtual time (in seconds)
    pub duration: Option<f64>,

    /// Retries of an unanswered fetch before it is abandoned
    pub max_retries: u32,

    /// Path of the audit log
    pub output: PathBuf,

    /// Seed for every random tie-break
    pub seed: u64,

    /// Size of one content transfer (in bytes)
    pub data_size: u64,

    /// Propagation delay of a link (in nanoseconds)
    pub link_delay_ns: u64,

    /// Link rate (in bits per second)
    pub link_rate_bps: u64,

    /// Hops a packet may take before it is dropped
    pub hop_limit: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            port: 4,
            fib_size: 64,
            cache_size: 16,
            enable_cache: true,
            timeout: 0.5,
            review_interval: 0.1,
            duration: None,
            max_retries: 3,
            output: PathBuf::from("ccdn.log"),
            seed: 1,
            data_size: 1_000_000,
            link_delay_ns: 500,
            link_rate_bps: 100_000_000,
            hop_limit: 64,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from an optional file layered under the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));

        let loaded: SimulationConfig = builder.build()?.try_deserialize()?;
        Ok(loaded)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.port < 2 || self.port > MAX_PORT || self.port % 2 != 0 {
            return Err(Error::Config(format!(
                "port must be an even number between 2 and {}, got {}",
                MAX_PORT, self.port
            )));
        }
        if self.fib_size == 0 {
            return Err(Error::Config("fib_size must be at least 1".into()));
        }
        if self.cache_size == 0 {
            return Err(Error::Config("cache_size must be at least 1".into()));
        }
        check_seconds("timeout", self.timeout, false)?;
        check_seconds("review_interval", self.review_interval, false)?;
        if let Some(duration) = self.duration {
            check_seconds("duration", duration, true)?;
        }
        if self.link_rate_bps == 0 {
            return Err(Error::Config("link_rate_bps must be positive".into()));
        }
        if self.hop_limit == 0 {
            return Err(Error::Config("hop_limit must be at least 1".into()));
        }
        Ok(())
    }

    /// Half the switch fan-out (`N`): downward ports per switch.
    pub fn half_port(&self) -> u32 {
        self.port / 2
    }

    pub fn timeout(&self) -> Duration {
        seconds(self.timeout)
    }

    pub fn review_interval(&self) -> Duration {
        seconds(self.review_interval)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration.map(seconds)
    }

    pub fn link_delay(&self) -> Duration {
        Duration::from_nanos(self.link_delay_ns)
    }
}

/// Saturates values that [`SimulationConfig::validate`] would reject.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

fn check_seconds(name: &str, value: f64, allow_zero: bool) -> Result<()> {
    let positive = value > 0.0 || (allow_zero && value == 0.0);
    match Duration::try_from_secs_f64(value) {
        Ok(_) if positive => Ok(()),
        _ => Err(Error::Config(format!(
            "{} must be a positive number of seconds that fits a duration, got {}",
            name, value
        ))),
    }
}
