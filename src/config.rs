//! Configuration Management
//!
//! Serde-backed configuration for building a `Disruptor` from JSON, plus the
//! named wait strategies selectable from the command line.

use crate::disruptor::{
    is_power_of_two, BlockingWaitStrategy, BusySpinWaitStrategy, DisruptorError,
    LiteBlockingWaitStrategy, PhasedBackoffWaitStrategy, ProducerType, Result,
    SleepingWaitStrategy, TimeoutBlockingWaitStrategy, WaitStrategy, YieldingWaitStrategy,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Disruptor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisruptorConfig {
    /// Ring buffer size, a positive power of 2
    pub buffer_size: usize,
    /// Single or multi producer claims
    pub producer_type: ProducerType,
    /// How consumers wait for new events
    pub wait_strategy: WaitStrategyConfig,
    /// Processor threads are named `{thread_name_prefix}-{index}`
    pub thread_name_prefix: String,
    /// Cores to pin processor threads to, assigned round-robin
    pub cpu_affinity: Vec<usize>,
    /// Upper bound on the shutdown drain; unbounded when absent
    pub shutdown_timeout_ms: Option<u64>,
}

impl Default for DisruptorConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            producer_type: ProducerType::default(),
            wait_strategy: WaitStrategyConfig::default(),
            thread_name_prefix: "ringway-processor".to_string(),
            cpu_affinity: Vec::new(),
            shutdown_timeout_ms: None,
        }
    }
}

impl DisruptorConfig {
    /// Parse a configuration from JSON and validate it
    ///
    /// # Errors
    /// `DisruptorError::InvalidConfig` for malformed JSON or invalid values
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DisruptorError::InvalidConfig(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    ///
    /// # Errors
    /// `DisruptorError::InvalidConfig` if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DisruptorError::InvalidConfig(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_json_str(&content)
    }

    /// Check every field
    ///
    /// # Errors
    /// `DisruptorError::InvalidBufferSize` for a bad buffer size, otherwise
    /// `DisruptorError::InvalidConfig`
    pub fn validate(&self) -> Result<()> {
        if !is_power_of_two(self.buffer_size) {
            return Err(DisruptorError::InvalidBufferSize(self.buffer_size));
        }

        if self.thread_name_prefix.trim().is_empty() {
            return Err(DisruptorError::InvalidConfig(
                "Thread name prefix cannot be empty".to_string(),
            ));
        }

        if self.shutdown_timeout_ms == Some(0) {
            return Err(DisruptorError::InvalidConfig(
                "Shutdown timeout must be greater than 0".to_string(),
            ));
        }

        self.wait_strategy.validate()
    }
}

/// Serializable description of a wait strategy
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaitStrategyConfig {
    /// Lock and condition variable
    #[default]
    Blocking,
    /// Blocking with a bounded wait
    TimeoutBlocking {
        /// Wait bound in milliseconds
        timeout_ms: u64,
    },
    /// Blocking that skips the lock when no consumer is waiting
    LiteBlocking,
    /// Spin, then yield, then sleep
    Sleeping {
        #[serde(default = "default_sleeping_retries")]
        retries: u32,
        #[serde(default = "default_sleep_ns")]
        sleep_ns: u64,
    },
    /// Spin, then yield
    Yielding {
        #[serde(default = "default_spin_tries")]
        spin_tries: u32,
    },
    /// Spin forever
    BusySpin,
    /// Spin, then yield, then hand over to `fallback`
    PhasedBackoff {
        spin_timeout_us: u64,
        yield_timeout_us: u64,
        fallback: Box<WaitStrategyConfig>,
    },
}

fn default_sleeping_retries() -> u32 {
    200
}

fn default_sleep_ns() -> u64 {
    1
}

fn default_spin_tries() -> u32 {
    100
}

impl WaitStrategyConfig {
    /// Every strategy name accepted by `FromStr`
    pub const NAMES: [&'static str; 7] = [
        "blocking",
        "timeout-blocking",
        "lite-blocking",
        "sleeping",
        "yielding",
        "busy-spin",
        "phased-backoff",
    ];

    /// Check the strategy parameters
    ///
    /// # Errors
    /// `DisruptorError::InvalidConfig` for zero timeouts or a zero sleep
    pub fn validate(&self) -> Result<()> {
        match self {
            WaitStrategyConfig::TimeoutBlocking { timeout_ms: 0 } => Err(DisruptorError::InvalidConfig(
                "Timeout blocking wait strategy needs a timeout greater than 0".to_string(),
            )),
            WaitStrategyConfig::Sleeping { sleep_ns: 0, .. } => Err(DisruptorError::InvalidConfig(
                "Sleeping wait strategy needs a sleep greater than 0".to_string(),
            )),
            WaitStrategyConfig::PhasedBackoff { fallback, .. } => fallback.validate(),
            _ => Ok(()),
        }
    }

    /// Instantiate the described strategy
    pub fn build(&self) -> Arc<dyn WaitStrategy> {
        Arc::from(self.build_boxed())
    }

    fn build_boxed(&self) -> Box<dyn WaitStrategy> {
        match self {
            WaitStrategyConfig::Blocking => Box::new(BlockingWaitStrategy::new()),
            WaitStrategyConfig::TimeoutBlocking { timeout_ms } => Box::new(
                TimeoutBlockingWaitStrategy::new(Duration::from_millis(*timeout_ms)),
            ),
            WaitStrategyConfig::LiteBlocking => Box::new(LiteBlockingWaitStrategy::new()),
            WaitStrategyConfig::Sleeping { retries, sleep_ns } => Box::new(
                SleepingWaitStrategy::with_retries_and_sleep(*retries, Duration::from_nanos(*sleep_ns)),
            ),
            WaitStrategyConfig::Yielding { spin_tries } => {
                Box::new(YieldingWaitStrategy::with_spin_tries(*spin_tries))
            }
            WaitStrategyConfig::BusySpin => Box::new(BusySpinWaitStrategy::new()),
            WaitStrategyConfig::PhasedBackoff {
                spin_timeout_us,
                yield_timeout_us,
                fallback,
            } => Box::new(PhasedBackoffWaitStrategy::new(
                Duration::from_micros(*spin_timeout_us),
                Duration::from_micros(*yield_timeout_us),
                fallback.build_boxed(),
            )),
        }
    }
}

impl std::str::FromStr for WaitStrategyConfig {
    type Err = String;

    /// Parse a strategy name with default parameters
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "blocking" => Ok(WaitStrategyConfig::Blocking),
            "timeout-blocking" => Ok(WaitStrategyConfig::TimeoutBlocking { timeout_ms: 100 }),
            "lite-blocking" => Ok(WaitStrategyConfig::LiteBlocking),
            "sleeping" => Ok(WaitStrategyConfig::Sleeping {
                retries: default_sleeping_retries(),
                sleep_ns: default_sleep_ns(),
            }),
            "yielding" => Ok(WaitStrategyConfig::Yielding {
                spin_tries: default_spin_tries(),
            }),
            "busy-spin" | "busyspin" => Ok(WaitStrategyConfig::BusySpin),
            "phased-backoff" => Ok(WaitStrategyConfig::PhasedBackoff {
                spin_timeout_us: 1_000,
                yield_timeout_us: 1_000,
                fallback: Box::new(WaitStrategyConfig::Blocking),
            }),
            _ => Err(format!(
                "Invalid wait strategy: '{s}'. Valid values are: {}",
                Self::NAMES.join(", ")
            )),
        }
    }
}
