//! Ringway demo
//!
//! Publishes a run of `LongEvent`s through a single producer disruptor. Each
//! value travels as an 8-byte big-endian buffer and is decoded into the slot
//! by a translator; a handler logs every event it receives.

use anyhow::Context;
use clap::Parser;
use ringway::config::{DisruptorConfig, WaitStrategyConfig};
use ringway::disruptor::{ClosureEventFactory, Disruptor, EventHandler, ProducerType, Result};
use std::path::PathBuf;
use tracing::info;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "ringway-demo")]
#[command(about = "Publish long events through a disruptor and log them")]
#[command(version)]
struct Args {
    /// Ring buffer size (must be power of 2)
    #[arg(short, long, default_value = "1024")]
    buffer_size: usize,

    /// Wait strategy: blocking, timeout-blocking, lite-blocking, sleeping,
    /// yielding, busy-spin or phased-backoff
    #[arg(short, long, default_value = "yielding")]
    wait_strategy: WaitStrategyConfig,

    /// Number of events to publish
    #[arg(short, long, default_value = "100")]
    events: i64,

    /// JSON configuration file; overrides buffer size and wait strategy
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Default)]
struct LongEvent {
    value: i64,
}

struct LongEventHandler;

impl EventHandler<LongEvent> for LongEventHandler {
    fn on_event(&mut self, event: &LongEvent, sequence: i64, end_of_batch: bool) -> Result<()> {
        info!(sequence, value = event.value, end_of_batch, "Event");
        Ok(())
    }
}

fn translate_long(event: &mut LongEvent, _sequence: i64, bytes: [u8; 8]) {
    event.value = i64::from_be_bytes(bytes);
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = match &args.config {
        Some(path) => DisruptorConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => DisruptorConfig {
            buffer_size: args.buffer_size,
            producer_type: ProducerType::Single,
            wait_strategy: args.wait_strategy.clone(),
            ..DisruptorConfig::default()
        },
    };
    info!(?config, events = args.events, "Starting ringway demo");

    let mut disruptor = Disruptor::from_config(&config, ClosureEventFactory::new(LongEvent::default))
        .context("Invalid disruptor configuration")?;
    disruptor.handle_events_with(LongEventHandler)?;
    disruptor.start()?;

    let mut producer = disruptor.producer()?;
    for value in 0..args.events {
        producer.publish_event_one_arg(&translate_long, value.to_be_bytes())?;
    }

    disruptor.shutdown()?;
    info!(published = args.events, "Ringway demo finished");
    Ok(())
}

/// Initialize logging based on the specified level
fn init_logging(level: &str) {
    let filter = match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_long_event_demo() {
        let args = Args::parse_from(["ringway-demo"]);
        assert!(matches!(args.wait_strategy, WaitStrategyConfig::Yielding { .. }));
        assert_eq!(args.buffer_size, 1024);
        assert_eq!(args.events, 100);
    }

    #[test]
    fn test_translate_long_decodes_big_endian() {
        let mut event = LongEvent::default();
        translate_long(&mut event, 0, 42i64.to_be_bytes());
        assert_eq!(event.value, 42);
    }
}
