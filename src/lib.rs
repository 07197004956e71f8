//! `Ringway` - In-Process Event Pipeline
//!
//! A Rust implementation of the LMAX Disruptor pattern: producers hand events
//! to consumer threads through a pre-allocated ring buffer, coordinated only by
//! monotonically increasing sequence numbers.
//!
//! ## Features
//!
//! - **Garbage-free**: every event slot is allocated once, up front, and reused
//! - **Batching**: consumers drain everything available in one pass
//! - **Pluggable waiting**: seven wait strategies trading latency for CPU
//! - **Pipelines**: handlers can depend on other handlers
//! - **Single or multi producer** claim strategies
//!
//! ## Quick Start
//!
//! ```rust
//! use ringway::disruptor::{
//!     BlockingWaitStrategy, DefaultEventFactory, Disruptor, EventHandler, ProducerType, Result,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Debug, Default)]
//! struct LongEvent {
//!     value: i64,
//! }
//!
//! struct LongEventHandler;
//!
//! impl EventHandler<LongEvent> for LongEventHandler {
//!     fn on_event(&mut self, event: &LongEvent, sequence: i64, _end_of_batch: bool) -> Result<()> {
//!         println!("Event {sequence}: {}", event.value);
//!         Ok(())
//!     }
//! }
//!
//! let mut disruptor = Disruptor::<LongEvent>::new(
//!     DefaultEventFactory::new(),
//!     1024, // Buffer size (must be power of 2)
//!     ProducerType::Single,
//!     Arc::new(BlockingWaitStrategy::new()),
//! )
//! .unwrap();
//!
//! disruptor.handle_events_with(LongEventHandler).unwrap();
//! disruptor.start().unwrap();
//!
//! let mut producer = disruptor.producer().unwrap();
//! let translator = |event: &mut LongEvent, _sequence: i64, bytes: [u8; 8]| {
//!     event.value = i64::from_be_bytes(bytes);
//! };
//! for value in 0..10_i64 {
//!     producer.publish_event_one_arg(&translator, value.to_be_bytes()).unwrap();
//! }
//!
//! disruptor.shutdown().unwrap();
//! ```
//!
//! ## Architecture
//!
//! - **`RingBuffer`**: Pre-allocated circular buffer for events
//! - **`Sequence`**: Cache-padded atomic counters for coordination
//! - **`Sequencer`**: Claim and publish policy (single/multi producer)
//! - **`SequenceBarrier`**: Tells a consumer how far it may read
//! - **`WaitStrategy`**: How a consumer waits at the barrier
//! - **`BatchEventProcessor`**: The consumer loop driving an `EventHandler`
//! - **`Disruptor`**: DSL wiring handlers, threads and lifecycle

pub mod config;
pub mod disruptor;

pub use config::{DisruptorConfig, WaitStrategyConfig};
pub use disruptor::{
    is_power_of_two, BatchEventProcessor, BlockingWaitStrategy, BusySpinWaitStrategy,
    ClaimedEvent, DefaultEventFactory, DefaultExceptionHandler, Disruptor, DisruptorError,
    EventFactory, EventHandler, EventHandlerGroup, EventProcessor, EventTranslator,
    EventTranslatorOneArg, EventTranslatorTwoArg, ExceptionHandler, LiteBlockingWaitStrategy,
    MultiProducerSequencer, PhasedBackoffWaitStrategy, Producer, ProducerType, Result, RingBuffer,
    Sequence, SequenceBarrier, Sequencer, SingleProducerSequencer, SleepingWaitStrategy,
    TimeoutBlockingWaitStrategy, WaitStrategy, YieldingWaitStrategy, INITIAL_CURSOR_VALUE,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version of the `Ringway` library
#[must_use]
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
