//! Ringway Disruptor Core
//!
//! This module provides the in-process disruptor core: a pre-allocated ring of
//! reusable events, sequence-based coordination between producers and
//! consumers, and a family of wait strategies.

pub mod disruptor;
pub mod event_factory;
pub mod event_handler;
pub mod event_processor;
pub mod event_translator;
pub mod exception_handler;
pub mod producer;
pub mod producer_type;
pub mod ring_buffer;
pub mod sequence;
pub mod sequence_barrier;
pub mod sequencer;
pub mod thread_management;
pub mod wait_strategy;


pub use disruptor::{Disruptor, EventHandlerGroup};
pub use event_factory::{ClosureEventFactory, DefaultEventFactory, EventFactory};
pub use event_handler::{ClosureEventHandler, EventHandler};
pub use event_processor::{BatchEventProcessor, EventProcessor, ProcessorController, ProcessorState};
pub use event_translator::{EventTranslator, EventTranslatorOneArg, EventTranslatorTwoArg};
pub use exception_handler::{
    ClosureExceptionHandler, DefaultExceptionHandler, ExceptionHandler, IgnoreExceptionHandler,
};
pub use producer::{ClaimedEvent, Producer};
pub use producer_type::ProducerType;
pub use ring_buffer::RingBuffer;
pub use sequence::{minimum_sequence, Sequence};
pub use sequence_barrier::{ProcessingSequenceBarrier, SequenceBarrier};
pub use sequencer::{MultiProducerSequencer, Sequencer, SingleProducerSequencer};
pub use thread_management::{ManagedThread, ThreadBuilder};
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, LiteBlockingWaitStrategy,
    PhasedBackoffWaitStrategy, SleepingWaitStrategy, TimeoutBlockingWaitStrategy, WaitStrategy,
    YieldingWaitStrategy,
};

use std::time::Duration;

/// The initial cursor value for sequences
pub const INITIAL_CURSOR_VALUE: i64 = -1;

/// Errors that can occur in the Disruptor
#[derive(Debug, thiserror::Error)]
pub enum DisruptorError {
    #[error("Buffer size must be a positive power of 2, got: {0}")]
    InvalidBufferSize(usize),

    #[error("Cannot claim {requested} slots from a ring buffer of size {buffer_size}")]
    InvalidClaimSize { requested: i64, buffer_size: usize },

    #[error("Insufficient capacity in ring buffer")]
    InsufficientCapacity,

    #[error("Sequence barrier has been alerted")]
    Alert,

    #[error("Timeout waiting for sequence")]
    Timeout,

    #[error("Shutdown did not drain within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("Disruptor has already been started")]
    AlreadyStarted,

    #[error("Event processor thread {0} exited before the backlog drained")]
    ProcessorExited(String),

    #[error("Event processor is already running")]
    ProcessorAlreadyRunning,

    #[error("A single producer ring buffer only supports one producer")]
    SingleProducerViolation,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn processor thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("Event handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DisruptorError {
    /// Wrap an arbitrary failure raised by an event handler
    pub fn handler<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Handler(error.into())
    }

    /// Returns true for errors caused by invalid construction or claim arguments
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBufferSize(_)
                | Self::InvalidClaimSize { .. }
                | Self::InvalidConfig(_)
                | Self::SingleProducerViolation
        )
    }
}

pub type Result<T> = std::result::Result<T, DisruptorError>;

/// Utility function to check if a number is a power of 2
#[must_use]
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_power_of_two() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(2));
        assert!(is_power_of_two(4));
        assert!(is_power_of_two(8));
        assert!(is_power_of_two(1024));

        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(3));
        assert!(!is_power_of_two(5));
        assert!(!is_power_of_two(1023));
    }

    #[test]
    fn test_configuration_error_classification() {
        assert!(DisruptorError::InvalidBufferSize(3).is_configuration_error());
        assert!(DisruptorError::InvalidClaimSize {
            requested: 16,
            buffer_size: 8
        }
        .is_configuration_error());
        assert!(!DisruptorError::Timeout.is_configuration_error());
        assert!(!DisruptorError::handler("boom").is_configuration_error());
    }

    #[test]
    fn test_handler_error_message() {
        let error = DisruptorError::handler("value 7 rejected");
        assert_eq!(error.to_string(), "Event handler failed: value 7 rejected");
    }
}
