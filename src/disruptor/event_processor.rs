//! Event Processor Implementation
//!
//! A `BatchEventProcessor` is the consumer loop: it waits on its barrier for
//! the next available sequence, hands every event up to that sequence to its
//! handler, and then publishes its own progress once for the whole batch.

use crate::disruptor::{
    DisruptorError, EventHandler, ExceptionHandler, ProcessingSequenceBarrier, Result, RingBuffer,
    Sequence, SequenceBarrier,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Lifecycle state of an event processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessorState {
    /// Created but not yet running
    Idle = 0,
    /// Inside `run`, processing events
    Running = 1,
    /// `halt` was requested and the loop has not exited yet
    Halting = 2,
    /// The loop has exited, or the processor was halted before it started
    Halted = 3,
}

impl ProcessorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ProcessorState::Idle,
            1 => ProcessorState::Running,
            2 => ProcessorState::Halting,
            _ => ProcessorState::Halted,
        }
    }
}

/// Cloneable handle for observing and halting a processor from other threads
#[derive(Debug, Clone)]
pub struct ProcessorController {
    state: Arc<AtomicU8>,
    sequence: Arc<Sequence>,
    barrier: Arc<ProcessingSequenceBarrier>,
}

impl ProcessorController {
    /// Ask the processor to stop after the batch it is currently handling
    pub fn halt(&self) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                match ProcessorState::from_u8(state) {
                    ProcessorState::Running => Some(ProcessorState::Halting as u8),
                    ProcessorState::Idle => Some(ProcessorState::Halted as u8),
                    ProcessorState::Halting | ProcessorState::Halted => None,
                }
            });
        self.barrier.alert();
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the processor is inside its run loop and not halting
    pub fn is_running(&self) -> bool {
        self.state() == ProcessorState::Running
    }

    /// The sequence of the last event the processor has consumed
    pub fn sequence(&self) -> i64 {
        self.sequence.get()
    }

    /// The progress sequence the producer is gated on
    pub(crate) fn gating_sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }
}

/// A consumer loop that can be run on a dedicated thread
pub trait EventProcessor: Send {
    /// The processor's progress sequence, used for gating and dependencies
    fn sequence(&self) -> Arc<Sequence>;

    /// A handle for halting the processor from another thread
    fn controller(&self) -> ProcessorController;

    /// Run the processing loop on the current thread until halted
    ///
    /// # Errors
    /// `DisruptorError::ProcessorAlreadyRunning` if the processor is already
    /// inside `run`
    fn run(&mut self) -> Result<()>;
}

/// Batch event processor driving one `EventHandler`
///
/// # Type Parameters
/// * `T` - The event type
/// * `H` - The event handler type
pub struct BatchEventProcessor<T, H> {
    ring_buffer: Arc<RingBuffer<T>>,
    barrier: Arc<ProcessingSequenceBarrier>,
    handler: H,
    exception_handler: Arc<dyn ExceptionHandler<T>>,
    sequence: Arc<Sequence>,
    state: Arc<AtomicU8>,
}

impl<T, H> BatchEventProcessor<T, H>
where
    T: Send + Sync,
    H: EventHandler<T>,
{
    /// Create a processor that reads `ring_buffer` through `barrier`
    ///
    /// The caller must register the processor's sequence as a gating sequence
    /// before running it.
    pub(crate) fn new(
        ring_buffer: Arc<RingBuffer<T>>,
        barrier: ProcessingSequenceBarrier,
        handler: H,
        exception_handler: Arc<dyn ExceptionHandler<T>>,
    ) -> Self {
        Self {
            ring_buffer,
            barrier: Arc::new(barrier),
            handler,
            exception_handler,
            sequence: Arc::new(Sequence::default()),
            state: Arc::new(AtomicU8::new(ProcessorState::Idle as u8)),
        }
    }

    fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn process_events(&mut self) {
        let mut next_sequence = self.sequence.get() + 1;

        loop {
            match self.barrier.wait_for(next_sequence) {
                Ok(available_sequence) => {
                    // A multi producer gap: the claimed sequence is not yet published
                    if available_sequence < next_sequence {
                        continue;
                    }

                    self.handler
                        .on_batch_start(available_sequence - next_sequence + 1);

                    while next_sequence <= available_sequence {
                        // SAFETY: the barrier only returns published sequences and
                        // this processor's sequence gates the producer.
                        let event = unsafe { self.ring_buffer.get(next_sequence) };
                        let end_of_batch = next_sequence == available_sequence;

                        // A panicking handler is reported like a failing one so
                        // its sequence still advances and the producer is released
                        let handled = panic::catch_unwind(AssertUnwindSafe(|| {
                            self.handler.on_event(event, next_sequence, end_of_batch)
                        }))
                        .unwrap_or_else(|payload| {
                            Err(DisruptorError::handler(format!(
                                "panicked: {}",
                                panic_message(payload.as_ref())
                            )))
                        });

                        if let Err(error) = handled {
                            self.exception_handler
                                .handle_event_exception(error, next_sequence, event);
                        }
                        next_sequence += 1;
                    }

                    self.sequence.set(available_sequence);
                }
                Err(DisruptorError::Timeout) => {
                    if let Err(error) = self.handler.on_timeout(self.sequence.get()) {
                        warn!(sequence = self.sequence.get(), %error, "Timeout hook failed");
                    }
                }
                Err(DisruptorError::Alert) => {
                    if self.state() != ProcessorState::Running {
                        break;
                    }
                    self.barrier.clear_alert();
                }
                Err(error) => {
                    error!(%error, "Event processor stopped on unexpected wait failure");
                    break;
                }
            }
        }
    }
}

impl<T, H> EventProcessor for BatchEventProcessor<T, H>
where
    T: Send + Sync,
    H: EventHandler<T>,
{
    fn sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.sequence)
    }

    fn controller(&self) -> ProcessorController {
        ProcessorController {
            state: Arc::clone(&self.state),
            sequence: Arc::clone(&self.sequence),
            barrier: Arc::clone(&self.barrier),
        }
    }

    fn run(&mut self) -> Result<()> {
        if let Err(current) = self.state.compare_exchange(
            ProcessorState::Idle as u8,
            ProcessorState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return match ProcessorState::from_u8(current) {
                ProcessorState::Halted => {
                    debug!("Event processor halted before it started");
                    Ok(())
                }
                _ => Err(DisruptorError::ProcessorAlreadyRunning),
            };
        }

        debug!(sequence = self.sequence.get(), "Event processor started");

        if let Err(error) = self.handler.on_start() {
            self.exception_handler.handle_on_start_exception(error);
        }

        self.process_events();

        if let Err(error) = self.handler.on_shutdown() {
            self.exception_handler.handle_on_shutdown_exception(error);
        }

        self.state
            .store(ProcessorState::Halted as u8, Ordering::Release);
        debug!(sequence = self.sequence.get(), "Event processor halted");
        Ok(())
    }
}
