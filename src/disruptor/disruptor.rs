//! Disruptor DSL
//!
//! `Disruptor` wires a ring buffer to its consumers. Handlers are registered
//! as independent consumers or as stages that run after other handlers; each
//! becomes a `BatchEventProcessor` on its own thread once `start` is called.

use crate::config::DisruptorConfig;
use crate::disruptor::{
    BatchEventProcessor, DefaultExceptionHandler, DisruptorError, EventFactory, EventHandler,
    EventProcessor, ExceptionHandler, ManagedThread, ProcessorController, Producer, ProducerType,
    Result, RingBuffer, Sequence, ThreadBuilder, WaitStrategy,
};
use crossbeam_utils::Backoff;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// The consumer sequences of one or more registered handlers
///
/// Passed to `Disruptor::handle_events_after` to make a handler wait for every
/// handler in the group.
#[derive(Debug, Clone, Default)]
pub struct EventHandlerGroup {
    sequences: Vec<Arc<Sequence>>,
}

impl EventHandlerGroup {
    /// Merge two groups, e.g. to join the branches of a diamond
    #[must_use]
    pub fn and(mut self, other: EventHandlerGroup) -> Self {
        self.sequences.extend(other.sequences);
        self
    }

    /// Number of handlers in this group
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Whether the group contains no handlers
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub(crate) fn sequences(&self) -> &[Arc<Sequence>] {
        &self.sequences
    }
}

/// The main Disruptor entry point
///
/// # Type Parameters
/// * `T` - The event type stored in the ring buffer
///
/// # Examples
/// ```
/// use ringway::disruptor::{BlockingWaitStrategy, ClosureEventHandler, DefaultEventFactory, Disruptor, ProducerType};
/// use std::sync::Arc;
///
/// let mut disruptor = Disruptor::<i64>::new(
///     DefaultEventFactory::new(),
///     1024,
///     ProducerType::Single,
///     Arc::new(BlockingWaitStrategy::new()),
/// ).unwrap();
///
/// disruptor
///     .handle_events_with(ClosureEventHandler::new(|event: &i64, sequence, _| {
///         println!("{sequence}: {event}");
///         Ok(())
///     }))
///     .unwrap();
///
/// disruptor.start().unwrap();
/// let mut producer = disruptor.producer().unwrap();
/// producer.publish(|event, sequence| *event = sequence * 2).unwrap();
/// disruptor.shutdown().unwrap();
/// ```
pub struct Disruptor<T> {
    ring_buffer: Arc<RingBuffer<T>>,
    exception_handler: Arc<dyn ExceptionHandler<T>>,
    pending: Vec<Box<dyn EventProcessor>>,
    controllers: Vec<ProcessorController>,
    threads: Vec<ManagedThread>,
    thread_name_prefix: String,
    cpu_affinity: Vec<usize>,
    shutdown_timeout: Option<Duration>,
    started: bool,
}

impl<T> Disruptor<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new Disruptor
    ///
    /// # Arguments
    /// * `event_factory` - Factory used to pre-allocate every slot
    /// * `buffer_size` - Size of the ring buffer (must be a power of 2)
    /// * `producer_type` - Whether to use single or multi producer claims
    /// * `wait_strategy` - How consumers wait for new events
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` if the buffer size is invalid
    pub fn new<F>(
        event_factory: F,
        buffer_size: usize,
        producer_type: ProducerType,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        let ring_buffer = Arc::new(RingBuffer::new(
            event_factory,
            buffer_size,
            producer_type,
            wait_strategy,
        )?);

        debug!(buffer_size, %producer_type, "Created disruptor");

        Ok(Self {
            ring_buffer,
            exception_handler: Arc::new(DefaultExceptionHandler::new()),
            pending: Vec::new(),
            controllers: Vec::new(),
            threads: Vec::new(),
            thread_name_prefix: "ringway-processor".to_string(),
            cpu_affinity: Vec::new(),
            shutdown_timeout: None,
            started: false,
        })
    }

    /// Create a Disruptor from a validated configuration
    ///
    /// # Errors
    /// `DisruptorError::InvalidConfig` or `InvalidBufferSize` if the
    /// configuration is rejected
    pub fn from_config<F>(config: &DisruptorConfig, event_factory: F) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        config.validate()?;

        let mut disruptor = Self::new(
            event_factory,
            config.buffer_size,
            config.producer_type,
            config.wait_strategy.build(),
        )?
        .with_thread_name_prefix(config.thread_name_prefix.clone())
        .with_cpu_affinity(config.cpu_affinity.clone());
        disruptor.shutdown_timeout = config.shutdown_timeout_ms.map(Duration::from_millis);
        Ok(disruptor)
    }

    /// Route handler failures of subsequently registered handlers to `handler`
    #[must_use]
    pub fn with_exception_handler<E>(mut self, handler: E) -> Self
    where
        E: ExceptionHandler<T> + 'static,
    {
        self.exception_handler = Arc::new(handler);
        self
    }

    /// Prefix for processor thread names; threads are named `{prefix}-{index}`
    #[must_use]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// CPU cores to pin processor threads to, assigned round-robin
    #[must_use]
    pub fn with_cpu_affinity(mut self, cores: Vec<usize>) -> Self {
        self.cpu_affinity = cores;
        self
    }

    /// Bound the drain performed by `shutdown`
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Register a handler that consumes every event as soon as it is published
    ///
    /// # Errors
    /// `DisruptorError::AlreadyStarted` once `start` has been called
    pub fn handle_events_with<H>(&mut self, handler: H) -> Result<EventHandlerGroup>
    where
        H: EventHandler<T> + 'static,
    {
        self.add_processor(&EventHandlerGroup::default(), handler)
    }

    /// Register a handler that only sees an event after every handler in `group`
    ///
    /// The upstream handlers stop gating the producer; the new handler gates
    /// it instead, which is equivalent because it can never overtake them.
    ///
    /// # Errors
    /// `DisruptorError::AlreadyStarted` once `start` has been called
    pub fn handle_events_after<H>(&mut self, group: &EventHandlerGroup, handler: H) -> Result<EventHandlerGroup>
    where
        H: EventHandler<T> + 'static,
    {
        self.add_processor(group, handler)
    }

    fn add_processor<H>(&mut self, group: &EventHandlerGroup, handler: H) -> Result<EventHandlerGroup>
    where
        H: EventHandler<T> + 'static,
    {
        if self.started {
            return Err(DisruptorError::AlreadyStarted);
        }

        let barrier = self.ring_buffer.new_barrier(group.sequences.clone());
        let processor = BatchEventProcessor::new(
            Arc::clone(&self.ring_buffer),
            barrier,
            handler,
            Arc::clone(&self.exception_handler),
        );
        let sequence = processor.sequence();

        self.ring_buffer.add_gating_sequences(&[Arc::clone(&sequence)]);
        for upstream in &group.sequences {
            self.ring_buffer.remove_gating_sequence(upstream);
        }

        self.controllers.push(processor.controller());
        self.pending.push(Box::new(processor));

        debug!(
            processors = self.controllers.len(),
            dependencies = group.sequences.len(),
            "Registered event handler"
        );

        Ok(EventHandlerGroup {
            sequences: vec![sequence],
        })
    }

    /// Spawn one thread per registered handler
    ///
    /// # Errors
    /// `DisruptorError::AlreadyStarted` if called twice, or
    /// `DisruptorError::ThreadSpawn` if a thread cannot be created
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(DisruptorError::AlreadyStarted);
        }
        self.started = true;

        for (index, mut processor) in self.pending.drain(..).enumerate() {
            let mut builder =
                ThreadBuilder::new().thread_name(format!("{}-{index}", self.thread_name_prefix));
            if !self.cpu_affinity.is_empty() {
                builder = builder.pin_at_core(self.cpu_affinity[index % self.cpu_affinity.len()]);
            }

            let thread = builder.spawn(move || {
                if let Err(error) = processor.run() {
                    error!(%error, "Event processor failed to run");
                }
            })?;
            self.threads.push(thread);
        }

        info!(
            processors = self.threads.len(),
            buffer_size = self.ring_buffer.buffer_size(),
            "Disruptor started"
        );
        Ok(())
    }

    /// Create a producer handle
    ///
    /// # Errors
    /// `DisruptorError::SingleProducerViolation` when asked for a second
    /// producer in single producer mode
    pub fn producer(&self) -> Result<Producer<T>> {
        Producer::new(Arc::clone(&self.ring_buffer))
    }

    /// Wait until every handler has consumed every published event, then stop
    ///
    /// Producers must stop publishing before calling this. The wait is
    /// unbounded unless a shutdown timeout was configured, but it ends early
    /// if a processor thread has died.
    ///
    /// # Errors
    /// `DisruptorError::ShutdownTimeout` if a configured timeout expires,
    /// `DisruptorError::ProcessorExited` if a processor thread exited before
    /// draining
    pub fn shutdown(&mut self) -> Result<()> {
        let drained = self.drain(self.shutdown_timeout);
        self.halt();
        drained
    }

    /// Like `shutdown`, but give up draining after `timeout`
    ///
    /// The processors are halted and joined either way.
    ///
    /// # Errors
    /// `DisruptorError::ShutdownTimeout` if the backlog did not drain in time,
    /// `DisruptorError::ProcessorExited` if a processor thread exited before
    /// draining
    pub fn shutdown_with_timeout(&mut self, timeout: Duration) -> Result<()> {
        let drained = self.drain(Some(timeout));
        self.halt();
        drained
    }

    /// Stop every processor without waiting for the backlog
    pub fn halt(&mut self) {
        for controller in &self.controllers {
            controller.halt();
        }

        for thread in self.threads.drain(..) {
            let name = thread.thread_name().to_string();
            if thread.join().is_err() {
                error!(thread = %name, "Event processor thread panicked");
            }
        }

        // Release producers blocked on consumers that no longer run
        for controller in &self.controllers {
            self.ring_buffer.remove_gating_sequence(controller.gating_sequence());
        }

        if self.started {
            info!(cursor = self.ring_buffer.cursor(), "Disruptor halted");
        }
    }

    fn drain(&self, timeout: Option<Duration>) -> Result<()> {
        if !self.started {
            return Ok(());
        }

        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let backoff = Backoff::new();
        loop {
            let cursor = self.ring_buffer.cursor();
            if self
                .controllers
                .iter()
                .all(|controller| controller.sequence() >= cursor)
            {
                return Ok(());
            }

            if let Some(thread) = self.threads.iter().find(|thread| !thread.is_running()) {
                warn!(thread = thread.thread_name(), cursor, "Processor exited before draining");
                return Err(DisruptorError::ProcessorExited(thread.thread_name().to_string()));
            }

            if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
                if Instant::now() >= deadline {
                    warn!(?timeout, cursor, "Shutdown timed out before draining");
                    return Err(DisruptorError::ShutdownTimeout(timeout));
                }
            }

            if backoff.is_completed() {
                std::thread::sleep(Duration::from_micros(100));
            } else {
                backoff.snooze();
            }
        }
    }

    /// The ring buffer shared with producers and processors
    pub fn ring_buffer(&self) -> &Arc<RingBuffer<T>> {
        &self.ring_buffer
    }

    /// Current producer cursor
    pub fn cursor(&self) -> i64 {
        self.ring_buffer.cursor()
    }

    /// Size of the ring buffer
    pub fn buffer_size(&self) -> usize {
        self.ring_buffer.buffer_size()
    }

    /// Number of slots that can be claimed without waiting
    pub fn remaining_capacity(&self) -> i64 {
        self.ring_buffer.remaining_capacity()
    }

    /// Controllers for every registered handler, in registration order
    pub fn controllers(&self) -> &[ProcessorController] {
        &self.controllers
    }

    /// Whether `start` has been called
    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl<T> Drop for Disruptor<T> {
    fn drop(&mut self) {
        if self.threads.is_empty() {
            return;
        }

        for controller in &self.controllers {
            controller.halt();
        }
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}

impl<T> std::fmt::Debug for Disruptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disruptor")
            .field("buffer_size", &self.ring_buffer.buffer_size())
            .field("producer_type", &self.ring_buffer.producer_type())
            .field("cursor", &self.ring_buffer.cursor())
            .field("processors", &self.controllers.len())
            .field("started", &self.started)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::{
        BlockingWaitStrategy, ClosureEventHandler, DefaultEventFactory, ProcessorState,
        YieldingWaitStrategy,
    };
    use parking_lot::Mutex;

    fn disruptor(size: usize, producer_type: ProducerType) -> Disruptor<i64> {
        Disruptor::new(
            DefaultEventFactory::new(),
            size,
            producer_type,
            Arc::new(BlockingWaitStrategy::new()),
        )
        .unwrap()
    }

    fn collector(seen: &Arc<Mutex<Vec<i64>>>) -> impl EventHandler<i64> + 'static {
        let seen = Arc::clone(seen);
        ClosureEventHandler::new(move |event: &i64, _, _| {
            seen.lock().push(*event);
            Ok(())
        })
    }

    #[test]
    fn test_invalid_buffer_size() {
        let result = Disruptor::<i64>::new(
            DefaultEventFactory::new(),
            12,
            ProducerType::Single,
            Arc::new(BlockingWaitStrategy::new()),
        );
        assert!(matches!(result, Err(DisruptorError::InvalidBufferSize(12))));
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut disruptor = disruptor(8, ProducerType::Single);
        disruptor.start().unwrap();
        assert!(matches!(disruptor.start(), Err(DisruptorError::AlreadyStarted)));
        assert!(matches!(
            disruptor.handle_events_with(ClosureEventHandler::new(|_: &i64, _, _| Ok(()))),
            Err(DisruptorError::AlreadyStarted)
        ));
        disruptor.shutdown().unwrap();
    }

    #[test]
    fn test_single_mode_hands_out_one_producer() {
        let disruptor = disruptor(8, ProducerType::Single);
        let producer = disruptor.producer().unwrap();
        assert!(matches!(disruptor.producer(), Err(DisruptorError::SingleProducerViolation)));
        assert!(producer.try_clone().is_err());

        let multi = self::disruptor(8, ProducerType::Multi);
        assert!(multi.producer().is_ok());
        assert!(multi.producer().is_ok());
    }

    #[test]
    fn test_publish_and_shutdown_drains() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut disruptor = disruptor(8, ProducerType::Single);
        disruptor.handle_events_with(collector(&seen)).unwrap();
        disruptor.start().unwrap();

        let mut producer = disruptor.producer().unwrap();
        for value in 0..20 {
            producer.publish(|event, _| *event = value).unwrap();
        }
        disruptor.shutdown().unwrap();

        assert_eq!(*seen.lock(), (0..20).collect::<Vec<_>>());
        assert!(disruptor
            .controllers()
            .iter()
            .all(|controller| controller.state() == ProcessorState::Halted));
    }

    #[test]
    fn test_gating_moves_to_downstream_stage() {
        let mut disruptor = disruptor(8, ProducerType::Single);
        let first = disruptor
            .handle_events_with(ClosureEventHandler::new(|_: &i64, _, _| Ok(())))
            .unwrap();
        assert_eq!(disruptor.ring_buffer().sequencer().gating_sequences().read().len(), 1);

        let second = disruptor
            .handle_events_after(&first, ClosureEventHandler::new(|_: &i64, _, _| Ok(())))
            .unwrap();
        let gating = disruptor.ring_buffer().sequencer().gating_sequences().read().clone();
        assert_eq!(gating.len(), 1);
        assert!(Arc::ptr_eq(&gating[0], &second.sequences()[0]));
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_diamond_groups_merge() {
        let mut disruptor = disruptor(8, ProducerType::Single);
        let a = disruptor
            .handle_events_with(ClosureEventHandler::new(|_: &i64, _, _| Ok(())))
            .unwrap();
        let b = disruptor
            .handle_events_with(ClosureEventHandler::new(|_: &i64, _, _| Ok(())))
            .unwrap();
        let joined = a.and(b);
        assert_eq!(joined.len(), 2);
        assert!(!joined.is_empty());

        disruptor
            .handle_events_after(&joined, ClosureEventHandler::new(|_: &i64, _, _| Ok(())))
            .unwrap();
        assert_eq!(disruptor.ring_buffer().sequencer().gating_sequences().read().len(), 1);
        assert_eq!(disruptor.controllers().len(), 3);
    }

    #[test]
    fn test_shutdown_timeout_still_halts() {
        let mut disruptor = Disruptor::<i64>::new(
            DefaultEventFactory::new(),
            8,
            ProducerType::Single,
            Arc::new(YieldingWaitStrategy::new()),
        )
        .unwrap();
        disruptor
            .handle_events_with(ClosureEventHandler::new(|_: &i64, _, _| {
                std::thread::sleep(Duration::from_millis(50));
                Ok(())
            }))
            .unwrap();
        disruptor.start().unwrap();

        let mut producer = disruptor.producer().unwrap();
        for value in 0..4 {
            producer.publish(|event, _| *event = value).unwrap();
        }

        let result = disruptor.shutdown_with_timeout(Duration::from_millis(10));
        assert!(matches!(result, Err(DisruptorError::ShutdownTimeout(_))));
        assert!(disruptor
            .controllers()
            .iter()
            .all(|controller| controller.state() == ProcessorState::Halted));

        // Gating was released, so the producer can no longer block
        for value in 0..16 {
            producer.try_publish(|event, _| *event = value).unwrap();
        }
    }

    #[test]
    fn test_shutdown_reports_dead_processor_instead_of_hanging() {
        struct FailsToStart;

        impl EventHandler<i64> for FailsToStart {
            fn on_event(&mut self, _event: &i64, _sequence: i64, _end_of_batch: bool) -> Result<()> {
                Ok(())
            }

            fn on_start(&mut self) -> Result<()> {
                panic!("cannot open journal");
            }
        }

        let mut disruptor = disruptor(8, ProducerType::Single).with_thread_name_prefix("journal");
        disruptor.handle_events_with(FailsToStart).unwrap();
        disruptor.start().unwrap();

        let mut producer = disruptor.producer().unwrap();
        producer.publish(|event, _| *event = 1).unwrap();

        let result = disruptor.shutdown();
        assert!(matches!(result, Err(DisruptorError::ProcessorExited(name)) if name == "journal-0"));
        assert_eq!(disruptor.controllers()[0].sequence(), -1);
    }

    #[test]
    fn test_shutdown_before_start() {
        let mut disruptor = disruptor(8, ProducerType::Multi);
        disruptor
            .handle_events_with(ClosureEventHandler::new(|_: &i64, _, _| Ok(())))
            .unwrap();
        disruptor.shutdown().unwrap();
        assert!(!disruptor.is_started());
    }

    #[test]
    fn test_drop_halts_running_disruptor() {
        let mut disruptor = disruptor(8, ProducerType::Single);
        disruptor
            .handle_events_with(ClosureEventHandler::new(|_: &i64, _, _| Ok(())))
            .unwrap();
        disruptor.start().unwrap();
        let controller = disruptor.controllers()[0].clone();

        drop(disruptor);
        assert_eq!(controller.state(), ProcessorState::Halted);
    }
}
