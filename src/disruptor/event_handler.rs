//! Event Handler Implementation
//!
//! Handlers are the consumer callbacks driven by a `BatchEventProcessor`. Each
//! handler runs on its own processor thread, so it owns its state mutably
//! while the event itself is shared with every other consumer of the slot.

use crate::disruptor::Result;
use std::marker::PhantomData;

/// Callback interface for consuming events from the ring buffer
///
/// # Type Parameters
/// * `T` - The event type that will be processed
///
/// # Examples
/// ```
/// use ringway::disruptor::{EventHandler, Result};
///
/// #[derive(Default)]
/// struct LongEvent {
///     value: i64,
/// }
///
/// struct SumHandler {
///     total: i64,
/// }
///
/// impl EventHandler<LongEvent> for SumHandler {
///     fn on_event(&mut self, event: &LongEvent, _sequence: i64, _end_of_batch: bool) -> Result<()> {
///         self.total += event.value;
///         Ok(())
///     }
/// }
/// ```
pub trait EventHandler<T>: Send {
    /// Process one published event
    ///
    /// `end_of_batch` is true for the last event the processor has available
    /// right now, which is the natural point to flush buffered work.
    ///
    /// # Errors
    /// Any error is passed to the processor's `ExceptionHandler`. The event
    /// is not redelivered.
    fn on_event(&mut self, event: &T, sequence: i64, end_of_batch: bool) -> Result<()>;

    /// Called once on the processor thread before the first event
    fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once on the processor thread after the last event
    fn on_shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called before a batch of `batch_size` events is delivered
    fn on_batch_start(&mut self, _batch_size: i64) {}

    /// Called when a timeout wait strategy expires while waiting for `sequence`
    fn on_timeout(&mut self, _sequence: i64) -> Result<()> {
        Ok(())
    }
}

/// Event handler built from a closure
///
/// Only `on_event` is customisable; the lifecycle hooks keep their defaults.
pub struct ClosureEventHandler<T, F> {
    handler: F,
    _phantom: PhantomData<fn(&T)>,
}

impl<T, F> ClosureEventHandler<T, F>
where
    F: FnMut(&T, i64, bool) -> Result<()> + Send,
{
    /// Create a new closure-based event handler
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<T, F> EventHandler<T> for ClosureEventHandler<T, F>
where
    F: FnMut(&T, i64, bool) -> Result<()> + Send,
{
    fn on_event(&mut self, event: &T, sequence: i64, end_of_batch: bool) -> Result<()> {
        (self.handler)(event, sequence, end_of_batch)
    }
}

impl<T, F> std::fmt::Debug for ClosureEventHandler<T, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureEventHandler").finish_non_exhaustive()
    }
}
