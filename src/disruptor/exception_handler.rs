//! Exception Handler Implementation
//!
//! Exception handlers receive every failure raised by an event handler. The
//! processor never retries: once the exception handler returns, the failed
//! sequence counts as consumed.

use crate::disruptor::DisruptorError;
use std::marker::PhantomData;
use tracing::error;

/// Handler for failures raised while processing events
///
/// # Type Parameters
/// * `T` - The event type being processed
pub trait ExceptionHandler<T>: Send + Sync {
    /// Handle a failure of `EventHandler::on_event` for the event at `sequence`
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, event: &T);

    /// Handle a failure of `EventHandler::on_start`
    fn handle_on_start_exception(&self, error: DisruptorError);

    /// Handle a failure of `EventHandler::on_shutdown`
    fn handle_on_shutdown_exception(&self, error: DisruptorError);
}

/// Logs every failure through `tracing` and carries on
#[derive(Debug)]
pub struct DefaultExceptionHandler<T> {
    _phantom: PhantomData<fn(&T)>,
}

impl<T> DefaultExceptionHandler<T> {
    /// Create a new default exception handler
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for DefaultExceptionHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ExceptionHandler<T> for DefaultExceptionHandler<T> {
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, _event: &T) {
        error!(sequence, %error, "Exception processing event");
    }

    fn handle_on_start_exception(&self, error: DisruptorError) {
        error!(%error, "Exception during event processor startup");
    }

    fn handle_on_shutdown_exception(&self, error: DisruptorError) {
        error!(%error, "Exception during event processor shutdown");
    }
}

/// Silently drops every failure
#[derive(Debug)]
pub struct IgnoreExceptionHandler<T> {
    _phantom: PhantomData<fn(&T)>,
}

impl<T> IgnoreExceptionHandler<T> {
    /// Create a new ignore exception handler
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for IgnoreExceptionHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ExceptionHandler<T> for IgnoreExceptionHandler<T> {
    fn handle_event_exception(&self, _error: DisruptorError, _sequence: i64, _event: &T) {}

    fn handle_on_start_exception(&self, _error: DisruptorError) {}

    fn handle_on_shutdown_exception(&self, _error: DisruptorError) {}
}

/// Routes event failures to a closure; lifecycle failures are logged
///
/// # Examples
/// ```
/// use ringway::disruptor::{ClosureExceptionHandler, DisruptorError, ExceptionHandler};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let failures = AtomicUsize::new(0);
/// let handler = ClosureExceptionHandler::new(|_error, _sequence, _event: &i64| {
///     failures.fetch_add(1, Ordering::Relaxed);
/// });
///
/// handler.handle_event_exception(DisruptorError::handler("boom"), 3, &7);
/// assert_eq!(failures.load(Ordering::Relaxed), 1);
/// ```
pub struct ClosureExceptionHandler<T, F> {
    on_event_exception: F,
    _phantom: PhantomData<fn(&T)>,
}

impl<T, F> ClosureExceptionHandler<T, F>
where
    F: Fn(DisruptorError, i64, &T) + Send + Sync,
{
    /// Create a handler that calls `on_event_exception` for each event failure
    pub fn new(on_event_exception: F) -> Self {
        Self {
            on_event_exception,
            _phantom: PhantomData,
        }
    }
}

impl<T, F> ExceptionHandler<T> for ClosureExceptionHandler<T, F>
where
    F: Fn(DisruptorError, i64, &T) + Send + Sync,
{
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, event: &T) {
        (self.on_event_exception)(error, sequence, event);
    }

    fn handle_on_start_exception(&self, error: DisruptorError) {
        error!(%error, "Exception during event processor startup");
    }

    fn handle_on_shutdown_exception(&self, error: DisruptorError) {
        error!(%error, "Exception during event processor shutdown");
    }
}

impl<T, F> std::fmt::Debug for ClosureExceptionHandler<T, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureExceptionHandler").finish_non_exhaustive()
    }
}
