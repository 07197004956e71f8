//! Event Factory Implementation
//!
//! Factories fill every ring buffer slot exactly once, when the buffer is
//! built. After that, events are reused in place and never reallocated.

use std::marker::PhantomData;

/// Creates the pre-allocated events that live in the ring buffer
///
/// # Examples
/// ```
/// use ringway::disruptor::EventFactory;
///
/// struct LongEvent {
///     value: i64,
/// }
///
/// struct LongEventFactory;
///
/// impl EventFactory<LongEvent> for LongEventFactory {
///     fn new_instance(&self) -> LongEvent {
///         LongEvent { value: 0 }
///     }
/// }
/// ```
pub trait EventFactory<T>: Send + Sync {
    /// Produce one event in its initial state
    fn new_instance(&self) -> T;
}

/// Event factory that uses `T::default()`
#[derive(Debug)]
pub struct DefaultEventFactory<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Default> DefaultEventFactory<T> {
    /// Create a new default event factory
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: Default> Default for DefaultEventFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> EventFactory<T> for DefaultEventFactory<T> {
    fn new_instance(&self) -> T {
        T::default()
    }
}

/// Event factory backed by a closure
pub struct ClosureEventFactory<F> {
    factory_fn: F,
}

impl<F> ClosureEventFactory<F> {
    /// Wrap `factory_fn`, which is called once per slot
    pub fn new(factory_fn: F) -> Self {
        Self { factory_fn }
    }
}

impl<T, F> EventFactory<T> for ClosureEventFactory<F>
where
    F: Fn() -> T + Send + Sync,
{
    fn new_instance(&self) -> T {
        (self.factory_fn)()
    }
}

impl<F> std::fmt::Debug for ClosureEventFactory<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureEventFactory").finish_non_exhaustive()
    }
}
