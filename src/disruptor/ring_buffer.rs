//! Ring Buffer Implementation
//!
//! The ring buffer is a pre-allocated circular array of events addressed by
//! `sequence & (buffer_size - 1)`. Slots are mutated in place and never
//! reallocated; all synchronisation goes through the sequencer's cursor and
//! the consumers' sequences, never through per-slot locks.

use crate::disruptor::{
    is_power_of_two, DisruptorError, EventFactory, MultiProducerSequencer,
    ProcessingSequenceBarrier, ProducerType, Result, Sequence, Sequencer,
    SingleProducerSequencer, WaitStrategy,
};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The core ring buffer for storing events
///
/// Claiming, publishing and gating are only reachable through [`Producer`]
/// and [`Disruptor`], so safe code cannot lap a slot that a handler still
/// reads:
///
/// ```compile_fail
/// use ringway::disruptor::{BlockingWaitStrategy, DefaultEventFactory, ProducerType, RingBuffer};
/// use std::sync::Arc;
///
/// let ring_buffer = RingBuffer::<i64>::new(
///     DefaultEventFactory::new(),
///     4,
///     ProducerType::Single,
///     Arc::new(BlockingWaitStrategy::new()),
/// ).unwrap();
/// let sequence = ring_buffer.next().unwrap();
/// ring_buffer.publish(sequence);
/// ```
///
/// # Type Parameters
/// * `T` - The event type stored in the buffer
///
/// [`Producer`]: crate::disruptor::Producer
/// [`Disruptor`]: crate::disruptor::Disruptor
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Box<[UnsafeCell<T>]>,
    /// `buffer_size - 1`, kept as i64 to match sequence arithmetic
    index_mask: i64,
    sequencer: Arc<dyn Sequencer>,
    producer_type: ProducerType,
    producer_registered: AtomicBool,
}

// SAFETY: slots are only written by the producer that claimed the sequence
// and only read by consumers after the sequence has been published, which the
// sequencer's Release/Acquire pairing orders. Gating stops the producer from
// reclaiming a slot that any gating consumer has not finished reading.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send + Sync> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer and pre-populate every slot
    ///
    /// # Arguments
    /// * `event_factory` - Factory called once per slot
    /// * `buffer_size` - Number of slots, must be a positive power of 2
    /// * `producer_type` - Single or multi producer claim strategy, fixed for life
    /// * `wait_strategy` - How consumers wait for new events
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` if `buffer_size` is not a power of 2
    pub fn new<F>(
        event_factory: F,
        buffer_size: usize,
        producer_type: ProducerType,
        wait_strategy: Arc<dyn WaitStrategy>,
    ) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        if !is_power_of_two(buffer_size) || buffer_size > i32::MAX as usize {
            return Err(DisruptorError::InvalidBufferSize(buffer_size));
        }

        let sequencer: Arc<dyn Sequencer> = match producer_type {
            ProducerType::Single => Arc::new(SingleProducerSequencer::new(buffer_size, wait_strategy)?),
            ProducerType::Multi => Arc::new(MultiProducerSequencer::new(buffer_size, wait_strategy)?),
        };

        let slots: Box<[UnsafeCell<T>]> = (0..buffer_size)
            .map(|_| UnsafeCell::new(event_factory.new_instance()))
            .collect();

        Ok(Self {
            slots,
            index_mask: (buffer_size - 1) as i64,
            sequencer,
            producer_type,
            producer_registered: AtomicBool::new(false),
        })
    }

    /// Get a shared reference to the event at `sequence`
    ///
    /// # Safety
    /// `sequence` must have been published and the caller must be gating the
    /// producer (directly or through a downstream consumer) so the slot cannot
    /// be claimed again while the reference is alive.
    #[inline]
    pub unsafe fn get(&self, sequence: i64) -> &T {
        &*self.get_mut_unchecked(sequence)
    }

    /// Raw pointer to the slot at `sequence`
    ///
    /// # Safety
    /// Dereferencing the pointer mutably is only sound for the producer that
    /// claimed `sequence` and before it is published.
    #[inline]
    pub unsafe fn get_mut_unchecked(&self, sequence: i64) -> *mut T {
        let index = (sequence & self.index_mask) as usize;
        // SAFETY: the mask keeps the index within bounds.
        self.slots.get_unchecked(index).get()
    }

    /// Mutable access with exclusive ownership of the buffer
    pub fn get_mut(&mut self, sequence: i64) -> &mut T {
        let index = (sequence & self.index_mask) as usize;
        self.slots[index].get_mut()
    }

    /// Get the size of the buffer
    pub fn buffer_size(&self) -> usize {
        self.slots.len()
    }

    /// The producer mode chosen at construction
    pub fn producer_type(&self) -> ProducerType {
        self.producer_type
    }

    /// Current value of the producer cursor
    pub fn cursor(&self) -> i64 {
        self.sequencer.cursor().get()
    }

    #[cfg(test)]
    pub(crate) fn sequencer(&self) -> &Arc<dyn Sequencer> {
        &self.sequencer
    }

    /// Claim the next sequence, waiting for consumers if the buffer is full
    pub(crate) fn next(&self) -> Result<i64> {
        self.sequencer.next()
    }

    /// Claim the next sequence without waiting
    pub(crate) fn try_next(&self) -> Result<i64> {
        self.sequencer.try_next()
    }

    /// Publish a claimed sequence
    pub(crate) fn publish(&self, sequence: i64) {
        self.sequencer.publish(sequence);
    }

    /// Whether `sequence` is published and still held in the buffer
    pub fn is_available(&self, sequence: i64) -> bool {
        self.sequencer.is_available(sequence)
    }

    /// Number of slots that can be claimed without waiting
    pub fn remaining_capacity(&self) -> i64 {
        self.sequencer.remaining_capacity()
    }

    /// Whether `required` slots can be claimed without waiting
    pub fn has_available_capacity(&self, required: i64) -> bool {
        self.sequencer.has_available_capacity(required)
    }

    /// Add consumer sequences the producer must not overtake
    pub(crate) fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.sequencer.add_gating_sequences(sequences);
    }

    /// Stop gating on `sequence`
    pub(crate) fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        self.sequencer.remove_gating_sequence(sequence)
    }

    /// Minimum of the gating sequences
    pub fn minimum_gating_sequence(&self) -> i64 {
        self.sequencer.minimum_gating_sequence()
    }

    /// Create a barrier for a consumer that depends on `dependent_sequences`
    pub(crate) fn new_barrier(&self, dependent_sequences: Vec<Arc<Sequence>>) -> ProcessingSequenceBarrier {
        ProcessingSequenceBarrier::new(Arc::clone(&self.sequencer), dependent_sequences)
    }

    /// Claim `n` slots, let `update` fill them, then publish them together
    ///
    /// # Safety
    /// In single producer mode the caller must be the only thread claiming.
    pub(crate) unsafe fn translate_and_publish<F>(&self, n: i64, claim: Claim, mut update: F) -> Result<i64>
    where
        F: FnMut(&mut T, i64),
    {
        let high = match claim {
            Claim::Wait => self.sequencer.next_n(n)?,
            Claim::Try => self.sequencer.try_next_n(n)?,
        };
        let low = high - (n - 1);

        debug_assert!(
            high - self.sequencer.minimum_gating_sequence() <= self.buffer_size() as i64,
            "claim of {low}..={high} would overwrite unread events"
        );

        // Publish even if `update` panics so consumers never stall on a gap
        let _publish = PublishOnDrop {
            sequencer: &*self.sequencer,
            low,
            high,
        };
        for sequence in low..=high {
            update(&mut *self.get_mut_unchecked(sequence), sequence);
        }

        Ok(high)
    }

    /// Register a producer handle, allowing only one in single producer mode
    pub(crate) fn register_producer(&self) -> Result<()> {
        if self.producer_type.is_single() && self.producer_registered.swap(true, Ordering::AcqRel) {
            return Err(DisruptorError::SingleProducerViolation);
        }
        Ok(())
    }
}

struct PublishOnDrop<'a> {
    sequencer: &'a dyn Sequencer,
    low: i64,
    high: i64,
}

impl Drop for PublishOnDrop<'_> {
    fn drop(&mut self) {
        self.sequencer.publish_range(self.low, self.high);
    }
}

/// How a claim behaves when the buffer is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    Wait,
    Try,
}
