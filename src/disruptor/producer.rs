//! Producer API
//!
//! A `Producer` publishes into a ring buffer either by claiming a slot and
//! writing it directly (`claim`, `publish`) or by handing a translator to
//! one of the `publish_event*` methods. Every claimed sequence is published
//! exactly once, including when the caller's update code panics.

use crate::disruptor::ring_buffer::Claim;
use crate::disruptor::{
    DisruptorError, EventTranslator, EventTranslatorOneArg, EventTranslatorTwoArg, Result,
    RingBuffer,
};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Publishing handle for a ring buffer
///
/// In single producer mode only one `Producer` can exist per ring buffer and
/// `try_clone` fails. In multi producer mode producers clone freely and may
/// publish concurrently from any number of threads.
///
/// # Examples
/// ```
/// use ringway::disruptor::{BlockingWaitStrategy, DefaultEventFactory, Producer, ProducerType, RingBuffer};
/// use std::sync::Arc;
///
/// let ring_buffer = Arc::new(RingBuffer::<i64>::new(
///     DefaultEventFactory::new(),
///     8,
///     ProducerType::Single,
///     Arc::new(BlockingWaitStrategy::new()),
/// ).unwrap());
///
/// let mut producer = Producer::new(Arc::clone(&ring_buffer)).unwrap();
/// let sequence = producer.publish(|event, _sequence| *event = 42).unwrap();
/// assert_eq!(sequence, 0);
/// assert_eq!(ring_buffer.cursor(), 0);
/// ```
#[derive(Debug)]
pub struct Producer<T> {
    ring_buffer: Arc<RingBuffer<T>>,
}

impl<T> Producer<T> {
    /// Create a producer for `ring_buffer`
    ///
    /// # Errors
    /// `DisruptorError::SingleProducerViolation` if the buffer is in single
    /// producer mode and already has a producer
    pub fn new(ring_buffer: Arc<RingBuffer<T>>) -> Result<Self> {
        ring_buffer.register_producer()?;
        Ok(Self { ring_buffer })
    }

    /// Create another producer for the same ring buffer
    ///
    /// # Errors
    /// `DisruptorError::SingleProducerViolation` in single producer mode
    pub fn try_clone(&self) -> Result<Self> {
        if self.ring_buffer.producer_type().is_single() {
            return Err(DisruptorError::SingleProducerViolation);
        }
        Ok(Self {
            ring_buffer: Arc::clone(&self.ring_buffer),
        })
    }

    /// The ring buffer this producer publishes into
    pub fn ring_buffer(&self) -> &Arc<RingBuffer<T>> {
        &self.ring_buffer
    }

    /// Claim the next slot, waiting while the buffer is full
    ///
    /// The slot is published when the returned `ClaimedEvent` is published or
    /// dropped.
    pub fn claim(&mut self) -> Result<ClaimedEvent<'_, T>> {
        let sequence = self.ring_buffer.next()?;
        Ok(ClaimedEvent {
            ring_buffer: &self.ring_buffer,
            sequence,
        })
    }

    /// Claim the next slot without waiting
    ///
    /// # Errors
    /// `DisruptorError::InsufficientCapacity` if the buffer is full
    pub fn try_claim(&mut self) -> Result<ClaimedEvent<'_, T>> {
        let sequence = self.ring_buffer.try_next()?;
        Ok(ClaimedEvent {
            ring_buffer: &self.ring_buffer,
            sequence,
        })
    }

    /// Claim a slot, fill it with `update`, and publish it
    ///
    /// Returns the published sequence.
    pub fn publish<F>(&mut self, update: F) -> Result<i64>
    where
        F: FnOnce(&mut T, i64),
    {
        let mut claimed = self.claim()?;
        let sequence = claimed.sequence();
        update(&mut *claimed, sequence);
        Ok(claimed.publish())
    }

    /// As `publish`, but fails instead of waiting when the buffer is full
    ///
    /// # Errors
    /// `DisruptorError::InsufficientCapacity` if the buffer is full
    pub fn try_publish<F>(&mut self, update: F) -> Result<i64>
    where
        F: FnOnce(&mut T, i64),
    {
        let mut claimed = self.try_claim()?;
        let sequence = claimed.sequence();
        update(&mut *claimed, sequence);
        Ok(claimed.publish())
    }

    /// Publish one event through `translator`
    pub fn publish_event<Tr>(&mut self, translator: &Tr) -> Result<i64>
    where
        Tr: EventTranslator<T> + ?Sized,
    {
        self.publish(|event, sequence| translator.translate_to(event, sequence))
    }

    /// Publish one event built from `arg0`
    pub fn publish_event_one_arg<Tr, A>(&mut self, translator: &Tr, arg0: A) -> Result<i64>
    where
        Tr: EventTranslatorOneArg<T, A> + ?Sized,
    {
        self.publish(|event, sequence| translator.translate_to(event, sequence, arg0))
    }

    /// Publish one event built from `arg0`, failing if the buffer is full
    pub fn try_publish_event_one_arg<Tr, A>(&mut self, translator: &Tr, arg0: A) -> Result<i64>
    where
        Tr: EventTranslatorOneArg<T, A> + ?Sized,
    {
        self.try_publish(|event, sequence| translator.translate_to(event, sequence, arg0))
    }

    /// Publish one event built from `arg0` and `arg1`
    pub fn publish_event_two_arg<Tr, A, B>(&mut self, translator: &Tr, arg0: A, arg1: B) -> Result<i64>
    where
        Tr: EventTranslatorTwoArg<T, A, B> + ?Sized,
    {
        self.publish(|event, sequence| translator.translate_to(event, sequence, arg0, arg1))
    }

    /// Publish one event per argument with a single claim and a single publish
    ///
    /// Returns the highest published sequence.
    ///
    /// # Errors
    /// `DisruptorError::InvalidClaimSize` if `args` is empty or longer than
    /// the buffer
    pub fn publish_events_one_arg<Tr, A, I>(&mut self, translator: &Tr, args: I) -> Result<i64>
    where
        Tr: EventTranslatorOneArg<T, A> + ?Sized,
        I: IntoIterator<Item = A>,
        I::IntoIter: ExactSizeIterator,
    {
        self.publish_batch(Claim::Wait, translator, args)
    }

    /// As `publish_events_one_arg`, but fails instead of waiting
    pub fn try_publish_events_one_arg<Tr, A, I>(&mut self, translator: &Tr, args: I) -> Result<i64>
    where
        Tr: EventTranslatorOneArg<T, A> + ?Sized,
        I: IntoIterator<Item = A>,
        I::IntoIter: ExactSizeIterator,
    {
        self.publish_batch(Claim::Try, translator, args)
    }

    fn publish_batch<Tr, A, I>(&mut self, claim: Claim, translator: &Tr, args: I) -> Result<i64>
    where
        Tr: EventTranslatorOneArg<T, A> + ?Sized,
        I: IntoIterator<Item = A>,
        I::IntoIter: ExactSizeIterator,
    {
        let mut args = args.into_iter();
        let n = args.len() as i64;

        // SAFETY: single producer mode allows exactly one `Producer`, and it
        // is borrowed mutably here.
        unsafe {
            self.ring_buffer.translate_and_publish(n, claim, |event, sequence| {
                if let Some(arg) = args.next() {
                    translator.translate_to(event, sequence, arg);
                }
            })
        }
    }
}

/// A claimed slot that is published when `publish` is called or when it drops
///
/// Dereferences to the event stored in the slot. The slot still holds the
/// value of its previous lap until overwritten.
#[derive(Debug)]
pub struct ClaimedEvent<'a, T> {
    ring_buffer: &'a RingBuffer<T>,
    sequence: i64,
}

impl<T> ClaimedEvent<'_, T> {
    /// The claimed sequence
    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// Publish the slot and return its sequence
    pub fn publish(self) -> i64 {
        self.sequence
    }
}

impl<T> Deref for ClaimedEvent<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the sequence is claimed by this handle and unpublished, so
        // no consumer reads the slot and no other producer owns it.
        unsafe { &*self.ring_buffer.get_mut_unchecked(self.sequence) }
    }
}

impl<T> DerefMut for ClaimedEvent<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as for `deref`; `&mut self` makes the access exclusive.
        unsafe { &mut *self.ring_buffer.get_mut_unchecked(self.sequence) }
    }
}

impl<T> Drop for ClaimedEvent<'_, T> {
    fn drop(&mut self) {
        self.ring_buffer.publish(self.sequence);
    }
}
