//! Sequencer Implementation
//!
//! Sequencers hand out sequence numbers to producers and make sure a producer
//! never wraps around onto a slot that a gating consumer has not read yet.
//! The single producer variant never performs a CAS on the cursor; the multi
//! producer variant claims with a CAS loop and tracks publication per slot,
//! because concurrent claims may be published out of order.

use crate::disruptor::{
    is_power_of_two, minimum_sequence, DisruptorError, Result, Sequence, WaitStrategy,
    INITIAL_CURSOR_VALUE,
};
use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::RwLock;
use std::sync::atomic::{fence, AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;

/// Trait for sequencers that coordinate access to the ring buffer
pub trait Sequencer: Send + Sync + std::fmt::Debug {
    /// The producer cursor
    ///
    /// For a single producer this is the highest published sequence; for
    /// multiple producers it is the highest claimed sequence and consumers must
    /// consult [`Sequencer::get_highest_published_sequence`].
    fn cursor(&self) -> &Arc<Sequence>;

    /// The wait strategy consumers use and producers signal
    fn wait_strategy(&self) -> &Arc<dyn WaitStrategy>;

    /// The size of the ring buffer
    fn buffer_size(&self) -> usize;

    /// Claim the next `n` sequences, waiting while the buffer is full
    ///
    /// A claim of exactly `buffer_size` sequences is accepted: it waits until
    /// every gating consumer has read the whole ring and then takes all of it,
    /// which is also what makes a buffer of size 1 usable.
    ///
    /// # Returns
    /// The highest claimed sequence
    ///
    /// # Errors
    /// `DisruptorError::InvalidClaimSize` if `n < 1` or `n > buffer_size`
    fn next_n(&self, n: i64) -> Result<i64>;

    /// Claim the next `n` sequences without waiting
    ///
    /// # Errors
    /// `DisruptorError::InsufficientCapacity` if the claim would overwrite
    /// unread events, `DisruptorError::InvalidClaimSize` for a bad `n`
    fn try_next_n(&self, n: i64) -> Result<i64>;

    /// Make `sequence` visible to consumers
    fn publish(&self, sequence: i64);

    /// Make the inclusive range `low..=high` visible to consumers
    fn publish_range(&self, low: i64, high: i64);

    /// Whether `sequence` has been published and not yet overwritten
    fn is_available(&self, sequence: i64) -> bool;

    /// Highest contiguous published sequence in `low..=available`
    ///
    /// Returns `low - 1` when `low` itself is not published.
    fn get_highest_published_sequence(&self, low: i64, available: i64) -> i64;

    /// The sequences this sequencer must not lap
    fn gating_sequences(&self) -> &RwLock<Vec<Arc<Sequence>>>;

    /// Claim the next sequence, waiting while the buffer is full
    fn next(&self) -> Result<i64> {
        self.next_n(1)
    }

    /// Claim the next sequence without waiting
    fn try_next(&self) -> Result<i64> {
        self.try_next_n(1)
    }

    /// Add sequences that this sequencer must not overtake
    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.gating_sequences().write().extend_from_slice(sequences);
    }

    /// Stop gating on `sequence`
    ///
    /// # Returns
    /// True if the sequence was registered
    fn remove_gating_sequence(&self, sequence: &Arc<Sequence>) -> bool {
        let mut sequences = self.gating_sequences().write();
        let before = sequences.len();
        sequences.retain(|registered| !Arc::ptr_eq(registered, sequence));
        sequences.len() != before
    }

    /// Minimum of the gating sequences, or the cursor when there are none
    fn minimum_gating_sequence(&self) -> i64 {
        let sequences = self.gating_sequences().read();
        minimum_sequence(&sequences, self.cursor().get())
    }

    /// Whether `required` more slots can be claimed without waiting
    fn has_available_capacity(&self, required: i64) -> bool {
        self.remaining_capacity() >= required
    }

    /// Number of slots that can be claimed without waiting
    fn remaining_capacity(&self) -> i64 {
        let produced = self.cursor().get();
        let consumed = self.minimum_gating_sequence();
        self.buffer_size() as i64 - (produced - consumed)
    }
}

fn check_claim_size(n: i64, buffer_size: usize) -> Result<()> {
    if n < 1 || n > buffer_size as i64 {
        return Err(DisruptorError::InvalidClaimSize {
            requested: n,
            buffer_size,
        });
    }
    Ok(())
}

/// Single producer sequencer
///
/// Only one thread may claim from this sequencer. The claim state lives in
/// relaxed atomics purely so the type is `Sync`; no read-modify-write is ever
/// performed on the cursor.
#[derive(Debug)]
pub struct SingleProducerSequencer {
    buffer_size: usize,
    wait_strategy: Arc<dyn WaitStrategy>,
    cursor: Arc<Sequence>,
    gating_sequences: RwLock<Vec<Arc<Sequence>>>,
    next_value: CachePadded<AtomicI64>,
    cached_value: CachePadded<AtomicI64>,
}

impl SingleProducerSequencer {
    /// Create a new single producer sequencer
    ///
    /// # Errors
    /// `DisruptorError::InvalidBufferSize` if `buffer_size` is not a power of 2
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Result<Self> {
        if !is_power_of_two(buffer_size) {
            return Err(DisruptorError::InvalidBufferSize(buffer_size));
        }

        Ok(Self {
            buffer_size,
            wait_strategy,
            cursor: Arc::new(Sequence::default()),
            gating_sequences: RwLock::new(Vec::new()),
            next_value: CachePadded::new(AtomicI64::new(INITIAL_CURSOR_VALUE)),
            cached_value: CachePadded::new(AtomicI64::new(INITIAL_CURSOR_VALUE)),
        })
    }

    /// Whether the claim ending at `next_sequence` fits, refreshing the gating cache
    fn has_room(&self, next_value: i64, next_sequence: i64) -> bool {
        let wrap_point = next_sequence - self.buffer_size as i64;
        let cached = self.cached_value.load(Ordering::Relaxed);

        if wrap_point > cached || cached > next_value {
            // Order the cursor publication against the gating reads below.
            fence(Ordering::SeqCst);
            let min_sequence = {
                let sequences = self.gating_sequences.read();
                minimum_sequence(&sequences, next_value)
            };
            self.cached_value.store(min_sequence, Ordering::Relaxed);
            return wrap_point <= min_sequence;
        }

        true
    }
}

impl Sequencer for SingleProducerSequencer {
    fn cursor(&self) -> &Arc<Sequence> {
        &self.cursor
    }

    fn wait_strategy(&self) -> &Arc<dyn WaitStrategy> {
        &self.wait_strategy
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn next_n(&self, n: i64) -> Result<i64> {
        check_claim_size(n, self.buffer_size)?;

        let next_value = self.next_value.load(Ordering::Relaxed);
        let next_sequence = next_value + n;

        let backoff = Backoff::new();
        while !self.has_room(next_value, next_sequence) {
            backoff.snooze();
        }

        self.next_value.store(next_sequence, Ordering::Relaxed);
        Ok(next_sequence)
    }

    fn try_next_n(&self, n: i64) -> Result<i64> {
        check_claim_size(n, self.buffer_size)?;

        let next_value = self.next_value.load(Ordering::Relaxed);
        let next_sequence = next_value + n;

        if !self.has_room(next_value, next_sequence) {
            return Err(DisruptorError::InsufficientCapacity);
        }

        self.next_value.store(next_sequence, Ordering::Relaxed);
        Ok(next_sequence)
    }

    fn publish(&self, sequence: i64) {
        self.cursor.set(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn publish_range(&self, _low: i64, high: i64) {
        self.publish(high);
    }

    fn is_available(&self, sequence: i64) -> bool {
        let current = self.cursor.get();
        sequence <= current && sequence > current - self.buffer_size as i64
    }

    fn get_highest_published_sequence(&self, _low: i64, available: i64) -> i64 {
        available
    }

    fn gating_sequences(&self) -> &RwLock<Vec<Arc<Sequence>>> {
        &self.gating_sequences
    }

    fn remaining_capacity(&self) -> i64 {
        let produced = self.next_value.load(Ordering::Relaxed);
        let consumed = {
            let sequences = self.gating_sequences.read();
            minimum_sequence(&sequences, produced)
        };
        self.buffer_size as i64 - (produced - consumed)
    }
}

/// Multi producer sequencer
///
/// Producers race for sequences with a CAS on the cursor. Each slot has an
/// availability flag holding the lap number (`sequence >> log2(buffer_size)`)
/// of the last sequence published into it, so consumers can tell which
/// claimed sequences have actually been written.
#[derive(Debug)]
pub struct MultiProducerSequencer {
    buffer_size: usize,
    wait_strategy: Arc<dyn WaitStrategy>,
    cursor: Arc<Sequence>,
    gating_sequences: RwLock<Vec<Arc<Sequence>>>,
    gating_sequence_cache: Sequence,
    available_buffer: Box<[AtomicI32]>,
    index_mask: i64,
    index_shift: u32,
}

impl MultiProducerSequencer {
    /// Create a new multi producer sequencer
    ///
    /// # Errors
    /// `DisruptorError::InvalidBufferSize` if `buffer_size` is not a power of 2
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Result<Self> {
        if !is_power_of_two(buffer_size) {
            return Err(DisruptorError::InvalidBufferSize(buffer_size));
        }

        let available_buffer = (0..buffer_size).map(|_| AtomicI32::new(-1)).collect();

        Ok(Self {
            buffer_size,
            wait_strategy,
            cursor: Arc::new(Sequence::default()),
            gating_sequences: RwLock::new(Vec::new()),
            gating_sequence_cache: Sequence::default(),
            available_buffer,
            index_mask: (buffer_size - 1) as i64,
            index_shift: buffer_size.trailing_zeros(),
        })
    }

    #[inline]
    fn calculate_index(&self, sequence: i64) -> usize {
        (sequence & self.index_mask) as usize
    }

    #[inline]
    fn calculate_availability_flag(&self, sequence: i64) -> i32 {
        (sequence >> self.index_shift) as i32
    }

    #[inline]
    fn set_available(&self, sequence: i64) {
        let index = self.calculate_index(sequence);
        let flag = self.calculate_availability_flag(sequence);
        self.available_buffer[index].store(flag, Ordering::Release);
    }

    /// One claim attempt; `None` means the buffer is full
    fn claim(&self, n: i64) -> Option<i64> {
        loop {
            let current = self.cursor.get();
            let next = current + n;
            let wrap_point = next - self.buffer_size as i64;
            let cached = self.gating_sequence_cache.get();

            if wrap_point > cached || cached > current {
                let gating = {
                    let sequences = self.gating_sequences.read();
                    minimum_sequence(&sequences, current)
                };
                if wrap_point > gating {
                    return None;
                }
                self.gating_sequence_cache.set(gating);
            } else if self.cursor.compare_and_set(current, next) {
                return Some(next);
            }
        }
    }
}

impl Sequencer for MultiProducerSequencer {
    fn cursor(&self) -> &Arc<Sequence> {
        &self.cursor
    }

    fn wait_strategy(&self) -> &Arc<dyn WaitStrategy> {
        &self.wait_strategy
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn next_n(&self, n: i64) -> Result<i64> {
        check_claim_size(n, self.buffer_size)?;

        let backoff = Backoff::new();
        loop {
            if let Some(next) = self.claim(n) {
                return Ok(next);
            }
            backoff.snooze();
        }
    }

    fn try_next_n(&self, n: i64) -> Result<i64> {
        check_claim_size(n, self.buffer_size)?;
        self.claim(n).ok_or(DisruptorError::InsufficientCapacity)
    }

    fn publish(&self, sequence: i64) {
        self.set_available(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn publish_range(&self, low: i64, high: i64) {
        for sequence in low..=high {
            self.set_available(sequence);
        }
        self.wait_strategy.signal_all_when_blocking();
    }

    fn is_available(&self, sequence: i64) -> bool {
        let index = self.calculate_index(sequence);
        let flag = self.calculate_availability_flag(sequence);
        self.available_buffer[index].load(Ordering::Acquire) == flag
    }

    fn get_highest_published_sequence(&self, low: i64, available: i64) -> i64 {
        for sequence in low..=available {
            if !self.is_available(sequence) {
                return sequence - 1;
            }
        }
        available
    }

    fn gating_sequences(&self) -> &RwLock<Vec<Arc<Sequence>>> {
        &self.gating_sequences
    }
}
