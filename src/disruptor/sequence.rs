//! Sequence implementation for the Disruptor
//!
//! The Sequence is used to track progress through the ring buffer and coordinate
//! between producers and consumers. Each sequence sits on its own cache line so
//! the producer cursor and the consumer sequences never false-share.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A cache-line padded sequence counter
///
/// Reads use `Acquire` and writes use `Release`, so every write a producer made
/// to a slot before publishing its sequence is visible to a consumer that
/// observes that sequence.
pub struct Sequence {
    value: CachePadded<AtomicI64>,
}

impl Sequence {
    /// Create a new sequence with the given initial value
    pub fn new(initial_value: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial_value)),
        }
    }

    /// Get the current sequence value
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Set the sequence value
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Set the sequence value with a full fence, ordering it against later loads
    #[inline]
    pub fn set_volatile(&self, value: i64) {
        self.value.store(value, Ordering::SeqCst);
    }

    /// Atomically set the value to `new` if it currently equals `expected`
    #[inline]
    pub fn compare_and_set(&self, expected: i64, new: i64) -> bool {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Increment and get the new value
    #[inline]
    pub fn increment_and_get(&self) -> i64 {
        self.add_and_get(1)
    }

    /// Add a value and get the new result
    #[inline]
    pub fn add_and_get(&self, increment: i64) -> i64 {
        self.value.fetch_add(increment, Ordering::AcqRel) + increment
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(crate::disruptor::INITIAL_CURSOR_VALUE)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("value", &self.get())
            .finish()
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Get the minimum value of a set of sequences
///
/// Returns `minimum` when `sequences` is empty, otherwise the smaller of
/// `minimum` and the lowest sequence.
#[inline]
pub fn minimum_sequence(sequences: &[Arc<Sequence>], minimum: i64) -> i64 {
    sequences
        .iter()
        .map(|sequence| sequence.get())
        .fold(minimum, i64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sequence_creation() {
        let seq = Sequence::new(42);
        assert_eq!(seq.get(), 42);
    }

    #[test]
    fn test_sequence_default() {
        let seq = Sequence::default();
        assert_eq!(seq.get(), crate::disruptor::INITIAL_CURSOR_VALUE);
    }

    #[test]
    fn test_sequence_set_get() {
        let seq = Sequence::new(0);
        seq.set(100);
        assert_eq!(seq.get(), 100);
        seq.set_volatile(101);
        assert_eq!(seq.get(), 101);
    }

    #[test]
    fn test_sequence_increment() {
        let seq = Sequence::new(0);
        assert_eq!(seq.increment_and_get(), 1);
        assert_eq!(seq.add_and_get(5), 6);
        assert_eq!(seq.get(), 6);
    }

    #[test]
    fn test_sequence_compare_and_set() {
        let seq = Sequence::new(10);

        assert!(seq.compare_and_set(10, 20));
        assert_eq!(seq.get(), 20);

        assert!(!seq.compare_and_set(10, 30));
        assert_eq!(seq.get(), 20);
    }

    #[test]
    fn test_sequence_is_cache_line_padded() {
        assert!(std::mem::size_of::<Sequence>() >= 64);
        assert!(std::mem::align_of::<Sequence>() >= 64);
    }

    #[test]
    fn test_minimum_sequence() {
        let sequences = vec![
            Arc::new(Sequence::new(10)),
            Arc::new(Sequence::new(5)),
            Arc::new(Sequence::new(20)),
        ];

        assert_eq!(minimum_sequence(&sequences, i64::MAX), 5);
        assert_eq!(minimum_sequence(&sequences, 3), 3);
        assert_eq!(minimum_sequence(&[], 7), 7);
    }

    #[test]
    fn test_sequence_thread_safety() {
        let seq = Arc::new(Sequence::new(0));
        let mut handles = vec![];

        for _ in 0..10 {
            let seq_clone = Arc::clone(&seq);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    seq_clone.increment_and_get();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(seq.get(), 10000);
    }
}
