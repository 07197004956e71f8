//! Sequence Barrier Implementation
//!
//! A sequence barrier tells a consumer the highest sequence it may safely read:
//! the producer cursor narrowed to what has actually been published, and never
//! beyond the consumers it depends on.

use crate::disruptor::{DisruptorError, Result, Sequence, Sequencer, WaitStrategy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Coordination barrier for managing dependencies between event processors
pub trait SequenceBarrier: Send + Sync {
    /// Wait for the given sequence to become available
    ///
    /// # Returns
    /// The highest available sequence. It may be greater than `sequence`
    /// (a batch is ready) or, with multiple producers, lower than it when a
    /// claimed sequence has not been published yet.
    ///
    /// # Errors
    /// `DisruptorError::Alert` if the barrier is alerted, or whatever the wait
    /// strategy reports (e.g. `DisruptorError::Timeout`)
    fn wait_for(&self, sequence: i64) -> Result<i64>;

    /// Current value of the producer cursor
    fn cursor(&self) -> i64;

    /// Check if this barrier has been alerted
    fn is_alerted(&self) -> bool;

    /// Alert this barrier and wake any thread waiting on it
    fn alert(&self);

    /// Clear the alert status
    fn clear_alert(&self);

    /// Fail with `DisruptorError::Alert` if the barrier has been alerted
    fn check_alert(&self) -> Result<()> {
        if self.is_alerted() {
            Err(DisruptorError::Alert)
        } else {
            Ok(())
        }
    }
}

/// Standard sequence barrier backed by a sequencer
#[derive(Debug)]
pub struct ProcessingSequenceBarrier {
    sequencer: Arc<dyn Sequencer>,
    wait_strategy: Arc<dyn WaitStrategy>,
    cursor: Arc<Sequence>,
    dependent_sequences: Vec<Arc<Sequence>>,
    alerted: AtomicBool,
}

impl ProcessingSequenceBarrier {
    /// Create a new processing sequence barrier
    ///
    /// # Arguments
    /// * `sequencer` - The sequencer whose cursor and publication state gate reads
    /// * `dependent_sequences` - Upstream consumers this barrier must not overtake
    pub fn new(sequencer: Arc<dyn Sequencer>, dependent_sequences: Vec<Arc<Sequence>>) -> Self {
        Self {
            wait_strategy: Arc::clone(sequencer.wait_strategy()),
            cursor: Arc::clone(sequencer.cursor()),
            sequencer,
            dependent_sequences,
            alerted: AtomicBool::new(false),
        }
    }

    /// The upstream sequences tracked by this barrier
    pub fn dependent_sequences(&self) -> &[Arc<Sequence>] {
        &self.dependent_sequences
    }
}

impl SequenceBarrier for ProcessingSequenceBarrier {
    fn wait_for(&self, sequence: i64) -> Result<i64> {
        self.check_alert()?;

        let available_sequence = self.wait_strategy.wait_for(
            sequence,
            &self.cursor,
            &self.dependent_sequences,
            self,
        )?;

        if available_sequence < sequence {
            return Ok(available_sequence);
        }

        Ok(self
            .sequencer
            .get_highest_published_sequence(sequence, available_sequence))
    }

    fn cursor(&self) -> i64 {
        self.cursor.get()
    }

    fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    fn alert(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::{
        BlockingWaitStrategy, MultiProducerSequencer, SingleProducerSequencer,
        YieldingWaitStrategy,
    };
    use std::thread;
    use std::time::Duration;

    fn single_sequencer(size: usize) -> Arc<dyn Sequencer> {
        Arc::new(SingleProducerSequencer::new(size, Arc::new(BlockingWaitStrategy::new())).unwrap())
    }

    #[test]
    fn test_wait_for_returns_highest_available() {
        let sequencer = single_sequencer(16);
        let high = sequencer.next_n(5).unwrap();
        sequencer.publish(high);

        let barrier = ProcessingSequenceBarrier::new(Arc::clone(&sequencer), vec![]);
        assert_eq!(barrier.wait_for(0).unwrap(), 4);
        assert_eq!(barrier.cursor(), 4);
    }

    #[test]
    fn test_wait_for_respects_dependents() {
        let sequencer = single_sequencer(16);
        let high = sequencer.next_n(8).unwrap();
        sequencer.publish(high);

        let upstream = Arc::new(Sequence::new(2));
        let barrier = ProcessingSequenceBarrier::new(Arc::clone(&sequencer), vec![Arc::clone(&upstream)]);

        assert_eq!(barrier.wait_for(1).unwrap(), 2);
        assert_eq!(barrier.dependent_sequences().len(), 1);
    }

    #[test]
    fn test_wait_for_blocks_until_dependent_advances() {
        let sequencer: Arc<dyn Sequencer> = Arc::new(
            SingleProducerSequencer::new(16, Arc::new(YieldingWaitStrategy::new())).unwrap(),
        );
        let high = sequencer.next_n(4).unwrap();
        sequencer.publish(high);

        let upstream = Arc::new(Sequence::new(0));
        let barrier = Arc::new(ProcessingSequenceBarrier::new(
            Arc::clone(&sequencer),
            vec![Arc::clone(&upstream)],
        ));

        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait_for(3))
        };

        thread::sleep(Duration::from_millis(10));
        upstream.set(3);

        assert_eq!(waiter.join().unwrap().unwrap(), 3);
    }

    #[test]
    fn test_alert_unblocks_waiting_consumer() {
        let sequencer = single_sequencer(8);
        let barrier = Arc::new(ProcessingSequenceBarrier::new(sequencer, vec![]));

        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait_for(0))
        };

        thread::sleep(Duration::from_millis(20));
        barrier.alert();

        assert!(matches!(waiter.join().unwrap(), Err(DisruptorError::Alert)));
        assert!(barrier.is_alerted());

        barrier.clear_alert();
        assert!(!barrier.is_alerted());
        assert!(barrier.check_alert().is_ok());
    }

    #[test]
    fn test_alerted_barrier_fails_fast() {
        let sequencer = single_sequencer(8);
        let barrier = ProcessingSequenceBarrier::new(sequencer, vec![]);
        barrier.alert();

        assert!(matches!(barrier.wait_for(0), Err(DisruptorError::Alert)));
    }

    #[test]
    fn test_multi_producer_barrier_stops_at_unpublished_gap() {
        let sequencer: Arc<dyn Sequencer> = Arc::new(
            MultiProducerSequencer::new(8, Arc::new(BlockingWaitStrategy::new())).unwrap(),
        );
        let high = sequencer.next_n(3).unwrap();
        assert_eq!(high, 2);
        sequencer.publish(0);
        sequencer.publish(2);

        let barrier = ProcessingSequenceBarrier::new(Arc::clone(&sequencer), vec![]);
        assert_eq!(barrier.wait_for(0).unwrap(), 0);
        // Sequence 1 is claimed but unpublished
        assert_eq!(barrier.wait_for(1).unwrap(), 0);

        sequencer.publish(1);
        assert_eq!(barrier.wait_for(1).unwrap(), 2);
    }
}
