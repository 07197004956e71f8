//! Wait Strategy Implementation
//!
//! Wait strategies decide how a consumer waits for a sequence to become
//! available. They trade latency against CPU consumption:
//!
//! | Strategy      | Latency          | CPU                       |
//! |---------------|------------------|---------------------------|
//! | BusySpin      | lowest           | one full core per waiter  |
//! | Yielding      | low, uniform     | high                      |
//! | PhasedBackoff | low, then bounded| bounded by fallback       |
//! | Sleeping      | variable         | low                       |
//! | LiteBlocking  | high             | lowest, cheaper publish   |
//! | Blocking      | high, consistent | lowest                    |
//! | TimeoutBlocking | high           | lowest, periodic wakeups  |
//!
//! Every strategy re-checks its condition after each wakeup and polls the
//! barrier's alert flag, so a halted consumer never stays parked.

use crate::disruptor::{minimum_sequence, DisruptorError, Result, Sequence, SequenceBarrier};
use crossbeam_utils::Backoff;
use parking_lot::{Condvar, Mutex};
use std::hint;
use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Strategy for waiting for events to become available
pub trait WaitStrategy: Send + Sync + std::fmt::Debug {
    /// Wait for the given sequence to become available
    ///
    /// # Arguments
    /// * `sequence` - The sequence to wait for
    /// * `cursor` - The producer cursor
    /// * `dependents` - Upstream consumer sequences; empty means the cursor itself
    /// * `barrier` - The barrier whose alert flag interrupts the wait
    ///
    /// # Returns
    /// The highest available sequence, which may be greater than `sequence`
    ///
    /// # Errors
    /// `DisruptorError::Alert` if the barrier is alerted while waiting,
    /// `DisruptorError::Timeout` for strategies with a bounded wait
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64>;

    /// Wake every thread blocked in `wait_for`
    ///
    /// Called by producers after publishing and by barriers when alerted.
    fn signal_all_when_blocking(&self);
}

#[inline]
fn dependent_sequence(cursor: &Sequence, dependents: &[Arc<Sequence>]) -> i64 {
    if dependents.is_empty() {
        cursor.get()
    } else {
        minimum_sequence(dependents, i64::MAX)
    }
}

/// Upper bound on one park while a blocking waiter trails an upstream stage
const DEPENDENT_PARK: Duration = Duration::from_micros(100);

/// Wait for the dependent sequences once the cursor has passed `sequence`
///
/// Upstream stages do not signal the wait strategy when they advance, so the
/// blocking family backs off and then parks in short slices instead of
/// spinning for the whole time an upstream handler runs.
fn wait_for_dependents(
    sequence: i64,
    cursor: &Sequence,
    dependents: &[Arc<Sequence>],
    barrier: &dyn SequenceBarrier,
) -> Result<i64> {
    let backoff = Backoff::new();
    loop {
        let available = dependent_sequence(cursor, dependents);
        if available >= sequence {
            return Ok(available);
        }
        barrier.check_alert()?;

        if backoff.is_completed() {
            thread::park_timeout(DEPENDENT_PARK);
        } else {
            backoff.snooze();
        }
    }
}

/// Blocking wait strategy using a lock and a condition variable
///
/// The cursor check and the wait registration happen under the same lock
/// that producers take before notifying, so a publish can never slip in
/// between a consumer's check and its wait.
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    /// Create a new blocking wait strategy
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64> {
        if cursor.get() < sequence {
            let mut guard = self.mutex.lock();
            while cursor.get() < sequence {
                barrier.check_alert()?;
                self.condvar.wait(&mut guard);
            }
        }

        wait_for_dependents(sequence, cursor, dependents, barrier)
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}

/// Blocking wait strategy whose wait is bounded by a timeout
///
/// When the timeout expires the wait returns `DisruptorError::Timeout`; the
/// event processor treats that as a liveness tick and waits again.
#[derive(Debug)]
pub struct TimeoutBlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
    timeout: Duration,
}

impl TimeoutBlockingWaitStrategy {
    /// Create a new timeout blocking wait strategy
    pub fn new(timeout: Duration) -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
            timeout,
        }
    }

    /// The configured maximum wait
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl WaitStrategy for TimeoutBlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64> {
        if cursor.get() < sequence {
            let deadline = Instant::now() + self.timeout;
            let mut guard = self.mutex.lock();
            while cursor.get() < sequence {
                barrier.check_alert()?;
                if self.condvar.wait_until(&mut guard, deadline).timed_out()
                    && cursor.get() < sequence
                {
                    return Err(DisruptorError::Timeout);
                }
            }
        }

        wait_for_dependents(sequence, cursor, dependents, barrier)
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}

/// Blocking wait strategy that skips the lock when nobody is waiting
///
/// Waiters raise `signal_needed` before re-checking the cursor; producers only
/// lock and notify when they observe the flag. The SeqCst fences on both sides
/// guarantee that either the waiter sees the new cursor or the producer sees
/// the flag.
#[derive(Debug, Default)]
pub struct LiteBlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
    signal_needed: AtomicBool,
}

impl LiteBlockingWaitStrategy {
    /// Create a new lite blocking wait strategy
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for LiteBlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64> {
        if cursor.get() < sequence {
            let mut guard = self.mutex.lock();
            loop {
                self.signal_needed.store(true, Ordering::SeqCst);
                fence(Ordering::SeqCst);

                if cursor.get() >= sequence {
                    break;
                }

                barrier.check_alert()?;
                self.condvar.wait(&mut guard);
            }
        }

        wait_for_dependents(sequence, cursor, dependents, barrier)
    }

    fn signal_all_when_blocking(&self) {
        fence(Ordering::SeqCst);
        if self.signal_needed.swap(false, Ordering::SeqCst) {
            let _guard = self.mutex.lock();
            self.condvar.notify_all();
        }
    }
}

/// Number of retries the sleeping strategy spends before it starts sleeping
const DEFAULT_SLEEP_RETRIES: u32 = 200;
/// Retries above this count spin, retries at or below it yield
const SLEEP_SPIN_THRESHOLD: u32 = 100;
const DEFAULT_SLEEP: Duration = Duration::from_nanos(1);

/// Sleeping wait strategy
///
/// Spins for the first 100 retries, yields for the next 100, then sleeps for
/// the configured minimal duration on every further iteration.
#[derive(Debug, Clone, Copy)]
pub struct SleepingWaitStrategy {
    retries: u32,
    sleep: Duration,
}

impl SleepingWaitStrategy {
    /// Create a sleeping wait strategy with 200 retries and a 1ns sleep
    pub fn new() -> Self {
        Self::with_retries_and_sleep(DEFAULT_SLEEP_RETRIES, DEFAULT_SLEEP)
    }

    /// Create a sleeping wait strategy with custom retries and sleep duration
    pub fn with_retries_and_sleep(retries: u32, sleep: Duration) -> Self {
        Self { retries, sleep }
    }

    #[inline]
    fn apply_wait_method(&self, counter: u32) -> u32 {
        if counter > SLEEP_SPIN_THRESHOLD {
            hint::spin_loop();
            counter - 1
        } else if counter > 0 {
            thread::yield_now();
            counter - 1
        } else {
            thread::sleep(self.sleep);
            counter
        }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64> {
        let mut counter = self.retries;
        loop {
            let available = dependent_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            barrier.check_alert()?;
            counter = self.apply_wait_method(counter);
        }
    }

    fn signal_all_when_blocking(&self) {}
}

const DEFAULT_YIELD_SPIN_TRIES: u32 = 100;

/// Yielding wait strategy
///
/// Spins for 100 iterations and then yields the thread on every iteration.
/// A good choice when there are fewer consumer threads than hardware threads.
#[derive(Debug, Clone, Copy)]
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl YieldingWaitStrategy {
    /// Create a new yielding wait strategy
    pub fn new() -> Self {
        Self::with_spin_tries(DEFAULT_YIELD_SPIN_TRIES)
    }

    /// Create a yielding wait strategy that spins `spin_tries` times before yielding
    pub fn with_spin_tries(spin_tries: u32) -> Self {
        Self { spin_tries }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64> {
        let mut counter = self.spin_tries;
        loop {
            let available = dependent_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            barrier.check_alert()?;
            if counter == 0 {
                thread::yield_now();
            } else {
                counter -= 1;
                hint::spin_loop();
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Busy-spin wait strategy
///
/// Never yields or parks. Lowest latency, but burns a full core per waiter.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    /// Create a new busy-spin wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64> {
        loop {
            let available = dependent_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            barrier.check_alert()?;
            hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {}
}

const PHASED_SPIN_TRIES: u32 = 10_000;

/// Phased backoff wait strategy
///
/// Spins until `spin_timeout` has elapsed, then yields until a further
/// `yield_timeout` has elapsed, then hands the rest of the wait to a fallback
/// strategy.
#[derive(Debug)]
pub struct PhasedBackoffWaitStrategy {
    spin_timeout: Duration,
    yield_timeout: Duration,
    fallback: Box<dyn WaitStrategy>,
}

impl PhasedBackoffWaitStrategy {
    /// Create a phased backoff strategy with an explicit fallback
    pub fn new(
        spin_timeout: Duration,
        yield_timeout: Duration,
        fallback: Box<dyn WaitStrategy>,
    ) -> Self {
        Self {
            spin_timeout,
            yield_timeout: spin_timeout + yield_timeout,
            fallback,
        }
    }

    /// Phased backoff falling back to [`BlockingWaitStrategy`]
    pub fn with_lock(spin_timeout: Duration, yield_timeout: Duration) -> Self {
        Self::new(spin_timeout, yield_timeout, Box::new(BlockingWaitStrategy::new()))
    }

    /// Phased backoff falling back to [`LiteBlockingWaitStrategy`]
    pub fn with_lite_lock(spin_timeout: Duration, yield_timeout: Duration) -> Self {
        Self::new(spin_timeout, yield_timeout, Box::new(LiteBlockingWaitStrategy::new()))
    }

    /// Phased backoff falling back to [`SleepingWaitStrategy`]
    pub fn with_sleep(spin_timeout: Duration, yield_timeout: Duration) -> Self {
        Self::new(spin_timeout, yield_timeout, Box::new(SleepingWaitStrategy::new()))
    }
}

impl WaitStrategy for PhasedBackoffWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64> {
        let mut start: Option<Instant> = None;
        let mut counter = PHASED_SPIN_TRIES;

        loop {
            let available = dependent_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }

            counter -= 1;
            if counter == 0 {
                barrier.check_alert()?;
                match start {
                    None => start = Some(Instant::now()),
                    Some(started) => {
                        let elapsed = started.elapsed();
                        if elapsed > self.yield_timeout {
                            return self.fallback.wait_for(sequence, cursor, dependents, barrier);
                        } else if elapsed > self.spin_timeout {
                            thread::yield_now();
                        }
                    }
                }
                counter = PHASED_SPIN_TRIES;
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        self.fallback.signal_all_when_blocking();
    }
}
