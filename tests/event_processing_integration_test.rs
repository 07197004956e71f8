//! Integration tests for handler dependency graphs and wait strategies

use parking_lot::Mutex;
use ringway::config::WaitStrategyConfig;
use ringway::disruptor::*;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// An event annotated in place by upstream stages
#[derive(Debug, Default)]
struct TradeEvent {
    price: i64,
    doubled: AtomicI64,
    negated: AtomicI64,
}

fn set_price(event: &mut TradeEvent, _sequence: i64, price: i64) {
    event.price = price;
    event.doubled.store(0, Ordering::Relaxed);
    event.negated.store(0, Ordering::Relaxed);
}

struct Doubler;

impl EventHandler<TradeEvent> for Doubler {
    fn on_event(&mut self, event: &TradeEvent, _sequence: i64, _end_of_batch: bool) -> ringway::Result<()> {
        event.doubled.store(event.price * 2, Ordering::Relaxed);
        Ok(())
    }
}

struct Negator;

impl EventHandler<TradeEvent> for Negator {
    fn on_event(&mut self, event: &TradeEvent, _sequence: i64, _end_of_batch: bool) -> ringway::Result<()> {
        event.negated.store(-event.price, Ordering::Relaxed);
        Ok(())
    }
}

/// Final stage: records what the upstream stages wrote
struct Journal {
    entries: Arc<Mutex<Vec<(i64, i64, i64)>>>,
    started: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
}

impl EventHandler<TradeEvent> for Journal {
    fn on_event(&mut self, event: &TradeEvent, _sequence: i64, _end_of_batch: bool) -> ringway::Result<()> {
        self.entries.lock().push((
            event.price,
            event.doubled.load(Ordering::Relaxed),
            event.negated.load(Ordering::Relaxed),
        ));
        Ok(())
    }

    fn on_start(&mut self) -> ringway::Result<()> {
        self.started.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_shutdown(&mut self) -> ringway::Result<()> {
        self.stopped.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

struct JournalRecorder {
    entries: Arc<Mutex<Vec<(i64, i64, i64)>>>,
    started: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
}

impl JournalRecorder {
    fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            started: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn handler(&self) -> Journal {
        Journal {
            entries: Arc::clone(&self.entries),
            started: Arc::clone(&self.started),
            stopped: Arc::clone(&self.stopped),
        }
    }
}

fn trade_disruptor(wait_strategy: Arc<dyn WaitStrategy>, producer_type: ProducerType) -> Disruptor<TradeEvent> {
    Disruptor::new(DefaultEventFactory::new(), 16, producer_type, wait_strategy).unwrap()
}

#[test]
fn test_downstream_stage_sees_upstream_annotation() {
    let recorder = JournalRecorder::new();
    let mut disruptor = trade_disruptor(Arc::new(BlockingWaitStrategy::new()), ProducerType::Single);

    let doubled = disruptor.handle_events_with(Doubler).unwrap();
    disruptor.handle_events_after(&doubled, recorder.handler()).unwrap();
    disruptor.start().unwrap();

    let mut producer = disruptor.producer().unwrap();
    for price in 1..=100 {
        producer.publish_event_one_arg(&set_price, price).unwrap();
    }
    disruptor.shutdown().unwrap();

    let entries = recorder.entries.lock();
    assert_eq!(entries.len(), 100);
    for (index, (price, doubled, _)) in entries.iter().enumerate() {
        assert_eq!(*price, index as i64 + 1);
        assert_eq!(*doubled, price * 2);
    }
    assert_eq!(recorder.started.load(Ordering::Relaxed), 1);
    assert_eq!(recorder.stopped.load(Ordering::Relaxed), 1);
}

#[test]
fn test_diamond_join_waits_for_both_branches() {
    let recorder = JournalRecorder::new();
    let mut disruptor = trade_disruptor(Arc::new(LiteBlockingWaitStrategy::new()), ProducerType::Multi);

    let left = disruptor.handle_events_with(Doubler).unwrap();
    let right = disruptor.handle_events_with(Negator).unwrap();
    disruptor.handle_events_after(&left.and(right), recorder.handler()).unwrap();
    disruptor.start().unwrap();

    let mut producer = disruptor.producer().unwrap();
    for price in 1..=200 {
        producer.publish_event_one_arg(&set_price, price).unwrap();
    }
    disruptor.shutdown().unwrap();

    let entries = recorder.entries.lock();
    assert_eq!(entries.len(), 200);
    assert!(entries
        .iter()
        .all(|(price, doubled, negated)| *doubled == price * 2 && *negated == -price));
}

#[test]
fn test_every_wait_strategy_delivers_everything() {
    for name in WaitStrategyConfig::NAMES {
        let wait_strategy = WaitStrategyConfig::from_str(name).unwrap().build();
        let recorder = JournalRecorder::new();
        let mut disruptor = trade_disruptor(wait_strategy, ProducerType::Single);

        let doubled = disruptor.handle_events_with(Doubler).unwrap();
        disruptor.handle_events_after(&doubled, recorder.handler()).unwrap();
        disruptor.start().unwrap();

        let mut producer = disruptor.producer().unwrap();
        let prices: Vec<i64> = (1..=300).collect();
        for chunk in prices.chunks(10) {
            producer.publish_events_one_arg(&set_price, chunk.iter().copied()).unwrap();
        }
        disruptor.shutdown_with_timeout(Duration::from_secs(10)).unwrap();

        let entries = recorder.entries.lock();
        assert_eq!(entries.len(), 300, "{name}");
        let total: i64 = entries.iter().map(|(_, doubled, _)| doubled).sum();
        assert_eq!(total, 2 * (1..=300).sum::<i64>(), "{name}");
    }
}

#[test]
fn test_timeout_strategy_reports_idle_periods() {
    struct IdleCounter(Arc<AtomicUsize>);

    impl EventHandler<TradeEvent> for IdleCounter {
        fn on_event(&mut self, _event: &TradeEvent, _sequence: i64, _end_of_batch: bool) -> ringway::Result<()> {
            Ok(())
        }

        fn on_timeout(&mut self, _sequence: i64) -> ringway::Result<()> {
            self.0.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    let timeouts = Arc::new(AtomicUsize::new(0));
    let mut disruptor = trade_disruptor(
        Arc::new(TimeoutBlockingWaitStrategy::new(Duration::from_millis(2))),
        ProducerType::Single,
    );
    disruptor.handle_events_with(IdleCounter(Arc::clone(&timeouts))).unwrap();
    disruptor.start().unwrap();

    std::thread::sleep(Duration::from_millis(50));
    disruptor.shutdown().unwrap();

    assert!(timeouts.load(Ordering::Relaxed) > 0);
}

#[test]
fn test_phased_backoff_falls_back_to_blocking() {
    let recorder = JournalRecorder::new();
    let mut disruptor = trade_disruptor(
        Arc::new(PhasedBackoffWaitStrategy::with_lock(
            Duration::from_micros(10),
            Duration::from_micros(10),
        )),
        ProducerType::Single,
    );
    disruptor.handle_events_with(recorder.handler()).unwrap();
    disruptor.start().unwrap();

    let mut producer = disruptor.producer().unwrap();
    // Let the consumer reach the blocking phase before every publish
    for price in 1..=5 {
        std::thread::sleep(Duration::from_millis(5));
        producer.publish_event_one_arg(&set_price, price).unwrap();
    }
    disruptor.shutdown().unwrap();

    let prices: Vec<i64> = recorder.entries.lock().iter().map(|(price, _, _)| *price).collect();
    assert_eq!(prices, vec![1, 2, 3, 4, 5]);
}
