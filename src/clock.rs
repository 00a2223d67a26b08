//! Clock abstractions used by the limiter and its maintenance loops.
//!
//! Enables fast, deterministic tests without real time delays: production code
//! uses [`SystemClock`], tests inject a [`MockClock`] and move time forward with
//! [`MockClock::advance_by`].

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

/// Clock abstraction so timing can be faked in tests.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time.
    fn now(&self) -> Instant;

    /// Create a ticker firing every `period`, first tick one period from now.
    ///
    /// Dropping the returned ticker stops it.
    fn ticker(&self, period: Duration) -> Box<dyn Ticker>;
}

/// Periodic source of tick timestamps.
#[async_trait]
pub trait Ticker: Send + std::fmt::Debug {
    /// Wait for the next tick and return the time it was due.
    ///
    /// Cancel-safe: dropping the future before it completes loses no tick.
    async fn tick(&mut self) -> Instant;
}

/// Wall-clock time backed by `Instant::now()` and tokio timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    /// # Panics
    ///
    /// Panics if `period` is zero or if called outside a tokio runtime.
    fn ticker(&self, period: Duration) -> Box<dyn Ticker> {
        assert!(period > Duration::ZERO, "ticker period must be non-zero");
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Box::new(IntervalTicker { interval })
    }
}

#[derive(Debug)]
struct IntervalTicker {
    interval: tokio::time::Interval,
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> Instant {
        self.interval.tick().await.into_std()
    }
}

/// Manually driven clock for tests.
///
/// Time stands still until [`advance_by`](MockClock::advance_by) is awaited. Clones
/// share the same timeline and tickers.
#[derive(Debug, Clone)]
pub struct MockClock {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Debug)]
struct MockState {
    now: Instant,
    tickers: Vec<Arc<MockTickerShared>>,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    /// Create a mock clock frozen at the current instant.
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(MockState { now: Instant::now(), tickers: Vec::new() })) }
    }

    /// Move time forward by `duration`, firing due tickers along the way.
    ///
    /// Tickers fire in due-time order (ties in creation order). `now()` reads the due
    /// time of the tick being delivered, and each tick must be consumed before the
    /// next one fires: the owner has asked for the following tick or dropped the
    /// ticker. A ticker whose owner never polls it therefore stalls this call.
    pub async fn advance_by(&self, duration: Duration) {
        let target = self.now() + duration;
        while let Some((ticker, due)) = self.next_due(target) {
            ticker.fire(due);
            ticker.consumed().await;
        }
        let mut state = self.lock();
        if state.now < target {
            state.now = target;
        }
    }

    /// Number of tickers that have not been dropped.
    pub fn ticker_count(&self) -> usize {
        let mut state = self.lock();
        state.tickers.retain(|t| !t.lock().closed);
        state.tickers.len()
    }

    fn next_due(&self, target: Instant) -> Option<(Arc<MockTickerShared>, Instant)> {
        let mut state = self.lock();
        state.tickers.retain(|t| !t.lock().closed);
        let (ticker, due) = state
            .tickers
            .iter()
            .map(|t| (t, t.lock().next_due))
            .filter(|(_, due)| *due <= target)
            .min_by_key(|(_, due)| *due)?;
        let ticker = Arc::clone(ticker);
        state.now = due;
        Some((ticker, due))
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.lock().now
    }

    /// # Panics
    ///
    /// Panics if `period` is zero.
    fn ticker(&self, period: Duration) -> Box<dyn Ticker> {
        assert!(period > Duration::ZERO, "ticker period must be non-zero");
        let mut state = self.lock();
        let shared = Arc::new(MockTickerShared {
            period,
            state: Mutex::new(TickState {
                next_due: state.now + period,
                pending: VecDeque::new(),
                parked: false,
                closed: false,
            }),
            fired: Notify::new(),
            idle: Notify::new(),
        });
        state.tickers.push(Arc::clone(&shared));
        Box::new(MockTicker { shared })
    }
}

#[derive(Debug)]
struct MockTickerShared {
    period: Duration,
    state: Mutex<TickState>,
    fired: Notify,
    idle: Notify,
}

#[derive(Debug)]
struct TickState {
    next_due: Instant,
    pending: VecDeque<Instant>,
    // owner is waiting inside `tick()` with nothing queued
    parked: bool,
    closed: bool,
}

impl MockTickerShared {
    fn lock(&self) -> MutexGuard<'_, TickState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(&self, due: Instant) {
        {
            let mut state = self.lock();
            state.pending.push_back(due);
            state.next_due = due + self.period;
        }
        self.fired.notify_one();
    }

    async fn consumed(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            {
                let state = self.lock();
                if state.closed || (state.parked && state.pending.is_empty()) {
                    return;
                }
            }
            idle.await;
        }
    }
}

#[derive(Debug)]
struct MockTicker {
    shared: Arc<MockTickerShared>,
}

#[async_trait]
impl Ticker for MockTicker {
    async fn tick(&mut self) -> Instant {
        loop {
            let fired = self.shared.fired.notified();
            {
                let mut state = self.shared.lock();
                if let Some(due) = state.pending.pop_front() {
                    state.parked = false;
                    return due;
                }
                state.parked = true;
            }
            self.shared.idle.notify_waiters();
            fired.await;
        }
    }
}

impl Drop for MockTicker {
    fn drop(&mut self) {
        self.shared.lock().closed = true;
        self.shared.idle.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spawn_recorder(
        mut ticker: Box<dyn Ticker>,
        label: &'static str,
        log: Arc<Mutex<Vec<(&'static str, Instant)>>>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let at = ticker.tick().await;
                log.lock().unwrap().push((label, at));
            }
        })
    }

    #[tokio::test]
    async fn mock_clock_only_moves_when_advanced() {
        let clock = MockClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance_by(Duration::from_secs(3)).await;
        assert_eq!(clock.now(), start + Duration::from_secs(3));
    }

    #[tokio::test]
    async fn advance_fires_tickers_in_due_order() {
        let clock = MockClock::new();
        let start = clock.now();
        let log = Arc::new(Mutex::new(Vec::new()));

        let fast = spawn_recorder(clock.ticker(Duration::from_secs(2)), "fast", log.clone());
        let slow = spawn_recorder(clock.ticker(Duration::from_secs(3)), "slow", log.clone());

        clock.advance_by(Duration::from_secs(6)).await;

        let recorded: Vec<_> = log
            .lock()
            .unwrap()
            .iter()
            .map(|(label, at)| (*label, at.duration_since(start).as_secs()))
            .collect();
        assert_eq!(
            recorded,
            vec![("fast", 2), ("slow", 3), ("fast", 4), ("fast", 6), ("slow", 6)]
        );

        fast.abort();
        slow.abort();
    }

    #[tokio::test]
    async fn advance_waits_for_each_tick_to_be_handled() {
        let clock = MockClock::new();
        let handled = Arc::new(AtomicUsize::new(0));
        let mut ticker = clock.ticker(Duration::from_secs(1));
        let counter = handled.clone();
        let task = tokio::spawn(async move {
            loop {
                ticker.tick().await;
                // yield mid-handling so completion is not trivially synchronous
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        clock.advance_by(Duration::from_secs(5)).await;
        assert_eq!(handled.load(Ordering::SeqCst), 5);

        clock.advance_by(Duration::from_millis(999)).await;
        assert_eq!(handled.load(Ordering::SeqCst), 5);

        clock.advance_by(Duration::from_millis(1)).await;
        assert_eq!(handled.load(Ordering::SeqCst), 6);

        task.abort();
    }

    #[tokio::test]
    async fn now_reports_due_time_while_tick_is_handled() {
        let clock = MockClock::new();
        let start = clock.now();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut ticker = clock.ticker(Duration::from_secs(10));
        let observer = clock.clone();
        let sink = seen.clone();
        let task = tokio::spawn(async move {
            loop {
                let due = ticker.tick().await;
                sink.lock().unwrap().push((due, observer.now()));
            }
        });

        clock.advance_by(Duration::from_secs(25)).await;

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        for (due, now) in &seen {
            assert_eq!(due, now);
        }
        assert_eq!(seen[1].0, start + Duration::from_secs(20));
        assert_eq!(clock.now(), start + Duration::from_secs(25));

        task.abort();
    }

    #[tokio::test]
    async fn dropped_ticker_is_released_and_never_blocks() {
        let clock = MockClock::new();
        let ticker = clock.ticker(Duration::from_secs(1));
        assert_eq!(clock.ticker_count(), 1);

        drop(ticker);
        assert_eq!(clock.ticker_count(), 0);

        clock.advance_by(Duration::from_secs(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn system_ticker_first_fires_after_one_period() {
        let mut ticker = SystemClock.ticker(Duration::from_secs(1));
        let start = tokio::time::Instant::now();

        ticker.tick().await;
        let first = start.elapsed();
        assert!(first >= Duration::from_secs(1) && first < Duration::from_millis(1_010));

        ticker.tick().await;
        let second = start.elapsed();
        assert!(second >= Duration::from_secs(2) && second < Duration::from_millis(2_010));
    }

    #[test]
    #[should_panic(expected = "ticker period must be non-zero")]
    fn zero_period_is_rejected() {
        let _ = MockClock::new().ticker(Duration::ZERO);
    }
}
