//! The metronome: a dedicated loop producing Fast, Normal, and Slow ticks.
//!
//! Each loop iteration measures the wall time since the previous one and
//! adds it to three independent accumulators, one per rate. Every
//! accumulator is clamped to `interval * MAX_CATCHUP_TICKS` before
//! firing, so however long the loop stalls, a rate never fires more than
//! [`MAX_CATCHUP_TICKS`] ticks in the recovery burst. After firing, the
//! loop sleeps for about half a Fast interval: a coarse sleep followed by
//! a short spin for precision.
//!
//! The counters and intervals live in a shared [`TickCounters`] so that
//! other subsystems can read "how many ticks have happened" and "how long
//! is a tick" without holding the metronome itself.
//!
//! A tick callback that returns an error terminates the loop. The error
//! is logged when it happens and reported by [`Metronome::stop`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tessera_types::TickRate;
use tessera_world::TickStamp;
use tracing::{debug, error, info, warn};

use crate::config::TickConfig;

/// Most ticks of one rate fired in a single loop iteration.
pub const MAX_CATCHUP_TICKS: u32 = 3;

/// Portion of the pause spent spinning instead of sleeping.
const SPIN_MARGIN: Duration = Duration::from_millis(1);

/// Errors that can occur while running the metronome.
#[derive(Debug, thiserror::Error)]
pub enum MetronomeError {
    /// The loop thread could not be spawned.
    #[error("failed to spawn metronome thread: {source}")]
    Spawn {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A tick callback failed and terminated the loop.
    #[error("tick callback failed: {message}")]
    TickFailed {
        /// The callback's error, rendered.
        message: String,
    },

    /// The loop did not exit within the stop timeout.
    #[error("metronome loop did not exit within {waited_ms}ms")]
    JoinTimeout {
        /// How long `stop` waited.
        waited_ms: u64,
    },

    /// The loop thread panicked.
    #[error("metronome loop panicked")]
    Panicked,
}

/// The three tick intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickIntervals {
    /// Fast interval.
    pub fast: Duration,
    /// Normal interval.
    pub normal: Duration,
    /// Slow interval.
    pub slow: Duration,
}

impl TickIntervals {
    /// Intervals from configuration.
    pub const fn from_config(config: &TickConfig) -> Self {
        Self {
            fast: Duration::from_millis(config.fast_interval_ms),
            normal: Duration::from_millis(config.normal_interval_ms),
            slow: Duration::from_millis(config.slow_interval_ms),
        }
    }

    /// Interval for one rate.
    pub const fn get(&self, rate: TickRate) -> Duration {
        match rate {
            TickRate::Fast => self.fast,
            TickRate::Normal => self.normal,
            TickRate::Slow => self.slow,
        }
    }
}

/// Tick counters and intervals, shared read-only with the rest of the
/// server.
#[derive(Debug)]
pub struct TickCounters {
    /// Fast ticks fired.
    fast: AtomicU64,
    /// Normal ticks fired.
    normal: AtomicU64,
    /// Slow ticks fired.
    slow: AtomicU64,
    /// Fast interval in milliseconds.
    fast_interval_ms: AtomicU64,
    /// Normal interval in milliseconds.
    normal_interval_ms: AtomicU64,
    /// Slow interval in milliseconds.
    slow_interval_ms: AtomicU64,
}

impl TickCounters {
    /// Create zeroed counters with the configured intervals.
    pub fn new(config: &TickConfig) -> Self {
        Self {
            fast: AtomicU64::new(0),
            normal: AtomicU64::new(0),
            slow: AtomicU64::new(0),
            fast_interval_ms: AtomicU64::new(config.fast_interval_ms),
            normal_interval_ms: AtomicU64::new(config.normal_interval_ms),
            slow_interval_ms: AtomicU64::new(config.slow_interval_ms),
        }
    }

    const fn counter(&self, rate: TickRate) -> &AtomicU64 {
        match rate {
            TickRate::Fast => &self.fast,
            TickRate::Normal => &self.normal,
            TickRate::Slow => &self.slow,
        }
    }

    const fn interval_cell(&self, rate: TickRate) -> &AtomicU64 {
        match rate {
            TickRate::Fast => &self.fast_interval_ms,
            TickRate::Normal => &self.normal_interval_ms,
            TickRate::Slow => &self.slow_interval_ms,
        }
    }

    /// Ticks of `rate` fired so far.
    pub fn count(&self, rate: TickRate) -> u64 {
        self.counter(rate).load(Ordering::Acquire)
    }

    /// Record one tick of `rate`, returning the new count.
    pub(crate) fn increment(&self, rate: TickRate) -> u64 {
        self.counter(rate)
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1)
    }

    /// Current interval of `rate`.
    pub fn interval(&self, rate: TickRate) -> Duration {
        Duration::from_millis(self.interval_cell(rate).load(Ordering::Acquire))
    }

    /// All three current intervals.
    pub fn intervals(&self) -> TickIntervals {
        TickIntervals {
            fast: self.interval(TickRate::Fast),
            normal: self.interval(TickRate::Normal),
            slow: self.interval(TickRate::Slow),
        }
    }

    fn set_intervals(&self, config: &TickConfig) {
        self.fast_interval_ms
            .store(config.fast_interval_ms, Ordering::Release);
        self.normal_interval_ms
            .store(config.normal_interval_ms, Ordering::Release);
        self.slow_interval_ms
            .store(config.slow_interval_ms, Ordering::Release);
    }

    /// Read all counters at this instant.
    pub fn stamp(&self) -> TickStamp {
        TickStamp {
            at: Instant::now(),
            fast: self.count(TickRate::Fast),
            normal: self.count(TickRate::Normal),
            slow: self.count(TickRate::Slow),
        }
    }
}

/// How many ticks of each rate one loop iteration fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickBurst {
    /// Fast ticks.
    pub fast: u32,
    /// Normal ticks.
    pub normal: u32,
    /// Slow ticks.
    pub slow: u32,
}

impl TickBurst {
    /// Ticks of one rate.
    pub const fn count(&self, rate: TickRate) -> u32 {
        match rate {
            TickRate::Fast => self.fast,
            TickRate::Normal => self.normal,
            TickRate::Slow => self.slow,
        }
    }

    const fn slot(&mut self, rate: TickRate) -> &mut u32 {
        match rate {
            TickRate::Fast => &mut self.fast,
            TickRate::Normal => &mut self.normal,
            TickRate::Slow => &mut self.slow,
        }
    }
}

/// The metronome's catch-up arithmetic, separated from the thread.
#[derive(Debug, Clone)]
pub struct TickAccumulator {
    /// Intervals in force.
    intervals: TickIntervals,
    /// Unfired time per rate, in firing order.
    pending: [Duration; 3],
}

impl TickAccumulator {
    /// Create an empty accumulator.
    pub const fn new(intervals: TickIntervals) -> Self {
        Self {
            intervals,
            pending: [Duration::ZERO; 3],
        }
    }

    const fn slot(rate: TickRate) -> usize {
        match rate {
            TickRate::Fast => 0,
            TickRate::Normal => 1,
            TickRate::Slow => 2,
        }
    }

    /// Unfired time for one rate.
    pub fn pending(&self, rate: TickRate) -> Duration {
        self.pending.get(Self::slot(rate)).copied().unwrap_or_default()
    }

    /// Add `elapsed` to every accumulator and return what should fire.
    pub fn advance(&mut self, elapsed: Duration) -> TickBurst {
        let mut burst = TickBurst::default();
        for rate in TickRate::ALL {
            let interval = self.intervals.get(rate);
            let Some(pending) = self.pending.get_mut(Self::slot(rate)) else {
                continue;
            };
            if interval.is_zero() {
                continue;
            }
            let ceiling = interval.saturating_mul(MAX_CATCHUP_TICKS);
            *pending = pending.saturating_add(elapsed).min(ceiling);
            let fired = burst.slot(rate);
            while *pending >= interval {
                *pending = pending.saturating_sub(interval);
                *fired = fired.saturating_add(1);
            }
        }
        burst
    }
}

/// A running loop.
#[derive(Debug)]
struct Worker {
    /// Set to ask the loop to exit.
    stop: Arc<AtomicBool>,
    /// Receives (or disconnects) when the loop exits.
    done: Receiver<()>,
    /// The loop thread.
    handle: JoinHandle<Result<(), String>>,
    /// The loop thread's id, to refuse self-joins.
    thread: ThreadId,
}

/// Dedicated tick scheduling loop.
#[derive(Debug)]
pub struct Metronome {
    /// Shared counters the loop increments.
    counters: Arc<TickCounters>,
    /// The running loop, if any.
    worker: Option<Worker>,
}

impl Metronome {
    /// Create a stopped metronome over shared counters.
    pub const fn new(counters: Arc<TickCounters>) -> Self {
        Self {
            counters,
            worker: None,
        }
    }

    /// The shared counters.
    pub const fn counters(&self) -> &Arc<TickCounters> {
        &self.counters
    }

    /// Whether the loop is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Start the loop with the configured intervals.
    ///
    /// Returns `Ok(false)` and drops `on_tick` if the loop is already
    /// running. A previous loop that terminated on its own is reaped
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`MetronomeError::Spawn`] if the thread cannot be created.
    pub fn start<F, E>(&mut self, config: &TickConfig, on_tick: F) -> Result<bool, MetronomeError>
    where
        F: FnMut(TickRate) -> Result<(), E> + Send + 'static,
        E: core::fmt::Display,
    {
        if self.is_running() {
            debug!("Metronome already running");
            return Ok(false);
        }
        if let Some(previous) = self.worker.take() {
            if let Ok(Err(message)) = previous.handle.join() {
                warn!(error = message, "Reaped metronome loop that had failed");
            }
        }

        self.counters.set_intervals(config);
        let intervals = TickIntervals::from_config(config);
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = crossbeam_channel::bounded(1);
        let counters = Arc::clone(&self.counters);
        let loop_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("tessera-metronome".to_owned())
            .spawn(move || run_loop(intervals, &counters, &loop_stop, on_tick, &done_tx))?;
        let thread = handle.thread().id();

        info!(
            fast_ms = config.fast_interval_ms,
            normal_ms = config.normal_interval_ms,
            slow_ms = config.slow_interval_ms,
            "Metronome started"
        );
        self.worker = Some(Worker {
            stop,
            done,
            handle,
            thread,
        });
        Ok(true)
    }

    /// Ask the loop to exit and wait up to `timeout` for it.
    ///
    /// No-op if not running. Called from the loop thread itself it only
    /// raises the stop flag, since a thread cannot wait for itself.
    ///
    /// # Errors
    ///
    /// Returns [`MetronomeError::TickFailed`] if the loop had terminated
    /// because a callback failed, [`MetronomeError::Panicked`] if it
    /// panicked, or [`MetronomeError::JoinTimeout`] if it did not exit in
    /// time (the thread is then detached).
    pub fn stop(&mut self, timeout: Duration) -> Result<(), MetronomeError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker.stop.store(true, Ordering::Release);

        if thread::current().id() == worker.thread {
            warn!("Metronome stop requested from its own loop; not waiting");
            return Ok(());
        }

        match worker.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                let waited_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(waited_ms, "Metronome loop did not exit in time, detaching");
                return Err(MetronomeError::JoinTimeout { waited_ms });
            }
        }

        let outcome = match worker.handle.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(MetronomeError::TickFailed { message }),
            Err(_panic) => Err(MetronomeError::Panicked),
        };
        info!(
            fast = self.counters.count(TickRate::Fast),
            normal = self.counters.count(TickRate::Normal),
            slow = self.counters.count(TickRate::Slow),
            "Metronome stopped"
        );
        outcome
    }
}

impl Drop for Metronome {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.stop.store(true, Ordering::Release);
        }
    }
}

fn run_loop<F, E>(
    intervals: TickIntervals,
    counters: &TickCounters,
    stop: &AtomicBool,
    mut on_tick: F,
    done: &Sender<()>,
) -> Result<(), String>
where
    F: FnMut(TickRate) -> Result<(), E>,
    E: core::fmt::Display,
{
    let mut accumulator = TickAccumulator::new(intervals);
    let mut last = Instant::now();
    let pause = intervals.fast.checked_div(2).unwrap_or_default();

    let result = 'ticking: loop {
        if stop.load(Ordering::Acquire) {
            break Ok(());
        }
        let now = Instant::now();
        let burst = accumulator.advance(now.saturating_duration_since(last));
        last = now;

        for rate in TickRate::ALL {
            for _ in 0..burst.count(rate) {
                let tick = counters.increment(rate);
                if let Err(err) = on_tick(rate) {
                    error!(%rate, tick, error = %err, "Tick callback failed, stopping metronome");
                    break 'ticking Err(err.to_string());
                }
            }
        }

        pace(pause);
    };

    // The receiver may already be gone if stop timed out.
    let _ = done.try_send(());
    result
}

/// Sleep coarsely for most of `pause`, then spin until it has elapsed.
fn pace(pause: Duration) {
    let Some(deadline) = Instant::now().checked_add(pause) else {
        return;
    };
    if let Some(coarse) = pause.checked_sub(SPIN_MARGIN) {
        thread::sleep(coarse);
    }
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(fast: u64, normal: u64, slow: u64) -> TickConfig {
        TickConfig {
            fast_interval_ms: fast,
            normal_interval_ms: normal,
            slow_interval_ms: slow,
        }
    }

    fn accumulator(fast: u64, normal: u64, slow: u64) -> TickAccumulator {
        TickAccumulator::new(TickIntervals::from_config(&config(fast, normal, slow)))
    }

    #[test]
    fn fires_once_per_elapsed_interval() {
        let mut acc = accumulator(50, 200, 1000);
        assert_eq!(acc.advance(Duration::from_millis(30)), TickBurst::default());
        let burst = acc.advance(Duration::from_millis(30));
        assert_eq!(burst.fast, 1);
        assert_eq!(burst.normal, 0);
        assert_eq!(acc.pending(TickRate::Fast), Duration::from_millis(10));
    }

    #[test]
    fn rates_accumulate_independently() {
        let mut acc = accumulator(50, 200, 1000);
        let mut totals = TickBurst::default();
        for _ in 0..40 {
            let burst = acc.advance(Duration::from_millis(25));
            totals.fast = totals.fast.saturating_add(burst.fast);
            totals.normal = totals.normal.saturating_add(burst.normal);
            totals.slow = totals.slow.saturating_add(burst.slow);
        }
        // 1000ms of wall time.
        assert_eq!((totals.fast, totals.normal, totals.slow), (20, 5, 1));
    }

    #[test]
    fn stall_is_bounded_by_catchup_limit() {
        let mut acc = accumulator(50, 200, 1000);
        let burst = acc.advance(Duration::from_secs(3600));
        assert_eq!(burst.fast, MAX_CATCHUP_TICKS);
        assert_eq!(burst.normal, MAX_CATCHUP_TICKS);
        assert_eq!(burst.slow, MAX_CATCHUP_TICKS);
        // Nothing is left owed after the burst.
        assert_eq!(acc.advance(Duration::ZERO), TickBurst::default());
    }

    #[test]
    fn counters_expose_intervals_and_stamps() {
        let counters = TickCounters::new(&config(10, 20, 30));
        assert_eq!(counters.interval(TickRate::Normal), Duration::from_millis(20));
        assert_eq!(counters.increment(TickRate::Fast), 1);
        assert_eq!(counters.increment(TickRate::Fast), 2);
        let stamp = counters.stamp();
        assert_eq!(stamp.fast, 2);
        assert_eq!(stamp.normal, 0);
    }

    #[test]
    fn start_ticks_and_stop_joins() {
        let counters = Arc::new(TickCounters::new(&config(2, 4, 8)));
        let mut metronome = Metronome::new(Arc::clone(&counters));
        let (tx, rx) = crossbeam_channel::unbounded();
        let started = metronome
            .start(&config(2, 4, 8), move |rate| {
                let _ = tx.send(rate);
                Ok::<(), String>(())
            })
            .unwrap();
        assert!(started);
        assert!(metronome.is_running());

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first, TickRate::Fast);

        metronome.stop(Duration::from_secs(5)).unwrap();
        assert!(!metronome.is_running());
        assert!(counters.count(TickRate::Fast) >= 1);
        // Second stop is a no-op.
        metronome.stop(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn start_is_idempotent() {
        let counters = Arc::new(TickCounters::new(&config(5, 10, 20)));
        let mut metronome = Metronome::new(counters);
        let ok = |_rate: TickRate| Ok::<(), String>(());
        assert!(metronome.start(&config(5, 10, 20), ok).unwrap());
        assert!(!metronome.start(&config(5, 10, 20), ok).unwrap());
        metronome.stop(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn failing_callback_terminates_loop() {
        let counters = Arc::new(TickCounters::new(&config(2, 1000, 1000)));
        let mut metronome = Metronome::new(Arc::clone(&counters));
        metronome
            .start(&config(2, 1000, 1000), |_rate| Err("boom"))
            .unwrap();

        let deadline = Instant::now().checked_add(Duration::from_secs(5)).unwrap();
        while metronome.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!metronome.is_running());
        assert_eq!(counters.count(TickRate::Fast), 1);

        let err = metronome.stop(Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, MetronomeError::TickFailed { message } if message == "boom"));
    }
}
