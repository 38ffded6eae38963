//! `FakeClock` implementation and the stepped advancement protocol.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use super::timers::{FakeSleep, TimerQueue};
use crate::error::{Error, Result};
use crate::provider::{real_now_millis, TimeProvider};
use crate::units::MINUTE;
use crate::wait::{yield_run_loops, DEFAULT_RUN_LOOP_YIELDS};

/// A controllable clock that reports simulated wall-clock time.
///
/// `FakeClock` reports real time plus an adjustable offset, so an idle fake
/// clock still flows forward at the real clock's rate. [`set_time`] moves
/// the offset: forward jumps step the pending timer queue in bounded
/// increments with cooperative yields in between, so timers fire in deadline
/// order and the work they wake gets to run (and schedule more timers)
/// before the next step lands. Backward jumps rewrite the offset in one
/// atomic step and leave the timer queue alone.
///
/// Most tests never construct one directly; [`setup_fake_timers`] installs
/// a clock for the ambient [`now_millis`]/[`delay`] functions and hands back
/// a guard. A standalone `FakeClock` is useful as an injected
/// [`TimeProvider`].
///
/// # Thread Safety
///
/// `FakeClock` is thread-safe and can be cloned and shared across tasks.
/// All clones share the same underlying time state.
///
/// # Example
///
/// ```rust
/// use timekit::clock::FakeClock;
///
/// let clock = FakeClock::starting_at(950_536_800_000);
/// assert!((clock.now_millis() - 950_536_800_000).abs() <= 10);
///
/// // Clones observe the same clock
/// let clock2 = clock.clone();
/// assert_eq!(clock2.offset_millis(), clock.offset_millis());
/// ```
///
/// [`set_time`]: FakeClock::set_time
/// [`setup_fake_timers`]: crate::clock::setup_fake_timers
/// [`now_millis`]: crate::clock::now_millis
/// [`delay`]: crate::clock::delay
#[derive(Debug, Clone)]
pub struct FakeClock {
    pub(crate) inner: Arc<ClockInner>,
}

#[derive(Debug)]
pub(crate) struct ClockInner {
    /// Reported-time state
    state: Mutex<ClockState>,
    /// Pending fake timers
    pub(crate) timers: Mutex<TimerQueue>,
}

#[derive(Debug)]
struct ClockState {
    /// Milliseconds added to real time when reporting simulated time
    offset: i64,
    /// Cap for a single advancement step, in milliseconds
    default_increment: i64,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClock {
    /// Creates a new `FakeClock` aligned with the real clock.
    ///
    /// # Example
    ///
    /// ```rust
    /// use timekit::clock::FakeClock;
    /// use timekit::provider::real_now_millis;
    ///
    /// let clock = FakeClock::new();
    /// assert!((clock.now_millis() - real_now_millis()).abs() <= 10);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Creates a new `FakeClock` reporting the given timestamp.
    ///
    /// # Example
    ///
    /// ```rust
    /// use timekit::clock::FakeClock;
    /// use timekit::units::DAY;
    ///
    /// let clock = FakeClock::starting_at(950_536_800_000 + 3 * DAY);
    /// assert!(clock.now_millis() >= 950_536_800_000 + 3 * DAY);
    /// ```
    #[must_use]
    pub fn starting_at(timestamp: i64) -> Self {
        Self::with_offset(timestamp.saturating_sub(real_now_millis()))
    }

    fn with_offset(offset: i64) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                state: Mutex::new(ClockState {
                    offset,
                    default_increment: MINUTE,
                }),
                timers: Mutex::new(TimerQueue::new()),
            }),
        }
    }

    /// Returns the current simulated timestamp in milliseconds since the
    /// Unix epoch.
    ///
    /// Real time keeps flowing underneath: two reads without an intervening
    /// [`set_time`](FakeClock::set_time) differ by the real time between
    /// them.
    #[must_use]
    pub fn now_millis(&self) -> i64 {
        real_now_millis().saturating_add(self.offset_millis())
    }

    /// Returns how far reported time currently is from real time, in
    /// milliseconds.
    #[must_use]
    pub fn offset_millis(&self) -> i64 {
        self.inner.state.lock().offset
    }

    /// Returns the step cap used by [`set_time`](FakeClock::set_time), in
    /// milliseconds.
    #[must_use]
    pub fn default_increment_millis(&self) -> i64 {
        self.inner.state.lock().default_increment
    }

    /// Sets the step cap used by [`set_time`](FakeClock::set_time).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `increment` is below one
    /// millisecond.
    pub fn set_default_increment(&self, increment: i64) -> Result<()> {
        Self::validate_increment(increment)?;
        self.inner.state.lock().default_increment = increment;
        Ok(())
    }

    /// Jumps simulated time to `timestamp`, using the clock's default
    /// advancement increment.
    ///
    /// See [`set_time_with_increment`](FakeClock::set_time_with_increment)
    /// for the advancement protocol.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the jump arithmetic would leave
    /// the representable range.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use timekit::clock::FakeClock;
    /// use timekit::units::DAY;
    ///
    /// let clock = FakeClock::new();
    /// let target = clock.now_millis() + 5 * DAY;
    /// clock.set_time(target).await?;
    /// assert!(clock.now_millis() >= target);
    /// ```
    pub async fn set_time(&self, timestamp: i64) -> Result<()> {
        let increment = self.default_increment_millis();
        self.set_time_with_increment(timestamp, increment).await
    }

    /// Jumps simulated time to `timestamp`, capping each forward step at
    /// `increment` milliseconds.
    ///
    /// A forward jump is applied as a sequence of steps. Each step advances
    /// the timer queue by at most `increment`, wakes every timer that came
    /// due in deadline order, and then yields to the scheduler for a few
    /// passes so the woken work runs before the next step. Timers scheduled
    /// by that work land on the advanced queue and fire in later steps of
    /// the same call when their deadlines are covered. Work scheduled so
    /// late that no yield remains before this call resolves stays pending;
    /// callers chasing deeper chains add their own
    /// [`yield_run_loops`](crate::wait::yield_run_loops) calls.
    ///
    /// A backward jump models clock skew: the reported time changes in one
    /// atomic step, no timers fire, and no already-fired timer is armed
    /// again. Forward advancement applied before a rewind still counts
    /// toward timer deadlines afterward.
    ///
    /// Jumping to the current simulated time is a no-op and does not yield.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `increment` is below one
    /// millisecond or the jump arithmetic would leave the representable
    /// range. Nothing is mutated in either case.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use timekit::clock::FakeClock;
    /// use timekit::units::{HOUR, SECOND};
    ///
    /// let clock = FakeClock::new();
    /// let target = clock.now_millis() + 2 * HOUR;
    /// clock.set_time_with_increment(target, 30 * SECOND).await?;
    /// ```
    pub async fn set_time_with_increment(&self, timestamp: i64, increment: i64) -> Result<()> {
        Self::validate_increment(increment)?;

        let real_now = real_now_millis();
        let final_offset = timestamp.checked_sub(real_now).ok_or_else(|| {
            Error::invalid_argument(format!(
                "timestamp {timestamp} is outside the representable range"
            ))
        })?;

        let current_offset = self.offset_millis();
        let advancement = final_offset.checked_sub(current_offset).ok_or_else(|| {
            Error::invalid_argument(format!(
                "timestamp {timestamp} is outside the representable range"
            ))
        })?;

        if advancement < 0 {
            // Clock skew. Timers keep the advancement they have seen.
            debug!(timestamp, advancement, "rewinding reported time");
            self.store_offset(final_offset);
            return Ok(());
        }
        if advancement == 0 {
            return Ok(());
        }

        let mut previous = current_offset;
        while final_offset - previous > increment {
            previous += increment;
            self.apply_step(previous, increment);
            yield_run_loops(DEFAULT_RUN_LOOP_YIELDS).await;
        }

        let last = final_offset - previous;
        self.apply_step(final_offset, last);
        yield_run_loops(DEFAULT_RUN_LOOP_YIELDS).await;
        Ok(())
    }

    /// Creates a timer future that fires once the clock advances `duration`
    /// past the current moment.
    ///
    /// The timer registers immediately, so it counts toward
    /// [`pending_timers`](FakeClock::pending_timers) before the first poll,
    /// and dropping the future cancels it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use timekit::clock::FakeClock;
    /// use std::time::Duration;
    ///
    /// let clock = FakeClock::new();
    /// let timer = clock.delay(Duration::from_secs(60));
    ///
    /// assert_eq!(clock.pending_timers(), 1);
    /// assert!(!timer.is_elapsed());
    /// ```
    #[must_use]
    pub fn delay(&self, duration: Duration) -> FakeSleep {
        let delay_millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        FakeSleep::new(self.clone(), delay_millis)
    }

    /// Returns the number of pending timers waiting to fire.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.lock().pending_count()
    }

    /// Discard every pending timer without firing it.
    pub(crate) fn clear_timers(&self) {
        self.inner.timers.lock().clear();
    }

    fn validate_increment(increment: i64) -> Result<()> {
        if increment < 1 {
            return Err(Error::invalid_argument(format!(
                "increment must be at least 1 ms, got {increment}"
            )));
        }
        Ok(())
    }

    fn store_offset(&self, offset: i64) {
        self.inner.state.lock().offset = offset;
    }

    /// Apply one forward step: report the new time, then wake every timer
    /// the step covered. Wakes happen outside the queue lock.
    fn apply_step(&self, new_offset: i64, step: i64) {
        trace!(new_offset, step, "advancing fake timers");
        self.store_offset(new_offset);
        let due = self.inner.timers.lock().advance_by(step);
        for waker in due {
            waker.wake();
        }
    }
}

impl TimeProvider for FakeClock {
    fn now_millis(&self) -> i64 {
        FakeClock::now_millis(self)
    }
}
