//! Installing a fake clock behind the ambient time functions.

use parking_lot::{Mutex, MutexGuard, RwLock};
use std::thread::{self, ThreadId};
use std::time::Duration;

use tracing::debug;

use super::fake_clock::FakeClock;
use super::timers::FakeSleep;
use crate::error::Result;
use crate::provider::real_now_millis;
use crate::wait;

/// Serializes tests that install fake time; the guard holds the permit for
/// its whole lifetime, so concurrently running tests queue up instead of
/// seeing each other's clocks.
static INSTALL_LOCK: Mutex<()> = Mutex::new(());

/// Thread currently holding the install permit, for catching a double
/// install inside one test before it deadlocks on the permit.
static INSTALLER: Mutex<Option<ThreadId>> = Mutex::new(None);

/// The clock the ambient functions consult while fake time is installed.
static ACTIVE: RwLock<Option<FakeClock>> = RwLock::new(None);

/// Installs fake time for the duration of the returned guard.
///
/// While the guard is alive, [`now_millis`] reports the fake clock and
/// [`delay`] schedules on the fake timer queue. Dropping the guard restores
/// real time and discards pending fake timers; this also happens when a test
/// panics, since unwinding drops the guard.
///
/// Tests running in parallel serialize here: the second `setup_fake_timers`
/// call blocks until the first test's guard is dropped.
///
/// # Panics
///
/// Panics if fake time is already installed on the current thread. Drop the
/// existing [`FakeTimers`] guard first.
///
/// # Example
///
/// ```rust,ignore
/// use timekit::units::WEEK;
///
/// #[tokio::test]
/// async fn skips_a_week() -> timekit::Result<()> {
///     let timers = timekit::setup_fake_timers();
///     let target = timers.now_millis() + WEEK;
///     timers.set_time(target).await?;
///     assert!(timekit::now_millis() >= target);
///     Ok(())
/// }
/// ```
#[must_use]
pub fn setup_fake_timers() -> FakeTimers {
    FakeTimers::install(FakeClock::new())
}

/// Per-test handle and uninstall guard for fake time.
///
/// Created by [`setup_fake_timers`] or [`FakeTimers::starting_at`]. The
/// handle controls the installed clock; dropping it uninstalls fake time on
/// every exit path, panics included.
///
/// The guard is not `Send`. Create and drop it on the test's own thread,
/// which is the normal single-threaded test flow; spawned tasks that need
/// the clock take a [`clock`](FakeTimers::clock) clone instead.
#[derive(Debug)]
pub struct FakeTimers {
    clock: FakeClock,
    _permit: MutexGuard<'static, ()>,
}

impl FakeTimers {
    /// Installs fake time reporting the given timestamp.
    ///
    /// # Panics
    ///
    /// Panics if fake time is already installed on the current thread.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let timers = timekit::clock::FakeTimers::starting_at(950_536_800_000);
    /// assert!((timers.now_millis() - 950_536_800_000).abs() <= 10);
    /// ```
    #[must_use]
    pub fn starting_at(timestamp: i64) -> Self {
        Self::install(FakeClock::starting_at(timestamp))
    }

    fn install(clock: FakeClock) -> Self {
        let current = thread::current().id();
        assert!(
            *INSTALLER.lock() != Some(current),
            "fake timers already installed in this test; drop the existing FakeTimers guard first"
        );

        let permit = INSTALL_LOCK.lock();
        *INSTALLER.lock() = Some(current);
        *ACTIVE.write() = Some(clock.clone());
        debug!(offset = clock.offset_millis(), "fake timers installed");

        Self {
            clock,
            _permit: permit,
        }
    }

    /// Sets the advancement increment for this test's clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// `increment` is below one millisecond.
    pub fn with_increment(self, increment: i64) -> Result<Self> {
        self.clock.set_default_increment(increment)?;
        Ok(self)
    }

    /// Returns a cloneable handle to the installed clock, for handing to
    /// spawned tasks.
    #[must_use]
    pub fn clock(&self) -> FakeClock {
        self.clock.clone()
    }

    /// Jumps simulated time to `timestamp`.
    ///
    /// See [`FakeClock::set_time_with_increment`] for the advancement
    /// protocol.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// the jump arithmetic would leave the representable range.
    pub async fn set_time(&self, timestamp: i64) -> Result<()> {
        self.clock.set_time(timestamp).await
    }

    /// Jumps simulated time to `timestamp` with an explicit step cap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// `increment` is below one millisecond or the jump arithmetic would
    /// leave the representable range.
    pub async fn set_time_with_increment(&self, timestamp: i64, increment: i64) -> Result<()> {
        self.clock.set_time_with_increment(timestamp, increment).await
    }

    /// Current simulated timestamp in milliseconds since the Unix epoch.
    #[must_use]
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// True wall-clock timestamp, bypassing the fake clock.
    #[must_use]
    pub fn real_now_millis(&self) -> i64 {
        real_now_millis()
    }

    /// Schedules a timer on this test's fake queue.
    #[must_use]
    pub fn delay(&self, duration: Duration) -> FakeSleep {
        self.clock.delay(duration)
    }

    /// Number of pending fake timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.clock.pending_timers()
    }

    /// Sets the advancement increment without consuming the guard.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// `increment` is below one millisecond.
    pub fn set_default_increment(&self, increment: i64) -> Result<()> {
        self.clock.set_default_increment(increment)
    }
}

impl Drop for FakeTimers {
    fn drop(&mut self) {
        *ACTIVE.write() = None;
        *INSTALLER.lock() = None;
        self.clock.clear_timers();
        debug!("fake timers uninstalled");
        // The permit field drops after this body, releasing the next test.
    }
}

/// Current timestamp in milliseconds since the Unix epoch.
///
/// Reports the installed fake clock when one is active, the real clock
/// otherwise. Code under test reads time through this function and never
/// notices the difference.
#[must_use]
pub fn now_millis() -> i64 {
    match &*ACTIVE.read() {
        Some(clock) => clock.now_millis(),
        None => real_now_millis(),
    }
}

/// Returns a handle to the installed fake clock, if fake time is active.
#[must_use]
pub fn fake_clock() -> Option<FakeClock> {
    ACTIVE.read().clone()
}

/// Waits for `duration` of simulated time when fake time is installed, real
/// time otherwise.
///
/// On the fake path the timer registers immediately and fires when
/// [`FakeTimers::set_time`] advances past its deadline. Code under test
/// sleeps through this function so tests can jump over its waits.
pub async fn delay(duration: Duration) {
    // Register (or decide on real sleep) before awaiting so the read lock
    // is never held across a suspension point.
    let fake = ACTIVE.read().as_ref().map(|clock| clock.delay(duration));
    match fake {
        Some(sleep) => sleep.await,
        None => wait::sleep(duration).await,
    }
}
