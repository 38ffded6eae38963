//! Time source abstraction.
//!
//! This module provides [`TimeProvider`], the seam between code that asks
//! "what time is it" and the clock answering the question. Production code
//! holds a [`SystemClock`]; tests hand in a
//! [`FakeClock`](crate::clock::FakeClock) instead, and nothing downstream can
//! tell the difference.
//!
//! # Example
//!
//! ```rust
//! use timekit::provider::{SystemClock, TimeProvider};
//!
//! fn expires_at(clock: &dyn TimeProvider, ttl_millis: i64) -> i64 {
//!     clock.now_millis() + ttl_millis
//! }
//!
//! let clock = SystemClock;
//! assert!(expires_at(&clock, 1000) > clock.now_millis());
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of wall-clock timestamps.
///
/// Timestamps are milliseconds since the Unix epoch, signed so that moments
/// before 1970 stay representable.
///
/// # Implementations
///
/// - [`SystemClock`] - the real system clock
/// - [`FakeClock`](crate::clock::FakeClock) - controllable time for testing
pub trait TimeProvider: Send + Sync {
    /// Get the current timestamp in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Get the current moment as a [`SystemTime`].
    fn system_time_now(&self) -> SystemTime {
        epoch_millis_to_system_time(self.now_millis())
    }
}

/// The real system clock.
///
/// # Example
///
/// ```rust
/// use timekit::provider::{SystemClock, TimeProvider};
///
/// // Sometime after 2020-01-01.
/// assert!(SystemClock.now_millis() > 1_577_836_800_000);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn now_millis(&self) -> i64 {
        real_now_millis()
    }
}

/// Returns the true wall-clock timestamp, bypassing any installed fake clock.
#[must_use]
pub fn real_now_millis() -> i64 {
    system_time_to_epoch_millis(SystemTime::now())
}

/// Converts a [`SystemTime`] to milliseconds since the Unix epoch.
///
/// Pre-epoch times produce negative values. Times beyond the `i64`
/// millisecond range saturate.
#[must_use]
pub fn system_time_to_epoch_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_millis()).unwrap_or(i64::MAX),
        Err(err) => i64::try_from(err.duration().as_millis()).map_or(i64::MIN, |millis| -millis),
    }
}

/// Converts milliseconds since the Unix epoch to a [`SystemTime`].
///
/// # Example
///
/// ```rust
/// use timekit::provider::{epoch_millis_to_system_time, system_time_to_epoch_millis};
///
/// let moment = epoch_millis_to_system_time(950_536_800_000);
/// assert_eq!(system_time_to_epoch_millis(moment), 950_536_800_000);
/// ```
#[must_use]
pub fn epoch_millis_to_system_time(timestamp: i64) -> SystemTime {
    let magnitude = Duration::from_millis(timestamp.unsigned_abs());
    if timestamp >= 0 {
        UNIX_EPOCH + magnitude
    } else {
        UNIX_EPOCH - magnitude
    }
}
