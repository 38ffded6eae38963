//! # timekit ⏱️
//!
//! > Controllable time for async Rust tests
//!
//! **timekit** puts a fake wall clock behind your code's time reads and
//! timers, jumps it in bounded steps so timer chains fire in order, and
//! polls real-world conditions without fixed sleeps.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use timekit::prelude::*;
//! use std::time::Duration;
//!
//! #[timekit::test]
//! async fn fires_a_scheduled_timer(timers: FakeTimers) {
//!     let timer = timers.delay(Duration::from_secs(3600));
//!
//!     timers.set_time(timers.now_millis() + 2 * HOUR).await.unwrap();
//!
//!     assert!(timer.is_elapsed()); // No real hour waited!
//! }
//! ```
//!
//! ## Features
//!
//! - ⏱️ **Fake Clock** - Jump simulated time without waiting
//! - 🪜 **Stepped Advancement** - Timers fire in order, chained work drains between steps
//! - ⏪ **Clock Skew** - Rewind reported time without firing or re-arming timers
//! - 🔁 **Condition Polling** - Bounded real-time `sleep_until`
//! - 🔌 **Injection Seam** - `TimeProvider` for code that takes a clock

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Fake clock for time control in tests
pub mod clock;

pub mod error;
pub mod provider;
pub mod units;
pub mod wait;

/// Prelude for convenient imports
///
/// ```rust
/// use timekit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::clock::*;
    pub use crate::error::{Error, Result};
    pub use crate::provider::{real_now_millis, SystemClock, TimeProvider};
    pub use crate::units::{DAY, HOUR, MINUTE, SECOND, WEEK};
    pub use crate::wait::{sleep, sleep_until, sleep_until_with, yield_run_loops};
}

// Re-exports
pub use clock::{delay, fake_clock, now_millis, setup_fake_timers, FakeClock, FakeSleep, FakeTimers};
pub use error::{Error, Result};
pub use provider::real_now_millis;
pub use units::{DAY, HOUR, MINUTE, SECOND, WEEK};
pub use wait::{sleep, sleep_until, sleep_until_with, yield_run_loops, DEFAULT_RUN_LOOP_YIELDS};

// Re-export the test macro when macros feature is enabled
#[cfg(feature = "macros")]
pub use timekit_macros::test;
