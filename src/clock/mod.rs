//! Controllable fake time for async tests
//!
//! The `clock` module provides [`FakeClock`], a clock whose reported time a
//! test can jump forward (stepping pending timers in bounded increments so
//! their work drains in order) or backward (atomically, without disturbing
//! timers), plus the [`setup_fake_timers`] install lifecycle that routes the
//! ambient [`now_millis`] and [`delay`] functions through it.
//!
//! # Example
//!
//! ```rust
//! use timekit::clock::FakeClock;
//! use std::time::Duration;
//!
//! let clock = FakeClock::starting_at(950_536_800_000);
//! assert!(clock.now_millis() >= 950_536_800_000);
//!
//! let timer = clock.delay(Duration::from_secs(60));
//! assert!(!timer.is_elapsed());
//! ```

mod fake_clock;
mod install;
mod timers;

pub use fake_clock::FakeClock;
pub use install::{delay, fake_clock, now_millis, setup_fake_timers, FakeTimers};
pub use timers::FakeSleep;
