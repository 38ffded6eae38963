//! Millisecond-denominated time unit constants.
//!
//! Timestamps and durations throughout timekit are signed 64-bit millisecond
//! counts since the Unix epoch, so arithmetic on them composes directly with
//! these constants.
//!
//! # Example
//!
//! ```rust
//! use timekit::units::{DAY, HOUR, MINUTE, SECOND, WEEK};
//!
//! assert_eq!(MINUTE, 60 * SECOND);
//! assert_eq!(WEEK, 7 * DAY);
//!
//! let friday_noon = 950_536_800_000 + 2 * DAY - 2 * HOUR;
//! assert_eq!(friday_noon % SECOND, 0);
//! ```

/// One second, in milliseconds.
pub const SECOND: i64 = 1000;

/// One minute, in milliseconds.
pub const MINUTE: i64 = 60 * SECOND;

/// One hour, in milliseconds.
pub const HOUR: i64 = 60 * MINUTE;

/// One day, in milliseconds.
pub const DAY: i64 = 24 * HOUR;

/// One week, in milliseconds.
pub const WEEK: i64 = 7 * DAY;
