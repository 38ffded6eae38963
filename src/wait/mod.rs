//! Real-time waiting and cooperative yielding.
//!
//! The helpers in this module always run against *real* time and the real
//! scheduler. Installing a fake clock never reroutes them; they are the
//! ground the fake clock itself stands on when it needs to let queued work
//! drain.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use timekit::wait::{sleep, sleep_until};
//!
//! sleep(Duration::from_millis(10)).await;
//! sleep_until(|| server.is_ready()).await?;
//! ```

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};

/// How many scheduler passes [`yield_run_loops`] performs by default.
///
/// Five passes empirically drain the short chains of continuations that a
/// burst of timer wakeups queues up. Deeper chains need explicit extra
/// yields from the caller.
pub const DEFAULT_RUN_LOOP_YIELDS: usize = 5;

/// Default limit for [`sleep_until`].
pub const DEFAULT_CONDITION_TIMEOUT: Duration = Duration::from_secs(2);

/// Default poll interval for [`sleep_until`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Suspends the current task for a duration of real time.
///
/// Other tasks keep running while this one sleeps; nothing blocks. The
/// underlying timer is the runtime's own and completes after real time
/// passes even while a fake clock is installed.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use timekit::wait::sleep;
///
/// sleep(Duration::from_millis(5)).await;
/// ```
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Yields to the scheduler `count` times in a row.
///
/// Each yield lets one pass of the scheduler's ready queue run, so work woken
/// by a previous pass (a fired timer, a resolved future) gets to execute and
/// queue its own follow-up work before the next pass. This drains short
/// chains of continuations; it is a bounded heuristic, not a guarantee for
/// chains deeper than `count`.
///
/// # Example
///
/// ```rust,ignore
/// use timekit::wait::{yield_run_loops, DEFAULT_RUN_LOOP_YIELDS};
///
/// yield_run_loops(DEFAULT_RUN_LOOP_YIELDS).await;
/// ```
pub async fn yield_run_loops(count: usize) {
    for _ in 0..count {
        // A zero-duration timer completes on its first poll without ever
        // returning to the scheduler, so it cannot serve as a pass here.
        tokio::task::yield_now().await;
    }
}

/// Polls `condition` until it returns `true`, with default limits.
///
/// Equivalent to [`sleep_until_with`] with a 2 second limit and a 2 ms poll
/// interval.
///
/// # Errors
///
/// Returns [`Error::Timeout`] if the condition never passes within the
/// limit.
///
/// # Example
///
/// ```rust,ignore
/// use timekit::wait::sleep_until;
///
/// sleep_until(|| messages_received() >= 3).await?;
/// ```
pub async fn sleep_until<F>(condition: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    sleep_until_with(condition, DEFAULT_CONDITION_TIMEOUT, DEFAULT_POLL_INTERVAL).await
}

/// Polls `condition` until it returns `true` or `max_duration` of real time
/// elapses.
///
/// The condition is checked once up front; if it already holds, this returns
/// without sleeping at all. Otherwise it sleeps `poll_interval` between
/// checks. Elapsed time is measured on the monotonic clock, so an installed
/// fake clock has no effect on the limit.
///
/// `condition` must be cheap and non-blocking; it runs on the current task
/// between sleeps.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if `poll_interval` is below one
/// millisecond, and [`Error::Timeout`] if the condition never passes within
/// `max_duration`.
///
/// # Panics
///
/// A panic raised inside `condition` propagates to the caller; the poll loop
/// does not catch it.
pub async fn sleep_until_with<F>(
    mut condition: F,
    max_duration: Duration,
    poll_interval: Duration,
) -> Result<()>
where
    F: FnMut() -> bool,
{
    if poll_interval < Duration::from_millis(1) {
        return Err(Error::invalid_argument(format!(
            "poll interval must be at least 1 ms, got {poll_interval:?}"
        )));
    }

    if condition() {
        return Ok(());
    }

    let start = Instant::now();
    while start.elapsed() < max_duration {
        sleep(poll_interval).await;
        if condition() {
            return Ok(());
        }
    }

    let elapsed = start.elapsed();
    debug!(?elapsed, limit = ?max_duration, "condition never passed");
    Err(Error::timeout(elapsed, max_duration))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sleep_until_already_true() {
        let start = Instant::now();
        sleep_until(|| true).await.unwrap();
        // No poll sleep should have happened.
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_sleep_until_condition_becomes_true() {
        let ready = Arc::new(AtomicBool::new(false));
        let ready2 = ready.clone();

        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            ready2.store(true, Ordering::SeqCst);
        });

        let ready3 = ready.clone();
        sleep_until_with(
            move || ready3.load(Ordering::SeqCst),
            Duration::from_millis(500),
            Duration::from_millis(2),
        )
        .await
        .unwrap();

        assert!(ready.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_sleep_until_times_out() {
        let limit = Duration::from_millis(50);
        let err = sleep_until_with(|| false, limit, Duration::from_millis(5))
            .await
            .unwrap_err();

        match err {
            Error::Timeout { elapsed, limit: reported } => {
                assert!(elapsed >= limit);
                assert_eq!(reported, limit);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sleep_until_rejects_sub_millisecond_interval() {
        let err = sleep_until_with(|| true, Duration::from_secs(1), Duration::from_micros(500))
            .await
            .unwrap_err();

        match err {
            Error::InvalidArgument(message) => {
                assert!(message.contains("poll interval"), "message: {message}");
            }
            other => panic!("expected invalid argument, got {other:?}"),
        }
    }

    #[tokio::test]
    #[should_panic(expected = "condition failure on the third poll")]
    async fn test_panicking_condition_propagates() {
        let calls = AtomicUsize::new(0);
        let _ = sleep_until_with(
            || {
                if calls.fetch_add(1, Ordering::SeqCst) == 2 {
                    panic!("condition failure on the third poll");
                }
                false
            },
            Duration::from_millis(500),
            Duration::from_millis(2),
        )
        .await;
    }

    #[tokio::test]
    async fn test_panicking_condition_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let handle = tokio::spawn(async move {
            sleep_until_with(
                move || {
                    calls2.fetch_add(1, Ordering::SeqCst);
                    panic!("condition failure on the first poll");
                },
                Duration::from_millis(200),
                Duration::from_millis(2),
            )
            .await
        });

        let err = handle.await.unwrap_err();
        assert!(err.is_panic());
        // The poll loop neither caught the panic nor invoked the condition again
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_yield_run_loops_lets_spawned_work_run() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();

        tokio::spawn(async move {
            tokio::task::yield_now().await;
            ran2.store(true, Ordering::SeqCst);
        });

        yield_run_loops(DEFAULT_RUN_LOOP_YIELDS).await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_sleep_waits_real_time() {
        let start = Instant::now();
        sleep(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
