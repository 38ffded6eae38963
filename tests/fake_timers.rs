//! End-to-end tests for the fake clock lifecycle.
//!
//! Every test installs its own guard, so concurrently running tests
//! serialize on the install permit instead of observing each other's clocks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use timekit::prelude::*;

/// 14 Feb 2000, 14:00 UTC.
const REFERENCE_TIMESTAMP: i64 = 950_536_800_000;

/// A freshly installed fake clock starts aligned with the real one.
#[tokio::test]
async fn test_fresh_install_tracks_real_time() {
    let timers = setup_fake_timers();
    let skew = (timers.now_millis() - timers.real_now_millis()).abs();
    assert!(skew <= 10, "fresh fake clock drifted {skew} ms");
}

/// Jumping to an absolute timestamp pins reported time there.
#[tokio::test]
async fn test_jump_to_reference_timestamp() {
    let timers = setup_fake_timers();

    timers.set_time(REFERENCE_TIMESTAMP).await.unwrap();

    let reported = now_millis();
    assert!(reported >= REFERENCE_TIMESTAMP);
    assert!(reported - REFERENCE_TIMESTAMP < 5 * SECOND);
}

/// A forward jump lands on the target within execution drift.
#[tokio::test]
async fn test_forward_jump_lands_on_target() {
    let timers = setup_fake_timers();
    let target = timers.now_millis() + 3 * DAY;

    timers.set_time(target).await.unwrap();

    let reported = now_millis();
    assert!(reported >= target);
    assert!(reported - target < 5 * SECOND);
}

/// A backward jump moves reported time in one step.
#[tokio::test]
async fn test_backward_jump_updates_reported_time() {
    let timers = setup_fake_timers();
    let before = timers.now_millis();
    let target = before - 2 * HOUR;

    timers.set_time(target).await.unwrap();

    let after = now_millis();
    assert!(after < before - HOUR);
    assert!(after >= target);
    assert!(after - target < 5 * SECOND);
}

/// A timer must not fire below its deadline and fires exactly once at it.
#[tokio::test]
async fn test_timer_fires_only_at_deadline() {
    let timers = setup_fake_timers();
    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = fired.clone();

    let handle = tokio::spawn(async move {
        timekit::delay(Duration::from_millis(1000)).await;
        fired2.fetch_add(1, Ordering::SeqCst);
    });

    // Let the task register its timer
    tokio::task::yield_now().await;
    assert_eq!(timers.pending_timers(), 1);

    timers.set_time(timers.now_millis() + 500).await.unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    timers.set_time(timers.now_millis() + 600).await.unwrap();
    handle.await.unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

/// Backward motion neither fires pending timers nor re-arms fired ones,
/// and forward advancement accumulated before a rewind still counts.
#[tokio::test]
async fn test_backward_skew_never_fires_or_rearms() {
    let timers = setup_fake_timers();
    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = fired.clone();

    let handle = tokio::spawn(async move {
        timekit::delay(Duration::from_millis(1000)).await;
        fired2.fetch_add(1, Ordering::SeqCst);
    });
    tokio::task::yield_now().await;

    timers.set_time(timers.now_millis() + 500).await.unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    timers.set_time(timers.now_millis() - 300).await.unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    // Cumulative forward advancement is 950 ms, still short of the deadline
    timers.set_time(timers.now_millis() + 450).await.unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    // 1050 ms crosses it; the timer fires exactly once
    timers.set_time(timers.now_millis() + 100).await.unwrap();
    handle.await.unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

/// A multi-day jump with the default one-minute increment fires every due
/// timer, in deadline order.
#[tokio::test]
async fn test_five_day_jump_fires_in_deadline_order() {
    let timers = setup_fake_timers();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for (label, hours) in [(1u8, 6u64), (2, 30), (3, 70)] {
        let order2 = order.clone();
        handles.push(tokio::spawn(async move {
            timekit::delay(Duration::from_secs(hours * 3600)).await;
            order2.lock().unwrap().push(label);
        }));
    }

    yield_run_loops(5).await;
    assert_eq!(timers.pending_timers(), 3);

    timers.set_time(timers.now_millis() + 5 * DAY).await.unwrap();

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(timers.pending_timers(), 0);
}

/// Work scheduled by a fired timer fires within the same jump when its
/// deadline is covered.
#[tokio::test]
async fn test_chained_timers_drain_in_one_jump() {
    let timers = setup_fake_timers();
    let stages = Arc::new(AtomicUsize::new(0));
    let stages2 = stages.clone();

    let handle = tokio::spawn(async move {
        timekit::delay(Duration::from_secs(3600)).await;
        stages2.fetch_add(1, Ordering::SeqCst);
        // The second timer only exists once the first has fired
        timekit::delay(Duration::from_secs(3600)).await;
        stages2.fetch_add(1, Ordering::SeqCst);
    });
    tokio::task::yield_now().await;

    timers.set_time(timers.now_millis() + 3 * HOUR).await.unwrap();

    handle.await.unwrap();
    assert_eq!(stages.load(Ordering::SeqCst), 2);
}

/// A delay handle created from the guard observes advancement directly.
#[tokio::test]
async fn test_delay_handle_observes_advancement() {
    let timers = setup_fake_timers();
    let timer = timers.delay(Duration::from_secs(60));
    assert!(!timer.is_elapsed());

    timers.set_time(timers.now_millis() + 2 * MINUTE).await.unwrap();

    assert!(timer.is_elapsed());
    timer.await;
}

/// `sleep_until` keeps polling on real time even while fake time is
/// installed.
#[tokio::test]
async fn test_sleep_until_runs_on_real_time_under_fake_clock() {
    let _timers = setup_fake_timers();
    let ready = Arc::new(AtomicBool::new(false));
    let ready2 = ready.clone();

    tokio::spawn(async move {
        sleep(Duration::from_millis(20)).await;
        ready2.store(true, Ordering::SeqCst);
    });

    let ready3 = ready.clone();
    sleep_until(move || ready3.load(Ordering::SeqCst))
        .await
        .unwrap();
    assert!(ready.load(Ordering::SeqCst));
}

/// Rejected arguments leave simulated time untouched.
#[tokio::test]
async fn test_invalid_increment_leaves_time_unchanged() {
    let timers = setup_fake_timers();
    let before = timers.now_millis();
    let target = before + DAY;

    let err = timers.set_time_with_increment(target, 0).await.unwrap_err();

    assert!(matches!(err, Error::InvalidArgument(_)));
    // Only real-time flow since `before`, not the attempted day jump
    assert!(timers.now_millis() - before < 5 * SECOND);
}
