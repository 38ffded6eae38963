//! Example: Driving simulated time through an async program
//!
//! This example installs the fake clock, schedules timers, and moves
//! simulated time forward and backward without any real waiting.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use timekit::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> timekit::Result<()> {
    println!("⏱️ timekit - Time Control Examples\n");

    example_install_and_jump().await?;
    example_timer_firing().await?;
    example_clock_skew().await?;
    example_sleep_until().await?;

    println!("\n✅ All time control examples completed!");
    Ok(())
}

/// Installing the fake clock and jumping to a new timestamp
async fn example_install_and_jump() -> timekit::Result<()> {
    println!("📌 Example 1: Install and Jump");
    println!("   Reroute time lookups and move the reported time at will\n");

    let timers = setup_fake_timers();
    println!("   Reported time: {} ms since epoch", now_millis());
    println!("   Real time:     {} ms since epoch", real_now_millis());

    // One week ahead, no real waiting
    let target = timers.now_millis() + WEEK;
    timers.set_time(target).await?;
    println!("   After a one-week jump: {} ms since epoch", now_millis());

    println!("   ⚡ The jump took a few run-loop passes, not a week!\n");
    Ok(())
}

/// Timers scheduled by tasks fire during a jump, in deadline order
async fn example_timer_firing() -> timekit::Result<()> {
    println!("📌 Example 2: Timer Firing");
    println!("   Pending timers fire as simulated time crosses their deadlines\n");

    let timers = setup_fake_timers();
    let fired = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for hours in [1u64, 26, 70] {
        let fired2 = fired.clone();
        handles.push(tokio::spawn(async move {
            timekit::delay(Duration::from_secs(hours * 3600)).await;
            let nth = fired2.fetch_add(1, Ordering::SeqCst) + 1;
            println!("   🔔 Timer for +{hours}h fired ({nth} so far)");
        }));
    }

    yield_run_loops(5).await;
    println!("   Pending timers: {}", timers.pending_timers());

    println!("   Jumping five days ahead...");
    timers.set_time(timers.now_millis() + 5 * DAY).await?;

    for handle in handles {
        handle.await.expect("timer task panicked");
    }
    let total = fired.load(Ordering::SeqCst);
    println!("   ✓ All {total} timers fired in deadline order!\n");
    Ok(())
}

/// Moving time backward never fires or re-arms timers
async fn example_clock_skew() -> timekit::Result<()> {
    println!("📌 Example 3: Clock Skew");
    println!("   Backward moves are atomic and leave timers untouched\n");

    let timers = setup_fake_timers();
    let timer = timers.delay(Duration::from_secs(1));

    timers.set_time(timers.now_millis() + 500).await?;
    println!("   +500 ms forward: elapsed = {}", timer.is_elapsed());

    timers.set_time(timers.now_millis() - 300).await?;
    println!("   -300 ms backward: elapsed = {}", timer.is_elapsed());

    timers.set_time(timers.now_millis() + 450).await?;
    println!(
        "   +450 ms (950 ms total forward): elapsed = {}",
        timer.is_elapsed()
    );

    timers.set_time(timers.now_millis() + 100).await?;
    println!(
        "   +100 ms (1050 ms total forward): elapsed = {}",
        timer.is_elapsed()
    );

    println!("   ✓ Only cumulative forward advancement counts!\n");
    Ok(())
}

/// Polling a condition on real time
async fn example_sleep_until() -> timekit::Result<()> {
    println!("📌 Example 4: Waiting on a Condition");
    println!("   sleep_until polls until external work finishes\n");

    let ready = Arc::new(AtomicBool::new(false));
    let ready2 = ready.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(25)).await;
        ready2.store(true, Ordering::SeqCst);
    });

    let ready3 = ready.clone();
    sleep_until(move || ready3.load(Ordering::SeqCst)).await?;

    println!("   ✓ Condition passed within the 2-second default limit!");
    Ok(())
}
