//! Fake timer queue and sleep futures.

use pin_project::{pin_project, pinned_drop};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use super::FakeClock;

/// Map key for a pending timer.
///
/// Ordering is by deadline first, then registration order, so iterating the
/// map visits timers exactly in the order they must fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TimerKey {
    /// Deadline on the queue's own timeline, in milliseconds
    deadline: i64,
    /// Unique ID for this timer (tie-break for equal deadlines)
    id: u64,
}

/// The set of pending fake timers.
///
/// The queue keeps its own timeline, `position`: the total forward
/// advancement ever applied, in milliseconds. It only moves forward.
/// Rewinding the clock's reported time deliberately does not touch it, so
/// backward motion can never fire a timer early or arm one again.
#[derive(Debug, Default)]
pub(crate) struct TimerQueue {
    /// Pending timers, earliest deadline first
    pending: BTreeMap<TimerKey, Option<Waker>>,
    /// Total forward advancement applied so far
    position: i64,
    /// Counter for generating unique timer IDs
    next_id: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Current position on the queue's timeline.
    pub(crate) fn position(&self) -> i64 {
        self.position
    }

    /// Register a new timer at an absolute queue deadline and return its ID.
    ///
    /// The waker slot starts empty; it is filled in when the owning future
    /// is first polled.
    pub(crate) fn register(&mut self, deadline: i64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(TimerKey { deadline, id }, None);
        id
    }

    /// Store the latest waker for a timer.
    ///
    /// A timer that has already fired (or been discarded) has no entry left;
    /// that case is a no-op, and the caller stays pending forever.
    fn update_waker(&mut self, deadline: i64, id: u64, waker: &Waker) {
        if let Some(slot) = self.pending.get_mut(&TimerKey { deadline, id }) {
            *slot = Some(waker.clone());
        }
    }

    /// Remove a timer entry, if it is still pending.
    fn remove(&mut self, deadline: i64, id: u64) {
        self.pending.remove(&TimerKey { deadline, id });
    }

    /// Move the timeline forward by `delta` milliseconds and collect every
    /// timer that came due, in non-decreasing deadline order.
    ///
    /// The caller wakes the returned wakers after releasing the queue lock.
    /// Due timers that were never polled have no waker yet; their entries
    /// are dropped here and their futures resolve on first poll.
    pub(crate) fn advance_by(&mut self, delta: i64) -> Vec<Waker> {
        debug_assert!(delta >= 0, "queue timeline only moves forward");
        self.position = self.position.saturating_add(delta);

        let mut due = Vec::new();
        while let Some(entry) = self.pending.first_entry() {
            if entry.key().deadline > self.position {
                break;
            }
            if let Some(waker) = entry.remove() {
                due.push(waker);
            }
        }
        due
    }

    /// Number of timers still waiting to fire.
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Discard every pending timer without waking anyone.
    ///
    /// Futures still awaiting a discarded timer stay pending; they are
    /// dropped together with the test's runtime.
    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}

/// A future that completes when the fake clock advances past its deadline.
///
/// Created by [`FakeClock::delay`](super::FakeClock::delay) or
/// [`crate::delay`] while fake time is installed. The timer is registered on
/// the queue at construction, so it counts toward
/// [`pending_timers`](super::FakeClock::pending_timers) before the first
/// poll, and dropping it unregisters it.
#[pin_project(PinnedDrop)]
#[derive(Debug)]
pub struct FakeSleep {
    clock: FakeClock,
    deadline: i64,
    id: u64,
    fired: bool,
}

impl FakeSleep {
    pub(crate) fn new(clock: FakeClock, delay_millis: i64) -> Self {
        let (deadline, id) = {
            let mut timers = clock.inner.timers.lock();
            let deadline = timers.position().saturating_add(delay_millis.max(0));
            (deadline, timers.register(deadline))
        };
        Self {
            clock,
            deadline,
            id,
            fired: false,
        }
    }

    /// Returns how much further the clock must advance before this timer
    /// fires, in milliseconds.
    ///
    /// Returns zero once the deadline has been reached.
    #[must_use]
    pub fn remaining_millis(&self) -> i64 {
        let position = self.clock.inner.timers.lock().position();
        (self.deadline - position).max(0)
    }

    /// Returns `true` if this timer's deadline has been reached.
    #[must_use]
    pub fn is_elapsed(&self) -> bool {
        self.clock.inner.timers.lock().position() >= self.deadline
    }
}

impl Future for FakeSleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut timers = this.clock.inner.timers.lock();

        if timers.position() >= *this.deadline {
            // Already removed if advance_by fired us; remove covers the
            // never-polled-until-due case.
            timers.remove(*this.deadline, *this.id);
            *this.fired = true;
            Poll::Ready(())
        } else {
            timers.update_waker(*this.deadline, *this.id, cx.waker());
            Poll::Pending
        }
    }
}

#[pinned_drop]
impl PinnedDrop for FakeSleep {
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        if !*this.fired {
            this.clock.inner.timers.lock().remove(*this.deadline, *this.id);
        }
    }
}
