//! Standard library backed scheduling services for the Strand engine.
//!
//! This crate provides concrete implementations of the platform
//! abstraction traits defined in `strand-core`. Hosts construct a
//! [`FrameDeadline`] per work slice and an [`StdScheduler`] for the
//! lifetime of the engine, then drive [`strand_core::Engine::run`] from
//! their own loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use strand_core::{ContinuationScheduler, Deadline};

/// Deadline measuring a fixed budget from the moment it is created.
///
/// A fresh one is made per work slice, typically with the portion of a
/// frame the host is willing to spend reconciling.
#[derive(Debug, Clone)]
pub struct FrameDeadline {
    started: Instant,
    budget: Duration,
}

/// Default slice budget, roughly one 60Hz frame.
pub const DEFAULT_FRAME_BUDGET: Duration = Duration::from_millis(16);

impl FrameDeadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for FrameDeadline {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_BUDGET)
    }
}

impl Deadline for FrameDeadline {
    fn time_remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }
}

/// Scheduler that records continuation requests in an atomic flag and
/// optionally wakes a registered callback, so an event loop can sleep
/// until the engine has work.
pub struct StdScheduler {
    continuation_requested: AtomicBool,
    waker: RwLock<Option<Arc<dyn Fn() + Send + Sync + 'static>>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            continuation_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether a continuation was requested since the last call.
    pub fn take_continuation_request(&self) -> bool {
        self.continuation_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever a continuation is scheduled.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap() = Some(Arc::new(waker));
    }

    /// Clears any registered waker.
    pub fn clear_waker(&self) {
        *self.waker.write().unwrap() = None;
    }

    fn wake(&self) {
        let waker = self.waker.read().unwrap().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "continuation_requested",
                &self.continuation_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl ContinuationScheduler for StdScheduler {
    fn schedule_continuation(&self) {
        self.continuation_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn exhausted_budget_reports_no_time_remaining() {
        let deadline = FrameDeadline::new(Duration::ZERO);
        assert_eq!(deadline.time_remaining(), Duration::ZERO);
    }

    #[test]
    fn fresh_budget_reports_time_remaining() {
        let deadline = FrameDeadline::new(Duration::from_secs(3600));
        assert!(deadline.time_remaining() > Duration::from_secs(3599));
    }

    #[test]
    fn continuation_request_is_latched_until_taken() {
        let scheduler = StdScheduler::new();
        assert!(!scheduler.take_continuation_request());
        scheduler.schedule_continuation();
        scheduler.schedule_continuation();
        assert!(scheduler.take_continuation_request());
        assert!(!scheduler.take_continuation_request());
    }

    #[test]
    fn waker_fires_on_schedule() {
        let scheduler = StdScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&fired);
        scheduler.set_waker(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.schedule_continuation();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        scheduler.clear_waker();
        scheduler.schedule_continuation();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
