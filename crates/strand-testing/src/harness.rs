//! Deadline stubs, a recording scheduler, and a host that drives an
//! engine over a [`MemorySurface`] until it settles.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use strand_core::{ContinuationScheduler, Deadline, Element, Engine, EngineError, SurfaceId};

use crate::memory_surface::MemorySurface;

/// Upper bound on settle iterations before the harness declares the
/// engine stuck.
const MAX_PUMP_STEPS: usize = 10_000;

/// Deadline with an effectively unlimited budget; the work loop never
/// yields under it.
#[derive(Debug, Default)]
pub struct ImmediateDeadline;

impl Deadline for ImmediateDeadline {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }
}

/// Deadline that grants a fixed number of budget queries before
/// expiring, which pins down exactly how many fibers one `run` call may
/// process. Useful for exercising the suspension point.
#[derive(Debug)]
pub struct StepDeadline {
    remaining: Cell<usize>,
}

impl StepDeadline {
    pub fn new(units: usize) -> Self {
        Self {
            remaining: Cell::new(units),
        }
    }
}

impl Deadline for StepDeadline {
    fn time_remaining(&self) -> Duration {
        let remaining = self.remaining.get();
        if remaining == 0 {
            return Duration::ZERO;
        }
        self.remaining.set(remaining - 1);
        Duration::from_millis(16)
    }
}

/// Scheduler that counts continuation requests.
#[derive(Debug, Default)]
pub struct CountingScheduler {
    requests: AtomicUsize,
}

impl CountingScheduler {
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl ContinuationScheduler for CountingScheduler {
    fn schedule_continuation(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Test host bundling an engine, an in-memory surface, and a container
/// node, with a settle loop in the style of a frame-driving shell.
pub struct TestHost {
    engine: Engine<MemorySurface>,
    scheduler: Arc<CountingScheduler>,
    container: SurfaceId,
}

impl TestHost {
    pub fn new() -> Self {
        let mut surface = MemorySurface::new();
        let container = surface.create_container();
        let scheduler = Arc::new(CountingScheduler::default());
        let engine = Engine::with_scheduler(surface, scheduler.clone());
        Self {
            engine,
            scheduler,
            container,
        }
    }

    pub fn container(&self) -> SurfaceId {
        self.container
    }

    pub fn engine(&self) -> &Engine<MemorySurface> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<MemorySurface> {
        &mut self.engine
    }

    pub fn surface(&self) -> &MemorySurface {
        self.engine.surface()
    }

    pub fn surface_mut(&mut self) -> &mut MemorySurface {
        self.engine.surface_mut()
    }

    pub fn scheduler(&self) -> &CountingScheduler {
        &self.scheduler
    }

    pub fn render(&mut self, element: Element) -> Result<(), EngineError> {
        self.engine.render(element, self.container)
    }

    /// Runs the engine with an unlimited budget until no work is pending.
    pub fn pump(&mut self) -> Result<(), EngineError> {
        for _ in 0..MAX_PUMP_STEPS {
            if !self.engine.has_pending_work() {
                return Ok(());
            }
            self.engine.run(&ImmediateDeadline)?;
        }
        panic!("engine failed to settle after {MAX_PUMP_STEPS} steps");
    }

    /// Runs one work slice under the given deadline.
    pub fn run_slice(&mut self, deadline: &dyn Deadline) -> Result<(), EngineError> {
        self.engine.run(deadline)
    }

    /// Fires the listener for `event` on `node`, returning whether one
    /// was attached.
    pub fn fire(&self, node: SurfaceId, event: &str) -> bool {
        self.surface().fire(node, event)
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}
