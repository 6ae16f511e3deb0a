//! Testing utilities and harness for the Strand fiber engine.

pub mod harness;
pub mod memory_surface;

pub use harness::{CountingScheduler, ImmediateDeadline, StepDeadline, TestHost};
pub use memory_surface::{MemoryNode, MemoryNodeKind, MemorySurface, SurfaceOp};

pub mod prelude {
    pub use crate::harness::*;
    pub use crate::memory_surface::*;
}
