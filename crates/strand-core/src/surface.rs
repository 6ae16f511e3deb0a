//! The capability surface the engine consumes from its host environment.
//!
//! The engine never talks to a concrete display technology. Everything it
//! needs from the outside world is expressed through [`RenderSurface`]:
//! create nodes, move them, and poke named properties and listeners. A
//! DOM binding, a retained scene graph, or the in-memory surface used by
//! the test harness all fit behind this trait.

use std::fmt;

use crate::element::{AttrValue, EventHandler};

/// Stable handle to a node owned by the render surface.
pub type SurfaceId = usize;

/// Failures reported by a render-surface implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    Missing { id: SurfaceId },
    InvalidTarget { id: SurfaceId, operation: &'static str },
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceError::Missing { id } => write!(f, "surface node {id} missing"),
            SurfaceError::InvalidTarget { id, operation } => {
                write!(f, "surface node {id} does not support {operation}")
            }
        }
    }
}

impl std::error::Error for SurfaceError {}

/// Mutable render surface the committer applies effects to.
pub trait RenderSurface {
    /// Create a surface node for the given type tag.
    fn create_node(&mut self, tag: &str) -> Result<SurfaceId, SurfaceError>;

    /// Create a text-content node.
    fn create_text(&mut self, text: &str) -> Result<SurfaceId, SurfaceError>;

    /// Set a named property on a node, replacing any previous value.
    fn set_property(
        &mut self,
        node: SurfaceId,
        name: &str,
        value: &AttrValue,
    ) -> Result<(), SurfaceError>;

    /// Remove a named property from a node.
    fn remove_property(&mut self, node: SurfaceId, name: &str) -> Result<(), SurfaceError>;

    /// Attach a named event listener to a node.
    fn add_listener(
        &mut self,
        node: SurfaceId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), SurfaceError>;

    /// Detach the named event listener from a node.
    fn remove_listener(&mut self, node: SurfaceId, event: &str) -> Result<(), SurfaceError>;

    /// Append `child` as the last child of `parent`.
    fn append_child(&mut self, parent: SurfaceId, child: SurfaceId) -> Result<(), SurfaceError>;

    /// Remove `child` from `parent`.
    fn remove_child(&mut self, parent: SurfaceId, child: SurfaceId) -> Result<(), SurfaceError>;
}
