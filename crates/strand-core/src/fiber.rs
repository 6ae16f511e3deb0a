//! The mutable work tree.
//!
//! Fibers form a left-child/right-sibling tree with parent back-links, so
//! the scheduler can walk up without a recursion stack tied to tree
//! depth. They live in an arena addressed by stable [`FiberId`] handles;
//! `child`, `sibling`, `parent` and `alternate` are all plain handles
//! into that arena, which sidesteps cyclic ownership entirely.
//!
//! `alternate`, when present, names the fiber occupying the same tree
//! position in the previously committed generation. It is a lookup aid
//! for diffing and hook continuity, never an ownership edge, and is
//! cleared when the previous generation is freed.

use crate::element::{Attributes, Element, ElementKind};
use crate::hooks::Hook;
use crate::surface::SurfaceId;

/// Stable handle to a fiber in the arena.
pub type FiberId = usize;

/// What the committer must do for a fiber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectTag {
    None,
    Place,
    Update,
    Delete,
}

pub(crate) struct Fiber {
    pub(crate) kind: ElementKind,
    pub(crate) attrs: Attributes,
    /// Desired child elements, consumed when this fiber's children are
    /// reconciled.
    pub(crate) children: Vec<Element>,
    pub(crate) surface: Option<SurfaceId>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) alternate: Option<FiberId>,
    pub(crate) effect: EffectTag,
    pub(crate) hooks: Vec<Hook>,
}

impl Fiber {
    pub(crate) fn new(
        kind: ElementKind,
        attrs: Attributes,
        children: Vec<Element>,
        parent: FiberId,
    ) -> Self {
        Self {
            kind,
            attrs,
            children,
            surface: None,
            parent: Some(parent),
            child: None,
            sibling: None,
            alternate: None,
            effect: EffectTag::None,
            hooks: Vec::new(),
        }
    }

    /// Root fiber for a work-in-progress generation. It carries the mount
    /// point's surface handle; its tag is never inspected by the diff.
    pub(crate) fn root(
        container: SurfaceId,
        children: Vec<Element>,
        alternate: Option<FiberId>,
    ) -> Self {
        Self {
            kind: ElementKind::Host(String::new()),
            attrs: Attributes::default(),
            children,
            surface: Some(container),
            parent: None,
            child: None,
            sibling: None,
            alternate,
            effect: EffectTag::None,
            hooks: Vec::new(),
        }
    }

    pub(crate) fn is_component(&self) -> bool {
        matches!(self.kind, ElementKind::Component(_))
    }
}

/// Slab of fibers. Slots are reused through a free list so long-running
/// update loops do not grow the arena without bound.
#[derive(Default)]
pub(crate) struct FiberArena {
    slots: Vec<Option<Fiber>>,
    free: Vec<FiberId>,
}

impl FiberArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(&mut self, fiber: Fiber) -> FiberId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(fiber);
                id
            }
            None => {
                self.slots.push(Some(fiber));
                self.slots.len() - 1
            }
        }
    }

    pub(crate) fn get(&self, id: FiberId) -> Option<&Fiber> {
        self.slots.get(id).and_then(|slot| slot.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber> {
        self.slots.get_mut(id).and_then(|slot| slot.as_mut())
    }

    pub(crate) fn free(&mut self, id: FiberId) -> Option<Fiber> {
        let fiber = self.slots.get_mut(id).and_then(|slot| slot.take());
        if fiber.is_some() {
            self.free.push(id);
        }
        fiber
    }

    /// Number of live fibers, for tests and diagnostics.
    pub(crate) fn len_live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
