//! Core runtime pieces for the Strand fiber engine.
//!
//! Strand turns immutable [`Element`] trees into live render-surface
//! mutations. Each render request seeds a work-in-progress fiber tree that
//! the cooperative work loop reconciles against the previously committed
//! generation one fiber at a time, yielding between fibers when the host's
//! time budget runs out. Once the walk completes, the accumulated effects
//! are committed to the [`RenderSurface`] in a single uninterrupted pass
//! and the new tree is promoted to current.
//!
//! The engine owns all of its scheduling state; independently rendered
//! trees get independent [`Engine`] instances and never observe each
//! other.

pub mod element;
pub mod fiber;
pub mod hooks;
pub mod platform;
pub mod surface;

pub use element::{
    AttrValue, Attributes, ComponentFn, Element, ElementKind, EventHandler, NODE_VALUE,
};
pub use fiber::{EffectTag, FiberId};
pub use hooks::{use_state, SetState};
pub use platform::{ContinuationScheduler, Deadline, NoopScheduler};
pub use surface::{RenderSurface, SurfaceError, SurfaceId};

use std::cell::Cell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

use fiber::{Fiber, FiberArena};
use hooks::{install_hook_context, HookContext};

/// Budget floor below which the work loop yields back to the host.
const YIELD_SLICE: Duration = Duration::from_millis(1);

/// Fatal engine failures. There is no retry policy: a render pass either
/// completes its full work-loop/commit cycle or is wholly superseded by a
/// later one, so every variant here means the current pass is aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A pass was requested before anything was rendered.
    NotMounted,
    /// Reconciliation or commit ran without a seeded pass.
    NoActivePass,
    /// A fiber handle resolved to a freed or never-allocated slot.
    FiberMissing { fiber: FiberId },
    /// A committed fiber had no surface-bearing ancestor to attach to.
    NoSurfaceAncestor { fiber: FiberId },
    /// The render surface rejected an operation.
    Surface(SurfaceError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotMounted => write!(f, "no element has been rendered yet"),
            EngineError::NoActivePass => write!(f, "no render pass is active"),
            EngineError::FiberMissing { fiber } => write!(f, "fiber {fiber} missing"),
            EngineError::NoSurfaceAncestor { fiber } => {
                write!(f, "fiber {fiber} has no surface-bearing ancestor")
            }
            EngineError::Surface(err) => write!(f, "render surface failure: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Surface(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SurfaceError> for EngineError {
    fn from(err: SurfaceError) -> Self {
        EngineError::Surface(err)
    }
}

pub(crate) struct HandleInner {
    pass_requested: Cell<bool>,
    scheduler: Arc<dyn ContinuationScheduler>,
}

impl HandleInner {
    fn take_pass_request(&self) -> bool {
        self.pass_requested.replace(false)
    }
}

/// Shared handle into an engine's invalidation channel.
///
/// Hook setters hold one of these; requesting a pass marks the committed
/// tree dirty and pings the host scheduler. A handle that outlives its
/// engine degrades to a no-op.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Weak<HandleInner>,
}

impl EngineHandle {
    pub fn request_render_pass(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.pass_requested.set(true);
            inner.scheduler.schedule_continuation();
        }
    }
}

/// The reconciliation engine for one rendered tree.
///
/// Owns the fiber arena, the work-in-progress and committed roots, the
/// deletion set, and the render surface. All state is per-instance so
/// multiple engines can coexist in one process.
pub struct Engine<S: RenderSurface> {
    surface: S,
    arena: FiberArena,
    current_root: Option<FiberId>,
    wip_root: Option<FiberId>,
    next_unit: Option<FiberId>,
    /// Present exactly while a pass is active; consumed by the committer.
    deletions: Option<Vec<FiberId>>,
    root_element: Option<Element>,
    container: Option<SurfaceId>,
    shared: Rc<HandleInner>,
}

impl<S: RenderSurface> Engine<S> {
    pub fn new(surface: S) -> Self {
        Self::with_scheduler(surface, Arc::new(NoopScheduler))
    }

    pub fn with_scheduler(surface: S, scheduler: Arc<dyn ContinuationScheduler>) -> Self {
        Self {
            surface,
            arena: FiberArena::new(),
            current_root: None,
            wip_root: None,
            next_unit: None,
            deletions: None,
            root_element: None,
            container: None,
            shared: Rc::new(HandleInner {
                pass_requested: Cell::new(false),
                scheduler,
            }),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            inner: Rc::downgrade(&self.shared),
        }
    }

    /// Whether another [`run`](Engine::run) call would make progress.
    pub fn has_pending_work(&self) -> bool {
        self.next_unit.is_some()
            || self.wip_root.is_some()
            || self.shared.pass_requested.get()
    }

    /// Live fibers in the arena, for diagnostics and leak assertions.
    pub fn live_fiber_count(&self) -> usize {
        self.arena.len_live()
    }

    /// Seeds a work-in-progress root whose single child is `element` and
    /// asks the host to schedule the work loop. Any unfinished pass is
    /// abandoned, not merged.
    pub fn render(&mut self, element: Element, container: SurfaceId) -> Result<(), EngineError> {
        self.root_element = Some(element);
        self.container = Some(container);
        self.begin_pass()?;
        self.shared.scheduler.schedule_continuation();
        Ok(())
    }

    /// Drives the work loop until the deadline runs out or the pass
    /// commits. Processes at least one fiber per call; a fiber's
    /// materialize-and-reconcile step is indivisible. When the walk
    /// finishes, the commit runs synchronously in the same call - it is
    /// never split across yields.
    pub fn run(&mut self, deadline: &dyn Deadline) -> Result<(), EngineError> {
        loop {
            if self.shared.take_pass_request() {
                self.begin_pass()?;
            }
            let Some(unit) = self.next_unit else { break };
            self.next_unit = self.perform_unit(unit)?;
            if self.next_unit.is_some() && deadline.time_remaining() < YIELD_SLICE {
                log::trace!("work loop yielding with work remaining");
                self.shared.scheduler.schedule_continuation();
                return Ok(());
            }
        }
        if self.wip_root.is_some() {
            self.commit_root()?;
        }
        Ok(())
    }

    fn fiber(&self, id: FiberId) -> Result<&Fiber, EngineError> {
        self.arena.get(id).ok_or(EngineError::FiberMissing { fiber: id })
    }

    fn fiber_mut(&mut self, id: FiberId) -> Result<&mut Fiber, EngineError> {
        self.arena
            .get_mut(id)
            .ok_or(EngineError::FiberMissing { fiber: id })
    }

    /// Starts a fresh pass rooted at the last committed tree, discarding
    /// any in-flight pass.
    fn begin_pass(&mut self) -> Result<(), EngineError> {
        let element = self.root_element.clone().ok_or(EngineError::NotMounted)?;
        let container = self.container.ok_or(EngineError::NotMounted)?;
        if let Some(abandoned) = self.wip_root.take() {
            log::debug!("superseding in-flight pass");
            self.free_tree(abandoned);
        }
        let root = self
            .arena
            .alloc(Fiber::root(container, vec![element], self.current_root));
        self.wip_root = Some(root);
        self.next_unit = Some(root);
        self.deletions = Some(Vec::new());
        Ok(())
    }

    /// Processes one fiber and returns the next unit in depth-first
    /// preorder: the fiber's child if it has one, otherwise the sibling of
    /// the nearest ancestor that has one.
    fn perform_unit(&mut self, id: FiberId) -> Result<Option<FiberId>, EngineError> {
        if self.fiber(id)?.is_component() {
            self.update_component(id)?;
        } else {
            self.update_host(id)?;
        }

        if let Some(child) = self.fiber(id)?.child {
            return Ok(Some(child));
        }
        let mut cursor = id;
        loop {
            let fiber = self.fiber(cursor)?;
            if let Some(sibling) = fiber.sibling {
                return Ok(Some(sibling));
            }
            match fiber.parent {
                Some(parent) => cursor = parent,
                None => return Ok(None),
            }
        }
    }

    /// Evaluates a component fiber under an installed hook context and
    /// reconciles the single element it renders. No surface node is
    /// created for the component itself.
    fn update_component(&mut self, id: FiberId) -> Result<(), EngineError> {
        let (func, attrs) = {
            let fiber = self.fiber(id)?;
            match &fiber.kind {
                ElementKind::Component(func) => (*func, fiber.attrs.clone()),
                _ => unreachable!("update_component on a host fiber"),
            }
        };
        let prev = match self.fiber(id)?.alternate {
            Some(alt) => self.fiber(alt)?.hooks.clone(),
            None => Vec::new(),
        };

        let mut ctx = HookContext {
            prev,
            next: Vec::new(),
            index: 0,
            handle: self.handle(),
        };
        let child = install_hook_context(&mut ctx, || func(&attrs));

        self.fiber_mut(id)?.hooks = ctx.next;
        self.reconcile_children(id, vec![child])
    }

    /// Materializes a host fiber's surface node if it has none yet, then
    /// reconciles its children.
    fn update_host(&mut self, id: FiberId) -> Result<(), EngineError> {
        if self.fiber(id)?.surface.is_none() {
            let kind = self.fiber(id)?.kind.clone();
            let sid = match &kind {
                ElementKind::Text => self.surface.create_text("")?,
                ElementKind::Host(tag) => self.surface.create_node(tag)?,
                ElementKind::Component(_) => unreachable!("component fibers have no surface"),
            };
            let Engine { surface, arena, .. } = self;
            let fiber = arena
                .get_mut(id)
                .ok_or(EngineError::FiberMissing { fiber: id })?;
            fiber.surface = Some(sid);
            // The node is still detached; nothing observes these writes
            // until the commit appends it.
            let empty = Attributes::default();
            apply_attributes(surface, sid, &empty, &fiber.attrs)?;
        }

        let children = mem::take(&mut self.fiber_mut(id)?.children);
        self.reconcile_children(id, children)
    }

    /// Walks the previous generation's child chain and the new element
    /// list in lockstep by position. Matching kinds reuse the old fiber's
    /// identity; mismatches place a fresh fiber and mark the old one for
    /// deletion. Trailing old fibers delete, trailing new elements place.
    fn reconcile_children(
        &mut self,
        wip: FiberId,
        elements: Vec<Element>,
    ) -> Result<(), EngineError> {
        if self.deletions.is_none() {
            return Err(EngineError::NoActivePass);
        }

        let mut old = match self.fiber(wip)?.alternate {
            Some(alt) => self.fiber(alt)?.child,
            None => None,
        };
        let mut elements = elements.into_iter();
        let mut prev_sibling: Option<FiberId> = None;
        let mut first = true;
        let mut removed: Vec<FiberId> = Vec::new();

        loop {
            let element = elements.next();
            if element.is_none() && old.is_none() {
                break;
            }

            let same_kind = match (&element, old) {
                (Some(el), Some(o)) => self.fiber(o)?.kind == el.kind,
                _ => false,
            };

            let new_fiber = match (element, old) {
                (Some(el), Some(o)) if same_kind => {
                    let surface = self.fiber(o)?.surface;
                    let mut fiber = Fiber::new(el.kind, el.attrs, el.children, wip);
                    fiber.surface = surface;
                    fiber.alternate = Some(o);
                    fiber.effect = EffectTag::Update;
                    Some(self.arena.alloc(fiber))
                }
                (Some(el), o) => {
                    if let Some(o) = o {
                        self.fiber_mut(o)?.effect = EffectTag::Delete;
                        removed.push(o);
                    }
                    let mut fiber = Fiber::new(el.kind, el.attrs, el.children, wip);
                    fiber.effect = EffectTag::Place;
                    Some(self.arena.alloc(fiber))
                }
                (None, Some(o)) => {
                    self.fiber_mut(o)?.effect = EffectTag::Delete;
                    removed.push(o);
                    None
                }
                (None, None) => None,
            };

            if let Some(o) = old {
                old = self.fiber(o)?.sibling;
            }

            if first {
                self.fiber_mut(wip)?.child = new_fiber;
                first = false;
            } else if let (Some(prev), Some(next)) = (prev_sibling, new_fiber) {
                self.fiber_mut(prev)?.sibling = Some(next);
            }
            if new_fiber.is_some() {
                prev_sibling = new_fiber;
            }
        }

        if let Some(deletions) = self.deletions.as_mut() {
            deletions.extend(removed);
        }
        Ok(())
    }

    /// Applies every accumulated effect to the surface in one pass, then
    /// publishes the work-in-progress tree as current.
    fn commit_root(&mut self) -> Result<(), EngineError> {
        let deletions = self.deletions.take().ok_or(EngineError::NoActivePass)?;
        let wip = self.wip_root.take().ok_or(EngineError::NoActivePass)?;

        for id in &deletions {
            self.commit_deletion(*id)?;
        }
        let first_child = self.fiber(wip)?.child;
        self.commit_work(first_child)?;
        log::debug!("committed generation with {} deletion(s)", deletions.len());

        let previous = self.current_root.replace(wip);
        if let Some(old_root) = previous {
            self.free_tree(old_root);
        }
        // The generation the alternates pointed into is gone; clearing
        // them keeps freed (and potentially reused) slots unreachable.
        self.clear_alternates(wip);
        Ok(())
    }

    /// Removes the deleted fiber's surface node - or, for a component
    /// boundary with no node of its own, the nearest host descendant's -
    /// from the nearest surface-bearing ancestor.
    fn commit_deletion(&mut self, id: FiberId) -> Result<(), EngineError> {
        let parent_surface = self.surface_ancestor(id)?;
        let mut cursor = id;
        let target = loop {
            let fiber = self.fiber(cursor)?;
            if let Some(sid) = fiber.surface {
                break Some(sid);
            }
            match fiber.child {
                Some(child) => cursor = child,
                None => break None,
            }
        };
        if let Some(sid) = target {
            self.surface.remove_child(parent_surface, sid)?;
        }
        Ok(())
    }

    fn commit_work(&mut self, entry: Option<FiberId>) -> Result<(), EngineError> {
        let Some(id) = entry else { return Ok(()) };
        let (effect, surface_id, child, sibling) = {
            let fiber = self.fiber(id)?;
            (fiber.effect, fiber.surface, fiber.child, fiber.sibling)
        };

        match effect {
            EffectTag::Place => {
                if let Some(sid) = surface_id {
                    let parent = self.surface_ancestor(id)?;
                    self.surface.append_child(parent, sid)?;
                }
            }
            EffectTag::Update => {
                if let Some(sid) = surface_id {
                    let Engine { surface, arena, .. } = self;
                    let fiber = arena
                        .get(id)
                        .ok_or(EngineError::FiberMissing { fiber: id })?;
                    let empty = Attributes::default();
                    let old_attrs = match fiber.alternate.and_then(|alt| arena.get(alt)) {
                        Some(alt) => &alt.attrs,
                        None => &empty,
                    };
                    apply_attributes(surface, sid, old_attrs, &fiber.attrs)?;
                }
            }
            // Deletions were consumed from the deletion set already.
            EffectTag::Delete => {}
            EffectTag::None => {}
        }

        self.commit_work(child)?;
        self.commit_work(sibling)
    }

    /// Nearest ancestor with a surface node, for attaching and detaching.
    fn surface_ancestor(&self, id: FiberId) -> Result<SurfaceId, EngineError> {
        let mut cursor = self.fiber(id)?.parent;
        while let Some(pid) = cursor {
            let fiber = self.fiber(pid)?;
            if let Some(sid) = fiber.surface {
                return Ok(sid);
            }
            cursor = fiber.parent;
        }
        Err(EngineError::NoSurfaceAncestor { fiber: id })
    }

    /// Frees every fiber reachable from `root` through child/sibling
    /// links. Alternate links are deliberately not followed.
    fn free_tree(&mut self, root: FiberId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(fiber) = self.arena.free(id) {
                if let Some(child) = fiber.child {
                    stack.push(child);
                }
                if let Some(sibling) = fiber.sibling {
                    stack.push(sibling);
                }
            }
        }
    }

    fn clear_alternates(&mut self, root: FiberId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(fiber) = self.arena.get_mut(id) {
                fiber.alternate = None;
                if let Some(child) = fiber.child {
                    stack.push(child);
                }
                if let Some(sibling) = fiber.sibling {
                    stack.push(sibling);
                }
            }
        }
    }
}

fn event_name(attr: &str) -> String {
    attr.strip_prefix("on").unwrap_or(attr).to_ascii_lowercase()
}

/// Diffs two attribute sets onto a surface node: stale listeners come
/// off, gone properties are removed, new or changed properties are set,
/// then new or changed listeners go on.
fn apply_attributes<S: RenderSurface>(
    surface: &mut S,
    node: SurfaceId,
    old: &Attributes,
    new: &Attributes,
) -> Result<(), SurfaceError> {
    for (name, value) in old {
        if !value.is_handler() {
            continue;
        }
        let replaced = new.get(name).map_or(true, |next| next != value);
        if replaced {
            surface.remove_listener(node, &event_name(name))?;
        }
    }
    for (name, value) in old {
        if value.is_handler() {
            continue;
        }
        if !new.contains_key(name) {
            surface.remove_property(node, name)?;
        }
    }
    for (name, value) in new {
        if value.is_handler() {
            continue;
        }
        if old.get(name) != Some(value) {
            surface.set_property(node, name, value)?;
        }
    }
    for (name, value) in new {
        if let AttrValue::Handler(handler) = value {
            let changed = old.get(name).map_or(true, |prev| prev != value);
            if changed {
                surface.add_listener(node, &event_name(name), handler.clone())?;
            }
        }
    }
    Ok(())
}

