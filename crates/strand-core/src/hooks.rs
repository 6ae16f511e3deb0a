//! Positionally addressed component state.
//!
//! While the reconciler evaluates a component fiber it installs a
//! [`HookContext`] into a thread-local stack; [`use_state`] reads it back
//! out. Hooks are addressed by call order within one evaluation, so the
//! Nth `use_state` call of generation N+1 continues the state of the Nth
//! call of generation N, looked up through the fiber's alternate.
//!
//! The context is installed per fiber evaluation and popped by a drop
//! guard, so a panicking component cannot leak state into the next one.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::EngineHandle;

/// Type-erased per-position state slot stored on a fiber.
pub(crate) type Hook = Rc<dyn Any>;

type Action<T> = Box<dyn Fn(&T) -> T>;

struct HookSlot<T> {
    value: T,
    queue: Rc<RefCell<Vec<Action<T>>>>,
}

pub(crate) struct HookContext {
    /// Hooks of the alternate (previously committed) fiber, read-only.
    pub(crate) prev: Vec<Hook>,
    /// Hooks being recorded for the fiber under evaluation.
    pub(crate) next: Vec<Hook>,
    pub(crate) index: usize,
    pub(crate) handle: EngineHandle,
}

thread_local! {
    static ACTIVE: RefCell<Vec<*mut HookContext>> = const { RefCell::new(Vec::new()) };
}

/// Installs `ctx` as the active hook context for the duration of `f`.
pub(crate) fn install_hook_context<R>(ctx: &mut HookContext, f: impl FnOnce() -> R) -> R {
    struct Guard;
    impl Drop for Guard {
        fn drop(&mut self) {
            ACTIVE.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }

    ACTIVE.with(|stack| {
        stack.borrow_mut().push(ctx as *mut HookContext);
    });
    let _guard = Guard;
    f()
}

fn with_hook_context<R>(f: impl FnOnce(&mut HookContext) -> R) -> R {
    let ptr = ACTIVE.with(|stack| stack.borrow().last().copied());
    let ptr = ptr.expect("state hook called outside component evaluation");
    // The pointer targets a stack frame of the engine's component
    // evaluation, which strictly outlives this call; the stack discipline
    // above guarantees it is still installed.
    let ctx = unsafe { &mut *ptr };
    f(ctx)
}

/// Setter half of a [`use_state`] pair.
///
/// Invoking it queues an action on the hook's persisted queue and asks the
/// engine for a fresh render pass rooted at the last committed tree. The
/// queued actions are folded, in enqueue order, the next time the owning
/// component is evaluated.
pub struct SetState<T> {
    queue: Rc<RefCell<Vec<Action<T>>>>,
    handle: EngineHandle,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
            handle: self.handle.clone(),
        }
    }
}

impl<T> SetState<T> {
    pub fn update(&self, action: impl Fn(&T) -> T + 'static) {
        self.queue.borrow_mut().push(Box::new(action));
        self.handle.request_render_pass();
    }
}

impl<T: Clone + 'static> SetState<T> {
    pub fn set(&self, value: T) {
        self.update(move |_| value.clone());
    }
}

/// Reads (and on first evaluation, seeds) the state slot at the current
/// hook position of the component being evaluated.
///
/// Callable only while a component fiber is evaluated; anywhere else this
/// is a programmer error and panics.
pub fn use_state<T: Clone + 'static>(initial: T) -> (T, SetState<T>) {
    with_hook_context(|ctx| {
        let index = ctx.index;
        ctx.index += 1;

        let prev = ctx
            .prev
            .get(index)
            .cloned()
            .and_then(|hook| hook.downcast::<HookSlot<T>>().ok());

        // A hook whose type changed between generations restarts from the
        // provided initial value.
        let mut value = match &prev {
            Some(slot) => slot.value.clone(),
            None => initial,
        };
        if let Some(slot) = &prev {
            // Folded by index so the queue is not borrowed while an
            // action runs; an action may touch a setter sharing it.
            let pending = slot.queue.borrow().len();
            for i in 0..pending {
                let next = {
                    let queue = slot.queue.borrow();
                    (queue[i])(&value)
                };
                value = next;
            }
        }

        let queue: Rc<RefCell<Vec<Action<T>>>> = Rc::new(RefCell::new(Vec::new()));
        ctx.next.push(Rc::new(HookSlot {
            value: value.clone(),
            queue: Rc::clone(&queue),
        }));

        let setter = SetState {
            queue,
            handle: ctx.handle.clone(),
        };
        (value, setter)
    })
}
