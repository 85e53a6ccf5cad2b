//! Per-flow stack of the "current" trace context.
//!
//! # Responsibilities
//! - Track which trace context is current for a logical flow
//! - Push a context on scope entry, restore the previous one on exit
//! - Keep concurrent flows isolated from each other
//!
//! # Design Decisions
//! - Inside a flow the stack lives in a tokio task-local, so it follows the
//!   future across `.await` points and worker threads
//! - A thread-local stack serves synchronous callers, and only when no tokio
//!   runtime is entered on the thread; a worker thread is shared by many
//!   tasks, so its thread-local would leak scopes between them
//! - On a runtime but outside any flow, scopes are detached: nothing is
//!   pushed and nothing is current
//! - Frames are keyed by id; a handle only ever removes its own frame

use std::cell::RefCell;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::TraceContext;

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static FLOW: RefCell<FlowStack>;
}

thread_local! {
    static THREAD: RefCell<FlowStack> = RefCell::new(FlowStack::default());
}

/// One entry on the context stack.
#[derive(Debug, Clone, Copy)]
struct Frame {
    id: u64,
    /// Context that was current when this frame was pushed.
    previous: Option<TraceContext>,
    /// Context observed as current while this frame is on top.
    current: Option<TraceContext>,
}

#[derive(Debug, Default)]
struct FlowStack {
    base: Option<TraceContext>,
    frames: Vec<Frame>,
}

impl FlowStack {
    fn seeded(base: Option<TraceContext>) -> Self {
        Self {
            base,
            frames: Vec::new(),
        }
    }

    fn current(&self) -> Option<TraceContext> {
        self.frames.last().map_or(self.base, |frame| frame.current)
    }

    fn push(&mut self, id: u64, context: Option<TraceContext>) {
        let previous = self.current();
        // An absent context shadows nothing: the previous value stays current.
        let current = context.or(previous);
        self.frames.push(Frame {
            id,
            previous,
            current,
        });
    }

    fn pop(&mut self, id: u64) -> Option<Frame> {
        let pos = self.frames.iter().rposition(|frame| frame.id == id)?;
        Some(self.frames.remove(pos))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    Flow,
    Thread,
    /// Async code outside any flow. No ambient state is visible.
    Detached,
}

impl Storage {
    fn active() -> Self {
        if FLOW.try_with(|_| ()).is_ok() {
            Storage::Flow
        } else if tokio::runtime::Handle::try_current().is_err() {
            Storage::Thread
        } else {
            Storage::Detached
        }
    }

    fn with<R>(self, f: impl FnOnce(&mut FlowStack) -> R) -> Option<R> {
        match self {
            Storage::Flow => FLOW.try_with(|cell| f(&mut cell.borrow_mut())).ok(),
            Storage::Thread => THREAD.try_with(|cell| f(&mut cell.borrow_mut())).ok(),
            Storage::Detached => None,
        }
    }
}

/// Entry points for the scoped context stack.
pub struct ContextStack;

impl ContextStack {
    /// Make `context` current until the returned handle exits.
    ///
    /// `None` pushes a frame that keeps the previous context current, so the
    /// handle can be treated uniformly whether or not a span was started.
    ///
    /// Async code must run inside [`ContextStack::in_flow`]. Called on a tokio
    /// runtime outside any flow, this returns an inactive handle and the
    /// context is not made current.
    pub fn enter(context: Option<TraceContext>) -> ScopeHandle {
        let id = NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed);
        let storage = Storage::active();
        if storage == Storage::Detached && context.is_some() {
            tracing::warn!(
                context = ?context,
                "Context scope entered on a runtime outside a flow; wrap the task in ContextStack::in_flow"
            );
        }
        let pushed = storage.with(|stack| stack.push(id, context)).is_some();
        ScopeHandle {
            id,
            storage,
            active: pushed,
        }
    }

    /// The context current for this flow, if any. Always `None` on a runtime
    /// outside any flow.
    pub fn current() -> Option<TraceContext> {
        Storage::active()
            .with(|stack| stack.current())
            .flatten()
    }

    /// Whether the caller is running inside a flow created by [`ContextStack::in_flow`].
    pub fn is_in_flow() -> bool {
        Storage::active() == Storage::Flow
    }

    /// Run `fut` in a new flow seeded with the caller's current context.
    ///
    /// The seed is captured when this function is called, which makes it the
    /// way to carry the current context into a spawned task:
    ///
    /// ```rust,no_run
    /// # use pipeline_observe::context::ContextStack;
    /// # async fn work() {}
    /// # async fn demo() {
    /// tokio::spawn(ContextStack::in_flow(work()));
    /// # }
    /// ```
    pub fn in_flow<F>(fut: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let seed = Self::current();
        FLOW.scope(RefCell::new(FlowStack::seeded(seed)), fut)
    }
}

/// Handle for an entered scope. Exiting restores the context that was current
/// right before the matching [`ContextStack::enter`].
#[must_use = "dropping the handle exits the scope immediately"]
#[derive(Debug)]
pub struct ScopeHandle {
    id: u64,
    storage: Storage,
    active: bool,
}

impl ScopeHandle {
    /// Exit the scope. Calling this more than once has no further effect.
    pub fn exit(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(Some(frame)) = self.storage.with(|stack| stack.pop(self.id)) {
            tracing::trace!(
                frame = frame.id,
                restored = ?frame.previous,
                "Context scope exited"
            );
        }
    }

    /// True until the scope has been exited.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        self.exit();
    }
}
