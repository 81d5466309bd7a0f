//! Logical flows of control.
//!
//! A flow is the unit of ownership for the reentrancy guard: a plain thread
//! outside any async runtime, or a chain of asynchronous continuations
//! derived from one initiating call.
//! Flows are identified by a [`FlowContext`] handle that callers pass down
//! their call chain. Clones of a context denote the same flow.
//!
//! Async code can also bind a flow to the running task with
//! [`FlowContext::scope`]. The binding lives in task-local storage, so it
//! follows the future when the runtime resumes it on another worker thread.
//!
//! # Example
//!
//! ```ignore
//! use flowguard_core::{FlowContext, ReentrancyGuard};
//!
//! let guard = ReentrancyGuard::new();
//! let flow = FlowContext::new();
//!
//! flow.clone()
//!     .scope(async move {
//!         let outer = guard.enter_async(&FlowContext::current()).await?;
//!         tokio::task::yield_now().await;
//!         // Same flow, possibly a different worker thread.
//!         let inner = guard.enter(&FlowContext::current())?;
//!         drop(inner);
//!         drop(outer);
//!         Ok::<_, flowguard_core::GuardError>(())
//!     })
//!     .await?;
//! ```

use std::fmt;
use std::future::Future;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

static NEXT_FLOW_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static CURRENT_FLOW: FlowContext;
}

// Only consulted outside a tokio runtime.
thread_local! {
    static THREAD_FLOW: FlowContext = FlowContext::new();
}

/// Process-unique identifier of a logical flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId(NonZeroU64);

impl FlowId {
    fn next() -> Self {
        let raw = NEXT_FLOW_ID.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Rebuild an id from its raw value. Zero is never a valid id.
    pub(crate) fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw numeric value of the id.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow-{}", self.0)
    }
}

/// Handle to a logical flow of control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowContext {
    id: FlowId,
}

impl FlowContext {
    /// Start a new, unrelated flow.
    pub fn new() -> Self {
        Self { id: FlowId::next() }
    }

    /// Identifier of this flow.
    pub fn id(&self) -> FlowId {
        self.id
    }

    /// The flow bound to the running task, if any.
    pub fn try_current() -> Option<Self> {
        CURRENT_FLOW.try_with(Clone::clone).ok()
    }

    /// The flow bound to the running task or closure, if any; otherwise a
    /// flow derived from where the call runs.
    ///
    /// On a plain thread outside any tokio runtime, the thread is its own
    /// root flow and every call returns it. Inside a runtime, worker and
    /// blocking-pool threads are shared by unrelated tasks, so each unbound
    /// call starts a fresh flow. Code that nests entries there must bind a
    /// flow with [`scope`](Self::scope) or [`sync_scope`](Self::sync_scope),
    /// or pass one [`FlowContext`] down explicitly.
    pub fn current() -> Self {
        if let Some(flow) = Self::try_current() {
            return flow;
        }
        if Handle::try_current().is_ok() {
            return Self::new();
        }
        THREAD_FLOW.with(Clone::clone)
    }

    /// Run `future` with this flow bound as the task's current flow.
    pub async fn scope<F>(self, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_FLOW.scope(self, future).await
    }

    /// Run `f` with this flow bound as the current flow.
    pub fn sync_scope<F, R>(self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        CURRENT_FLOW.sync_scope(self, f)
    }

    /// Spawn a continuation of this flow onto the tokio runtime.
    ///
    /// The spawned task is the same flow for guard purposes: it may re-enter
    /// a guard held by the spawning code.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(self.clone().scope(future))
    }
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::new()
    }
}
