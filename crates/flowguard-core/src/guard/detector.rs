//! The reentrancy guard.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::state::GuardState;
use super::token::{Admission, GuardToken};
use crate::error::{GuardError, GuardResult};
use crate::flow::{FlowContext, FlowId};

/// Detects concurrent use of a non-thread-safe session.
///
/// One guard is created per protected session. Every unit of work on the
/// session enters the guard and drops the returned [`GuardToken`] when it
/// finishes. The flow that holds the guard may re-enter it freely; any
/// other flow is either rejected ([`enter`](Self::enter)) or queued
/// ([`enter_async`](Self::enter_async)) until the holder's outermost token
/// is released.
///
/// Cloning a guard yields another handle to the same state.
#[derive(Clone)]
pub struct ReentrancyGuard {
    state: Arc<GuardState>,
}

impl ReentrancyGuard {
    /// Create a free guard.
    pub fn new() -> Self {
        Self {
            state: Arc::new(GuardState::new()),
        }
    }

    /// Enter the guard without waiting.
    ///
    /// Fails with [`GuardError::ConcurrentAccessDetected`] if an unrelated
    /// flow holds the guard. Never blocks.
    pub fn enter(&self, flow: &FlowContext) -> GuardResult<GuardToken> {
        self.state.ensure_live()?;
        let admission = self.state.try_enter(flow)?;
        Ok(self.token(admission))
    }

    /// Enter the guard, waiting for admission if another flow holds it.
    pub async fn enter_async(&self, flow: &FlowContext) -> GuardResult<GuardToken> {
        self.enter_async_with_cancel(flow, std::future::pending()).await
    }

    /// Enter the guard, waiting for admission until `cancel` resolves.
    ///
    /// A flow that already holds the guard re-enters immediately and
    /// `cancel` is not consulted. Otherwise a cancellation that wins the
    /// race (including one that has already fired) yields
    /// [`GuardError::OperationCancelled`] and leaves the guard untouched.
    pub async fn enter_async_with_cancel<C>(
        &self,
        flow: &FlowContext,
        cancel: C,
    ) -> GuardResult<GuardToken>
    where
        C: Future<Output = ()>,
    {
        self.state.ensure_live()?;

        if self.state.try_reenter(flow) {
            return Ok(self.token(Admission::Reentrant));
        }

        let permit = tokio::select! {
            biased;
            () = cancel => return Err(GuardError::OperationCancelled),
            acquired = self.state.admission().acquire() => {
                acquired.map_err(|_| GuardError::GuardDisposed)?
            }
        };
        permit.forget();

        self.state.occupy(flow);
        Ok(self.token(Admission::Waited))
    }

    /// Tear down the guard.
    ///
    /// Pending waiters and later entries fail with
    /// [`GuardError::GuardDisposed`], as does a second teardown.
    pub fn dispose(&self) -> GuardResult<()> {
        self.state.dispose()
    }

    /// Whether the guard has been torn down.
    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// Whether any flow currently holds the guard.
    pub fn is_occupied(&self) -> bool {
        self.state.depth() > 0
    }

    /// Current nesting depth of the holding flow (0 when free).
    pub fn nesting_depth(&self) -> usize {
        self.state.depth()
    }

    /// Whether `flow` currently holds the guard.
    pub fn is_held_by(&self, flow: &FlowContext) -> bool {
        self.state.is_held_by(flow)
    }

    /// The flow currently holding the guard.
    pub fn holder(&self) -> Option<FlowId> {
        self.state.holder()
    }

    fn token(&self, admission: Admission) -> GuardToken {
        GuardToken::new(Arc::clone(&self.state), admission)
    }
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReentrancyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReentrancyGuard")
            .field("holder", &self.holder())
            .field("nesting_depth", &self.nesting_depth())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
