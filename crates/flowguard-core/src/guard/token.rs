//! Scoped acquisition tokens.

use std::fmt;
use std::sync::Arc;

use super::state::GuardState;
use crate::error::{GuardError, GuardResult};

/// How a token obtained its level of nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The flow already held the guard.
    Reentrant,
    /// Outermost entry granted without waiting.
    Immediate,
    /// Outermost entry granted through the asynchronous admission wait.
    Waited,
}

impl Admission {
    /// Whether this token was the flow's outermost entry.
    pub fn is_outermost(self) -> bool {
        !matches!(self, Admission::Reentrant)
    }
}

/// Ownership of one level of nesting on a [`ReentrancyGuard`](super::ReentrancyGuard).
///
/// Dropping the token releases it. [`release`](Self::release) does the same
/// but reports failures, and rejects a second release with
/// [`GuardError::GuardDisposed`].
#[must_use = "the guard is released as soon as the token is dropped"]
pub struct GuardToken {
    state: Arc<GuardState>,
    admission: Admission,
    released: bool,
}

impl GuardToken {
    pub(crate) fn new(state: Arc<GuardState>, admission: Admission) -> Self {
        Self {
            state,
            admission,
            released: false,
        }
    }

    /// How this token was admitted.
    pub fn admission(&self) -> Admission {
        self.admission
    }

    /// Whether the token has already been released.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release this level of nesting.
    ///
    /// Fails with [`GuardError::GuardDisposed`] if the token was already
    /// released or the guard has been torn down. Guard state is left
    /// untouched in both cases.
    pub fn release(&mut self) -> GuardResult<()> {
        if self.released {
            return Err(GuardError::GuardDisposed);
        }
        self.released = true;
        self.state.exit()
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Only teardown can make an unreleased token's exit fail.
        let result = self.release();
        debug_assert!(
            result.is_ok() || self.state.is_disposed(),
            "live guard rejected a token release"
        );
    }
}

impl fmt::Debug for GuardToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardToken")
            .field("admission", &self.admission)
            .field("released", &self.released)
            .finish()
    }
}
