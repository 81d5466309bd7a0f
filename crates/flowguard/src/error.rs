//! Session error types.

use flowguard_core::GuardError;
use thiserror::Error;

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Another flow of control is using the session.
    #[error(
        "a second operation was started on session '{session}' before a previous operation \
         completed; this is usually caused by different threads concurrently using the same \
         session instance"
    )]
    ConcurrentOperation {
        /// Session name.
        session: String,
    },

    /// The operation was cancelled while waiting for the session.
    #[error("operation on session '{session}' was cancelled")]
    Cancelled {
        /// Session name.
        session: String,
    },

    /// The session has been closed, or a scope was released twice.
    #[error("session '{session}' has been closed")]
    Disposed {
        /// Session name.
        session: String,
    },
}

impl SessionError {
    /// Translate a guard error for the named session.
    pub fn from_guard(session: &str, err: GuardError) -> Self {
        let session = session.to_string();
        match err {
            GuardError::ConcurrentAccessDetected { .. } => Self::ConcurrentOperation { session },
            GuardError::OperationCancelled => Self::Cancelled { session },
            GuardError::GuardDisposed => Self::Disposed { session },
        }
    }

    /// Whether this error signals concurrent use of the session.
    pub fn is_concurrent_operation(&self) -> bool {
        matches!(self, Self::ConcurrentOperation { .. })
    }
}
