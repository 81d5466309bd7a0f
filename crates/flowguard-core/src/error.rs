//! Guard error types.

use thiserror::Error;

use crate::flow::FlowId;

/// Errors raised by the reentrancy guard.
///
/// All three kinds indicate something the caller must act on; the guard
/// never retries internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardError {
    /// Synchronous entry found the guard held by an unrelated flow.
    #[error("concurrent access detected: guard is held by {}", holder_label(.holder))]
    ConcurrentAccessDetected {
        /// Flow holding the guard at the time of the check, if observable.
        holder: Option<FlowId>,
    },

    /// The cancellation signal fired while waiting for admission.
    #[error("operation cancelled while waiting for guard admission")]
    OperationCancelled,

    /// Token released twice, or guard used after teardown.
    #[error("guard has been disposed")]
    GuardDisposed,
}

impl GuardError {
    /// Whether this error signals a concurrency violation.
    pub fn is_concurrent_access(&self) -> bool {
        matches!(self, GuardError::ConcurrentAccessDetected { .. })
    }
}

fn holder_label(holder: &Option<FlowId>) -> String {
    match holder {
        Some(id) => id.to_string(),
        None => "another flow".to_string(),
    }
}

/// Result type for guard operations.
pub type GuardResult<T> = Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GuardError::ConcurrentAccessDetected { holder: None };
        assert_eq!(
            err.to_string(),
            "concurrent access detected: guard is held by another flow"
        );
        assert!(err.is_concurrent_access());

        assert_eq!(GuardError::GuardDisposed.to_string(), "guard has been disposed");
        assert!(!GuardError::OperationCancelled.is_concurrent_access());
    }
}
