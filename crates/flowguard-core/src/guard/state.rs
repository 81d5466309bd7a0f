//! Shared guard state.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::{Semaphore, TryAcquireError};

use super::token::Admission;
use crate::error::{GuardError, GuardResult};
use crate::flow::{FlowContext, FlowId};

/// Which flow holds the guard, and how deeply.
///
/// `holder` is `Some` exactly when `depth > 0`. Both fields change together
/// under one lock, so no reader ever pairs one flow's holder with another
/// flow's depth.
#[derive(Debug, Clone, Copy, Default)]
struct Occupancy {
    holder: Option<FlowId>,
    depth: usize,
}

/// State shared by a guard and every token issued from it.
///
/// Ownership of the guard is the single admission permit. The occupancy
/// lock is only held for a few instructions and never across an `.await`.
pub(crate) struct GuardState {
    /// Binary admission primitive (capacity 1).
    admission: Semaphore,
    occupancy: Mutex<Occupancy>,
    /// Set once by teardown.
    disposed: AtomicBool,
}

impl GuardState {
    pub(crate) fn new() -> Self {
        Self {
            admission: Semaphore::new(1),
            occupancy: Mutex::new(Occupancy::default()),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn admission(&self) -> &Semaphore {
        &self.admission
    }

    pub(crate) fn ensure_live(&self) -> GuardResult<()> {
        if self.is_disposed() {
            return Err(GuardError::GuardDisposed);
        }
        Ok(())
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn holder(&self) -> Option<FlowId> {
        self.occupancy.lock().holder
    }

    pub(crate) fn depth(&self) -> usize {
        self.occupancy.lock().depth
    }

    pub(crate) fn is_held_by(&self, flow: &FlowContext) -> bool {
        self.occupancy.lock().holder == Some(flow.id())
    }

    /// Enter without waiting: re-enter if `flow` holds the guard, otherwise
    /// try to take the admission permit.
    ///
    /// The holder check, the permit and the bookkeeping all happen under the
    /// occupancy lock, so a stale holder can never be re-entered.
    pub(crate) fn try_enter(&self, flow: &FlowContext) -> GuardResult<Admission> {
        let mut occupancy = self.occupancy.lock();
        if occupancy.holder == Some(flow.id()) {
            occupancy.depth += 1;
            return Ok(Admission::Reentrant);
        }

        match self.admission.try_acquire() {
            Ok(permit) => permit.forget(),
            Err(TryAcquireError::NoPermits) => {
                return Err(GuardError::ConcurrentAccessDetected {
                    holder: occupancy.holder,
                });
            }
            Err(TryAcquireError::Closed) => return Err(GuardError::GuardDisposed),
        }

        *occupancy = Occupancy {
            holder: Some(flow.id()),
            depth: 1,
        };
        Ok(Admission::Immediate)
    }

    /// Bump the depth if `flow` already holds the guard.
    pub(crate) fn try_reenter(&self, flow: &FlowContext) -> bool {
        let mut occupancy = self.occupancy.lock();
        if occupancy.holder != Some(flow.id()) {
            return false;
        }
        occupancy.depth += 1;
        true
    }

    /// Record `flow` as holder after it has taken the admission permit.
    pub(crate) fn occupy(&self, flow: &FlowContext) {
        let mut occupancy = self.occupancy.lock();
        debug_assert_eq!(occupancy.depth, 0, "admitted while occupied");
        *occupancy = Occupancy {
            holder: Some(flow.id()),
            depth: 1,
        };
    }

    /// Undo one level of nesting, handing the permit on at depth zero.
    pub(crate) fn exit(&self) -> GuardResult<()> {
        self.ensure_live()?;

        let vacated = {
            let mut occupancy = self.occupancy.lock();
            if occupancy.depth == 0 {
                return Err(GuardError::GuardDisposed);
            }
            occupancy.depth -= 1;
            if occupancy.depth == 0 {
                occupancy.holder = None;
            }
            occupancy.depth == 0
        };

        // Waking the next waiter happens outside the lock.
        if vacated {
            self.admission.add_permits(1);
        }
        Ok(())
    }

    /// Close the admission primitive. Only the first call succeeds.
    pub(crate) fn dispose(&self) -> GuardResult<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(GuardError::GuardDisposed);
        }
        self.admission.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_enter_and_exit() {
        let state = GuardState::new();
        let flow = FlowContext::new();

        assert_eq!(state.try_enter(&flow), Ok(Admission::Immediate));
        assert_eq!(state.try_enter(&flow), Ok(Admission::Reentrant));
        assert!(state.is_held_by(&flow));
        assert_eq!(state.holder(), Some(flow.id()));
        assert_eq!(state.depth(), 2);
        assert_eq!(state.admission().available_permits(), 0);

        state.exit().unwrap();
        assert_eq!(state.admission().available_permits(), 0);
        state.exit().unwrap();
        assert_eq!(state.depth(), 0);
        assert_eq!(state.holder(), None);
        assert_eq!(state.admission().available_permits(), 1);
    }

    #[test]
    fn test_try_enter_reports_holder() {
        let state = GuardState::new();
        let owner = FlowContext::new();
        state.try_enter(&owner).unwrap();

        assert_eq!(
            state.try_enter(&FlowContext::new()),
            Err(GuardError::ConcurrentAccessDetected {
                holder: Some(owner.id())
            })
        );
        assert_eq!(state.depth(), 1);
    }

    #[test]
    fn test_exit_without_holder_is_rejected() {
        let state = GuardState::new();
        assert_eq!(state.exit(), Err(GuardError::GuardDisposed));
        assert_eq!(state.admission().available_permits(), 1);
    }

    #[test]
    fn test_reenter_requires_holder() {
        let state = GuardState::new();
        let flow = FlowContext::new();
        assert!(!state.try_reenter(&flow));

        state.admission().try_acquire().unwrap().forget();
        state.occupy(&flow);
        assert!(state.try_reenter(&flow));
        assert!(!state.try_reenter(&FlowContext::new()));
        assert_eq!(state.depth(), 2);
    }

    #[test]
    fn test_vacated_holder_is_not_reentered() {
        let state = GuardState::new();
        let first = FlowContext::new();
        let second = FlowContext::new();

        state.try_enter(&first).unwrap();
        state.exit().unwrap();
        state.try_enter(&second).unwrap();

        assert!(!state.try_reenter(&first));
        assert!(state.try_enter(&first).is_err());
        assert_eq!(state.holder(), Some(second.id()));
        assert_eq!(state.depth(), 1);
    }

    #[test]
    fn test_dispose_once() {
        let state = GuardState::new();
        assert!(state.dispose().is_ok());
        assert!(state.admission().is_closed());
        assert_eq!(state.dispose(), Err(GuardError::GuardDisposed));
        assert_eq!(state.ensure_live(), Err(GuardError::GuardDisposed));
        assert_eq!(
            state.try_enter(&FlowContext::new()),
            Err(GuardError::GuardDisposed)
        );
    }
}
