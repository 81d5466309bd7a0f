//! Sessions guarded against concurrent use.

use std::fmt;
use std::future::Future;
use std::ops::Deref;

use flowguard_core::{Admission, FlowContext, GuardError, GuardToken, ReentrancyGuard};
use tracing::{debug, trace, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;

/// A non-thread-safe state object protected by a reentrancy guard.
///
/// Every public entry point acquires the session's guard for the duration
/// of the unit of work. The flow that is inside may call back into the
/// session freely. Another thread entering synchronously gets
/// [`SessionError::ConcurrentOperation`]; another async flow waits its turn.
pub struct Session<T> {
    state: T,
    guard: ReentrancyGuard,
    config: SessionConfig,
}

impl<T> Session<T> {
    /// Create a session with default configuration.
    pub fn new(state: T) -> Self {
        Self::with_config(state, SessionConfig::default())
    }

    /// Create a session with the given configuration.
    pub fn with_config(state: T, config: SessionConfig) -> Self {
        debug!(
            session = %config.name,
            thread_safety_checks = config.thread_safety_checks,
            "session created"
        );
        Self {
            state,
            guard: ReentrancyGuard::new(),
            config,
        }
    }

    /// Session name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The guard protecting this session, for collaborators that manage
    /// their own scopes.
    pub fn guard(&self) -> &ReentrancyGuard {
        &self.guard
    }

    /// Enter the session on the current flow.
    ///
    /// Inside a tokio task with no bound flow, every call is a new flow: a
    /// second `enter` while the first scope is alive is rejected. Use
    /// [`run`](Self::run), [`run_async`](Self::run_async) or
    /// [`enter_with`](Self::enter_with) to nest there.
    pub fn enter(&self) -> Result<SessionScope<'_, T>, SessionError> {
        self.enter_with(&FlowContext::current())
    }

    /// Enter the session on `flow`, failing fast if another flow is inside.
    pub fn enter_with(&self, flow: &FlowContext) -> Result<SessionScope<'_, T>, SessionError> {
        if !self.config.thread_safety_checks {
            return self.unchecked_scope();
        }
        let token = self
            .guard
            .enter(flow)
            .map_err(|err| self.reject(flow, err))?;
        Ok(self.scope(Some(token)))
    }

    /// Enter the session on `flow`, waiting while another flow is inside.
    pub async fn enter_async(&self, flow: &FlowContext) -> Result<SessionScope<'_, T>, SessionError> {
        self.enter_async_with_cancel(flow, std::future::pending()).await
    }

    /// Enter the session on `flow`, waiting until admitted or `cancel`
    /// resolves.
    pub async fn enter_async_with_cancel<C>(
        &self,
        flow: &FlowContext,
        cancel: C,
    ) -> Result<SessionScope<'_, T>, SessionError>
    where
        C: Future<Output = ()>,
    {
        if !self.config.thread_safety_checks {
            return self.unchecked_scope();
        }
        let token = self
            .guard
            .enter_async_with_cancel(flow, cancel)
            .await
            .map_err(|err| self.reject(flow, err))?;
        Ok(self.scope(Some(token)))
    }

    /// Run a synchronous unit of work.
    ///
    /// `f` runs with the entering flow bound, so nested calls on the session
    /// re-enter it.
    pub fn run<F, R>(&self, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&T) -> R,
    {
        let flow = FlowContext::current();
        let scope = self.enter_with(&flow)?;
        trace!(session = %self.config.name, flow = %flow.id(), "running operation");
        let output = flow.sync_scope(|| f(&*scope));
        scope.finish()?;
        Ok(output)
    }

    /// Run an asynchronous unit of work.
    ///
    /// The future runs as the caller's bound flow, or as a fresh flow when
    /// none is bound, so nested calls and spawned continuations inside it
    /// re-enter the session instead of contending with it.
    pub async fn run_async<'a, F, Fut, R>(&'a self, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&'a T) -> Fut,
        Fut: Future<Output = R>,
    {
        self.run_async_with_cancel(std::future::pending(), f).await
    }

    /// Run an asynchronous unit of work, giving up if `cancel` resolves
    /// before the session admits it.
    pub async fn run_async_with_cancel<'a, C, F, Fut, R>(
        &'a self,
        cancel: C,
        f: F,
    ) -> Result<R, SessionError>
    where
        C: Future<Output = ()>,
        F: FnOnce(&'a T) -> Fut,
        Fut: Future<Output = R>,
    {
        let flow = FlowContext::try_current().unwrap_or_else(FlowContext::new);
        let scope = self.enter_async_with_cancel(&flow, cancel).await?;
        trace!(session = %self.config.name, flow = %flow.id(), "running async operation");
        let output = flow.scope(f(&self.state)).await;
        scope.finish()?;
        Ok(output)
    }

    /// Close the session. Later operations fail with
    /// [`SessionError::Disposed`], as does closing it again.
    pub fn close(&self) -> Result<(), SessionError> {
        self.guard
            .dispose()
            .map_err(|err| SessionError::from_guard(&self.config.name, err))?;
        debug!(session = %self.config.name, "session closed");
        Ok(())
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.guard.is_disposed()
    }

    /// Close the session and return its state.
    pub fn into_inner(self) -> T {
        // Already-closed sessions just hand back their state.
        let _ = self.guard.dispose();
        self.state
    }

    fn scope(&self, token: Option<GuardToken>) -> SessionScope<'_, T> {
        SessionScope {
            session: self,
            token,
        }
    }

    fn unchecked_scope(&self) -> Result<SessionScope<'_, T>, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Disposed {
                session: self.config.name.clone(),
            });
        }
        Ok(self.scope(None))
    }

    fn reject(&self, flow: &FlowContext, err: GuardError) -> SessionError {
        match err {
            GuardError::ConcurrentAccessDetected { holder } => warn!(
                session = %self.config.name,
                flow = %flow.id(),
                holder = ?holder,
                "concurrent operation detected"
            ),
            GuardError::OperationCancelled => debug!(
                session = %self.config.name,
                flow = %flow.id(),
                "operation cancelled while waiting for session"
            ),
            GuardError::GuardDisposed => debug!(
                session = %self.config.name,
                flow = %flow.id(),
                "operation rejected by closed session"
            ),
        }
        SessionError::from_guard(&self.config.name, err)
    }
}

impl<T> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.config.name)
            .field("thread_safety_checks", &self.config.thread_safety_checks)
            .field("guard", &self.guard)
            .finish()
    }
}

/// One level of access to a [`Session`], released on drop.
#[must_use = "the session is released as soon as the scope is dropped"]
pub struct SessionScope<'a, T> {
    session: &'a Session<T>,
    token: Option<GuardToken>,
}

impl<T> SessionScope<'_, T> {
    /// How the scope was admitted. `None` when thread-safety checks are off.
    pub fn admission(&self) -> Option<Admission> {
        self.token.as_ref().map(GuardToken::admission)
    }

    /// Release the scope, reporting a failed release.
    pub fn finish(mut self) -> Result<(), SessionError> {
        match self.token.take() {
            Some(mut token) => token
                .release()
                .map_err(|err| SessionError::from_guard(&self.session.config.name, err)),
            None => Ok(()),
        }
    }
}

impl<T> Deref for SessionScope<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.session.state
    }
}

impl<T> fmt::Debug for SessionScope<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionScope")
            .field("session", &self.session.config.name)
            .field("admission", &self.admission())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_nested_run() {
        let session = Session::new(Cell::new(0));

        let result = session.run(|counter| {
            counter.set(counter.get() + 1);
            session
                .run(|counter| {
                    counter.set(counter.get() + 1);
                    session.guard().nesting_depth()
                })
                .unwrap()
        });

        assert_eq!(result, Ok(2));
        assert_eq!(session.into_inner().get(), 2);
    }

    #[tokio::test]
    async fn test_nested_run_in_unbound_task() {
        let session = Session::new(());
        let depth = session.run(|_| {
            session
                .run(|_| session.guard().nesting_depth())
                .unwrap()
        });
        assert_eq!(depth, Ok(2));
        assert!(!session.guard().is_occupied());
    }

    #[test]
    fn test_scope_admission() {
        let session = Session::new(());
        let outer = session.enter().unwrap();
        let inner = session.enter().unwrap();

        assert_eq!(outer.admission(), Some(Admission::Immediate));
        assert_eq!(inner.admission(), Some(Admission::Reentrant));
        inner.finish().unwrap();
        outer.finish().unwrap();
        assert!(!session.guard().is_occupied());
    }

    #[test]
    fn test_other_flow_rejected() {
        let session = Session::with_config((), SessionConfig::new("orders"));
        let _scope = session.enter().unwrap();

        let err = session.enter_with(&FlowContext::new()).unwrap_err();
        assert_eq!(
            err,
            SessionError::ConcurrentOperation {
                session: "orders".to_string()
            }
        );
    }

    #[test]
    fn test_checks_disabled() {
        let config = SessionConfig::default().with_thread_safety_checks(false);
        let session = Session::with_config((), config);

        let scope = session.enter().unwrap();
        assert_eq!(scope.admission(), None);
        assert!(session.enter_with(&FlowContext::new()).is_ok());
        assert!(!session.guard().is_occupied());
        drop(scope);

        session.close().unwrap();
        assert!(matches!(
            session.enter(),
            Err(SessionError::Disposed { .. })
        ));
    }

    #[test]
    fn test_close() {
        let session = Session::new(());
        session.close().unwrap();
        assert!(session.is_closed());
        assert!(matches!(session.close(), Err(SessionError::Disposed { .. })));
        assert!(matches!(session.run(|_| ()), Err(SessionError::Disposed { .. })));
    }

    #[test]
    fn test_finish_after_close() {
        let session = Session::new(());
        let scope = session.enter().unwrap();
        session.close().unwrap();
        assert!(matches!(scope.finish(), Err(SessionError::Disposed { .. })));
    }

    #[tokio::test]
    async fn test_run_async_nested() {
        let session = Session::new(Cell::new(0));

        let depth = session
            .run_async(|counter| async {
                counter.set(counter.get() + 1);
                tokio::task::yield_now().await;
                session
                    .run(|_| session.guard().nesting_depth())
                    .unwrap()
            })
            .await
            .unwrap();

        assert_eq!(depth, 2);
        assert!(!session.guard().is_occupied());
    }
}
