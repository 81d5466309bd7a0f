//! flowguard - sessions that detect concurrent use.
//!
//! A [`Session`] wraps a state object that must not be used by two flows of
//! control at once. Each operation on the session runs inside a scoped
//! acquisition of a [`ReentrancyGuard`]: the flow that is inside may call
//! back into the session, a second thread is rejected immediately, and a
//! second async flow waits for its turn.
//!
//! # Quick Start
//!
//! ```ignore
//! use flowguard::{Session, SessionConfig, SessionError};
//!
//! let session = Session::with_config(Vec::<u32>::new(), SessionConfig::new("orders"));
//!
//! // Synchronous work fails fast on concurrent use.
//! let len = session.run(|orders| orders.len())?;
//!
//! // Async work waits for the session and may nest freely.
//! let total = session
//!     .run_async(|orders| async move {
//!         let count = session.run(|o| o.len())?;
//!         Ok::<_, SessionError>(count + orders.len())
//!     })
//!     .await??;
//! ```

pub mod config;
pub mod error;
pub mod session;

pub use config::SessionConfig;
pub use error::SessionError;
pub use session::{Session, SessionScope};

/// Re-export guard types.
pub use flowguard_core::{Admission, FlowContext, FlowId, GuardError, ReentrancyGuard};
