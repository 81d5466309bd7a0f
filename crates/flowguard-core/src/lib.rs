//! flowguard core - reentrancy detection for non-thread-safe sessions.
//!
//! This crate provides the [`ReentrancyGuard`] a session wraps around each
//! unit of work, and the [`FlowContext`] handles that identify logical flows
//! of control across threads and async continuations.

pub mod error;
pub mod flow;
pub mod guard;

pub use error::{GuardError, GuardResult};
pub use flow::{FlowContext, FlowId};
pub use guard::{Admission, GuardToken, ReentrancyGuard};
