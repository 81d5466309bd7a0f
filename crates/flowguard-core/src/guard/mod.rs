//! Reentrancy guard and its scoped acquisition tokens.
//!
//! # Usage
//!
//! ```ignore
//! use flowguard_core::{FlowContext, ReentrancyGuard};
//!
//! let guard = ReentrancyGuard::new();
//! let flow = FlowContext::current();
//!
//! // Synchronous entry fails fast if another flow is inside.
//! let outer = guard.enter(&flow)?;
//!
//! // The same flow may nest freely.
//! let inner = guard.enter(&flow)?;
//! drop(inner);
//! drop(outer);
//!
//! // Asynchronous entry waits for the holder instead of failing.
//! let token = guard.enter_async(&flow).await?;
//! ```

mod detector;
mod state;
mod token;

pub use detector::ReentrancyGuard;
pub use token::{Admission, GuardToken};
