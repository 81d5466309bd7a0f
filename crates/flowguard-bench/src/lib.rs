//! flowguard Benchmark Suite
//!
//! Criterion benchmarks for the reentrancy guard and guarded sessions.
//!
//! # Benchmark Categories
//!
//! - **Guard**: synchronous entry, nesting, async admission, rejection
//! - **Session**: `run` and `run_async` overhead with checks on and off

pub mod harness;
