//! Shared benchmark setup.

use flowguard_core::{FlowContext, GuardResult, GuardToken, ReentrancyGuard};
use tokio::runtime::Runtime;

/// Nesting depths exercised by the nesting benchmarks.
pub const NESTING_DEPTHS: [usize; 3] = [1, 8, 64];

/// Build a single-threaded runtime for async benchmarks.
pub fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build benchmark runtime")
}

/// Enter `guard` `depth` times on `flow`, returning every token.
pub fn enter_nested(
    guard: &ReentrancyGuard,
    flow: &FlowContext,
    depth: usize,
) -> GuardResult<Vec<GuardToken>> {
    (0..depth).map(|_| guard.enter(flow)).collect()
}

/// A guard already held by an unrelated flow, plus the holder's token.
pub fn held_guard() -> (ReentrancyGuard, GuardToken) {
    let guard = ReentrancyGuard::new();
    let token = guard
        .enter(&FlowContext::new())
        .expect("fresh guard must admit its first flow");
    (guard, token)
}
