//! Session configuration.

use serde::Deserialize;

/// Default session name used in errors and logs.
pub const DEFAULT_SESSION_NAME: &str = "session";

/// Session configuration.
///
/// Can be built in code or deserialized from application settings; missing
/// fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name used to label the session in errors and logs.
    pub name: String,

    /// Whether concurrent use is detected at all.
    ///
    /// Turning this off removes the per-operation guard, trading safety for
    /// a small amount of overhead.
    pub thread_safety_checks: bool,
}

impl SessionConfig {
    /// Create a configuration for a session with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            thread_safety_checks: true,
        }
    }

    /// Set the session name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enable or disable concurrency detection.
    pub fn with_thread_safety_checks(mut self, enabled: bool) -> Self {
        self.thread_safety_checks = enabled;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_NAME)
    }
}
