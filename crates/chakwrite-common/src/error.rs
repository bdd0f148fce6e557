use thiserror::Error;

/// Failure taxonomy shared by the capability layer, the router and the
/// cross-context transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChakError {
    /// The capability exists but its session could not be constructed.
    #[error("capability '{kind}' is unavailable: {reason}")]
    CapabilityUnavailable { kind: String, reason: String },

    #[error("no capability available (tried: {})", .attempted.join(", "))]
    NoCapabilityAvailable { attempted: Vec<String> },

    /// The session was constructed but the call itself failed.
    #[error("capability '{kind}' failed: {message}")]
    InvocationFailed { kind: String, message: String },

    #[error("Invalid AI action type: {0}")]
    UnknownOperation(String),

    #[error("could not start the AI context: {0}")]
    ContextCreationFailed(String),

    #[error("timed out after {timeout_ms} ms")]
    RequestTimedOut { timeout_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("config store error: {0}")]
    Store(String),
}

impl ChakError {
    /// Short, action-scoped text suitable for the page UI.
    pub fn user_message(&self, operation: &str) -> String {
        scoped_failure(operation, self)
    }
}

/// Action-scoped failure text for a reason that is already a string, such
/// as an error relayed back from the hidden context.
pub fn scoped_failure(operation: &str, reason: impl std::fmt::Display) -> String {
    format!("{operation} failed: {reason}. Try again.")
}
