/// Canonical error type used across all modules.
///
/// Only non-recoverable conditions surface here. Malformed single SSE lines
/// and incomplete tool-call buffers at soft-flush points are dropped by the
/// decoder without ever constructing an error.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Token limit exceeded: {0}")]
    TokenLimit(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid tool-call arguments: {0}")]
    ToolArguments(String),
}

impl BridgeError {
    /// True when the error was raised before any response part could have
    /// been emitted (pre-flight validation and connection setup).
    #[must_use]
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            BridgeError::Config(_)
                | BridgeError::Auth(_)
                | BridgeError::InvalidRequest(_)
                | BridgeError::TokenLimit(_)
                | BridgeError::Upstream { .. }
        )
    }
}
