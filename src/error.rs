//! Error types for overscribe.

use std::time::Duration;
use thiserror::Error;

/// Classification of a failed remote call.
///
/// Produced once at the HTTP boundary and carried through the retry
/// machinery, so no other layer ever inspects error strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The credential hit a rate limit; rotate and cool down.
    RateLimited,
    /// Network-level trouble (timeout, connection reset); retry.
    Transient,
    /// The service rejected the request itself; retrying cannot help.
    NonRetryable,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::RateLimited => write!(f, "rate limited"),
            FailureClass::Transient => write!(f, "network error"),
            FailureClass::NonRetryable => write!(f, "rejected by service"),
        }
    }
}

#[derive(Error, Debug)]
pub enum OverscribeError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("No API credentials found (set {prefix}* environment variables)")]
    NoCredentials { prefix: String },

    // Audio capture errors
    #[error("Audio capture failed: {message}")]
    Capture { message: String },

    // Remote call errors (taxonomy used by the retrying client)
    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Network error: {message}")]
    TransientNetwork { message: String },

    #[error("Service rejected request: {message}")]
    NonRetryable { message: String },

    #[error("All credentials cooling down, retry in {}s", retry_after.as_secs())]
    AllCredentialsCooling { retry_after: Duration },

    #[error("Retry budget exhausted after {attempts} attempts (last failure: {last})")]
    RetryBudgetExhausted { attempts: u32, last: FailureClass },

    // Session errors
    #[error("Session error: {message}")]
    Session { message: String },

    // IPC errors
    #[error("IPC socket error: {message}")]
    IpcSocket { message: String },

    #[error("IPC protocol error: {message}")]
    IpcProtocol { message: String },

    #[error("IPC connection failed: {message}")]
    IpcConnection { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl OverscribeError {
    /// The failure class of a remote-call error, if it is one.
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            OverscribeError::RateLimited { .. } => Some(FailureClass::RateLimited),
            OverscribeError::TransientNetwork { .. } => Some(FailureClass::Transient),
            OverscribeError::NonRetryable { .. } => Some(FailureClass::NonRetryable),
            OverscribeError::RetryBudgetExhausted { last, .. } => Some(*last),
            _ => None,
        }
    }

    /// Human-readable message for terminal failures shown to the user.
    ///
    /// Distinguishes "all keys cooling down" from plain network trouble
    /// from hard rejections, per the session-level error contract.
    pub fn user_message(&self) -> String {
        match self {
            OverscribeError::AllCredentialsCooling { retry_after } => format!(
                "All API keys are cooling down; retry in {}s.",
                retry_after.as_secs()
            ),
            OverscribeError::RetryBudgetExhausted {
                last: FailureClass::RateLimited,
                ..
            } => "All API keys are cooling down; please wait and try again.".to_string(),
            OverscribeError::RetryBudgetExhausted {
                last: FailureClass::Transient,
                ..
            }
            | OverscribeError::TransientNetwork { .. } => {
                "Network error: please check your connection and try again.".to_string()
            }
            OverscribeError::NonRetryable { message } => {
                format!("The service rejected the request: {}", message)
            }
            other => other.to_string(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, OverscribeError>;
