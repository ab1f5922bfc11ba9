//! overscribe - overlapped-segment voice dictation.
//!
//! Records speech as overlapping fixed-cap segments, transcribes them
//! concurrently against a cloud speech service with credential rotation,
//! reassembles the pieces in order, and pastes the cleaned-up result.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod capture;
pub mod cli;
pub mod clock;
pub mod config;
pub mod daemon;
pub mod defaults;
pub mod error;
pub mod ipc;
pub mod pipeline;
pub mod remote;
pub mod session;

// Core traits (source → process → sink)
pub use capture::{CaptureHandle, CaptureSource};
pub use pipeline::sink::PasteSink;
pub use remote::service::RemoteService;

// Session lifecycle
pub use pipeline::types::SessionMode;
pub use session::{SessionController, SessionState};

// Error handling
pub use error::{OverscribeError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.2+abc1234"` when git hash is available, `"0.1.2"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
