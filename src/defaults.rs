//! Default policy constants for overscribe.
//!
//! Shared across config types and the pipeline so the numbers live in
//! exactly one place.

use std::time::Duration;

/// Audio sample rate in Hz expected from capture sources.
///
/// 16kHz mono is the standard input format for speech recognition.
pub const SAMPLE_RATE: u32 = 16000;

/// Interval between segment openings while recording.
///
/// A new overlapping segment starts every 12 seconds.
pub const TICK_INTERVAL: Duration = Duration::from_secs(12);

/// Maximum duration of a single segment.
///
/// 15 seconds per segment against a 12 second tick gives 3 seconds of
/// overlap between consecutive segments, so a delayed segment never
/// leaves a gap in coverage.
pub const SEGMENT_CAP: Duration = Duration::from_secs(15);

/// Cooldown applied to a credential after a rate-limit response.
pub const CREDENTIAL_COOLDOWN: Duration = Duration::from_secs(300);

/// Backoff after a rate-limited call when no fresh credential is available.
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);

/// Backoff after a transient network failure.
pub const TRANSIENT_BACKOFF: Duration = Duration::from_secs(1);

/// Poll interval while waiting for a cooling credential pool.
pub const ACQUIRE_POLL: Duration = Duration::from_millis(500);

/// Default number of transcription workers.
pub const WORKERS: usize = 2;

/// Lower bound for the worker pool size.
pub const MIN_WORKERS: usize = 2;

/// Upper bound for the worker pool size.
pub const MAX_WORKERS: usize = 5;

/// Default retry budget per remote call.
pub const MAX_RETRIES: u32 = 3;

/// Capacity of the segment queue between scheduler and workers.
///
/// Segments arrive at most every `TICK_INTERVAL`, so a small bound is
/// plenty; it gives backpressure a defined shape rather than buffering.
pub const SEGMENT_QUEUE_CAP: usize = 16;

/// Environment variable prefix scanned for API credentials.
///
/// Every variable whose name starts with this prefix contributes one
/// credential, in sorted name order (`OVERSCRIBE_API_KEY`,
/// `OVERSCRIBE_API_KEY_2`, ...).
pub const API_KEY_ENV_PREFIX: &str = "OVERSCRIBE_API_KEY";

/// Default chat model for formatting and drafting calls.
pub const CHAT_MODEL: &str = "llama-3.3-70b-versatile";

/// Default speech-to-text model for segment transcription.
pub const TRANSCRIBE_MODEL: &str = "whisper-large-v3-turbo";

/// Default API base URL (OpenAI-compatible endpoint layout).
pub const API_BASE_URL: &str = "https://api.groq.com/openai/v1";
