//! Shared pipeline data types.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens to the finished transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Clean up the transcript and paste it as-is.
    Transcribe,
    /// Treat the transcript as an instruction and paste drafted content.
    Prompt,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMode::Transcribe => write!(f, "transcribe"),
            SessionMode::Prompt => write!(f, "prompt"),
        }
    }
}

/// One finalized audio segment heading into transcription.
///
/// Sequence numbers are assigned at capture open, monotonically, exactly
/// once per segment. Ownership moves scheduler, queue, worker, reassembler.
#[derive(Debug, Clone)]
pub struct Segment {
    pub seq: u64,
    /// Position of the capture open relative to session start.
    pub offset: Duration,
    pub samples: Vec<i16>,
}

/// Result of transcribing one segment.
///
/// The seq slot is preserved whether transcription succeeded or
/// exhausted its retries.
#[derive(Debug)]
pub struct SegmentOutcome {
    pub seq: u64,
    pub result: Result<String>,
}

/// Status events observed over a session, serializable for forwarding.
///
/// Emitted best-effort on an unbounded channel; a slow or absent consumer
/// never stalls the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    SessionStarted { mode: SessionMode },
    SessionPaused,
    SessionResumed,
    SegmentTranscribed { seq: u64, chars: usize },
    SegmentFailed { seq: u64, message: String },
    TranscriptReady { chars: usize },
    SessionCancelled,
}
