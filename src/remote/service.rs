use crate::error::{OverscribeError, Result};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

/// Remote operations the pipeline performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Speech-to-text for one segment.
    Transcribe,
    /// Clean up a finished transcript without changing its meaning.
    Format,
    /// Treat the transcript as an instruction and draft the requested content.
    DraftPrompt,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Transcribe => write!(f, "transcribe"),
            Operation::Format => write!(f, "format"),
            Operation::DraftPrompt => write!(f, "draft"),
        }
    }
}

/// Request body for a remote operation.
#[derive(Debug, Clone)]
pub enum Payload {
    /// WAV-encoded segment audio.
    Audio(Vec<u8>),
    /// Transcript text.
    Text(String),
}

/// Trait for the remote transcription/formatting service.
///
/// This trait allows swapping implementations (real HTTP backend vs mock).
/// Implementations classify failures at this boundary: every error they
/// return carries a [`crate::error::FailureClass`] or is non-retryable by
/// construction.
pub trait RemoteService: Send + Sync {
    /// Perform one remote call with the given credential key.
    fn call(&self, op: Operation, payload: &Payload, key: &str) -> Result<String>;
}

/// Scripted outcome for one mock call.
#[derive(Debug, Clone)]
enum MockOutcome {
    Ok(String),
    RateLimited,
    Transient,
    Rejected,
}

/// Mock remote service for testing
pub struct MockRemoteService {
    script: Mutex<VecDeque<MockOutcome>>,
    calls: Mutex<Vec<(Operation, String)>>,
    text_payloads: Mutex<Vec<String>>,
    default_response: String,
}

impl MockRemoteService {
    /// Create a new mock with an empty script
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            text_payloads: Mutex::new(Vec::new()),
            default_response: String::new(),
        }
    }

    fn push(self, outcome: MockOutcome) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
        self
    }

    /// Script a successful call returning the given text
    pub fn with_response(self, text: &str) -> Self {
        let text = text.to_string();
        self.push(MockOutcome::Ok(text))
    }

    /// Script a rate-limited failure
    pub fn with_rate_limited(self) -> Self {
        self.push(MockOutcome::RateLimited)
    }

    /// Script a transient network failure
    pub fn with_transient(self) -> Self {
        self.push(MockOutcome::Transient)
    }

    /// Script a non-retryable rejection
    pub fn with_rejection(self) -> Self {
        self.push(MockOutcome::Rejected)
    }

    /// Configure the response returned once the script runs out
    pub fn with_default_response(mut self, text: &str) -> Self {
        self.default_response = text.to_string();
        self
    }

    /// Operations and credential keys seen so far, in call order
    pub fn calls(&self) -> Vec<(Operation, String)> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Text payloads seen so far (audio payloads are not recorded)
    pub fn text_payloads(&self) -> Vec<String> {
        self.text_payloads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MockRemoteService {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteService for MockRemoteService {
    fn call(&self, op: Operation, payload: &Payload, key: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((op, key.to_string()));
        if let Payload::Text(text) = payload {
            self.text_payloads
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(text.clone());
        }

        let outcome = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match outcome {
            None => Ok(self.default_response.clone()),
            Some(MockOutcome::Ok(text)) => Ok(text),
            Some(MockOutcome::RateLimited) => Err(OverscribeError::RateLimited {
                message: "mock rate limit".to_string(),
            }),
            Some(MockOutcome::Transient) => Err(OverscribeError::TransientNetwork {
                message: "mock network error".to_string(),
            }),
            Some(MockOutcome::Rejected) => Err(OverscribeError::NonRetryable {
                message: "mock rejection".to_string(),
            }),
        }
    }
}
