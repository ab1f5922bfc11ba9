//! JSON message protocol for IPC communication between CLI and daemon.

use crate::pipeline::types::SessionMode;
use crate::session::SessionState;
use serde::{Deserialize, Serialize};

/// Commands sent by CLI to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Begin a session in the given mode
    Start { mode: SessionMode },
    /// Suspend segment scheduling; in-flight segments still transcribe
    Pause,
    /// Resume a paused session
    Resume,
    /// Stop recording, transcribe, and paste the final text
    Stop,
    /// Discard the session without transcribing or pasting
    Cancel,
    /// Get daemon status
    Status,
    /// Shutdown the daemon
    Shutdown,
}

impl Command {
    /// Serialize command to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize command from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Responses sent by daemon to CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Command succeeded
    Ok,
    /// Command succeeded and the final text was pasted
    Pasted { text: String },
    /// Current daemon status
    Status {
        state: SessionState,
        mode: Option<SessionMode>,
        credentials_available: bool,
    },
    /// Error occurred
    Error { message: String },
}

impl Response {
    /// Serialize response to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize response from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Command Tests

    #[test]
    fn test_command_all_variants_roundtrip() {
        let commands = vec![
            Command::Start {
                mode: SessionMode::Transcribe,
            },
            Command::Start {
                mode: SessionMode::Prompt,
            },
            Command::Pause,
            Command::Resume,
            Command::Stop,
            Command::Cancel,
            Command::Status,
            Command::Shutdown,
        ];

        for cmd in commands {
            let json = cmd.to_json().expect("should serialize");
            let deserialized = Command::from_json(&json).expect("should deserialize");
            assert_eq!(cmd, deserialized, "roundtrip failed for {:?}", cmd);
        }
    }

    #[test]
    fn test_command_json_format_examples() {
        let start = Command::Start {
            mode: SessionMode::Transcribe,
        }
        .to_json()
        .unwrap();
        assert_eq!(start, r#"{"type":"start","mode":"transcribe"}"#);

        let start = Command::Start {
            mode: SessionMode::Prompt,
        }
        .to_json()
        .unwrap();
        assert_eq!(start, r#"{"type":"start","mode":"prompt"}"#);

        let pause = Command::Pause.to_json().unwrap();
        assert_eq!(pause, r#"{"type":"pause"}"#);

        let status = Command::Status.to_json().unwrap();
        assert_eq!(status, r#"{"type":"status"}"#);
    }

    // Response Tests

    #[test]
    fn test_response_ok_json_roundtrip() {
        let resp = Response::Ok;
        let json = resp.to_json().expect("should serialize");
        let deserialized = Response::from_json(&json).expect("should deserialize");
        assert_eq!(resp, deserialized);
        assert_eq!(json, r#"{"type":"ok"}"#);
    }

    #[test]
    fn test_response_pasted_json_roundtrip() {
        let resp = Response::Pasted {
            text: "Hello, world.".to_string(),
        };
        let json = resp.to_json().expect("should serialize");
        let deserialized = Response::from_json(&json).expect("should deserialize");
        assert_eq!(resp, deserialized);
        assert!(json.contains("\"type\":\"pasted\""));
        assert!(json.contains("\"text\":\"Hello, world.\""));
    }

    #[test]
    fn test_response_status_json_roundtrip() {
        let resp = Response::Status {
            state: SessionState::Recording,
            mode: Some(SessionMode::Transcribe),
            credentials_available: true,
        };
        let json = resp.to_json().expect("should serialize");
        let deserialized = Response::from_json(&json).expect("should deserialize");
        assert_eq!(resp, deserialized);
        assert!(json.contains("\"state\":\"recording\""));
        assert!(json.contains("\"mode\":\"transcribe\""));
        assert!(json.contains("\"credentials_available\":true"));
    }

    #[test]
    fn test_response_status_idle_has_no_mode() {
        let resp = Response::Status {
            state: SessionState::Idle,
            mode: None,
            credentials_available: false,
        };
        let json = resp.to_json().expect("should serialize");
        let deserialized = Response::from_json(&json).expect("should deserialize");
        assert_eq!(resp, deserialized);
        assert!(json.contains("\"mode\":null"));
    }

    #[test]
    fn test_response_error_json_roundtrip() {
        let resp = Response::Error {
            message: "already recording".to_string(),
        };
        let json = resp.to_json().expect("should serialize");
        let deserialized = Response::from_json(&json).expect("should deserialize");
        assert_eq!(resp, deserialized);
        assert!(json.contains("\"type\":\"error\""));
    }

    #[test]
    fn test_invalid_json_returns_error() {
        let invalid = r#"{"type": "unknown_command"}"#;
        assert!(Command::from_json(invalid).is_err());

        let invalid = r#"{"type": "start"}"#;
        assert!(
            Command::from_json(invalid).is_err(),
            "start requires a mode field"
        );

        let invalid = r#"not json at all"#;
        assert!(Command::from_json(invalid).is_err());
    }

    #[test]
    fn test_response_pasted_with_special_chars() {
        let resp = Response::Pasted {
            text: r#"Quoted "text" with \n escapes"#.to_string(),
        };
        let json = resp.to_json().expect("should serialize");
        let deserialized = Response::from_json(&json).expect("should deserialize");
        assert_eq!(resp, deserialized);
    }
}
