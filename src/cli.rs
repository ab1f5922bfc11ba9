//! Command-line interface for overscribe
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Overlapped-segment voice dictation
#[derive(Parser, Debug)]
#[command(
    name = "overscribe",
    version,
    about = "Overlapped-segment voice dictation"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress status messages
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: pipeline status events as JSON lines)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a duration string such as `12s`, `500ms`, or `5m`.
///
/// Bare numbers are seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the daemon (foreground process for systemd)
    Daemon {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/overscribe.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,

        /// Read one WAV stream from stdin instead of recording live
        #[arg(long)]
        stdin: bool,

        /// Segment opening interval override. Examples: 12s, 500ms
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        tick: Option<Duration>,

        /// Segment duration cap override. Examples: 15s, 2s500ms
        #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
        segment_cap: Option<Duration>,
    },

    /// Start a dictation session via IPC
    Start {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/overscribe.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,

        /// Treat the dictation as an instruction and draft the content
        #[arg(long)]
        prompt: bool,
    },

    /// Pause the live session via IPC
    Pause {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/overscribe.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Resume a paused session via IPC
    Resume {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/overscribe.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Stop recording, transcribe, and paste the result via IPC
    Stop {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/overscribe.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Discard the session without transcribing via IPC
    Cancel {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/overscribe.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Get daemon status via IPC
    Status {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/overscribe.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Shut the daemon down via IPC
    Shutdown {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/overscribe.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_daemon_command() {
        let cli = Cli::try_parse_from(["overscribe", "daemon"]).unwrap();
        match cli.command {
            Commands::Daemon {
                socket,
                stdin,
                tick,
                segment_cap,
            } => {
                assert!(socket.is_none());
                assert!(!stdin);
                assert!(tick.is_none());
                assert!(segment_cap.is_none());
            }
            _ => panic!("Expected Daemon command"),
        }
    }

    #[test]
    fn test_parse_daemon_with_overrides() {
        let cli = Cli::try_parse_from([
            "overscribe",
            "daemon",
            "--stdin",
            "--tick",
            "500ms",
            "--segment-cap",
            "2s",
        ])
        .unwrap();
        match cli.command {
            Commands::Daemon {
                stdin,
                tick,
                segment_cap,
                ..
            } => {
                assert!(stdin);
                assert_eq!(tick, Some(Duration::from_millis(500)));
                assert_eq!(segment_cap, Some(Duration::from_secs(2)));
            }
            _ => panic!("Expected Daemon command"),
        }
    }

    #[test]
    fn test_parse_start_prompt_mode() {
        let cli = Cli::try_parse_from(["overscribe", "start", "--prompt"]).unwrap();
        match cli.command {
            Commands::Start { prompt, .. } => assert!(prompt),
            _ => panic!("Expected Start command"),
        }
    }

    #[test]
    fn test_parse_start_default_is_transcribe() {
        let cli = Cli::try_parse_from(["overscribe", "start"]).unwrap();
        match cli.command {
            Commands::Start { prompt, .. } => assert!(!prompt),
            _ => panic!("Expected Start command"),
        }
    }

    #[test]
    fn test_parse_global_config_and_quiet() {
        let cli =
            Cli::try_parse_from(["overscribe", "status", "--config", "/tmp/c.toml", "--quiet"])
                .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(cli.quiet);
    }

    #[test]
    fn test_parse_verbose_count() {
        let cli = Cli::try_parse_from(["overscribe", "daemon", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_socket_override() {
        let cli = Cli::try_parse_from(["overscribe", "stop", "--socket", "/tmp/o.sock"]).unwrap();
        match cli.command {
            Commands::Stop { socket } => {
                assert_eq!(socket, Some(PathBuf::from("/tmp/o.sock")));
            }
            _ => panic!("Expected Stop command"),
        }
    }

    #[test]
    fn test_parse_duration_accepts_bare_seconds() {
        assert_eq!(parse_duration("12").unwrap(), Duration::from_secs(12));
        assert_eq!(parse_duration("12s").unwrap(), Duration::from_secs(12));
        assert_eq!(
            parse_duration("1m30s").unwrap(),
            Duration::from_secs(90)
        );
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["overscribe"]).is_err());
    }
}
