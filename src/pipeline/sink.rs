//! Output sinks for the finished text.

use crate::error::{OverscribeError, Result};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Pluggable consumer for the processed transcript.
///
/// Pairs with `CaptureSource` on the input side: the pipeline never knows
/// where its text ends up.
pub trait PasteSink: Send + Sync {
    fn paste(&self, text: &str) -> Result<()>;

    /// Name for logging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Sink that prints to stdout.
pub struct StdoutSink;

impl PasteSink for StdoutSink {
    fn paste(&self, text: &str) -> Result<()> {
        println!("{}", text);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

/// Sink that pipes the text to an external command's stdin.
///
/// Lets the daemon hand results to a clipboard or typing tool, e.g.
/// `wl-copy` or `wtype -`.
pub struct CommandSink {
    program: String,
    args: Vec<String>,
}

impl CommandSink {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl PasteSink for CommandSink {
    fn paste(&self, text: &str) -> Result<()> {
        let mut child = std::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| OverscribeError::Other(format!(
                "Failed to run {}: {}",
                self.program, e
            )))?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(text.as_bytes())?;
        }
        drop(child.stdin.take());

        let status = child.wait()?;
        if !status.success() {
            return Err(OverscribeError::Other(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Sink that collects pasted text for tests.
#[derive(Clone, Default)]
pub struct CollectSink {
    texts: Arc<Mutex<Vec<String>>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collected(&self) -> Vec<String> {
        self.texts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl PasteSink for CollectSink {
    fn paste(&self, text: &str) -> Result<()> {
        self.texts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collect"
    }
}
