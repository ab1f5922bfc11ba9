//! Daemon mode for overscribe - owns the session controller and IPC server.

pub mod handler;

use crate::capture::{CaptureSource, CommandFeed, SampleFeed, StreamCaptureSource, WavFeed};
use crate::clock::SystemClock;
use crate::config::{Config, credentials_from_env};
use crate::defaults;
use crate::error::{OverscribeError, Result};
use crate::ipc::server::IpcServer;
use crate::pipeline::scheduler::SegmentTiming;
use crate::pipeline::sink::{CommandSink, PasteSink, StdoutSink};
use crate::pipeline::types::PipelineEvent;
use crate::remote::{CredentialPool, HttpRemoteService, RetryPolicy, RetryingClient};
use crate::session::SessionController;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Shared daemon state: the session controller plus the credential pool
/// consulted for status reports.
pub struct DaemonState {
    pub controller: Mutex<SessionController>,
    pub pool: Arc<CredentialPool>,
}

impl DaemonState {
    pub fn new(controller: SessionController, pool: Arc<CredentialPool>) -> Self {
        Self {
            controller: Mutex::new(controller),
            pool,
        }
    }
}

/// Where the daemon records from.
pub enum CaptureInput {
    /// Spawn a recorder subprocess streaming raw PCM.
    Microphone,
    /// Read one WAV stream from stdin (pipe mode).
    Stdin,
}

/// Run the daemon: wire up the pipeline, start the IPC server, and wait
/// for shutdown via signal or the `shutdown` command.
pub async fn run_daemon(
    config: Config,
    socket_path: Option<PathBuf>,
    input: CaptureInput,
    timing_override: Option<SegmentTiming>,
    quiet: bool,
    verbose: u8,
) -> Result<()> {
    config.validate()?;

    let timing = timing_override.unwrap_or_else(|| SegmentTiming {
        tick_interval: config.segments.tick_interval(),
        segment_cap: config.segments.duration_cap(),
    });
    if timing.segment_cap <= timing.tick_interval {
        return Err(OverscribeError::ConfigInvalidValue {
            key: "segments.duration_cap".to_string(),
            message: "segment cap must exceed the tick interval".to_string(),
        });
    }

    let keys = credentials_from_env(defaults::API_KEY_ENV_PREFIX)?;
    if !quiet {
        eprintln!("overscribe: loaded {} credential(s)", keys.len());
    }

    let pool = Arc::new(CredentialPool::new(
        keys,
        config.credentials.cooldown(),
        Arc::new(SystemClock),
    )?);

    let service = Arc::new(HttpRemoteService::new(&config.service)?);
    let policy = RetryPolicy {
        max_retries: config.transcription.max_retries,
        ..RetryPolicy::default()
    };
    let client = Arc::new(RetryingClient::new(service, Arc::clone(&pool), policy));

    let sample_rate = config.segments.sample_rate;
    let feed: Box<dyn SampleFeed> = match input {
        CaptureInput::Microphone => Box::new(microphone_feed(sample_rate)?),
        CaptureInput::Stdin => Box::new(WavFeed::from_stdin(sample_rate)?),
    };
    let source: Arc<dyn CaptureSource> = Arc::new(StreamCaptureSource::new(feed, sample_rate));

    let sink = select_sink();
    if !quiet {
        eprintln!("overscribe: pasting via {}", sink.name());
    }

    let mut controller = SessionController::new(
        source,
        client,
        sink,
        timing,
        config.worker_count(),
        sample_rate,
    );
    if verbose > 0 {
        controller = controller.with_events(spawn_event_printer());
    }

    let state = DaemonState::new(controller, pool);

    let socket_path = socket_path.unwrap_or_else(IpcServer::default_socket_path);
    let server = Arc::new(IpcServer::new(socket_path)?);

    if !quiet {
        eprintln!(
            "overscribe: IPC server listening at {}",
            server.socket_path().display()
        );
        eprintln!("overscribe: daemon ready");
    }

    let shutdown = Arc::new(Notify::new());
    let handler = handler::DaemonCommandHandler::new(state, Arc::clone(&shutdown), quiet);

    let server_clone = Arc::clone(&server);
    let server_handle = tokio::spawn(async move { server_clone.start(handler).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            if !quiet {
                eprintln!("\noverscribe: received SIGINT, shutting down");
            }
        }
        res = wait_for_sigterm() => {
            if let Err(e) = res {
                eprintln!("overscribe: error setting up signal handler: {}", e);
            }
            if !quiet {
                eprintln!("\noverscribe: received SIGTERM, shutting down");
            }
        }
        _ = shutdown.notified() => {
            if !quiet {
                eprintln!("overscribe: shutdown requested");
            }
        }
    }

    server.stop().await?;

    if let Err(e) = server_handle.await {
        eprintln!("overscribe: daemon server task failed: {e}");
    }

    if !quiet {
        eprintln!("overscribe: daemon stopped");
    }

    Ok(())
}

/// Wait for SIGTERM signal (used by systemd).
#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| OverscribeError::Other(format!("Failed to register SIGTERM handler: {}", e)))?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    std::future::pending::<()>().await
}

/// Spawn a microphone recorder subprocess.
///
/// Tries `arecord` (ALSA) first and falls back to `parecord` (PulseAudio).
fn microphone_feed(sample_rate: u32) -> Result<CommandFeed> {
    let rate = sample_rate.to_string();
    let arecord_args: [&str; 9] = ["-q", "-f", "S16_LE", "-r", &rate, "-c", "1", "-t", "raw"];
    match CommandFeed::spawn("arecord", &arecord_args, sample_rate) {
        Ok(feed) => Ok(feed),
        Err(arecord_err) => {
            let rate_flag = format!("--rate={}", rate);
            let parecord_args: [&str; 4] = ["--raw", "--format=s16le", &rate_flag, "--channels=1"];
            CommandFeed::spawn("parecord", &parecord_args, sample_rate).map_err(|_| {
                OverscribeError::Capture {
                    message: format!(
                        "no recorder available (tried arecord and parecord): {}",
                        arecord_err
                    ),
                }
            })
        }
    }
}

/// Print pipeline status events as JSON lines on stderr.
///
/// The printer thread exits when the controller drops its sender.
fn spawn_event_printer() -> crossbeam_channel::Sender<PipelineEvent> {
    let (tx, rx) = crossbeam_channel::unbounded::<PipelineEvent>();
    std::thread::spawn(move || {
        while let Ok(event) = rx.recv() {
            match serde_json::to_string(&event) {
                Ok(json) => eprintln!("overscribe: event {}", json),
                Err(e) => eprintln!("overscribe: unprintable event: {}", e),
            }
        }
    });
    tx
}

/// Pick a paste sink for the current desktop environment.
fn select_sink() -> Arc<dyn PasteSink> {
    if std::env::var("WAYLAND_DISPLAY").is_ok() {
        Arc::new(CommandSink::new("wl-copy", &[]))
    } else if std::env::var("DISPLAY").is_ok() {
        Arc::new(CommandSink::new("xclip", &["-selection", "clipboard"]))
    } else {
        Arc::new(StdoutSink)
    }
}
