//! Command handler implementation for the daemon.

use crate::daemon::DaemonState;
use crate::ipc::protocol::{Command, Response};
use crate::ipc::server::CommandHandler;
use crate::pipeline::types::SessionMode;
use crate::session::SessionController;
use std::sync::{Arc, MutexGuard};
use tokio::sync::Notify;

/// Command handler for daemon IPC commands.
pub struct DaemonCommandHandler {
    state: Arc<DaemonState>,
    shutdown: Arc<Notify>,
    quiet: bool,
}

impl DaemonCommandHandler {
    /// Creates a new command handler.
    pub fn new(state: DaemonState, shutdown: Arc<Notify>, quiet: bool) -> Self {
        Self {
            state: Arc::new(state),
            shutdown,
            quiet,
        }
    }

    fn controller(&self) -> MutexGuard<'_, SessionController> {
        self.state.controller.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start (or resume) a session. Cheap: only spawns threads.
    fn start_session(&self, mode: SessionMode) -> Response {
        match self.controller().start(mode) {
            Ok(()) => Response::Ok,
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        }
    }

    fn pause_session(&self) -> Response {
        match self.controller().pause() {
            Ok(()) => Response::Ok,
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        }
    }

    fn resume_session(&self) -> Response {
        match self.controller().resume() {
            Ok(()) => Response::Ok,
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        }
    }

    /// Stop, transcribe, format, and paste.
    ///
    /// The controller lock is held only to take the session out and to
    /// finish afterwards. The slow phase (joining worker threads and the
    /// blocking HTTP final call) runs on a blocking thread without the
    /// lock, so Status keeps answering and Cancel can still flag the
    /// drain before anything is pasted.
    async fn stop_session(&self) -> Response {
        let pending = match self.controller().begin_stop() {
            Ok(pending) => pending,
            Err(e) => {
                return Response::Error {
                    message: e.to_string(),
                };
            }
        };

        let quiet = self.quiet;
        let result = tokio::task::spawn_blocking(move || {
            let result = pending.finish();
            if let Err(e) = &result
                && !quiet
            {
                eprintln!("overscribe: {}", e.user_message());
            }
            result
        })
        .await;

        self.controller().complete_stop();

        match result {
            Ok(Ok(text)) => Response::Pasted { text },
            Ok(Err(e)) => Response::Error {
                message: e.user_message(),
            },
            Err(join_err) => Response::Error {
                message: format!("stop task failed: {}", join_err),
            },
        }
    }

    /// Discard the session. Joins threads, so it also runs blocking.
    async fn cancel_session(&self) -> Response {
        let state = Arc::clone(&self.state);
        let result = tokio::task::spawn_blocking(move || {
            state
                .controller
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .cancel()
        })
        .await;

        match result {
            Ok(Ok(())) => Response::Ok,
            Ok(Err(e)) => Response::Error {
                message: e.to_string(),
            },
            Err(join_err) => Response::Error {
                message: format!("cancel task failed: {}", join_err),
            },
        }
    }

    /// Get daemon status.
    fn get_status(&self) -> Response {
        let controller = self.controller();
        Response::Status {
            state: controller.state(),
            mode: controller.mode(),
            credentials_available: self.state.pool.has_available(),
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for DaemonCommandHandler {
    async fn handle(&self, command: Command) -> Response {
        match command {
            Command::Start { mode } => self.start_session(mode),
            Command::Pause => self.pause_session(),
            Command::Resume => self.resume_session(),
            Command::Stop => self.stop_session().await,
            Command::Cancel => self.cancel_session().await,
            Command::Status => self.get_status(),
            Command::Shutdown => {
                self.shutdown.notify_one();
                Response::Ok
            }
        }
    }
}
