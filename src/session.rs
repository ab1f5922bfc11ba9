//! Session lifecycle: start, pause, resume, stop, cancel.
//!
//! One controller owns at most one live session. A session is the whole
//! per-recording pipeline: scheduler, bounded segment queue, worker pool,
//! and a collector thread feeding the ordered reassembler. Stop is a
//! join/barrier: the scheduler's queue sender drops, workers drain and
//! exit, the outcome channel disconnects, and the collector returns the
//! transcript.

use crate::capture::CaptureSource;
use crate::defaults;
use crate::error::{OverscribeError, Result};
use crate::pipeline::scheduler::{SegmentScheduler, SegmentTiming};
use crate::pipeline::sink::PasteSink;
use crate::pipeline::types::{PipelineEvent, SessionMode};
use crate::pipeline::{OrderedReassembler, WorkerPool};
use crate::remote::{Operation, Payload, RetryingClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Recording,
    Paused,
    /// Draining segments and running the final call; pasting comes next.
    Stopping,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Recording => write!(f, "recording"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Stopping => write!(f, "stopping"),
        }
    }
}

struct ActiveSession {
    mode: SessionMode,
    paused: bool,
    scheduler: SegmentScheduler,
    workers: WorkerPool,
    collector: JoinHandle<String>,
    cancelled: Arc<AtomicBool>,
}

/// What the controller remembers about a session handed out via
/// [`SessionController::begin_stop`], so cancel can still reach it.
struct StoppingMarker {
    mode: SessionMode,
    cancelled: Arc<AtomicBool>,
}

/// A session taken out of the controller for draining.
///
/// Created by [`SessionController::begin_stop`]; [`PendingStop::finish`]
/// does the slow work (join workers, final call, paste) and is meant to
/// run without any controller lock held, so status and cancel stay
/// responsive while segments settle.
pub struct PendingStop {
    mode: SessionMode,
    scheduler: SegmentScheduler,
    workers: WorkerPool,
    collector: JoinHandle<String>,
    cancelled: Arc<AtomicBool>,
    client: Arc<RetryingClient>,
    sink: Arc<dyn PasteSink>,
}

impl PendingStop {
    /// Wait for every segment to settle, run the final Format or
    /// DraftPrompt call, and paste the result.
    ///
    /// The cancel flag is consulted after the drain and again after the
    /// final call, so a cancel issued while stopping never pastes.
    ///
    /// # Errors
    /// Fails without pasting anything if the session was cancelled, the
    /// transcript is empty, or the final call fails.
    pub fn finish(self) -> Result<String> {
        let PendingStop {
            mode,
            mut scheduler,
            workers,
            collector,
            cancelled,
            client,
            sink,
        } = self;

        scheduler.stop();
        workers.join();
        let transcript = match collector.join() {
            Ok(transcript) => transcript,
            Err(_) => {
                eprintln!("overscribe: collector thread panicked");
                String::new()
            }
        };

        if cancelled.load(Ordering::SeqCst) {
            return Err(OverscribeError::Session {
                message: "session cancelled".to_string(),
            });
        }

        if transcript.trim().is_empty() {
            return Err(OverscribeError::Session {
                message: "no transcript captured".to_string(),
            });
        }

        let op = match mode {
            SessionMode::Transcribe => Operation::Format,
            SessionMode::Prompt => Operation::DraftPrompt,
        };
        let final_text = client.call(op, &Payload::Text(transcript))?;

        if cancelled.load(Ordering::SeqCst) {
            return Err(OverscribeError::Session {
                message: "session cancelled".to_string(),
            });
        }

        sink.paste(&final_text)?;
        Ok(final_text)
    }
}

/// Drives one dictation session at a time.
pub struct SessionController {
    source: Arc<dyn CaptureSource>,
    client: Arc<RetryingClient>,
    sink: Arc<dyn PasteSink>,
    timing: SegmentTiming,
    worker_count: usize,
    sample_rate: u32,
    events: Option<crossbeam_channel::Sender<PipelineEvent>>,
    session: Option<ActiveSession>,
    stopping: Option<StoppingMarker>,
}

impl SessionController {
    pub fn new(
        source: Arc<dyn CaptureSource>,
        client: Arc<RetryingClient>,
        sink: Arc<dyn PasteSink>,
        timing: SegmentTiming,
        worker_count: usize,
        sample_rate: u32,
    ) -> Self {
        Self {
            source,
            client,
            sink,
            timing,
            worker_count: worker_count.clamp(defaults::MIN_WORKERS, defaults::MAX_WORKERS),
            sample_rate,
            events: None,
            session: None,
            stopping: None,
        }
    }

    /// Forward pipeline status events to the given channel.
    pub fn with_events(mut self, events: crossbeam_channel::Sender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    pub fn state(&self) -> SessionState {
        if self.stopping.is_some() {
            return SessionState::Stopping;
        }
        match &self.session {
            None => SessionState::Idle,
            Some(session) if session.paused => SessionState::Paused,
            Some(_) => SessionState::Recording,
        }
    }

    pub fn mode(&self) -> Option<SessionMode> {
        self.session
            .as_ref()
            .map(|s| s.mode)
            .or_else(|| self.stopping.as_ref().map(|m| m.mode))
    }

    /// Begin a new session.
    ///
    /// Start while paused resumes the existing session. Start while
    /// recording is rejected.
    pub fn start(&mut self, mode: SessionMode) -> Result<()> {
        if self.stopping.is_some() {
            return Err(OverscribeError::Session {
                message: "session is stopping".to_string(),
            });
        }
        if let Some(session) = &mut self.session {
            if session.paused {
                session.scheduler.resume();
                session.paused = false;
                eprintln!("overscribe: resumed ({} mode)", session.mode);
                self.emit(PipelineEvent::SessionResumed);
                return Ok(());
            }
            return Err(OverscribeError::Session {
                message: "already recording".to_string(),
            });
        }

        let (segment_tx, segment_rx) =
            crossbeam_channel::bounded(defaults::SEGMENT_QUEUE_CAP);
        let (outcome_tx, outcome_rx) =
            crossbeam_channel::bounded(defaults::SEGMENT_QUEUE_CAP);
        let cancelled = Arc::new(AtomicBool::new(false));

        let workers = WorkerPool::spawn(
            self.worker_count,
            self.client.clone(),
            segment_rx,
            outcome_tx,
            cancelled.clone(),
            self.sample_rate,
        );

        let events = self.events.clone();
        let collector = std::thread::spawn(move || {
            let mut reassembler = OrderedReassembler::new(0);
            while let Ok(outcome) = outcome_rx.recv() {
                if let Some(events) = &events {
                    let event = match &outcome.result {
                        Ok(text) => PipelineEvent::SegmentTranscribed {
                            seq: outcome.seq,
                            chars: text.len(),
                        },
                        Err(e) => PipelineEvent::SegmentFailed {
                            seq: outcome.seq,
                            message: e.to_string(),
                        },
                    };
                    let _ = events.send(event);
                }
                reassembler.accept(outcome);
            }
            let transcript = reassembler.into_transcript();
            if let Some(events) = &events {
                let _ = events.send(PipelineEvent::TranscriptReady {
                    chars: transcript.len(),
                });
            }
            transcript
        });

        let scheduler = SegmentScheduler::start(
            self.source.clone(),
            segment_tx,
            self.timing,
            cancelled.clone(),
        );

        self.session = Some(ActiveSession {
            mode,
            paused: false,
            scheduler,
            workers,
            collector,
            cancelled,
        });
        eprintln!("overscribe: recording started ({} mode)", mode);
        self.emit(PipelineEvent::SessionStarted { mode });
        Ok(())
    }

    /// Pause the live session; in-flight segments still transcribe.
    pub fn pause(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or_else(|| OverscribeError::Session {
            message: "no active session".to_string(),
        })?;
        if !session.paused {
            session.scheduler.pause();
            session.paused = true;
            eprintln!("overscribe: paused");
            self.emit(PipelineEvent::SessionPaused);
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or_else(|| OverscribeError::Session {
            message: "no active session".to_string(),
        })?;
        if session.paused {
            session.scheduler.resume();
            session.paused = false;
            eprintln!("overscribe: resumed");
            self.emit(PipelineEvent::SessionResumed);
        }
        Ok(())
    }

    /// Take the live session out for draining; the controller reports
    /// `Stopping` until [`complete_stop`](Self::complete_stop).
    ///
    /// The returned [`PendingStop`] carries everything the slow phase
    /// needs, so `finish` can run while the controller serves status and
    /// cancel requests.
    pub fn begin_stop(&mut self) -> Result<PendingStop> {
        if self.stopping.is_some() {
            return Err(OverscribeError::Session {
                message: "stop already in progress".to_string(),
            });
        }
        let session = self.session.take().ok_or_else(|| OverscribeError::Session {
            message: "no active session".to_string(),
        })?;

        self.stopping = Some(StoppingMarker {
            mode: session.mode,
            cancelled: session.cancelled.clone(),
        });
        Ok(PendingStop {
            mode: session.mode,
            scheduler: session.scheduler,
            workers: session.workers,
            collector: session.collector,
            cancelled: session.cancelled,
            client: self.client.clone(),
            sink: self.sink.clone(),
        })
    }

    /// Return to idle once the matching [`PendingStop::finish`] has run.
    pub fn complete_stop(&mut self) {
        self.stopping = None;
    }

    /// Stop recording, wait for every segment to settle, run the final
    /// Format or DraftPrompt call, and paste the result.
    ///
    /// # Errors
    /// Fails without pasting anything if the transcript is empty or the
    /// final call fails.
    pub fn stop_and_process(&mut self) -> Result<String> {
        let pending = self.begin_stop()?;
        let result = pending.finish();
        self.complete_stop();
        result
    }

    /// Drop the live session without transcribing or pasting anything.
    ///
    /// During a stop this flags the in-flight drain instead, which then
    /// skips the final call and the paste. Cancelling with no active
    /// session is a no-op.
    pub fn cancel(&mut self) -> Result<()> {
        if let Some(marker) = &self.stopping {
            marker.cancelled.store(true, Ordering::SeqCst);
            eprintln!("overscribe: session cancelled");
            self.emit(PipelineEvent::SessionCancelled);
            return Ok(());
        }
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        session.cancelled.store(true, Ordering::SeqCst);
        session.scheduler.cancel();
        session.workers.join();
        if session.collector.join().is_err() {
            eprintln!("overscribe: collector thread panicked");
        }
        eprintln!("overscribe: session cancelled");
        self.emit(PipelineEvent::SessionCancelled);
        Ok(())
    }
}
