//! Segment cadence: the overlapping-capture scheduler.
//!
//! While recording, a tick every `tick_interval` opens a new capture with
//! cap `segment_cap`. Because the cap exceeds the interval, consecutive
//! segments overlap and coverage has no gaps. Each capture gets a watcher
//! thread that waits for it to close and queues the finalized segment.

use crate::capture::{CaptureHandle, CaptureSource};
use crate::defaults;
use crate::error::Result;
use crate::pipeline::types::Segment;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Cadence knobs. The cap must exceed the interval.
#[derive(Debug, Clone, Copy)]
pub struct SegmentTiming {
    pub tick_interval: Duration,
    pub segment_cap: Duration,
}

impl Default for SegmentTiming {
    fn default() -> Self {
        Self {
            tick_interval: defaults::TICK_INTERVAL,
            segment_cap: defaults::SEGMENT_CAP,
        }
    }
}

enum Command {
    Pause,
    Resume,
    Stop,
    Cancel,
}

/// Timer-driven segment opener for one session.
///
/// Owns the only sender for the segment queue: when the scheduler thread
/// exits, the queue disconnects and workers drain out.
pub struct SegmentScheduler {
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl SegmentScheduler {
    /// Start recording immediately; the first segment opens right away.
    pub fn start(
        source: Arc<dyn CaptureSource>,
        segments: Sender<Segment>,
        timing: SegmentTiming,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let thread = std::thread::spawn(move || {
            run(source, segments, timing, cancelled, command_rx);
        });
        Self {
            commands: command_tx,
            thread: Some(thread),
        }
    }

    /// Stop opening segments; in-flight captures finish and queue.
    pub fn pause(&self) {
        let _ = self.commands.send(Command::Pause);
    }

    /// Resume ticking; a segment opens immediately.
    pub fn resume(&self) {
        let _ = self.commands.send(Command::Resume);
    }

    /// Cut live captures short and shut down.
    ///
    /// Returns once every watcher has queued its segment and the queue
    /// sender is dropped.
    pub fn stop(&mut self) {
        let _ = self.commands.send(Command::Stop);
        self.join();
    }

    /// Cancel live captures; nothing further is queued.
    pub fn cancel(&mut self) {
        let _ = self.commands.send(Command::Cancel);
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            eprintln!("overscribe: scheduler thread panicked");
        }
    }
}

impl Drop for SegmentScheduler {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Stop);
        self.join();
    }
}

struct Watcher {
    thread: JoinHandle<()>,
    handle: Arc<dyn CaptureHandle>,
    done: Arc<AtomicBool>,
}

fn run(
    source: Arc<dyn CaptureSource>,
    segments: Sender<Segment>,
    timing: SegmentTiming,
    cancelled: Arc<AtomicBool>,
    commands: Receiver<Command>,
) {
    let started = Instant::now();
    let mut next_seq: u64 = 0;
    let mut recording = true;
    let mut open_now = true;
    let mut watchers: Vec<Watcher> = Vec::new();

    loop {
        if recording && open_now {
            // Settled watchers have already queued their segment
            watchers.retain(|w| !w.done.load(Ordering::SeqCst));

            match open_segment(&*source, &segments, timing, started, next_seq, &cancelled) {
                Ok(watcher) => {
                    watchers.push(watcher);
                    next_seq += 1;
                }
                Err(e) => {
                    eprintln!("overscribe: failed to open segment {}: {}", next_seq, e);
                }
            }
            open_now = false;
        }

        let command = if recording {
            match commands.recv_timeout(timing.tick_interval) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => {
                    open_now = true;
                    None
                }
                Err(RecvTimeoutError::Disconnected) => Some(Command::Stop),
            }
        } else {
            // Paused: nothing to do until the next command
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => Some(Command::Stop),
            }
        };

        match command {
            None => {}
            Some(Command::Pause) => recording = false,
            Some(Command::Resume) => {
                if !recording {
                    recording = true;
                    open_now = true;
                }
            }
            Some(Command::Stop) => {
                for watcher in &watchers {
                    watcher.handle.cut_short();
                }
                break;
            }
            Some(Command::Cancel) => {
                cancelled.store(true, Ordering::SeqCst);
                for watcher in &watchers {
                    watcher.handle.cancel();
                }
                break;
            }
        }
    }

    for watcher in watchers {
        if watcher.thread.join().is_err() {
            eprintln!("overscribe: segment watcher panicked");
        }
    }
    // The segment sender drops here; workers drain what is queued and exit
}

fn open_segment(
    source: &dyn CaptureSource,
    segments: &Sender<Segment>,
    timing: SegmentTiming,
    started: Instant,
    seq: u64,
    cancelled: &Arc<AtomicBool>,
) -> Result<Watcher> {
    let handle = source.open_capture(timing.segment_cap)?;
    let offset = started.elapsed();
    let done = Arc::new(AtomicBool::new(false));

    let thread = {
        let handle = handle.clone();
        let segments = segments.clone();
        let cancelled = cancelled.clone();
        let done = done.clone();
        std::thread::spawn(move || {
            let samples = match handle.wait() {
                Ok(samples) => samples,
                Err(e) => {
                    eprintln!("overscribe: capture for segment {} failed: {}", seq, e);
                    Vec::new()
                }
            };
            if !cancelled.load(Ordering::SeqCst) {
                let _ = segments.send(Segment {
                    seq,
                    offset,
                    samples,
                });
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    Ok(Watcher {
        thread,
        handle,
        done,
    })
}
