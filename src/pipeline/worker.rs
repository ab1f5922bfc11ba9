//! Transcription worker pool.
//!
//! A fixed set of threads pulls finalized segments off the bounded queue
//! and transcribes them through the retrying client. Completion order may
//! differ from capture order; the reassembler restores it downstream.

use crate::capture::wav;
use crate::pipeline::types::{Segment, SegmentOutcome};
use crate::remote::{Operation, Payload, RetryingClient};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

/// Fixed pool of transcription worker threads.
///
/// Workers exit when the segment queue's senders are dropped; `join`
/// is the drain barrier for session stop.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(
        count: usize,
        client: Arc<RetryingClient>,
        segments: crossbeam_channel::Receiver<Segment>,
        outcomes: crossbeam_channel::Sender<SegmentOutcome>,
        cancelled: Arc<AtomicBool>,
        sample_rate: u32,
    ) -> Self {
        let handles = (0..count)
            .map(|_| {
                let client = client.clone();
                let segments = segments.clone();
                let outcomes = outcomes.clone();
                let cancelled = cancelled.clone();
                std::thread::spawn(move || {
                    worker_loop(client, segments, outcomes, cancelled, sample_rate);
                })
            })
            .collect();

        Self { handles }
    }

    /// Number of worker threads.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to drain the queue and exit.
    pub fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                eprintln!("overscribe: worker thread panicked");
            }
        }
    }
}

fn worker_loop(
    client: Arc<RetryingClient>,
    segments: crossbeam_channel::Receiver<Segment>,
    outcomes: crossbeam_channel::Sender<SegmentOutcome>,
    cancelled: Arc<AtomicBool>,
    sample_rate: u32,
) {
    while let Ok(segment) = segments.recv() {
        // Cancelled sessions drop remaining segments without calling out
        if cancelled.load(Ordering::SeqCst) {
            continue;
        }

        let outcome = transcribe_segment(&client, segment, sample_rate);
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
}

/// Transcribe one segment, short-circuiting empty captures.
fn transcribe_segment(
    client: &RetryingClient,
    segment: Segment,
    sample_rate: u32,
) -> SegmentOutcome {
    let seq = segment.seq;
    if segment.samples.is_empty() {
        return SegmentOutcome {
            seq,
            result: Ok(String::new()),
        };
    }

    let result = wav::encode(&segment.samples, sample_rate)
        .and_then(|encoded| client.call(Operation::Transcribe, &Payload::Audio(encoded)));
    SegmentOutcome { seq, result }
}
