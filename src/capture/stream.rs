//! Capture source backed by a continuous sample feed.
//!
//! A feeder thread pulls chunks from a [`SampleFeed`] and fans them out to
//! every open capture. Overlapping segments each tap the same live stream,
//! so a chunk arriving while two captures are open lands in both.

use crate::capture::source::{CaptureHandle, CaptureSource};
use crate::capture::wav;
use crate::error::Result;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// Source of mono PCM chunks at the session sample rate.
///
/// An empty chunk signals end of feed.
pub trait SampleFeed: Send {
    fn next_chunk(&mut self) -> Result<Vec<i16>>;
}

/// Feed that decodes a WAV stream up front and replays it in 100ms chunks.
pub struct WavFeed {
    samples: Vec<i16>,
    position: usize,
    chunk_size: usize,
}

impl WavFeed {
    /// Create from any reader.
    pub fn from_reader(reader: Box<dyn Read + Send>, sample_rate: u32) -> Result<Self> {
        let samples = wav::decode(reader, sample_rate)?;
        Ok(Self {
            samples,
            position: 0,
            chunk_size: (sample_rate / 10) as usize,
        })
    }

    /// Create from stdin.
    pub fn from_stdin(sample_rate: u32) -> Result<Self> {
        // Read all data from stdin into memory first (StdinLock is not Send)
        let mut buffer = Vec::new();
        std::io::stdin().lock().read_to_end(&mut buffer)?;
        Self::from_reader(Box::new(Cursor::new(buffer)), sample_rate)
    }
}

impl SampleFeed for WavFeed {
    fn next_chunk(&mut self) -> Result<Vec<i16>> {
        if self.position >= self.samples.len() {
            return Ok(Vec::new());
        }

        let end = std::cmp::min(self.position + self.chunk_size, self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;

        Ok(chunk)
    }
}

/// Feed that streams raw signed 16-bit little-endian PCM from a recorder
/// subprocess, e.g. `arecord -f S16_LE -r 16000 -c 1 -t raw`.
pub struct CommandFeed {
    child: std::process::Child,
    stdout: std::process::ChildStdout,
    chunk_bytes: usize,
}

impl CommandFeed {
    /// Spawn the recorder and start reading its stdout.
    pub fn spawn(program: &str, args: &[&str], sample_rate: u32) -> Result<Self> {
        let mut child = std::process::Command::new(program)
            .args(args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| crate::error::OverscribeError::Capture {
                message: format!("failed to spawn '{}': {}", program, e),
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| crate::error::OverscribeError::Capture {
                message: format!("'{}' produced no stdout", program),
            })?;

        Ok(Self {
            child,
            stdout,
            // 100ms of samples, 2 bytes each
            chunk_bytes: (sample_rate / 10) as usize * 2,
        })
    }
}

impl SampleFeed for CommandFeed {
    fn next_chunk(&mut self) -> Result<Vec<i16>> {
        let mut buffer = vec![0u8; self.chunk_bytes];
        let mut filled = 0;
        while filled < buffer.len() {
            let n = self.stdout.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        let samples = buffer[..filled - filled % 2]
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(samples)
    }
}

impl Drop for CommandFeed {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Feed driven by another thread over a channel.
///
/// Dropping all senders ends the feed.
pub struct ChannelFeed {
    receiver: crossbeam_channel::Receiver<Vec<i16>>,
}

impl ChannelFeed {
    pub fn new() -> (crossbeam_channel::Sender<Vec<i16>>, Self) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (sender, Self { receiver })
    }
}

impl SampleFeed for ChannelFeed {
    fn next_chunk(&mut self) -> Result<Vec<i16>> {
        match self.receiver.recv() {
            Ok(chunk) => Ok(chunk),
            Err(_) => Ok(Vec::new()),
        }
    }
}

struct TapState {
    samples: Vec<i16>,
    cap: usize,
    closed: bool,
    cancelled: bool,
}

struct Tap {
    state: Mutex<TapState>,
    on_close: Condvar,
}

impl Tap {
    fn lock(&self) -> MutexGuard<'_, TapState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            self.on_close.notify_all();
        }
    }
}

/// Capture source that taps a shared live stream.
pub struct StreamCaptureSource {
    taps: Arc<Mutex<Vec<Arc<Tap>>>>,
    sample_rate: u32,
    feed_ended: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    feeder: Mutex<Option<JoinHandle<()>>>,
}

impl StreamCaptureSource {
    /// Start feeding from the given source.
    ///
    /// The feeder thread runs until the feed ends or the source is dropped.
    pub fn new(mut feed: Box<dyn SampleFeed>, sample_rate: u32) -> Self {
        let taps: Arc<Mutex<Vec<Arc<Tap>>>> = Arc::new(Mutex::new(Vec::new()));
        let feed_ended = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let feeder = {
            let taps = Arc::clone(&taps);
            let feed_ended = Arc::clone(&feed_ended);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                loop {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let chunk = match feed.next_chunk() {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            eprintln!("overscribe: capture feed error: {}", e);
                            break;
                        }
                    };
                    if chunk.is_empty() {
                        break;
                    }
                    distribute(&taps, &chunk);
                }

                // Late-opened captures must not block forever
                feed_ended.store(true, Ordering::SeqCst);
                let mut taps_guard = taps.lock().unwrap_or_else(|e| e.into_inner());
                for tap in taps_guard.drain(..) {
                    tap.close();
                }
            })
        };

        Self {
            taps,
            sample_rate,
            feed_ended,
            stop,
            feeder: Mutex::new(Some(feeder)),
        }
    }
}

/// Append a chunk to every open tap, closing taps that reach their cap.
fn distribute(taps: &Mutex<Vec<Arc<Tap>>>, chunk: &[i16]) {
    let mut taps_guard = taps.lock().unwrap_or_else(|e| e.into_inner());
    taps_guard.retain(|tap| {
        let mut state = tap.lock();
        if state.closed {
            return false;
        }
        let remaining = state.cap.saturating_sub(state.samples.len());
        let take = remaining.min(chunk.len());
        state.samples.extend_from_slice(&chunk[..take]);
        if state.samples.len() >= state.cap {
            state.closed = true;
            tap.on_close.notify_all();
            false
        } else {
            true
        }
    });
}

impl StreamCaptureSource {
    fn open_tap(&self, cap: Duration) -> StreamCaptureHandle {
        let cap_samples = (cap.as_secs_f64() * self.sample_rate as f64) as usize;
        let tap = Arc::new(Tap {
            state: Mutex::new(TapState {
                samples: Vec::new(),
                cap: cap_samples.max(1),
                closed: false,
                cancelled: false,
            }),
            on_close: Condvar::new(),
        });

        if self.feed_ended.load(Ordering::SeqCst) {
            // Nothing left to record
            tap.close();
        } else {
            self.taps
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(Arc::clone(&tap));

            // The feeder may have ended between the check and the push
            if self.feed_ended.load(Ordering::SeqCst) {
                tap.close();
            }
        }

        StreamCaptureHandle { tap }
    }
}

impl CaptureSource for StreamCaptureSource {
    fn open_capture(&self, cap: Duration) -> Result<Arc<dyn CaptureHandle>> {
        Ok(Arc::new(self.open_tap(cap)))
    }
}

impl Drop for StreamCaptureSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        let handle = self
            .feeder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

struct StreamCaptureHandle {
    tap: Arc<Tap>,
}

impl CaptureHandle for StreamCaptureHandle {
    fn cut_short(&self) {
        self.tap.close();
    }

    fn cancel(&self) {
        let mut state = self.tap.lock();
        state.cancelled = true;
        if !state.closed {
            state.closed = true;
            self.tap.on_close.notify_all();
        }
    }

    fn wait(&self) -> Result<Vec<i16>> {
        let mut state = self.tap.lock();
        while !state.closed {
            state = self
                .tap
                .on_close
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        if state.cancelled {
            Ok(Vec::new())
        } else {
            Ok(std::mem::take(&mut state.samples))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_closes_when_cap_reached() {
        let (tx, feed) = ChannelFeed::new();
        let source = StreamCaptureSource::new(Box::new(feed), 16000);

        // 100ms cap = 1600 samples
        let handle = source.open_capture(Duration::from_millis(100)).unwrap();

        tx.send(vec![1i16; 1000]).unwrap();
        tx.send(vec![2i16; 1000]).unwrap();

        let samples = handle.wait().unwrap();
        assert_eq!(samples.len(), 1600);
        assert!(samples[..1000].iter().all(|&s| s == 1));
        assert!(samples[1000..].iter().all(|&s| s == 2));

        // End the feed before `source` drops and joins the feeder thread
        drop(tx);
    }

    #[test]
    fn overlapping_taps_both_receive_live_chunks() {
        let (tx, feed) = ChannelFeed::new();
        let source = StreamCaptureSource::new(Box::new(feed), 16000);

        let first = source.open_capture(Duration::from_secs(1)).unwrap();
        let second = source.open_capture(Duration::from_secs(1)).unwrap();

        tx.send(vec![7i16; 16000]).unwrap();

        assert_eq!(first.wait().unwrap(), vec![7i16; 16000]);
        assert_eq!(second.wait().unwrap(), vec![7i16; 16000]);

        // End the feed before `source` drops and joins the feeder thread
        drop(tx);
    }

    #[test]
    fn cut_short_keeps_partial_samples() {
        let (tx, feed) = ChannelFeed::new();
        let source = StreamCaptureSource::new(Box::new(feed), 16000);

        let handle = source.open_tap(Duration::from_secs(10));
        tx.send(vec![3i16; 500]).unwrap();

        // Let the feeder deliver the chunk before cutting
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            if handle.tap.lock().samples.len() == 500 {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "chunk never arrived");
            std::thread::sleep(Duration::from_millis(5));
        }

        handle.cut_short();
        assert_eq!(handle.wait().unwrap(), vec![3i16; 500]);

        // End the feed before `source` drops and joins the feeder thread
        drop(tx);
    }

    #[test]
    fn cancel_discards_samples() {
        let (tx, feed) = ChannelFeed::new();
        let source = StreamCaptureSource::new(Box::new(feed), 16000);

        let handle = source.open_capture(Duration::from_secs(10)).unwrap();
        tx.send(vec![3i16; 500]).unwrap();
        handle.cancel();

        assert_eq!(handle.wait().unwrap(), Vec::<i16>::new());

        // End the feed before `source` drops and joins the feeder thread
        drop(tx);
    }

    #[test]
    fn tap_opened_after_feed_ends_resolves_empty() {
        let (tx, feed) = ChannelFeed::new();
        let source = StreamCaptureSource::new(Box::new(feed), 16000);
        drop(tx);

        // Wait for the feeder to notice the feed ended
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !source.feed_ended.load(Ordering::SeqCst) {
            assert!(std::time::Instant::now() < deadline, "feeder never ended");
            std::thread::sleep(Duration::from_millis(5));
        }

        let handle = source.open_capture(Duration::from_secs(1)).unwrap();
        assert_eq!(handle.wait().unwrap(), Vec::<i16>::new());
    }

    #[test]
    fn feed_end_closes_open_taps_with_partial_data() {
        let (tx, feed) = ChannelFeed::new();
        let source = StreamCaptureSource::new(Box::new(feed), 16000);

        let handle = source.open_capture(Duration::from_secs(60)).unwrap();
        tx.send(vec![5i16; 800]).unwrap();
        drop(tx);

        assert_eq!(handle.wait().unwrap(), vec![5i16; 800]);
    }

    #[test]
    fn command_feed_reads_little_endian_pcm() {
        // 4 samples: 1, -1, 256, 0
        let mut feed = CommandFeed::spawn(
            "printf",
            &[r"\x01\x00\xff\xff\x00\x01\x00\x00"],
            16000,
        )
        .unwrap();

        let chunk = feed.next_chunk().unwrap();
        assert_eq!(chunk, vec![1i16, -1, 256, 0]);
        assert!(feed.next_chunk().unwrap().is_empty());
    }

    #[test]
    fn command_feed_missing_program_errors() {
        let result = CommandFeed::spawn("definitely-not-a-real-recorder", &[], 16000);
        assert!(result.is_err());
    }

    #[test]
    fn wav_feed_replays_decoded_samples_in_chunks() {
        let data = wav::encode(&vec![9i16; 2000], 16000).unwrap();
        let mut feed = WavFeed::from_reader(Box::new(Cursor::new(data)), 16000).unwrap();

        let first = feed.next_chunk().unwrap();
        assert_eq!(first.len(), 1600);

        let second = feed.next_chunk().unwrap();
        assert_eq!(second.len(), 400);

        assert!(feed.next_chunk().unwrap().is_empty());
    }
}
