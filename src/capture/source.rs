use crate::error::{OverscribeError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trait for sources that record one time-boxed audio segment at a time.
///
/// This trait allows swapping implementations (real capture vs mock).
/// Multiple captures may be open concurrently; overlapping segments each
/// get their own handle.
pub trait CaptureSource: Send + Sync {
    /// Open a new capture that records for at most `cap`.
    ///
    /// # Returns
    /// A handle for the in-progress capture, or an error
    fn open_capture(&self, cap: Duration) -> Result<Arc<dyn CaptureHandle>>;
}

/// Handle for one in-progress segment capture.
///
/// Handles are shared: one thread blocks in `wait` while another may cut
/// the capture short or cancel it.
pub trait CaptureHandle: Send + Sync {
    /// Close the capture now, keeping whatever has been recorded so far.
    fn cut_short(&self);

    /// Abandon the capture; `wait` will return no samples.
    fn cancel(&self);

    /// Block until the capture closes and return its 16-bit PCM samples.
    ///
    /// Returns an empty vector if the capture was cancelled.
    fn wait(&self) -> Result<Vec<i16>>;
}

/// Mock capture source for testing
pub struct MockCaptureSource {
    segments: Mutex<VecDeque<Vec<i16>>>,
    opened: Mutex<u64>,
    default_samples: Vec<i16>,
    should_fail_open: bool,
    should_fail_wait: bool,
    error_message: String,
}

impl MockCaptureSource {
    /// Create a new mock capture source with default settings
    pub fn new() -> Self {
        Self {
            segments: Mutex::new(VecDeque::new()),
            opened: Mutex::new(0),
            default_samples: vec![0i16; 160],
            should_fail_open: false,
            should_fail_wait: false,
            error_message: "mock capture error".to_string(),
        }
    }

    /// Configure scripted samples, one entry per opened capture in order.
    ///
    /// Once the script runs out, captures return the default samples.
    pub fn with_segments(self, segments: Vec<Vec<i16>>) -> Self {
        *self.segments.lock().unwrap_or_else(|e| e.into_inner()) = segments.into();
        self
    }

    /// Configure the samples returned once the script runs out
    pub fn with_default_samples(mut self, samples: Vec<i16>) -> Self {
        self.default_samples = samples;
        self
    }

    /// Configure the mock to fail on open
    pub fn with_open_failure(mut self) -> Self {
        self.should_fail_open = true;
        self
    }

    /// Configure the mock to fail on wait
    pub fn with_wait_failure(mut self) -> Self {
        self.should_fail_wait = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Number of captures opened so far
    pub fn opened_count(&self) -> u64 {
        *self.opened.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockCaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for MockCaptureSource {
    fn open_capture(&self, _cap: Duration) -> Result<Arc<dyn CaptureHandle>> {
        if self.should_fail_open {
            return Err(OverscribeError::Capture {
                message: self.error_message.clone(),
            });
        }

        *self.opened.lock().unwrap_or_else(|e| e.into_inner()) += 1;

        let samples = self
            .segments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.default_samples.clone());

        Ok(Arc::new(MockCaptureHandle {
            state: Mutex::new(MockHandleState {
                samples,
                cancelled: false,
            }),
            should_fail_wait: self.should_fail_wait,
            error_message: self.error_message.clone(),
        }))
    }
}

struct MockHandleState {
    samples: Vec<i16>,
    cancelled: bool,
}

/// Handle produced by [`MockCaptureSource`]; resolves immediately on wait.
pub struct MockCaptureHandle {
    state: Mutex<MockHandleState>,
    should_fail_wait: bool,
    error_message: String,
}

impl CaptureHandle for MockCaptureHandle {
    fn cut_short(&self) {}

    fn cancel(&self) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancelled = true;
    }

    fn wait(&self) -> Result<Vec<i16>> {
        if self.should_fail_wait {
            return Err(OverscribeError::Capture {
                message: self.error_message.clone(),
            });
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.cancelled {
            return Ok(Vec::new());
        }
        Ok(std::mem::take(&mut state.samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_returns_scripted_segments_in_order() {
        let source = MockCaptureSource::new()
            .with_segments(vec![vec![1i16, 2, 3], vec![4i16, 5, 6]]);

        let first = source.open_capture(Duration::from_secs(15)).unwrap();
        let second = source.open_capture(Duration::from_secs(15)).unwrap();

        assert_eq!(first.wait().unwrap(), vec![1i16, 2, 3]);
        assert_eq!(second.wait().unwrap(), vec![4i16, 5, 6]);
    }

    #[test]
    fn test_mock_falls_back_to_default_samples() {
        let source = MockCaptureSource::new()
            .with_segments(vec![vec![1i16]])
            .with_default_samples(vec![9i16, 9]);

        let first = source.open_capture(Duration::from_secs(15)).unwrap();
        let second = source.open_capture(Duration::from_secs(15)).unwrap();

        assert_eq!(first.wait().unwrap(), vec![1i16]);
        assert_eq!(second.wait().unwrap(), vec![9i16, 9]);
    }

    #[test]
    fn test_mock_open_failure() {
        let source = MockCaptureSource::new()
            .with_open_failure()
            .with_error_message("device gone");

        let result = source.open_capture(Duration::from_secs(15));

        match result {
            Err(OverscribeError::Capture { message }) => {
                assert_eq!(message, "device gone");
            }
            _ => panic!("Expected Capture error"),
        }
    }

    #[test]
    fn test_mock_wait_failure() {
        let source = MockCaptureSource::new().with_wait_failure();

        let handle = source.open_capture(Duration::from_secs(15)).unwrap();
        let result = handle.wait();

        assert!(matches!(result, Err(OverscribeError::Capture { .. })));
    }

    #[test]
    fn test_cancelled_capture_returns_no_samples() {
        let source = MockCaptureSource::new().with_segments(vec![vec![1i16, 2, 3]]);

        let handle = source.open_capture(Duration::from_secs(15)).unwrap();
        handle.cancel();

        assert_eq!(handle.wait().unwrap(), Vec::<i16>::new());
    }

    #[test]
    fn test_opened_count_tracks_captures() {
        let source = MockCaptureSource::new();
        assert_eq!(source.opened_count(), 0);

        let _a = source.open_capture(Duration::from_secs(15)).unwrap();
        let _b = source.open_capture(Duration::from_secs(15)).unwrap();

        assert_eq!(source.opened_count(), 2);
    }

    #[test]
    fn test_source_trait_is_object_safe() {
        let source: Box<dyn CaptureSource> =
            Box::new(MockCaptureSource::new().with_segments(vec![vec![7i16]]));

        let handle = source.open_capture(Duration::from_secs(15)).unwrap();
        assert_eq!(handle.wait().unwrap(), vec![7i16]);
    }

    #[test]
    fn test_handle_is_shareable_across_threads() {
        let source = MockCaptureSource::new().with_segments(vec![vec![5i16; 10]]);
        let handle = source.open_capture(Duration::from_secs(15)).unwrap();

        let waiter = {
            let handle = handle.clone();
            std::thread::spawn(move || handle.wait())
        };
        handle.cut_short();

        assert_eq!(waiter.join().unwrap().unwrap(), vec![5i16; 10]);
    }
}
