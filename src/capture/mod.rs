//! Audio capture: segment-oriented capture traits and sources.

pub mod source;
pub mod stream;
pub mod wav;

pub use source::{CaptureHandle, CaptureSource, MockCaptureSource};
pub use stream::{ChannelFeed, CommandFeed, SampleFeed, StreamCaptureSource, WavFeed};
