//! Segment pipeline: scheduling, transcription workers, ordered reassembly.

pub mod reassembler;
pub mod scheduler;
pub mod sink;
pub mod types;
pub mod worker;

pub use reassembler::OrderedReassembler;
pub use scheduler::{SegmentScheduler, SegmentTiming};
pub use sink::{CollectSink, PasteSink, StdoutSink};
pub use types::{PipelineEvent, Segment, SegmentOutcome, SessionMode};
pub use worker::WorkerPool;
