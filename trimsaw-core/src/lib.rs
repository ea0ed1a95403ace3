//! Core library for trimsaw, a pipeline that cuts source videos into
//! fixed-length overlapping segments, verifies the results frame by frame
//! and publishes an audit report next to the outputs.
//!
//! The library is organized as a set of stages the [`pipeline`] module
//! sequences: a [`planner`] that derives the segment layout and reuses
//! acceptable outputs from earlier runs, a [`transcode`] executor that
//! drives ffmpeg or an OpenCV-based converter with bounded retries, a
//! [`verify`] module holding the frame-consistency checks, and a
//! [`report`] generator that re-audits the destination and writes the
//! CSV artifacts. Storage and probing sit behind traits so callers can
//! substitute their own backends.
//!
//! # Example
//!
//! ```rust,no_run
//! use trimsaw_core::{
//!     CoreConfig, FfprobeProber, FsDestinationStore, FsSourceRecord, NullProgressSink,
//!     TrimPipeline,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CoreConfig::new();
//!     let mut record = FsSourceRecord::open("videos/movie.mp4")?;
//!     let store = FsDestinationStore::new("trimmed");
//!     let prober = FfprobeProber::new(None);
//!     let transcoder = config.method.build(&config);
//!
//!     let pipeline = TrimPipeline::new(&config, &mut record, &store, &prober, &*transcoder);
//!     let outcome = pipeline.run(&mut NullProgressSink)?;
//!     println!(
//!         "{} segments, verified: {}",
//!         outcome.planned, outcome.verified
//!     );
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod report;
pub mod segment;
pub mod store;
pub mod timecode;
pub mod transcode;
pub mod util;
pub mod verify;

// Configuration.
pub use config::{CoreConfig, LengthUnit, RetryPolicy};

// Errors.
pub use error::{CoreError, CoreResult};

// Pipeline entry points.
pub use pipeline::{PipelineState, RunOutcome, TrimPipeline};

// Planning.
pub use planner::{compute_plan, PlannerInput};
pub use segment::{Segment, SegmentPlan};

// Probing.
pub use probe::{FfprobeProber, MediaProber, VideoMetadata};

// Progress reporting.
pub use progress::{NullProgressSink, ProgressSink};

// Reporting.
pub use report::{ReportOutcome, ReportRequest};

// Storage seams and the filesystem implementations.
pub use store::{
    DestinationStore, FsDestinationStore, FsSourceRecord, ItemMetadata, SourceRecord, StoredItem,
    TrimMetadata, TrimStatusBlock,
};

// Timecode arithmetic.
pub use timecode::TimeFrame;

// Transcoding.
pub use transcode::{ConversionMethod, Transcoder};

// Verification records.
pub use verify::{ErrorLog, ErrorRecord};
