//! Configuration for the trimming pipeline.
//!
//! A [`CoreConfig`] is built by the consumer (typically trimsaw-cli) and
//! passed into [`crate::pipeline::TrimPipeline`].

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::transcode::ConversionMethod;

/// Default segment length in frames, two minutes of 60 fps video.
pub const DEFAULT_SEGMENT_FRAMES: f64 = 7200.0;

/// Default attempts per segment before a frame mismatch is recorded.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Default pause between encode attempts.
pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(5);

/// Default container extension for trimmed outputs, without the dot.
pub const DEFAULT_OUTPUT_EXTENSION: &str = "webm";

/// Unit for segment length and overlap values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthUnit {
    /// Values are frame counts.
    #[default]
    Frames,
    /// Values are seconds, converted with the source frame rate.
    Seconds,
}

impl LengthUnit {
    /// Converts a length in this unit to whole frames at `fps`.
    /// Seconds are multiplied by fps and truncated toward zero.
    pub fn to_frames(self, value: f64, fps: f64) -> u64 {
        match self {
            LengthUnit::Frames => value as u64,
            LengthUnit::Seconds => (value * fps) as u64,
        }
    }
}

/// Bounded retry behaviour for segment encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per segment, including the first.
    pub max_attempts: u32,
    /// Pause between attempts. Never applied after the final attempt.
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            pause: DEFAULT_RETRY_PAUSE,
        }
    }
}

/// Main configuration for the trimsaw-core library.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    // ---- Segmentation ----
    /// Nominal segment length, in `length_unit`.
    pub segment_length: f64,

    /// Extra length pulled in before each segment start, in `length_unit`.
    /// Never applied to the first segment.
    pub before_overlap: f64,

    /// Extra length appended after each segment end, in `length_unit`.
    /// Never applied past the end of the source.
    pub after_overlap: f64,

    /// Unit the three values above are expressed in.
    pub length_unit: LengthUnit,

    // ---- Conversion ----
    /// Backend used to produce outputs.
    pub method: ConversionMethod,

    /// Extension for trimmed outputs, without the dot.
    pub output_extension: String,

    /// Path to the opencv converter binary, used when `method` selects it.
    pub opencv_converter: PathBuf,

    // ---- Destination ----
    /// Directory prefix outputs are grouped under at the destination,
    /// joined with the source stem. The stem alone when unset.
    pub main_dir: Option<String>,

    // ---- Retry ----
    /// Retry behaviour for segments whose frame count does not verify.
    pub retry: RetryPolicy,

    // ---- Probing ----
    /// Token attached as an authorization header when probing remote
    /// locators.
    pub probe_auth_token: Option<String>,

    // ---- Working Storage ----
    /// Base directory for the per-run scratch directory. The system temp
    /// directory is used when unset.
    pub temp_dir: Option<PathBuf>,
}

impl CoreConfig {
    pub fn new() -> Self {
        Self {
            segment_length: DEFAULT_SEGMENT_FRAMES,
            before_overlap: 0.0,
            after_overlap: 0.0,
            length_unit: LengthUnit::Frames,
            method: ConversionMethod::Ffmpeg,
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
            opencv_converter: PathBuf::from("opencv_converter"),
            main_dir: None,
            retry: RetryPolicy::default(),
            probe_auth_token: None,
            temp_dir: None,
        }
    }

    /// Rejects configurations that cannot yield a valid plan.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.segment_length > 0.0) {
            return Err(CoreError::Plan(format!(
                "segment length {} must be positive",
                self.segment_length
            )));
        }
        if self.before_overlap < 0.0 || self.after_overlap < 0.0 {
            return Err(CoreError::Plan(format!(
                "overlaps must not be negative (before {}, after {})",
                self.before_overlap, self.after_overlap
            )));
        }
        if self.output_extension.is_empty() {
            return Err(CoreError::Plan(
                "output extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
