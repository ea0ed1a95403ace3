//! Conversion backends and the retrying segment encoder.
//!
//! Two backends sit behind the [`Transcoder`] trait: ffmpeg, which can cut
//! a frame range out of the source, and an external opencv converter that
//! only handles whole files. The [`SegmentEncoder`] drives a backend over
//! every pending segment of a plan, verifying each output's frame count
//! and retrying within a bounded [`RetryPolicy`].

use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::str::FromStr;
use std::thread;

use crate::config::{CoreConfig, RetryPolicy};
use crate::error::{CoreError, CoreResult};
use crate::probe::MediaProber;
use crate::progress::{ProgressReporter, transcode_band};
use crate::segment::{Segment, SegmentPlan};
use crate::util::command::{parse_frame_marker, run_command, run_command_streaming};
use crate::verify::{ErrorLog, frame_diff_record};

/// Backend used to produce trimmed outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionMethod {
    #[default]
    Ffmpeg,
    Opencv,
}

impl ConversionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversionMethod::Ffmpeg => "ffmpeg",
            ConversionMethod::Opencv => "opencv",
        }
    }

    /// Builds the backend this tag selects, using the configured converter
    /// path for opencv.
    pub fn build(self, config: &CoreConfig) -> Box<dyn Transcoder> {
        match self {
            ConversionMethod::Ffmpeg => Box::new(FfmpegTranscoder),
            ConversionMethod::Opencv => {
                Box::new(OpencvTranscoder::new(config.opencv_converter.clone()))
            }
        }
    }
}

impl fmt::Display for ConversionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ffmpeg" => Ok(ConversionMethod::Ffmpeg),
            "opencv" => Ok(ConversionMethod::Opencv),
            other => Err(CoreError::Unsupported(format!(
                "unknown conversion method '{other}'"
            ))),
        }
    }
}

/// Source range to extract, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeRange {
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

/// One conversion request handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub target_fps: f64,
    /// Range to extract; the whole file when unset.
    pub range: Option<TranscodeRange>,
}

/// A conversion backend.
pub trait Transcoder {
    fn transcode(&self, job: &TranscodeJob) -> CoreResult<()>;
}

/// [`Transcoder`] backed by the ffmpeg executable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegTranscoder;

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, job: &TranscodeJob) -> CoreResult<()> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(ffmpeg_args(job));
        let output_name = job.output.display().to_string();
        run_command_streaming("ffmpeg", &mut cmd, |line| {
            if let Some(frame) = parse_frame_marker(line) {
                log::debug!("ffmpeg {output_name}: frame {frame}");
            }
        })?;
        Ok(())
    }
}

/// Argument list for an ffmpeg conversion. The rate precedes the input so
/// it applies to demuxing; `-ss`/`-t` are omitted for whole-file jobs.
fn ffmpeg_args(job: &TranscodeJob) -> Vec<String> {
    let mut args = vec!["-r".to_string(), job.target_fps.to_string()];
    if let Some(range) = &job.range {
        args.push("-ss".to_string());
        args.push(range.start_seconds.to_string());
    }
    args.push("-i".to_string());
    args.push(job.input.display().to_string());
    if let Some(range) = &job.range {
        args.push("-t".to_string());
        args.push(range.duration_seconds.to_string());
    }
    args.extend(
        ["-y", "-v", "info", "-max_muxing_queue_size", "9999"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.push(job.output.display().to_string());
    args
}

/// [`Transcoder`] shelling out to the standalone opencv converter binary.
/// Whole-file conversions only.
#[derive(Debug, Clone)]
pub struct OpencvTranscoder {
    binary: PathBuf,
}

impl OpencvTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Transcoder for OpencvTranscoder {
    fn transcode(&self, job: &TranscodeJob) -> CoreResult<()> {
        if job.range.is_some() {
            return Err(CoreError::Unsupported(
                "the opencv converter handles whole files only, not ranges".to_string(),
            ));
        }
        let tool = self.binary.display().to_string();
        run_command(
            &tool,
            Command::new(&self.binary).arg(&job.input).arg(&job.output),
        )?;
        Ok(())
    }
}

/// Drives a backend over every pending segment of a plan.
///
/// Each output is probed after the attempt; a frame count that misses the
/// planned window is retried up to the policy's attempt limit and then
/// recorded as a frame-diff error, never failing the run. Backend and
/// probe errors propagate.
pub struct SegmentEncoder<'a> {
    transcoder: &'a dyn Transcoder,
    prober: &'a dyn MediaProber,
    retry: RetryPolicy,
}

impl<'a> SegmentEncoder<'a> {
    pub fn new(
        transcoder: &'a dyn Transcoder,
        prober: &'a dyn MediaProber,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transcoder,
            prober,
            retry,
        }
    }

    /// Encodes the plan's pending segments in timeline order. Returns the
    /// number of outputs produced.
    pub fn encode_pending(
        &self,
        plan: &SegmentPlan,
        errors: &mut ErrorLog,
        progress: &mut ProgressReporter<'_>,
    ) -> CoreResult<usize> {
        let pending = plan.pending_count();
        if pending == 0 {
            log::info!("every planned segment already exists, nothing to trim");
            return Ok(0);
        }
        log::info!(
            "trimming {pending} of {} segments from {}",
            plan.len(),
            plan.source_path().display()
        );

        let total_frames = plan.source_frame_count();
        let mut encoded = 0;
        for segment in plan.pending() {
            let job = TranscodeJob {
                input: plan.source_path().to_path_buf(),
                output: plan.output_path(segment),
                target_fps: plan.source_fps(),
                range: Some(TranscodeRange {
                    start_seconds: segment.start().seconds(),
                    duration_seconds: segment.duration(),
                }),
            };
            self.encode_segment(segment, &job, errors)?;
            encoded += 1;
            progress.advance(
                transcode_band(segment.start().frame(), total_frames),
                &format!("Trimming {}/{}", segment.start().frame(), total_frames),
            );
        }
        Ok(encoded)
    }

    fn encode_segment(
        &self,
        segment: &Segment,
        job: &TranscodeJob,
        errors: &mut ErrorLog,
    ) -> CoreResult<()> {
        // At least one attempt regardless of policy.
        let attempts = self.retry.max_attempts.max(1);
        let wanted = segment.frame_count();
        let mut observed = None;

        for attempt in 1..=attempts {
            self.transcoder.transcode(job)?;
            let meta = self
                .prober
                .probe(&job.output.display().to_string(), false)?;
            observed = meta.best_frame_count();
            if observed == Some(wanted) {
                log::debug!("'{}' verified with {wanted} frames", segment.name());
                return Ok(());
            }
            log::info!(
                "'{}' has {observed:?} frames but the window holds {wanted} (attempt {attempt}/{attempts})",
                segment.name()
            );
            if attempt < attempts {
                thread::sleep(self.retry.pause);
            }
        }

        errors.upsert(frame_diff_record(segment.name(), wanted, observed));
        Ok(())
    }
}
