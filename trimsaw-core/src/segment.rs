//! Planned trim segments and the plan that collects them.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};
use crate::timecode::TimeFrame;
use crate::transcode::ConversionMethod;

/// A half-open frame range `[start, end)` destined for one output file.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    name: String,
    start: TimeFrame,
    end: TimeFrame,
    exists: bool,
}

impl Segment {
    /// Builds a segment, rejecting inverted ranges and mismatched rates.
    pub fn new(
        name: impl Into<String>,
        start: TimeFrame,
        end: TimeFrame,
        exists: bool,
    ) -> CoreResult<Self> {
        let name = name.into();
        if !(start.fps() > 0.0) {
            return Err(CoreError::InvalidRange(format!(
                "segment '{}' has non-positive fps {}",
                name,
                start.fps()
            )));
        }
        if start.fps() != end.fps() {
            return Err(CoreError::InvalidRange(format!(
                "segment '{}' mixes frame rates {} and {}",
                name,
                start.fps(),
                end.fps()
            )));
        }
        if start.frame() > end.frame() {
            return Err(CoreError::InvalidRange(format!(
                "segment '{}' starts at frame {} after its end {}",
                name,
                start.frame(),
                end.frame()
            )));
        }
        Ok(Self {
            name,
            start,
            end,
            exists,
        })
    }

    /// Output file name, including extension.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> TimeFrame {
        self.start
    }

    pub fn end(&self) -> TimeFrame {
        self.end
    }

    /// Whether an acceptable output for this segment already exists at the
    /// destination.
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Number of frames the segment covers.
    pub fn frame_count(&self) -> u64 {
        self.end.frame() - self.start.frame()
    }

    pub fn fps(&self) -> f64 {
        self.start.fps()
    }

    /// Segment duration in seconds.
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.fps()
    }

    /// Segment length rendered as a timestamp.
    pub fn length_timestamp(&self) -> String {
        TimeFrame::new(self.frame_count(), self.fps()).timestamp()
    }
}

/// The ordered set of segments planned for one source video, plus the
/// source descriptor the executor needs.
///
/// Only the planner appends to a plan; it is read-only afterwards.
#[derive(Debug, Clone)]
pub struct SegmentPlan {
    source_path: PathBuf,
    source_fps: f64,
    source_frame_count: u64,
    work_dir: PathBuf,
    method: ConversionMethod,
    segments: Vec<Segment>,
}

impl SegmentPlan {
    pub fn new(
        source_path: &Path,
        source_fps: f64,
        source_frame_count: u64,
        work_dir: &Path,
        method: ConversionMethod,
    ) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            source_fps,
            source_frame_count,
            work_dir: work_dir.to_path_buf(),
            method,
            segments: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segments with no acceptable output yet, in timeline order.
    pub fn pending(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| !s.exists())
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments whose existing outputs were accepted as-is.
    pub fn reused_count(&self) -> usize {
        self.segments.iter().filter(|s| s.exists()).count()
    }

    pub fn pending_count(&self) -> usize {
        self.len() - self.reused_count()
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn source_fps(&self) -> f64 {
        self.source_fps
    }

    pub fn source_frame_count(&self) -> u64 {
        self.source_frame_count
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn method(&self) -> ConversionMethod {
        self.method
    }

    /// Local path a segment's output is written to.
    pub fn output_path(&self, segment: &Segment) -> PathBuf {
        self.work_dir.join(segment.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(frame: u64) -> TimeFrame {
        TimeFrame::new(frame, 30.0)
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = Segment::new("a.webm", frame(10), frame(5), false).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRange(_)));
    }

    #[test]
    fn mixed_rates_are_rejected() {
        let err = Segment::new(
            "a.webm",
            TimeFrame::new(0, 30.0),
            TimeFrame::new(10, 25.0),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRange(_)));
    }

    #[test]
    fn non_positive_fps_is_rejected() {
        let err = Segment::new(
            "a.webm",
            TimeFrame::new(0, 0.0),
            TimeFrame::new(10, 0.0),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRange(_)));
    }

    #[test]
    fn derived_values() {
        let segment = Segment::new("a.webm", frame(300), frame(600), false).unwrap();
        assert_eq!(segment.frame_count(), 300);
        assert_eq!(segment.duration(), 10.0);
        assert_eq!(segment.length_timestamp(), "00:00:10:000");
    }

    #[test]
    fn pending_filters_existing() {
        let mut plan = SegmentPlan::new(
            Path::new("video.mp4"),
            30.0,
            600,
            Path::new("/tmp/work"),
            ConversionMethod::Ffmpeg,
        );
        plan.push(Segment::new("a.webm", frame(0), frame(300), true).unwrap());
        plan.push(Segment::new("b.webm", frame(300), frame(600), false).unwrap());

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.reused_count(), 1);
        assert_eq!(plan.pending_count(), 1);
        let pending: Vec<_> = plan.pending().map(|s| s.name().to_string()).collect();
        assert_eq!(pending, vec!["b.webm"]);
        assert_eq!(
            plan.output_path(&plan.segments()[1]),
            PathBuf::from("/tmp/work/b.webm")
        );
    }
}
