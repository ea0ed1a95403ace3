//! Progress reporting for pipeline runs.
//!
//! The pipeline maps its stages onto a 0..=100 percentage scale. Download
//! and planning take the first two points, transcoding occupies the band
//! from [`TRANSCODE_BAND_START`] to just below [`TRANSCODE_BAND_END`], and
//! upload holds at 99 until the run completes.

/// First percentage point of the transcode band.
pub const TRANSCODE_BAND_START: u8 = 3;
/// Percentage reserved for the upload stage.
pub const TRANSCODE_BAND_END: u8 = 99;

/// Receives progress updates from a pipeline run.
pub trait ProgressSink {
    fn update(&mut self, percent: u8, status: &str);
}

/// Sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn update(&mut self, _percent: u8, _status: &str) {}
}

/// Maps a frame position within the source onto the transcode band.
pub fn transcode_band(frame: u64, total_frames: u64) -> u8 {
    if total_frames == 0 {
        return TRANSCODE_BAND_START;
    }
    let span = f64::from(TRANSCODE_BAND_END - TRANSCODE_BAND_START);
    let scaled = f64::from(TRANSCODE_BAND_START) + (span * frame as f64 / total_frames as f64);
    (scaled.round() as u8).min(TRANSCODE_BAND_END)
}

/// Forwards updates to a sink while enforcing that the reported
/// percentage never moves backwards within a run.
pub struct ProgressReporter<'a> {
    sink: &'a mut dyn ProgressSink,
    last: Option<u8>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self { sink, last: None }
    }

    /// Reports `percent` unless an equal or later point was already reported.
    pub fn advance(&mut self, percent: u8, status: &str) {
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        self.sink.update(percent, status);
    }
}
