//! Frame-accurate points on a video timeline.

use std::fmt;

/// A position on a timeline, addressed by frame index at a fixed rate.
///
/// Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeFrame {
    frame: u64,
    fps: f64,
}

impl TimeFrame {
    pub fn new(frame: u64, fps: f64) -> Self {
        Self { frame, fps }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Position in seconds from the start of the timeline.
    pub fn seconds(&self) -> f64 {
        self.frame as f64 / self.fps
    }

    /// Renders the position as `HH:MM:SS:mmm`. Milliseconds are truncated,
    /// not rounded, and the hour field wraps at 24.
    pub fn timestamp(&self) -> String {
        let total_ms = (self.frame as f64 / self.fps * 1000.0) as u64;
        let hours = (total_ms / 3_600_000) % 24;
        let minutes = (total_ms / 60_000) % 60;
        let seconds = (total_ms / 1000) % 60;
        let millis = total_ms % 1000;
        format!("{hours:02}:{minutes:02}:{seconds:02}:{millis:03}")
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_renders_whole_seconds() {
        assert_eq!(TimeFrame::new(90, 30.0).timestamp(), "00:00:03:000");
        assert_eq!(TimeFrame::new(0, 25.0).timestamp(), "00:00:00:000");
    }

    #[test]
    fn timestamp_truncates_milliseconds() {
        // 1 frame at 29.97 fps is 33.367 ms.
        assert_eq!(TimeFrame::new(1, 29.97).timestamp(), "00:00:00:033");
        assert_eq!(TimeFrame::new(1, 30.0).timestamp(), "00:00:00:033");
    }

    #[test]
    fn timestamp_hours_wrap_at_24() {
        // 25 hours of 1 fps video.
        assert_eq!(TimeFrame::new(90_000, 1.0).timestamp(), "01:00:00:000");
    }

    #[test]
    fn seconds_divides_by_fps() {
        assert_eq!(TimeFrame::new(300, 30.0).seconds(), 10.0);
        assert!((TimeFrame::new(300, 29.97).seconds() - 10.01001).abs() < 1e-5);
    }
}
