//! Frame-count and rate consistency checks.
//!
//! Two kinds of check feed the audit trail: the expected-frame formula,
//! which reconciles `fps * duration` against an observed frame count, and
//! the source-vs-output cross-check on rates and counts. Failures become
//! [`ErrorRecord`]s collected in an [`ErrorLog`] and persisted with the
//! source record; they do not abort the run.

use serde::{Deserialize, Serialize};

/// Record type for an output whose frame rate drifts from the source.
pub const ERROR_TYPE_FPS_DIFF: &str = "fpsDiff";

/// Record type for an output whose frame count misses its planned window.
pub const ERROR_TYPE_FRAME_DIFF: &str = "frameDiff";

/// Error-type prefix for the source-side expected-frame check.
pub const SOURCE_PREFIX: &str = "source";

/// Error-type prefix for the output-side expected-frame check.
pub const TRIM_PREFIX: &str = "trim";

/// Largest fps spread between source and output that still passes,
/// inclusive.
pub const FPS_TOLERANCE: f64 = 0.2;

/// Slack, in frames, around the expected-frame product before a mismatch
/// counts as a failure.
pub const FRAME_SLACK: f64 = 0.5;

const EXPECTED_FRAMES_MESSAGE: &str = "Frames is not equal to FPS * Duration";

/// One recorded consistency failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    /// Numeric delta behind the failure.
    pub value: f64,
    /// File the record is about.
    pub source: String,
}

impl ErrorRecord {
    pub fn new(
        error_type: impl Into<String>,
        message: impl Into<String>,
        value: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            value,
            source: source.into(),
        }
    }
}

/// Builds the record for an expected-frame formula failure.
pub fn expected_frames_record(prefix: &str, subject: &str, delta: f64) -> ErrorRecord {
    ErrorRecord::new(
        format!("{prefix}ExpectedFrames"),
        EXPECTED_FRAMES_MESSAGE,
        delta,
        subject,
    )
}

/// Builds the record for a frame rate that drifted past [`FPS_TOLERANCE`].
pub fn fps_diff_record(subject: &str, delta: f64) -> ErrorRecord {
    ErrorRecord::new(
        ERROR_TYPE_FPS_DIFF,
        "FPS is not equal to the source FPS",
        delta,
        subject,
    )
}

/// Builds the record for a frame count that missed its planned window.
/// An unreadable count is recorded with the full window as the delta.
pub fn frame_diff_record(subject: &str, expected: u64, actual: Option<u64>) -> ErrorRecord {
    let delta = match actual {
        Some(actual) => (expected as f64 - actual as f64).abs(),
        None => expected as f64,
    };
    ErrorRecord::new(
        ERROR_TYPE_FRAME_DIFF,
        "Frames count is not equal to the calculated frames",
        delta,
        subject,
    )
}

/// Consistency failures accumulated over a run, deduplicated so the log
/// holds at most one record per `(type, source)` pair. A later record
/// replaces the earlier one in place.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    records: Vec<ErrorRecord>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record`, replacing any existing record of the same type on
    /// the same source.
    pub fn upsert(&mut self, record: ErrorRecord) {
        match self
            .records
            .iter_mut()
            .find(|r| r.error_type == record.error_type && r.source == record.source)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ErrorRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of the expected-frame formula for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameCheck {
    /// Accepted expected frame count, 0 when the check was vacuous.
    pub expected: u64,
    /// Failure record, absent when the check passed.
    pub record: Option<ErrorRecord>,
}

impl FrameCheck {
    pub fn passed(&self) -> bool {
        self.record.is_none()
    }
}

/// Reconciles `fps * duration` against an observed frame count.
///
/// The product truncates `duration - start_time` to two decimal places
/// before multiplying. The accepted expectation is the rounded product
/// unless rounding down disagrees with both the ceiling and the observed
/// count, in which case the ceiling wins. A mismatch only fails when it
/// also exceeds [`FRAME_SLACK`] frames. Passes vacuously when fps,
/// duration or the observed count is unavailable.
pub fn expected_frame_check(
    subject: &str,
    prefix: &str,
    fps: Option<f64>,
    duration: Option<f64>,
    start_time: Option<f64>,
    observed: Option<u64>,
) -> FrameCheck {
    let (Some(fps), Some(duration), Some(observed)) = (fps, duration, observed) else {
        return FrameCheck {
            expected: 0,
            record: None,
        };
    };

    let start = start_time.unwrap_or(0.0);
    let exp_count = fps * truncate2(duration - start);
    let rounded = exp_count.round();
    let rounded_up = exp_count.floor() + 1.0;
    let expected = if rounded == rounded_up || rounded == observed as f64 {
        rounded
    } else {
        rounded_up
    };

    let delta = (exp_count - observed as f64).abs();
    if expected != observed as f64 && delta > FRAME_SLACK {
        FrameCheck {
            expected: expected as u64,
            record: Some(expected_frames_record(prefix, subject, delta)),
        }
    } else {
        FrameCheck {
            expected: expected as u64,
            record: None,
        }
    }
}

/// Compares an output's rate and frame count against the source rate and
/// the planned window. Returns one record per failed comparison; values
/// missing on the output side are skipped here and caught by the report's
/// completeness conditions instead.
pub fn cross_check(
    subject: &str,
    source_fps: f64,
    actual_fps: Option<f64>,
    expected_frames: Option<u64>,
    actual_frames: Option<u64>,
) -> Vec<ErrorRecord> {
    let mut records = Vec::new();
    if let Some(fps) = actual_fps {
        let delta = (fps - source_fps).abs();
        if delta > FPS_TOLERANCE {
            records.push(fps_diff_record(subject, delta));
        }
    }
    if let (Some(expected), Some(actual)) = (expected_frames, actual_frames) {
        if expected != actual {
            records.push(frame_diff_record(subject, expected, Some(actual)));
        }
    }
    records
}

fn truncate2(value: f64) -> f64 {
    (value * 100.0).trunc() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_accepts_truncated_product() {
        // 30 fps over 10.033 s truncates to 30 * 10.03 = 300.9.
        let check =
            expected_frame_check("a.mp4", SOURCE_PREFIX, Some(30.0), Some(10.033), None, Some(301));
        assert_eq!(check.expected, 301);
        assert!(check.passed());
    }

    #[test]
    fn formula_tolerates_half_a_frame() {
        let check =
            expected_frame_check("a.mp4", SOURCE_PREFIX, Some(30.0), Some(10.01), None, Some(300));
        assert!(check.passed());
    }

    #[test]
    fn formula_failure_carries_prefix_and_delta() {
        // With the observed count matching neither candidate, the ceiling
        // is elected as the expectation.
        let check =
            expected_frame_check("a.mp4", SOURCE_PREFIX, Some(30.0), Some(10.0), None, Some(280));
        assert_eq!(check.expected, 301);
        let record = check.record.unwrap();
        assert_eq!(record.error_type, "sourceExpectedFrames");
        assert_eq!(record.message, "Frames is not equal to FPS * Duration");
        assert_eq!(record.value, 20.0);
        assert_eq!(record.source, "a.mp4");
    }

    #[test]
    fn formula_subtracts_start_time() {
        let check = expected_frame_check(
            "a.mp4",
            TRIM_PREFIX,
            Some(30.0),
            Some(11.0),
            Some(1.0),
            Some(300),
        );
        assert_eq!(check.expected, 300);
        assert!(check.passed());
    }

    #[test]
    fn formula_passes_vacuously_on_missing_inputs() {
        let check = expected_frame_check("a.mp4", SOURCE_PREFIX, None, Some(10.0), None, Some(300));
        assert_eq!(check.expected, 0);
        assert!(check.passed());

        let check = expected_frame_check("a.mp4", SOURCE_PREFIX, Some(30.0), None, None, Some(300));
        assert!(check.passed());

        let check = expected_frame_check("a.mp4", SOURCE_PREFIX, Some(30.0), Some(10.0), None, None);
        assert!(check.passed());
    }

    #[test]
    fn cross_check_fps_boundary_is_inclusive() {
        assert!(cross_check("a.webm", 30.0, Some(30.2), None, None).is_empty());
        assert!(cross_check("a.webm", 30.0, Some(29.8), None, None).is_empty());

        let records = cross_check("a.webm", 30.0, Some(30.21), None, None);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error_type, ERROR_TYPE_FPS_DIFF);
        assert!((records[0].value - 0.21).abs() < 1e-9);
    }

    #[test]
    fn cross_check_frames_are_exact() {
        let records = cross_check("a.webm", 30.0, Some(30.0), Some(300), Some(299));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error_type, ERROR_TYPE_FRAME_DIFF);
        assert_eq!(records[0].value, 1.0);

        assert!(cross_check("a.webm", 30.0, Some(30.0), Some(300), Some(300)).is_empty());
    }

    #[test]
    fn cross_check_skips_missing_output_values() {
        assert!(cross_check("a.webm", 30.0, None, Some(300), None).is_empty());
    }

    #[test]
    fn upsert_replaces_same_type_and_source() {
        let mut log = ErrorLog::new();
        log.upsert(fps_diff_record("a.webm", 0.3));
        log.upsert(fps_diff_record("a.webm", 0.4));
        log.upsert(fps_diff_record("b.webm", 0.5));
        log.upsert(frame_diff_record("a.webm", 300, Some(299)));

        assert_eq!(log.len(), 3);
        let a_fps = log
            .records()
            .iter()
            .find(|r| r.error_type == ERROR_TYPE_FPS_DIFF && r.source == "a.webm")
            .unwrap();
        assert_eq!(a_fps.value, 0.4);
    }

    #[test]
    fn frame_diff_without_a_count_uses_the_window() {
        let record = frame_diff_record("a.webm", 300, None);
        assert_eq!(record.value, 300.0);
    }

    #[test]
    fn records_serialize_with_type_key() {
        let record = fps_diff_record("a.webm", 0.25);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "fpsDiff");
        assert_eq!(json["source"], "a.webm");
    }
}
