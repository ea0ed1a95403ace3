//! Media metadata extraction through ffprobe.

use std::process::Command;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::util::command::run_command;

/// Metadata extracted for one video. Every field is optional because
/// upstream containers routinely omit them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub fps: Option<f64>,
    /// Container-declared frame count (`nb_frames`).
    pub frame_count: Option<u64>,
    /// Frame count obtained by decoding every frame (`nb_read_frames`).
    pub read_frame_count: Option<u64>,
    pub duration: Option<f64>,
    pub start_time: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub stream_count: Option<u32>,
}

impl VideoMetadata {
    /// The container-declared count when present, otherwise the decoded one.
    pub fn best_frame_count(&self) -> Option<u64> {
        self.frame_count.or(self.read_frame_count)
    }

    /// Names of the fields a complete ingest is expected to fill. A
    /// missing `start_time` is not reported; the frame checks default it
    /// to zero.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.fps.is_none() {
            missing.push("fps");
        }
        if self.best_frame_count().is_none() {
            missing.push("frame_count");
        }
        if self.duration.is_none() {
            missing.push("duration");
        }
        if self.width.is_none() {
            missing.push("width");
        }
        if self.height.is_none() {
            missing.push("height");
        }
        missing
    }
}

/// Extracts metadata from media at a locator.
pub trait MediaProber {
    /// Probes `locator`, a local path or a URL the underlying tool can read.
    /// `with_auth` attaches the configured authorization header, used for
    /// remote locators.
    fn probe(&self, locator: &str, with_auth: bool) -> CoreResult<VideoMetadata>;
}

/// [`MediaProber`] backed by the ffprobe executable.
#[derive(Debug, Clone, Default)]
pub struct FfprobeProber {
    auth_token: Option<String>,
}

impl FfprobeProber {
    pub fn new(auth_token: Option<String>) -> Self {
        Self { auth_token }
    }
}

impl MediaProber for FfprobeProber {
    fn probe(&self, locator: &str, with_auth: bool) -> CoreResult<VideoMetadata> {
        log::debug!("probing {locator}");
        let mut cmd = Command::new("ffprobe");
        cmd.args([
            "-select_streams",
            "v:0",
            "-count_frames",
            "-count_packets",
            "-show_format",
            "-show_streams",
            "-of",
            "json",
        ]);
        if with_auth {
            match &self.auth_token {
                Some(token) => {
                    cmd.arg("-headers").arg(format!("authorization: {token}"));
                }
                None => log::debug!("no auth token configured, probing {locator} without headers"),
            }
        }
        cmd.arg(locator);

        let output = run_command("ffprobe", &mut cmd)?;
        parse_probe_output(locator, &output.stdout)
    }
}

/// Parses the JSON document ffprobe writes to stdout.
pub fn parse_probe_output(locator: &str, raw: &[u8]) -> CoreResult<VideoMetadata> {
    let doc: Value = serde_json::from_slice(raw)
        .map_err(|e| CoreError::ProbeParse(format!("invalid probe JSON for {locator}: {e}")))?;

    let video = doc
        .get("streams")
        .and_then(Value::as_array)
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.get("codec_type").and_then(Value::as_str) == Some("video"))
        })
        .ok_or_else(|| CoreError::MissingVideoStream(locator.to_string()))?;
    let format = doc.get("format");

    let fps = video
        .get("avg_frame_rate")
        .and_then(Value::as_str)
        .and_then(|raw| match parse_rational(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("unusable frame rate for {locator}: {err}");
                None
            }
        });

    let duration = field_f64(video, "duration")
        .or_else(|| {
            video
                .get("tags")
                .and_then(|tags| tags.get("DURATION"))
                .and_then(Value::as_str)
                .and_then(parse_clock_duration)
        })
        .or_else(|| format.and_then(|f| field_f64(f, "duration")));

    Ok(VideoMetadata {
        fps,
        frame_count: field_u64(video, "nb_frames"),
        read_frame_count: field_u64(video, "nb_read_frames"),
        duration,
        start_time: field_f64(video, "start_time"),
        width: video.get("width").and_then(Value::as_u64).map(|v| v as u32),
        height: video
            .get("height")
            .and_then(Value::as_u64)
            .map(|v| v as u32),
        stream_count: format
            .and_then(|f| field_u64(f, "nb_streams"))
            .map(|v| v as u32),
    })
}

/// Parses an ffprobe rational such as `30000/1001` into a float.
/// Never evaluates the string; it is split on `/` and divided.
pub fn parse_rational(raw: &str) -> CoreResult<f64> {
    let raw = raw.trim();
    let malformed = || CoreError::ProbeParse(format!("malformed rational '{raw}'"));
    match raw.split_once('/') {
        Some((numerator, denominator)) => {
            let numerator: f64 = numerator.trim().parse().map_err(|_| malformed())?;
            let denominator: f64 = denominator.trim().parse().map_err(|_| malformed())?;
            if denominator == 0.0 {
                return Err(CoreError::ProbeParse(format!(
                    "zero denominator in rational '{raw}'"
                )));
            }
            Ok(numerator / denominator)
        }
        None => raw.parse().map_err(|_| malformed()),
    }
}

/// Parses a tag-encoded duration of the form `H:MM:SS.fraction` to seconds.
fn parse_clock_duration(raw: &str) -> Option<f64> {
    let mut parts = raw.trim().splitn(3, ':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

// ffprobe emits numeric fields as JSON strings in most builds; accept both.
fn field_u64(value: &Value, key: &str) -> Option<u64> {
    let field = value.get(key)?;
    field
        .as_u64()
        .or_else(|| field.as_str().and_then(|s| s.parse().ok()))
}

fn field_f64(value: &Value, key: &str) -> Option<f64> {
    let field = value.get(key)?;
    field
        .as_f64()
        .or_else(|| field.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "codec_type": "video",
                "avg_frame_rate": "30000/1001",
                "nb_frames": "300",
                "nb_read_frames": "299",
                "duration": "10.010000",
                "start_time": "0.000000",
                "width": 1280,
                "height": 720
            }
        ],
        "format": {
            "nb_streams": 2,
            "duration": "10.050000"
        }
    }"#;

    #[test]
    fn parses_stream_fields() {
        let meta = parse_probe_output("sample.mp4", SAMPLE.as_bytes()).unwrap();
        assert!((meta.fps.unwrap() - 29.97).abs() < 0.01);
        assert_eq!(meta.frame_count, Some(300));
        assert_eq!(meta.read_frame_count, Some(299));
        assert_eq!(meta.best_frame_count(), Some(300));
        assert_eq!(meta.duration, Some(10.01));
        assert_eq!(meta.start_time, Some(0.0));
        assert_eq!(meta.width, Some(1280));
        assert_eq!(meta.height, Some(720));
        assert_eq!(meta.stream_count, Some(2));
        assert!(meta.missing_fields().is_empty());
    }

    #[test]
    fn duration_falls_back_to_tag_then_format() {
        let tagged = r#"{
            "streams": [{
                "codec_type": "video",
                "avg_frame_rate": "25/1",
                "tags": {"DURATION": "0:01:30.500000000"}
            }],
            "format": {"duration": "95.0"}
        }"#;
        let meta = parse_probe_output("a.mkv", tagged.as_bytes()).unwrap();
        assert_eq!(meta.duration, Some(90.5));

        let format_only = r#"{
            "streams": [{"codec_type": "video", "avg_frame_rate": "25/1"}],
            "format": {"duration": "95.0"}
        }"#;
        let meta = parse_probe_output("a.mkv", format_only.as_bytes()).unwrap();
        assert_eq!(meta.duration, Some(95.0));
    }

    #[test]
    fn missing_video_stream_is_an_error() {
        let audio_only = r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        let err = parse_probe_output("a.ogg", audio_only.as_bytes()).unwrap_err();
        assert!(matches!(err, CoreError::MissingVideoStream(_)));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let err = parse_probe_output("a.mp4", b"not json").unwrap_err();
        assert!(matches!(err, CoreError::ProbeParse(_)));
    }

    #[test]
    fn rational_parsing() {
        assert!((parse_rational("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rational("25/1").unwrap(), 25.0);
        assert_eq!(parse_rational("30").unwrap(), 30.0);
        assert!(parse_rational("0/0").is_err());
        assert!(parse_rational("abc").is_err());
        assert!(parse_rational("1/x").is_err());
    }

    #[test]
    fn unusable_frame_rate_leaves_fps_unset() {
        let zero_rate = r#"{
            "streams": [{"codec_type": "video", "avg_frame_rate": "0/0"}],
            "format": {}
        }"#;
        let meta = parse_probe_output("still.png", zero_rate.as_bytes()).unwrap();
        assert_eq!(meta.fps, None);
        assert!(meta.missing_fields().contains(&"fps"));
    }

    #[test]
    fn clock_duration_parsing() {
        assert_eq!(parse_clock_duration("0:00:10"), Some(10.0));
        assert_eq!(parse_clock_duration("1:02:03.5"), Some(3723.5));
        assert_eq!(parse_clock_duration("garbage"), None);
    }
}
