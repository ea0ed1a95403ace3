//! Audit artifacts: the trim-list export and the post-run report.
//!
//! The trim-list CSV captures the plan itself; the report CSV is built
//! after the run by re-listing the destination and auditing every found
//! output against its persisted trim metadata. The report's file name
//! carries the verdict: `<stem>_report.csv` on success,
//! `<stem>_report_error.csv` otherwise.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::CoreResult;
use crate::probe::MediaProber;
use crate::segment::SegmentPlan;
use crate::store::{DestinationStore, StoredItem};
use crate::verify::{self, ErrorLog};

const TRIM_LIST_HEADER: &str = "Scene Number,Start Frame,Start Timecode,Start Time (seconds),End Frame,End Timecode,End Time (seconds),Length (frames),Length (timecode),Length (seconds)";

const REPORT_HEADER: &str = "File Name,Directory,Item Id,FPS,Source FPS,Original Video,Original Video Id,Frames,Calculated Frames,Frames Delta,Start Frame,End Frame,Before Overlap,After Overlap";

/// File name of the trim-list artifact for a source stem.
pub fn trim_list_name(stem: &str) -> String {
    format!("{stem}-trim.csv")
}

/// Writes the plan as a timecode list plus one row per segment.
pub fn write_trim_list(path: &Path, plan: &SegmentPlan) -> CoreResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "Timecode List:")?;
    for segment in plan.segments() {
        write!(out, ",{}", segment.start().timestamp())?;
    }
    writeln!(out)?;
    writeln!(out, "{TRIM_LIST_HEADER}")?;
    for (index, segment) in plan.segments().iter().enumerate() {
        writeln!(
            out,
            "{},{},{},{:.3},{},{},{:.3},{},{},{:.3}",
            index + 1,
            segment.start().frame(),
            segment.start().timestamp(),
            segment.start().seconds(),
            segment.end().frame(),
            segment.end().timestamp(),
            segment.end().seconds(),
            segment.frame_count(),
            segment.length_timestamp(),
            segment.duration(),
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Inputs the report stage needs about the audited source.
pub struct ReportRequest<'a> {
    pub source_stem: &'a str,
    pub source_fps: f64,
    pub dest_dir: &'a str,
    /// Segment count recorded during planning.
    pub expected_count: usize,
    /// Directory the CSV is written to before upload.
    pub work_dir: &'a Path,
}

/// One audited destination item. Fields read back from trim metadata are
/// absent when the item carries none.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub name: String,
    pub directory: String,
    pub id: String,
    pub fps: Option<f64>,
    pub source_fps: f64,
    pub original_video: Option<String>,
    pub original_video_id: Option<String>,
    pub frames: Option<u64>,
    pub calculated_frames: Option<u64>,
    pub delta: Option<i64>,
    pub start_from: Option<u64>,
    pub end_on: Option<u64>,
    pub before_overlap: Option<u64>,
    pub after_overlap: Option<u64>,
}

impl ReportRow {
    /// Whether this item passes the report's success conditions: a rate
    /// within tolerance of the source, a known frame count, and zero
    /// deviation from the calculated window.
    pub fn verified(&self) -> bool {
        let fps_ok = self
            .fps
            .is_some_and(|fps| (fps - self.source_fps).abs() <= verify::FPS_TOLERANCE);
        fps_ok && self.frames.is_some() && self.delta == Some(0)
    }
}

/// Verdict and artifact name produced by the report stage.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub verified: bool,
    pub report_name: String,
    pub found: usize,
    pub expected: usize,
}

/// Re-lists the destination, audits every found item and publishes the
/// report artifact, overwriting any prior report.
pub fn generate_report(
    request: &ReportRequest<'_>,
    store: &dyn DestinationStore,
    prober: &dyn MediaProber,
    errors: &mut ErrorLog,
) -> CoreResult<ReportOutcome> {
    let items = store.list(request.dest_dir, Some("video"))?;
    let found = items.len();
    let mut verified = found == request.expected_count;
    if !verified {
        log::warn!(
            "{} holds {found} outputs, expected {}",
            request.dest_dir,
            request.expected_count
        );
    }

    let mut rows = Vec::with_capacity(found);
    for item in &items {
        let row = audit_item(item, request.source_fps, prober, errors)?;
        if !row.verified() {
            log::warn!("output {} failed verification", row.name);
            verified = false;
        }
        rows.push(row);
    }

    let report_name = if verified {
        format!("{}_report.csv", request.source_stem)
    } else {
        format!("{}_report_error.csv", request.source_stem)
    };
    let local = request.work_dir.join(&report_name);
    write_report(&local, &rows)?;
    store.upload(&local, request.dest_dir, None, true)?;
    log::info!("report {report_name} uploaded to {}", request.dest_dir);

    Ok(ReportOutcome {
        verified,
        report_name,
        found,
        expected: request.expected_count,
    })
}

/// Audits one found item: resolves its rate and frame count, derives the
/// calculated window from trim metadata, and records consistency failures.
fn audit_item(
    item: &StoredItem,
    source_fps: f64,
    prober: &dyn MediaProber,
    errors: &mut ErrorLog,
) -> CoreResult<ReportRow> {
    let meta = item.video_metadata(prober)?;
    let fps = meta.fps;
    let frames = meta.best_frame_count();
    let trim = item.metadata.trim.as_ref();
    let calculated = trim.map(|t| t.calculated_frames());
    let delta = match (frames, calculated) {
        (Some(frames), Some(calculated)) => Some(frames as i64 - calculated as i64),
        _ => None,
    };

    let check = verify::expected_frame_check(
        &item.name,
        verify::TRIM_PREFIX,
        fps,
        meta.duration,
        meta.start_time,
        frames,
    );
    if let Some(record) = check.record {
        errors.upsert(record);
    }
    for record in verify::cross_check(&item.name, source_fps, fps, calculated, frames) {
        errors.upsert(record);
    }

    Ok(ReportRow {
        name: item.name.clone(),
        directory: item.directory.clone(),
        id: item.id.clone(),
        fps,
        source_fps,
        original_video: trim.map(|t| t.original_video.clone()),
        original_video_id: trim.map(|t| t.original_video_id.clone()),
        frames,
        calculated_frames: calculated,
        delta,
        start_from: trim.map(|t| t.start_from),
        end_on: trim.map(|t| t.end_on),
        before_overlap: trim.map(|t| t.before_overlap),
        after_overlap: trim.map(|t| t.after_overlap),
    })
}

fn write_report(path: &Path, rows: &[ReportRow]) -> CoreResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{REPORT_HEADER}")?;
    for row in rows {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            row.name,
            row.directory,
            row.id,
            cell(&row.fps),
            row.source_fps,
            cell(&row.original_video),
            cell(&row.original_video_id),
            cell(&row.frames),
            cell(&row.calculated_frames),
            cell(&row.delta),
            cell(&row.start_from),
            cell(&row.end_on),
            cell(&row.before_overlap),
            cell(&row.after_overlap),
        )?;
    }
    out.flush()?;
    Ok(())
}

// Unknown values render as empty cells.
fn cell<T: Display>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}
