//! Segment planning with resume by probing the destination.
//!
//! The planner walks the source frame axis in fixed nominal steps and
//! emits one [`Segment`] per step. For every window it first looks for a
//! previously produced output at the destination; acceptance and
//! regeneration use the same window arithmetic, which is what makes
//! re-running a completed or partially completed job produce no duplicate
//! work.

use std::path::Path;

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::probe::MediaProber;
use crate::segment::{Segment, SegmentPlan};
use crate::store::DestinationStore;
use crate::timecode::TimeFrame;

/// Source-side facts the planner works from.
pub struct PlannerInput<'a> {
    /// Local path of the downloaded source.
    pub source_path: &'a Path,
    /// Source file stem, used to derive output names.
    pub source_stem: &'a str,
    pub source_fps: f64,
    pub source_frame_count: u64,
    /// Directory pending outputs are produced in locally.
    pub work_dir: &'a Path,
    /// Destination directory probed for prior outputs.
    pub dest_dir: &'a str,
}

/// Splits the source into segments and decides, per window, whether a
/// previously produced output can be kept.
///
/// The window for nominal start `s` is `[s - before, min(s + length +
/// after, total))`, with no before-overlap on the first segment. An
/// existing candidate survives when it is annotated or when its rate and
/// frame count match that exact window; anything else is deleted and
/// scheduled for regeneration.
pub fn compute_plan(
    config: &CoreConfig,
    input: &PlannerInput<'_>,
    store: &dyn DestinationStore,
    prober: &dyn MediaProber,
) -> CoreResult<SegmentPlan> {
    let fps = input.source_fps;
    let total_frames = input.source_frame_count;
    if !(fps > 0.0) {
        return Err(CoreError::Plan(format!("source fps {fps} must be positive")));
    }
    if total_frames == 0 {
        return Err(CoreError::Plan("source has no frames to trim".to_string()));
    }

    let segment_length = config.length_unit.to_frames(config.segment_length, fps);
    let before = config.length_unit.to_frames(config.before_overlap, fps);
    let after = config.length_unit.to_frames(config.after_overlap, fps);
    if segment_length == 0 {
        return Err(CoreError::Plan(format!(
            "segment length {} converts to zero frames at {fps} fps",
            config.segment_length
        )));
    }

    // Index width, from the highest index a full division yields.
    let pad = (total_frames / segment_length).to_string().len();

    let existing = store.list(input.dest_dir, Some("video"))?;
    log::debug!(
        "{} candidate outputs at {}",
        existing.len(),
        input.dest_dir
    );

    let mut plan = SegmentPlan::new(
        input.source_path,
        fps,
        total_frames,
        input.work_dir,
        config.method,
    );
    let mut start_from = 0u64;
    let mut index = 0usize;
    while start_from < total_frames {
        let name = format!(
            "{}-trim-{index:0pad$}.{}",
            input.source_stem, config.output_extension
        );
        let window_start = if index == 0 {
            0
        } else {
            start_from.checked_sub(before).ok_or_else(|| {
                CoreError::Plan(format!(
                    "before overlap {before} reaches past the start of the source at segment {index}"
                ))
            })?
        };
        let window_end = (start_from + segment_length + after).min(total_frames);
        let window_frames = window_end - window_start;

        let mut exists = false;
        if let Some(item) = existing.iter().find(|item| item.name == name) {
            let (item_fps, item_frames) = item.fps_and_frames(prober)?;
            if item.metadata.annotated
                || (item_fps == Some(fps) && item_frames == Some(window_frames))
            {
                log::debug!("keeping existing output {name}");
                exists = true;
            } else {
                log::info!(
                    "stale output {name} (fps {item_fps:?}, frames {item_frames:?}, window {window_frames}), regenerating"
                );
                store.delete(item)?;
            }
        }

        plan.push(Segment::new(
            name,
            TimeFrame::new(window_start, fps),
            TimeFrame::new(window_end, fps),
            exists,
        )?);
        start_from += segment_length;
        index += 1;
    }

    Ok(plan)
}
