//! The end-to-end trimming pipeline.
//!
//! [`TrimPipeline::run`] sequences download, planning, transcode, upload
//! and report for one source record, persisting a status block at every
//! state transition so a crashed run is observable from outside. The
//! scratch directory lives for exactly one run and is removed on every
//! exit path, success or failure.

use std::fmt;
use std::path::Path;

use tempfile::TempDir;

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::planner::{self, PlannerInput};
use crate::probe::{MediaProber, VideoMetadata};
use crate::progress::{ProgressReporter, ProgressSink};
use crate::report::{self, ReportRequest};
use crate::segment::SegmentPlan;
use crate::store::{DestinationStore, ItemMetadata, SourceRecord, TrimMetadata, TrimStatusBlock};
use crate::transcode::{SegmentEncoder, Transcoder};
use crate::verify::{self, ErrorLog};

/// Externally observable stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Downloading,
    Planning,
    Transcoding,
    Uploading,
    Reporting,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Init => "Init",
            PipelineState::Downloading => "Downloading",
            PipelineState::Planning => "Planning",
            PipelineState::Transcoding => "Transcoding",
            PipelineState::Uploading => "Uploading",
            PipelineState::Reporting => "Reporting",
            PipelineState::Done => "Done",
            PipelineState::Failed => "Failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters and verdict handed back to the caller after a run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub planned: usize,
    pub reused: usize,
    pub encoded: usize,
    pub uploaded: usize,
    /// Whether the report confirmed every expected output.
    pub verified: bool,
    pub report_name: String,
    pub state: PipelineState,
    pub destination_dir: String,
}

/// Sequences one run over injected store, probe and transcode backends.
pub struct TrimPipeline<'a> {
    config: &'a CoreConfig,
    record: &'a mut dyn SourceRecord,
    store: &'a dyn DestinationStore,
    prober: &'a dyn MediaProber,
    transcoder: &'a dyn Transcoder,
}

impl<'a> TrimPipeline<'a> {
    pub fn new(
        config: &'a CoreConfig,
        record: &'a mut dyn SourceRecord,
        store: &'a dyn DestinationStore,
        prober: &'a dyn MediaProber,
        transcoder: &'a dyn Transcoder,
    ) -> Self {
        Self {
            config,
            record,
            store,
            prober,
            transcoder,
        }
    }

    /// Runs the pipeline to completion. A failing run persists the
    /// `Failed` status before the error propagates.
    pub fn run(mut self, sink: &mut dyn ProgressSink) -> CoreResult<RunOutcome> {
        self.config.validate()?;
        let scratch = self.create_scratch_dir()?;
        let dest_dir = destination_dir(self.config.main_dir.as_deref(), self.record.name());
        let mut errors = ErrorLog::new();
        let mut progress = ProgressReporter::new(sink);

        let result = self.run_stages(scratch.path(), &dest_dir, &mut errors, &mut progress);
        if let Err(err) = &result {
            log::error!("run for {} failed: {err}", self.record.name());
            self.persist_failure(&dest_dir, &errors);
        }
        // `scratch` is dropped here, tearing the working directory down on
        // both paths.
        result
    }

    fn run_stages(
        &mut self,
        work_dir: &Path,
        dest_dir: &str,
        errors: &mut ErrorLog,
        progress: &mut ProgressReporter<'_>,
    ) -> CoreResult<RunOutcome> {
        let source_name = self.record.name().to_string();
        let stem = file_stem(&source_name);
        log::info!("trimming {source_name} into {dest_dir}");
        self.persist_state(PipelineState::Init, dest_dir, None)?;

        self.persist_state(PipelineState::Downloading, dest_dir, None)?;
        progress.advance(1, "Downloading video");
        let source_path = self.record.fetch_to(work_dir)?;

        self.persist_state(PipelineState::Planning, dest_dir, None)?;
        progress.advance(2, "Planning segments");
        let (fps, frame_count) = self.ingest_source(&source_name, &source_path, errors)?;
        let plan = planner::compute_plan(
            self.config,
            &PlannerInput {
                source_path: &source_path,
                source_stem: &stem,
                source_fps: fps,
                source_frame_count: frame_count,
                work_dir,
                dest_dir,
            },
            self.store,
            self.prober,
        )?;
        let expected = Some(plan.len());
        self.persist_state(PipelineState::Planning, dest_dir, expected)?;
        log::info!(
            "planned {} segments, {} reusable",
            plan.len(),
            plan.reused_count()
        );

        self.persist_state(PipelineState::Transcoding, dest_dir, expected)?;
        progress.advance(3, "Trimming segments");
        let encoder = SegmentEncoder::new(self.transcoder, self.prober, self.config.retry.clone());
        let encoded = encoder.encode_pending(&plan, errors, progress)?;

        self.persist_state(PipelineState::Uploading, dest_dir, expected)?;
        progress.advance(99, "Uploading trimmed files");
        let uploaded = self.upload_outputs(&plan, dest_dir, &stem, &source_name)?;

        self.persist_state(PipelineState::Reporting, dest_dir, expected)?;
        let outcome = report::generate_report(
            &ReportRequest {
                source_stem: &stem,
                source_fps: fps,
                dest_dir,
                expected_count: plan.len(),
                work_dir,
            },
            self.store,
            self.prober,
            errors,
        )?;

        let state = if outcome.verified {
            PipelineState::Done
        } else {
            PipelineState::Failed
        };
        self.record.set_errors(errors.records().to_vec());
        self.persist_state(state, dest_dir, expected)?;
        progress.advance(100, state.as_str());
        log::info!("run for {source_name} finished {state}, {encoded} encoded, {uploaded} uploaded");

        Ok(RunOutcome {
            planned: plan.len(),
            reused: plan.reused_count(),
            encoded,
            uploaded,
            verified: outcome.verified,
            report_name: outcome.report_name,
            state,
            destination_dir: dest_dir.to_string(),
        })
    }

    /// Resolves fps and frame count from the record cache or a probe,
    /// then runs the completeness check and the ingest frame validation.
    /// A validation failure is recorded and the run continues.
    fn ingest_source(
        &mut self,
        source_name: &str,
        source_path: &Path,
        errors: &mut ErrorLog,
    ) -> CoreResult<(f64, u64)> {
        let cached = (self.record.cached_fps(), self.record.cached_frame_count());
        let meta = match cached {
            (Some(fps), Some(frame_count)) => VideoMetadata {
                fps: Some(fps),
                frame_count: Some(frame_count),
                duration: self.record.cached_duration(),
                ..Default::default()
            },
            _ => {
                let meta = self
                    .prober
                    .probe(&source_path.display().to_string(), false)?;
                let missing = meta.missing_fields();
                if !missing.is_empty() {
                    log::warn!(
                        "{source_name} probe left fields unset: {}",
                        missing.join(", ")
                    );
                }
                self.record.cache_metadata(&meta);
                self.record.persist()?;
                meta
            }
        };

        let check = verify::expected_frame_check(
            source_name,
            verify::SOURCE_PREFIX,
            meta.fps,
            meta.duration,
            meta.start_time,
            meta.best_frame_count(),
        );
        if let Some(record) = check.record {
            log::warn!(
                "{source_name} failed the expected-frame check, off by {}",
                record.value
            );
            errors.upsert(record);
        }

        let fps = meta.fps.ok_or_else(|| {
            CoreError::Plan(format!("source {source_name} has no usable frame rate"))
        })?;
        let frame_count = meta.best_frame_count().ok_or_else(|| {
            CoreError::Plan(format!("source {source_name} has no usable frame count"))
        })?;
        Ok((fps, frame_count))
    }

    /// Publishes every newly produced output with its trim metadata, then
    /// the trim-list CSV with overwrite. Pre-existing accepted outputs are
    /// left untouched.
    fn upload_outputs(
        &mut self,
        plan: &SegmentPlan,
        dest_dir: &str,
        stem: &str,
        source_name: &str,
    ) -> CoreResult<usize> {
        let source_id = self.record.id();
        let fps = plan.source_fps();
        let before = self
            .config
            .length_unit
            .to_frames(self.config.before_overlap, fps);
        let after = self
            .config
            .length_unit
            .to_frames(self.config.after_overlap, fps);

        let mut uploaded = 0;
        for (index, segment) in plan.segments().iter().enumerate() {
            if segment.exists() {
                continue;
            }
            let metadata = ItemMetadata {
                annotated: false,
                fps: None,
                frame_count: None,
                trim: Some(TrimMetadata {
                    original_video: source_name.to_string(),
                    original_video_id: source_id.clone(),
                    method: plan.method().as_str().to_string(),
                    expected_outputs: plan.len(),
                    trim_number: index,
                    start_from: segment.start().frame(),
                    end_on: segment.end().frame().saturating_sub(1),
                    before_overlap: before,
                    after_overlap: after,
                }),
            };
            self.store
                .upload(&plan.output_path(segment), dest_dir, Some(metadata), false)?;
            log::info!("uploaded {}", segment.name());
            uploaded += 1;
        }

        let list_path = plan.work_dir().join(report::trim_list_name(stem));
        report::write_trim_list(&list_path, plan)?;
        self.store.upload(&list_path, dest_dir, None, true)?;
        Ok(uploaded)
    }

    fn persist_state(
        &mut self,
        state: PipelineState,
        dest_dir: &str,
        expected_outputs: Option<usize>,
    ) -> CoreResult<()> {
        log::debug!("entering {state}");
        self.record
            .set_status(TrimStatusBlock::new(dest_dir, state.as_str(), expected_outputs));
        self.record.persist()
    }

    /// Best effort: a failure to persist the failure must not mask the
    /// original error.
    fn persist_failure(&mut self, dest_dir: &str, errors: &ErrorLog) {
        self.record.set_errors(errors.records().to_vec());
        self.record
            .set_status(TrimStatusBlock::new(dest_dir, PipelineState::Failed.as_str(), None));
        if let Err(persist_err) = self.record.persist() {
            log::warn!("could not persist the failure status: {persist_err}");
        }
    }

    fn create_scratch_dir(&self) -> CoreResult<TempDir> {
        let dir = match &self.config.temp_dir {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                tempfile::Builder::new().prefix("trimsaw-").tempdir_in(base)?
            }
            None => tempfile::Builder::new().prefix("trimsaw-").tempdir()?,
        };
        log::debug!("scratch directory {}", dir.path().display());
        Ok(dir)
    }
}

/// Destination directory for a source: the configured prefix joined with
/// the source stem.
fn destination_dir(main_dir: Option<&str>, source_name: &str) -> String {
    let stem = file_stem(source_name);
    match main_dir.map(|dir| dir.trim_matches('/')) {
        Some(dir) if !dir.is_empty() => format!("{dir}/{stem}"),
        _ => stem,
    }
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}
