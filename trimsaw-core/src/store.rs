//! Destination store and source record seams, plus the shipped
//! filesystem implementations.
//!
//! The pipeline publishes outputs through a [`DestinationStore`] and keeps
//! its bookkeeping on a [`SourceRecord`]; any object store satisfying these
//! contracts works. The filesystem versions keep one `<file>.meta.json`
//! sidecar per item.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::probe::{MediaProber, VideoMetadata};
use crate::verify::ErrorRecord;

/// Suffix of the metadata sidecar kept next to each file.
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// Guesses a mimetype from the file extension. Unknown extensions map to
/// `None` and never match a filter.
pub fn guess_mimetype(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "webm" => Some("video/webm"),
        "mp4" | "m4v" => Some("video/mp4"),
        "mkv" => Some("video/x-matroska"),
        "mov" => Some("video/quicktime"),
        "avi" => Some("video/x-msvideo"),
        "mpg" | "mpeg" => Some("video/mpeg"),
        "ts" => Some("video/mp2t"),
        "csv" => Some("text/csv"),
        "json" => Some("application/json"),
        _ => None,
    }
}

/// Provenance stored with each uploaded output, read back by the report
/// generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimMetadata {
    pub original_video: String,
    pub original_video_id: String,
    pub method: String,
    pub expected_outputs: usize,
    pub trim_number: usize,
    /// First frame of the output's window.
    pub start_from: u64,
    /// Last frame of the output's window, inclusive.
    pub end_on: u64,
    pub before_overlap: u64,
    pub after_overlap: u64,
}

impl TrimMetadata {
    /// Frame count the window implies.
    pub fn calculated_frames(&self) -> u64 {
        self.end_on - self.start_from + 1
    }
}

/// Sidecar document for one destination item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemMetadata {
    /// Hand-marked items are accepted by the planner regardless of their
    /// probed properties.
    pub annotated: bool,
    pub fps: Option<f64>,
    pub frame_count: Option<u64>,
    pub trim: Option<TrimMetadata>,
}

/// Pipeline status persisted on the source record at every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimStatusBlock {
    pub destination_dir: String,
    pub status: String,
    pub expected_outputs: Option<usize>,
    /// RFC 3339 timestamp of the transition.
    pub updated_at: String,
}

impl TrimStatusBlock {
    pub fn new(
        destination_dir: impl Into<String>,
        status: impl Into<String>,
        expected_outputs: Option<usize>,
    ) -> Self {
        Self {
            destination_dir: destination_dir.into(),
            status: status.into(),
            expected_outputs,
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

/// One item at the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    /// File name, with extension.
    pub name: String,
    /// Directory the item lives in, relative to the store.
    pub directory: String,
    /// Stable identifier within the store.
    pub id: String,
    /// Locator the prober can read.
    pub path: PathBuf,
    pub metadata: ItemMetadata,
}

impl StoredItem {
    /// The cached rate and count when both are present, otherwise a probe
    /// of the item.
    pub fn video_metadata(&self, prober: &dyn MediaProber) -> CoreResult<VideoMetadata> {
        if let (Some(fps), Some(frame_count)) = (self.metadata.fps, self.metadata.frame_count) {
            return Ok(VideoMetadata {
                fps: Some(fps),
                frame_count: Some(frame_count),
                ..Default::default()
            });
        }
        prober.probe(&self.path.display().to_string(), false)
    }

    /// Frame rate and count, from the cache or a probe.
    pub fn fps_and_frames(&self, prober: &dyn MediaProber) -> CoreResult<(Option<f64>, Option<u64>)> {
        let meta = self.video_metadata(prober)?;
        Ok((meta.fps, meta.best_frame_count()))
    }
}

/// Storage the trimmed outputs are published to.
pub trait DestinationStore {
    /// Items in `directory`, ordered by name. `mimetype` keeps only items
    /// whose guessed mimetype starts with the filter.
    fn list(&self, directory: &str, mimetype: Option<&str>) -> CoreResult<Vec<StoredItem>>;

    /// Publishes a local file into `directory` with an optional metadata
    /// document. Refuses to replace an existing item unless `overwrite`
    /// is set.
    fn upload(
        &self,
        local: &Path,
        directory: &str,
        metadata: Option<ItemMetadata>,
        overwrite: bool,
    ) -> CoreResult<StoredItem>;

    /// Removes an item and its metadata.
    fn delete(&self, item: &StoredItem) -> CoreResult<()>;
}

/// The video a run trims, plus its persisted bookkeeping. Mutations stay
/// in memory until [`SourceRecord::persist`] commits them.
pub trait SourceRecord {
    /// File name, with extension.
    fn name(&self) -> &str;

    /// Stable identifier recorded in output provenance.
    fn id(&self) -> String;

    fn cached_fps(&self) -> Option<f64>;

    fn cached_frame_count(&self) -> Option<u64>;

    fn cached_duration(&self) -> Option<f64>;

    /// Caches probed values so later runs skip the probe.
    fn cache_metadata(&mut self, metadata: &VideoMetadata);

    /// Copies the source into `dir` and returns the local path.
    fn fetch_to(&self, dir: &Path) -> CoreResult<PathBuf>;

    fn set_status(&mut self, status: TrimStatusBlock);

    fn set_errors(&mut self, errors: Vec<ErrorRecord>);

    /// Commits metadata changes.
    fn persist(&mut self) -> CoreResult<()>;
}

/// [`DestinationStore`] rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsDestinationStore {
    root: PathBuf,
}

impl FsDestinationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DestinationStore for FsDestinationStore {
    fn list(&self, directory: &str, mimetype: Option<&str>) -> CoreResult<Vec<StoredItem>> {
        let dir = self.root.join(directory);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut items = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(SIDECAR_SUFFIX) {
                continue;
            }
            let kind = guess_mimetype(&name);
            if let Some(filter) = mimetype {
                if !kind.is_some_and(|k| k.starts_with(filter)) {
                    continue;
                }
            }
            let path = entry.path();
            let metadata = read_sidecar(&path)?;
            items.push(StoredItem {
                id: format!("{directory}/{name}"),
                name,
                directory: directory.to_string(),
                path,
                metadata,
            });
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    fn upload(
        &self,
        local: &Path,
        directory: &str,
        metadata: Option<ItemMetadata>,
        overwrite: bool,
    ) -> CoreResult<StoredItem> {
        let name = file_name_of(local)?;
        let dir = self.root.join(directory);
        fs::create_dir_all(&dir)?;
        let target = dir.join(&name);
        if target.exists() && !overwrite {
            return Err(CoreError::Store(format!(
                "'{name}' already exists in {directory}"
            )));
        }
        fs::copy(local, &target)?;
        let metadata = metadata.unwrap_or_default();
        write_sidecar(&target, &metadata)?;
        log::debug!("uploaded {name} to {directory}");
        Ok(StoredItem {
            id: format!("{directory}/{name}"),
            name,
            directory: directory.to_string(),
            path: target,
            metadata,
        })
    }

    fn delete(&self, item: &StoredItem) -> CoreResult<()> {
        log::debug!("deleting {} from {}", item.name, item.directory);
        fs::remove_file(&item.path)?;
        let sidecar = sidecar_path(&item.path);
        if sidecar.exists() {
            fs::remove_file(sidecar)?;
        }
        Ok(())
    }
}

/// Sidecar document for a source video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SourceSidecar {
    fps: Option<f64>,
    frame_count: Option<u64>,
    duration: Option<f64>,
    trim: Option<TrimStatusBlock>,
    errors: Vec<ErrorRecord>,
}

/// [`SourceRecord`] backed by a local video file and its sidecar.
#[derive(Debug, Clone)]
pub struct FsSourceRecord {
    path: PathBuf,
    name: String,
    sidecar: SourceSidecar,
}

impl FsSourceRecord {
    /// Opens a source video, loading its sidecar when one exists.
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(CoreError::Store(format!(
                "source '{}' is not a file",
                path.display()
            )));
        }
        let name = file_name_of(&path)?;
        let sidecar_file = sidecar_path(&path);
        let sidecar = if sidecar_file.is_file() {
            serde_json::from_slice(&fs::read(&sidecar_file)?)?
        } else {
            SourceSidecar::default()
        };
        Ok(Self {
            path,
            name,
            sidecar,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Status block persisted by the most recent run, if any.
    pub fn status(&self) -> Option<&TrimStatusBlock> {
        self.sidecar.trim.as_ref()
    }

    pub fn errors(&self) -> &[ErrorRecord] {
        &self.sidecar.errors
    }
}

impl SourceRecord for FsSourceRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> String {
        self.path.display().to_string()
    }

    fn cached_fps(&self) -> Option<f64> {
        self.sidecar.fps
    }

    fn cached_frame_count(&self) -> Option<u64> {
        self.sidecar.frame_count
    }

    fn cached_duration(&self) -> Option<f64> {
        self.sidecar.duration
    }

    fn cache_metadata(&mut self, metadata: &VideoMetadata) {
        if metadata.fps.is_some() {
            self.sidecar.fps = metadata.fps;
        }
        if let Some(frames) = metadata.best_frame_count() {
            self.sidecar.frame_count = Some(frames);
        }
        if metadata.duration.is_some() {
            self.sidecar.duration = metadata.duration;
        }
    }

    fn fetch_to(&self, dir: &Path) -> CoreResult<PathBuf> {
        let target = dir.join(&self.name);
        log::debug!("fetching {} to {}", self.path.display(), target.display());
        fs::copy(&self.path, &target)?;
        Ok(target)
    }

    fn set_status(&mut self, status: TrimStatusBlock) {
        self.sidecar.trim = Some(status);
    }

    fn set_errors(&mut self, errors: Vec<ErrorRecord>) {
        self.sidecar.errors = errors;
    }

    fn persist(&mut self) -> CoreResult<()> {
        fs::write(
            sidecar_path(&self.path),
            serde_json::to_vec_pretty(&self.sidecar)?,
        )?;
        Ok(())
    }
}

/// Path of the sidecar kept next to `path`.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(SIDECAR_SUFFIX);
    path.with_file_name(name)
}

fn read_sidecar(path: &Path) -> CoreResult<ItemMetadata> {
    let sidecar = sidecar_path(path);
    if !sidecar.is_file() {
        return Ok(ItemMetadata::default());
    }
    Ok(serde_json::from_slice(&fs::read(&sidecar)?)?)
}

fn write_sidecar(path: &Path, metadata: &ItemMetadata) -> CoreResult<()> {
    fs::write(sidecar_path(path), serde_json::to_vec_pretty(metadata)?)?;
    Ok(())
}

fn file_name_of(path: &Path) -> CoreResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CoreError::Store(format!("'{}' has no file name", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_trim() -> TrimMetadata {
        TrimMetadata {
            original_video: "movie.mp4".to_string(),
            original_video_id: "/videos/movie.mp4".to_string(),
            method: "ffmpeg".to_string(),
            expected_outputs: 4,
            trim_number: 0,
            start_from: 0,
            end_on: 299,
            before_overlap: 0,
            after_overlap: 0,
        }
    }

    #[test]
    fn upload_then_list_round_trips_metadata() {
        let root = tempdir().unwrap();
        let staging = tempdir().unwrap();
        let store = FsDestinationStore::new(root.path());

        let local = staging.path().join("movie-trim-0.webm");
        fs::write(&local, b"payload").unwrap();
        let metadata = ItemMetadata {
            annotated: false,
            fps: Some(30.0),
            frame_count: Some(300),
            trim: Some(sample_trim()),
        };
        store
            .upload(&local, "movie", Some(metadata.clone()), false)
            .unwrap();

        let items = store.list("movie", Some("video")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "movie-trim-0.webm");
        assert_eq!(items[0].directory, "movie");
        assert_eq!(items[0].metadata, metadata);
        assert_eq!(items[0].metadata.trim.as_ref().unwrap().calculated_frames(), 300);
    }

    #[test]
    fn list_is_sorted_and_filters_non_video() {
        let root = tempdir().unwrap();
        let staging = tempdir().unwrap();
        let store = FsDestinationStore::new(root.path());

        for name in ["b-trim-1.webm", "a-trim-0.webm", "notes.csv", "stray.txt"] {
            let local = staging.path().join(name);
            fs::write(&local, b"x").unwrap();
            store.upload(&local, "d", None, false).unwrap();
        }

        let videos = store.list("d", Some("video")).unwrap();
        let names: Vec<_> = videos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a-trim-0.webm", "b-trim-1.webm"]);

        let everything = store.list("d", None).unwrap();
        // Sidecars are never listed; the unknown extension only shows up
        // with the filter off.
        assert_eq!(everything.len(), 4);
    }

    #[test]
    fn listing_a_missing_directory_is_empty() {
        let root = tempdir().unwrap();
        let store = FsDestinationStore::new(root.path());
        assert!(store.list("nothing", Some("video")).unwrap().is_empty());
    }

    #[test]
    fn upload_refuses_collision_without_overwrite() {
        let root = tempdir().unwrap();
        let staging = tempdir().unwrap();
        let store = FsDestinationStore::new(root.path());

        let local = staging.path().join("movie-trim-0.webm");
        fs::write(&local, b"one").unwrap();
        store.upload(&local, "movie", None, false).unwrap();

        assert!(matches!(
            store.upload(&local, "movie", None, false),
            Err(CoreError::Store(_))
        ));
        // Overwrite replaces without error.
        fs::write(&local, b"two").unwrap();
        let item = store.upload(&local, "movie", None, true).unwrap();
        assert_eq!(fs::read(&item.path).unwrap(), b"two");
    }

    #[test]
    fn delete_removes_file_and_sidecar() {
        let root = tempdir().unwrap();
        let staging = tempdir().unwrap();
        let store = FsDestinationStore::new(root.path());

        let local = staging.path().join("movie-trim-0.webm");
        fs::write(&local, b"x").unwrap();
        let item = store.upload(&local, "movie", None, false).unwrap();
        assert!(item.path.exists());
        assert!(sidecar_path(&item.path).exists());

        store.delete(&item).unwrap();
        assert!(!item.path.exists());
        assert!(!sidecar_path(&item.path).exists());
        assert!(store.list("movie", None).unwrap().is_empty());
    }

    #[test]
    fn source_record_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("movie.mp4");
        fs::write(&video, b"video bytes").unwrap();

        let mut record = FsSourceRecord::open(&video).unwrap();
        assert_eq!(record.name(), "movie.mp4");
        assert_eq!(record.cached_fps(), None);

        record.cache_metadata(&VideoMetadata {
            fps: Some(30.0),
            frame_count: Some(1000),
            duration: Some(33.37),
            ..Default::default()
        });
        record.set_status(TrimStatusBlock::new("movie", "Planning", Some(4)));
        record.set_errors(vec![ErrorRecord::new(
            "sourceExpectedFrames",
            "Frames is not equal to FPS * Duration",
            2.0,
            "movie.mp4",
        )]);
        record.persist().unwrap();

        let reloaded = FsSourceRecord::open(&video).unwrap();
        assert_eq!(reloaded.cached_fps(), Some(30.0));
        assert_eq!(reloaded.cached_frame_count(), Some(1000));
        assert_eq!(reloaded.cached_duration(), Some(33.37));
        let status = reloaded.status().unwrap();
        assert_eq!(status.status, "Planning");
        assert_eq!(status.expected_outputs, Some(4));
        assert!(!status.updated_at.is_empty());
        assert_eq!(reloaded.errors().len(), 1);
    }

    #[test]
    fn cache_prefers_declared_count_and_keeps_old_values() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("movie.mp4");
        fs::write(&video, b"x").unwrap();
        let mut record = FsSourceRecord::open(&video).unwrap();

        record.cache_metadata(&VideoMetadata {
            read_frame_count: Some(999),
            ..Default::default()
        });
        assert_eq!(record.cached_frame_count(), Some(999));

        // A later partial probe never erases what is known.
        record.cache_metadata(&VideoMetadata::default());
        assert_eq!(record.cached_frame_count(), Some(999));
    }

    #[test]
    fn fetch_copies_into_the_work_dir() {
        let dir = tempdir().unwrap();
        let work = tempdir().unwrap();
        let video = dir.path().join("movie.mp4");
        fs::write(&video, b"video bytes").unwrap();

        let record = FsSourceRecord::open(&video).unwrap();
        let fetched = record.fetch_to(work.path()).unwrap();
        assert_eq!(fetched, work.path().join("movie.mp4"));
        assert_eq!(fs::read(&fetched).unwrap(), b"video bytes");
    }

    #[test]
    fn opening_a_missing_source_fails() {
        assert!(matches!(
            FsSourceRecord::open("/no/such/video.mp4"),
            Err(CoreError::Store(_))
        ));
    }

    #[test]
    fn sidecar_documents_use_camel_case_keys() {
        let block = TrimStatusBlock::new("movie", "Done", Some(4));
        let json = serde_json::to_value(&block).unwrap();
        assert!(json.get("destinationDir").is_some());
        assert!(json.get("expectedOutputs").is_some());
        assert!(json.get("updatedAt").is_some());

        let metadata = ItemMetadata {
            trim: Some(sample_trim()),
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert!(json["trim"].get("originalVideo").is_some());
        assert!(json["trim"].get("startFrom").is_some());
        assert!(json["trim"].get("endOn").is_some());
    }

    #[test]
    fn mimetype_guesses() {
        assert_eq!(guess_mimetype("a.webm"), Some("video/webm"));
        assert_eq!(guess_mimetype("a.MP4"), Some("video/mp4"));
        assert_eq!(guess_mimetype("report.csv"), Some("text/csv"));
        assert_eq!(guess_mimetype("noext"), None);
        assert_eq!(guess_mimetype("a.xyz"), None);
    }

    #[test]
    fn cached_item_skips_the_probe() {
        struct PanickingProber;
        impl MediaProber for PanickingProber {
            fn probe(&self, locator: &str, _with_auth: bool) -> CoreResult<VideoMetadata> {
                panic!("unexpected probe of {locator}");
            }
        }

        let item = StoredItem {
            name: "a.webm".to_string(),
            directory: "d".to_string(),
            id: "d/a.webm".to_string(),
            path: PathBuf::from("/dest/d/a.webm"),
            metadata: ItemMetadata {
                fps: Some(30.0),
                frame_count: Some(300),
                ..Default::default()
            },
        };
        let (fps, frames) = item.fps_and_frames(&PanickingProber).unwrap();
        assert_eq!(fps, Some(30.0));
        assert_eq!(frames, Some(300));
    }
}
