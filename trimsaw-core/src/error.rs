//! Error types shared across the trimsaw-core library.

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Result alias used throughout the library.
pub type CoreResult<T> = Result<T, CoreError>;

/// All failure modes the library surfaces to callers.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A required external binary is not installed or not on PATH.
    /// Always fatal to the run.
    #[error("required tool '{0}' was not found")]
    ToolUnavailable(String),

    /// A child process could not be spawned for a reason other than a
    /// missing binary.
    #[error("failed to start '{0}': {1}")]
    CommandStart(String, #[source] io::Error),

    /// A child process ran but exited unsuccessfully.
    #[error("'{tool}' exited with {status}: {stderr}")]
    CommandFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    /// ffprobe produced output that could not be interpreted.
    #[error("failed to parse probe output: {0}")]
    ProbeParse(String),

    /// The probed media carries no video stream.
    #[error("no video stream found in {0}")]
    MissingVideoStream(String),

    /// A segment's boundaries are malformed.
    #[error("invalid frame range: {0}")]
    InvalidRange(String),

    /// Segment planning could not produce a usable plan.
    #[error("planning failed: {0}")]
    Plan(String),

    /// The destination store or source record rejected an operation.
    #[error("store error: {0}")]
    Store(String),

    /// Sidecar or probe metadata failed to (de)serialize.
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The requested operation is not supported by the selected backend.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Maps a spawn failure to the right variant. A missing binary becomes
/// [`CoreError::ToolUnavailable`] so callers can distinguish it from other
/// startup failures.
pub fn command_start_error(tool: &str, err: io::Error) -> CoreError {
    if err.kind() == io::ErrorKind::NotFound {
        CoreError::ToolUnavailable(tool.to_string())
    } else {
        CoreError::CommandStart(tool.to_string(), err)
    }
}

/// Builds a [`CoreError::CommandFailed`] carrying the captured stderr text.
pub fn command_failed_error(tool: &str, status: ExitStatus, stderr: &[u8]) -> CoreError {
    CoreError::CommandFailed {
        tool: tool.to_string(),
        status,
        stderr: String::from_utf8_lossy(stderr).trim().to_string(),
    }
}
