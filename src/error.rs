// src/error.rs
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    #[error("video file does not exist: {0}")]
    NotFound(PathBuf),

    #[error("cannot read video file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("FFmpeg is not installed or not in PATH")]
    FfmpegMissing,

    #[error("invalid video format or corrupted file: {0}")]
    InvalidFormat(String),

    #[error("frame is {actual:?} but the writer expects {expected:?}")]
    FrameSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("ffmpeg {stage} failed: {message}")]
    Ffmpeg { stage: &'static str, message: String },

    #[error("video I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("failed to start landmark detector `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("landmark detector exited unexpectedly")]
    Exited,

    #[error("landmark detector sent an invalid reply: {0}")]
    Protocol(String),

    #[error("failed to hand frame to landmark detector: {0}")]
    Image(#[from] image::ImageError),

    #[error("landmark detector I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("keypoint file not found: {0}")]
    NotFound(PathBuf),

    #[error("keypoint file {path} is corrupt or empty: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("keypoint file {0} contains no frames")]
    Empty(PathBuf),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal outcomes of an analysis session.
///
/// Missing joints at the bottom frame are not errors; they surface as
/// `NotAnalyzed` verdicts on an otherwise successful result.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("input unavailable: {0}")]
    InputUnavailable(String),

    #[error("no poses detected")]
    NoDetection,

    #[error("could not track hip reliably")]
    UntrackableHip,

    #[error("frame index {index} is out of range for a sequence of {len} frames")]
    FrameOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error(transparent)]
    Video(#[from] VideoError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl AnalysisError {
    /// Classifies a failure to open the input as the caller's problem rather
    /// than an internal fault.
    pub fn from_open(err: VideoError) -> Self {
        match err {
            VideoError::NotFound(_)
            | VideoError::Unreadable { .. }
            | VideoError::InvalidFormat(_) => Self::InputUnavailable(err.to_string()),
            other => Self::Video(other),
        }
    }
}
