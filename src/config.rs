// src/config.rs - Analysis thresholds and process configuration
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_VISIBILITY: f64 = 0.3;
pub const DEFAULT_BACK_ANGLE_THRESHOLD: f64 = 35.0;
pub const DEFAULT_DEPTH_ANGLE_THRESHOLD: f64 = 95.0;

/// Thresholds shared by every entry point.
///
/// | Env Var                       | Default |
/// |-------------------------------|---------|
/// | `SQUAT_MIN_VISIBILITY`        | `0.3`   |
/// | `SQUAT_BACK_ANGLE_THRESHOLD`  | `35`    |
/// | `SQUAT_DEPTH_ANGLE_THRESHOLD` | `95`    |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// A joint counts only when its visibility is strictly above this.
    pub min_visibility: f64,
    /// Torso/shin angle difference (degrees) at or above which the back
    /// counts as leaned forward.
    pub back_angle_threshold: f64,
    /// Hip vertex angle (degrees) below which the flexion summary calls the
    /// squat deep.
    pub depth_angle_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_visibility: DEFAULT_MIN_VISIBILITY,
            back_angle_threshold: DEFAULT_BACK_ANGLE_THRESHOLD,
            depth_angle_threshold: DEFAULT_DEPTH_ANGLE_THRESHOLD,
        }
    }
}

impl AnalysisConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            min_visibility: env_or("SQUAT_MIN_VISIBILITY", defaults.min_visibility)?,
            back_angle_threshold: env_or("SQUAT_BACK_ANGLE_THRESHOLD", defaults.back_angle_threshold)?,
            depth_angle_threshold: env_or("SQUAT_DEPTH_ANGLE_THRESHOLD", defaults.depth_angle_threshold)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_visibility) {
            anyhow::bail!(
                "min_visibility must be within [0, 1], got {}",
                self.min_visibility
            );
        }
        if !(0.0..=180.0).contains(&self.back_angle_threshold) {
            anyhow::bail!(
                "back_angle_threshold must be within [0, 180], got {}",
                self.back_angle_threshold
            );
        }
        if !(0.0..=180.0).contains(&self.depth_angle_threshold) {
            anyhow::bail!(
                "depth_angle_threshold must be within [0, 180], got {}",
                self.depth_angle_threshold
            );
        }
        Ok(())
    }
}

/// How to launch the landmark detector process.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl DetectorConfig {
    /// Reads `SQUAT_DETECTOR_CMD`, split on whitespace
    /// (default: `python3 -u pose_worker.py`).
    pub fn from_env() -> Result<Self> {
        let command = std::env::var("SQUAT_DETECTOR_CMD")
            .unwrap_or_else(|_| "python3 -u pose_worker.py".into());
        Self::parse(&command)
    }

    pub fn parse(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .context("SQUAT_DETECTOR_CMD must name a program")?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

/// Paths for the one-shot batch tool.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_video: PathBuf,
    pub output_video: PathBuf,
    pub output_json: PathBuf,
    pub output_csv: Option<PathBuf>,
}

impl BatchConfig {
    /// | Env Var              | Default               |
    /// |----------------------|-----------------------|
    /// | `SQUAT_INPUT_VIDEO`  | `squat.mp4`           |
    /// | `SQUAT_OUTPUT_VIDEO` | `analysis_output.mp4` |
    /// | `SQUAT_OUTPUT_JSON`  | `keypoints.json`      |
    /// | `SQUAT_OUTPUT_CSV`   | unset (no CSV)        |
    pub fn from_env() -> Self {
        Self {
            input_video: env_path("SQUAT_INPUT_VIDEO", "squat.mp4"),
            output_video: env_path("SQUAT_OUTPUT_VIDEO", "analysis_output.mp4"),
            output_json: env_path("SQUAT_OUTPUT_JSON", "keypoints.json"),
            output_csv: std::env::var("SQUAT_OUTPUT_CSV").ok().map(PathBuf::from),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// When set, every request also writes an annotated video next to this
    /// path, named `<stem>_<request id>.<ext>`.
    pub debug_video: Option<PathBuf>,
    /// Allowed browser origins. `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// Where uploads are stored while they are analysed.
    pub upload_dir: PathBuf,
}

impl ServerConfig {
    /// | Env Var              | Default                  |
    /// |----------------------|--------------------------|
    /// | `HOST`               | `0.0.0.0`                |
    /// | `PORT`               | `3000`                   |
    /// | `SQUAT_DEBUG_VIDEO`  | unset                    |
    /// | `SQUAT_CORS_ORIGINS` | `*` (comma-separated)    |
    /// | `SQUAT_UPLOAD_DIR`   | the system temp dir      |
    pub fn from_env() -> Result<Self> {
        let cors_origins = parse_origins(
            &std::env::var("SQUAT_CORS_ORIGINS").unwrap_or_else(|_| "*".into()),
        );

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("PORT", 3000)?,
            debug_video: std::env::var("SQUAT_DEBUG_VIDEO").ok().map(PathBuf::from),
            cors_origins,
            upload_dir: std::env::var("SQUAT_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
