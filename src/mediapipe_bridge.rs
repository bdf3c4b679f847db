// src/mediapipe_bridge.rs - Landmark detector seam and external-process bridge
//
// The pose model runs out of process. One detector process serves one
// session: for every image we drop a PNG into a scratch directory, send its
// path as a line on stdin, and read back one line of JSON, either `null`
// (nobody in the picture) or an array of `{x, y, z, visibility}` objects in
// MediaPipe landmark order.
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use image::RgbImage;
use serde::Deserialize;

use crate::config::DetectorConfig;
use crate::error::DetectorError;
use crate::landmarks::{Frame, Joint};

/// Anything that can turn an image into a set of pose landmarks.
pub trait LandmarkDetector {
    /// `Ok(None)` means no person was found in the image.
    fn detect(&mut self, image: &RgbImage) -> Result<Option<Frame>, DetectorError>;
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<Frame>, DetectorError> {
        (**self).detect(image)
    }
}

/// Builds a fresh detector per session so sessions never share one.
pub trait DetectorFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn LandmarkDetector>, DetectorError>;
}

#[derive(Debug, Deserialize)]
struct RawLandmark {
    x: f64,
    y: f64,
    #[serde(default)]
    z: f64,
    #[serde(default)]
    visibility: f64,
}

/// Parses one reply line from the detector process.
pub fn parse_reply(line: &str) -> Result<Option<Frame>, DetectorError> {
    let raw: Option<Vec<RawLandmark>> =
        serde_json::from_str(line.trim()).map_err(|e| DetectorError::Protocol(e.to_string()))?;

    Ok(raw
        .filter(|landmarks| !landmarks.is_empty())
        .map(|landmarks| {
            Frame::from_indexed(
                landmarks
                    .into_iter()
                    .map(|lm| Joint::new(lm.x, lm.y, lm.z, lm.visibility)),
            )
        }))
}

/// A detector process owned by one session. Dropping it stops the process
/// and removes its scratch directory.
pub struct MediaPipeBridge {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    scratch_dir: PathBuf,
    frames_sent: u64,
}

impl MediaPipeBridge {
    pub fn spawn(config: &DetectorConfig) -> Result<Self, DetectorError> {
        let scratch_dir = std::env::temp_dir().join(format!("squat_coach_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&scratch_dir)?;

        let mut child = match Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
        {
            Ok(child) => child,
            Err(source) => {
                let _ = fs::remove_dir_all(&scratch_dir);
                return Err(DetectorError::Spawn {
                    program: config.program.clone(),
                    source,
                });
            }
        };

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            let _ = fs::remove_dir_all(&scratch_dir);
            return Err(DetectorError::Exited);
        };

        tracing::info!(program = %config.program, "landmark detector started");
        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            scratch_dir,
            frames_sent: 0,
        })
    }
}

impl LandmarkDetector for MediaPipeBridge {
    fn detect(&mut self, image: &RgbImage) -> Result<Option<Frame>, DetectorError> {
        let frame_path = self.scratch_dir.join("frame.png");
        image.save(&frame_path)?;

        writeln!(self.stdin, "{}", frame_path.display())?;
        self.stdin.flush()?;
        self.frames_sent += 1;

        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(DetectorError::Exited);
        }
        parse_reply(&line)
    }
}

impl Drop for MediaPipeBridge {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = fs::remove_dir_all(&self.scratch_dir);
        tracing::debug!(frames = self.frames_sent, "landmark detector shut down");
    }
}

/// Spawns a [`MediaPipeBridge`] per session from a shared command line.
pub struct CommandDetectorFactory {
    config: DetectorConfig,
}

impl CommandDetectorFactory {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

impl DetectorFactory for CommandDetectorFactory {
    fn create(&self) -> Result<Box<dyn LandmarkDetector>, DetectorError> {
        Ok(Box::new(MediaPipeBridge::spawn(&self.config)?))
    }
}
