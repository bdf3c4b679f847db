// src/data.rs - Keypoint sequence export and reload
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use csv::Writer;
use serde::Serialize;

use crate::error::ExportError;
use crate::landmarks::{BodyPart, Frame, Sequence, Side};

#[derive(Debug, Serialize)]
struct FrameRecord {
    sequence_index: usize,
    source_frame: Option<usize>,
    detected_landmarks: usize,

    left_shoulder_x: Option<f64>,
    left_shoulder_y: Option<f64>,
    left_shoulder_visibility: Option<f64>,

    right_shoulder_x: Option<f64>,
    right_shoulder_y: Option<f64>,
    right_shoulder_visibility: Option<f64>,

    left_hip_x: Option<f64>,
    left_hip_y: Option<f64>,
    left_hip_visibility: Option<f64>,

    right_hip_x: Option<f64>,
    right_hip_y: Option<f64>,
    right_hip_visibility: Option<f64>,

    left_knee_x: Option<f64>,
    left_knee_y: Option<f64>,
    left_knee_visibility: Option<f64>,

    right_knee_x: Option<f64>,
    right_knee_y: Option<f64>,
    right_knee_visibility: Option<f64>,

    left_ankle_x: Option<f64>,
    left_ankle_y: Option<f64>,
    left_ankle_visibility: Option<f64>,

    right_ankle_x: Option<f64>,
    right_ankle_y: Option<f64>,
    right_ankle_visibility: Option<f64>,
}

type Columns = (Option<f64>, Option<f64>, Option<f64>);

fn columns(frame: &Frame, part: BodyPart, side: Side) -> Columns {
    match frame.get(part.on(side)) {
        Some(joint) => (Some(joint.x), Some(joint.y), Some(joint.visibility)),
        None => (None, None, None),
    }
}

impl FrameRecord {
    fn new(sequence_index: usize, source_frame: Option<usize>, frame: &Frame) -> Self {
        let (left_shoulder_x, left_shoulder_y, left_shoulder_visibility) =
            columns(frame, BodyPart::Shoulder, Side::Left);
        let (right_shoulder_x, right_shoulder_y, right_shoulder_visibility) =
            columns(frame, BodyPart::Shoulder, Side::Right);
        let (left_hip_x, left_hip_y, left_hip_visibility) = columns(frame, BodyPart::Hip, Side::Left);
        let (right_hip_x, right_hip_y, right_hip_visibility) = columns(frame, BodyPart::Hip, Side::Right);
        let (left_knee_x, left_knee_y, left_knee_visibility) = columns(frame, BodyPart::Knee, Side::Left);
        let (right_knee_x, right_knee_y, right_knee_visibility) =
            columns(frame, BodyPart::Knee, Side::Right);
        let (left_ankle_x, left_ankle_y, left_ankle_visibility) =
            columns(frame, BodyPart::Ankle, Side::Left);
        let (right_ankle_x, right_ankle_y, right_ankle_visibility) =
            columns(frame, BodyPart::Ankle, Side::Right);

        Self {
            sequence_index,
            source_frame,
            detected_landmarks: frame.len(),
            left_shoulder_x,
            left_shoulder_y,
            left_shoulder_visibility,
            right_shoulder_x,
            right_shoulder_y,
            right_shoulder_visibility,
            left_hip_x,
            left_hip_y,
            left_hip_visibility,
            right_hip_x,
            right_hip_y,
            right_hip_visibility,
            left_knee_x,
            left_knee_y,
            left_knee_visibility,
            right_knee_x,
            right_knee_y,
            right_knee_visibility,
            left_ankle_x,
            left_ankle_y,
            left_ankle_visibility,
            right_ankle_x,
            right_ankle_y,
            right_ankle_visibility,
        }
    }
}

fn create_parent(path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Writes the sequence as a JSON array of `{LANDMARK_NAME: joint}` objects.
pub fn export_json(sequence: &[Frame], path: impl AsRef<Path>) -> Result<PathBuf, ExportError> {
    let path = path.as_ref();
    create_parent(path)?;

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, sequence)?;
    writer.flush()?;
    Ok(path.to_path_buf())
}

/// Reads a sequence written by [`export_json`].
///
/// A missing file, a file that does not parse, and a file with no frames are
/// all reported as distinct errors.
pub fn load_sequence(path: impl AsRef<Path>) -> Result<Sequence, ExportError> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ExportError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(ExportError::Io(e)),
    };

    let sequence: Sequence =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ExportError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

    if sequence.is_empty() {
        return Err(ExportError::Empty(path.to_path_buf()));
    }
    Ok(sequence)
}

/// Writes one CSV row per sequence frame with the squat joints of both sides.
/// `source_frames[i]` is the video frame that sequence frame `i` came from.
pub fn export_csv(
    sequence: &[Frame],
    source_frames: &[usize],
    path: impl AsRef<Path>,
) -> Result<PathBuf, ExportError> {
    let path = path.as_ref();
    create_parent(path)?;

    let mut writer = Writer::from_writer(File::create(path)?);
    for (i, frame) in sequence.iter().enumerate() {
        writer.serialize(FrameRecord::new(i, source_frames.get(i).copied(), frame))?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}
