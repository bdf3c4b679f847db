// src/landmarks.rs - Pose landmark names, joints and per-frame landmark sets
use std::collections::BTreeMap;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// The 33 MediaPipe pose landmarks, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoseLandmark {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl PoseLandmark {
    pub const COUNT: usize = 33;

    pub const ALL: [PoseLandmark; Self::COUNT] = [
        Self::Nose,
        Self::LeftEyeInner,
        Self::LeftEye,
        Self::LeftEyeOuter,
        Self::RightEyeInner,
        Self::RightEye,
        Self::RightEyeOuter,
        Self::LeftEar,
        Self::RightEar,
        Self::MouthLeft,
        Self::MouthRight,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftPinky,
        Self::RightPinky,
        Self::LeftIndex,
        Self::RightIndex,
        Self::LeftThumb,
        Self::RightThumb,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::LeftHeel,
        Self::RightHeel,
        Self::LeftFootIndex,
        Self::RightFootIndex,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Upper-snake name as used in serialized keypoint files.
    pub fn name(self) -> &'static str {
        match self {
            Self::Nose => "NOSE",
            Self::LeftEyeInner => "LEFT_EYE_INNER",
            Self::LeftEye => "LEFT_EYE",
            Self::LeftEyeOuter => "LEFT_EYE_OUTER",
            Self::RightEyeInner => "RIGHT_EYE_INNER",
            Self::RightEye => "RIGHT_EYE",
            Self::RightEyeOuter => "RIGHT_EYE_OUTER",
            Self::LeftEar => "LEFT_EAR",
            Self::RightEar => "RIGHT_EAR",
            Self::MouthLeft => "MOUTH_LEFT",
            Self::MouthRight => "MOUTH_RIGHT",
            Self::LeftShoulder => "LEFT_SHOULDER",
            Self::RightShoulder => "RIGHT_SHOULDER",
            Self::LeftElbow => "LEFT_ELBOW",
            Self::RightElbow => "RIGHT_ELBOW",
            Self::LeftWrist => "LEFT_WRIST",
            Self::RightWrist => "RIGHT_WRIST",
            Self::LeftPinky => "LEFT_PINKY",
            Self::RightPinky => "RIGHT_PINKY",
            Self::LeftIndex => "LEFT_INDEX",
            Self::RightIndex => "RIGHT_INDEX",
            Self::LeftThumb => "LEFT_THUMB",
            Self::RightThumb => "RIGHT_THUMB",
            Self::LeftHip => "LEFT_HIP",
            Self::RightHip => "RIGHT_HIP",
            Self::LeftKnee => "LEFT_KNEE",
            Self::RightKnee => "RIGHT_KNEE",
            Self::LeftAnkle => "LEFT_ANKLE",
            Self::RightAnkle => "RIGHT_ANKLE",
            Self::LeftHeel => "LEFT_HEEL",
            Self::RightHeel => "RIGHT_HEEL",
            Self::LeftFootIndex => "LEFT_FOOT_INDEX",
            Self::RightFootIndex => "RIGHT_FOOT_INDEX",
        }
    }
}

/// A single detected landmark in normalized image coordinates.
///
/// `y` grows downward, so a larger `y` is lower in the picture. Deserialized
/// joints go through [`Joint::new`], so loaded files are clamped too.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawJoint")]
pub struct Joint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub visibility: f64,
}

#[derive(Deserialize)]
struct RawJoint {
    x: f64,
    y: f64,
    #[serde(default)]
    z: f64,
    visibility: f64,
}

impl From<RawJoint> for Joint {
    fn from(raw: RawJoint) -> Self {
        Joint::new(raw.x, raw.y, raw.z, raw.visibility)
    }
}

impl Joint {
    /// Builds a joint, clamping the visibility into `[0, 1]`.
    pub fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        let visibility = if visibility.is_nan() {
            0.0
        } else {
            visibility.clamp(0.0, 1.0)
        };
        Self { x, y, z, visibility }
    }

    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn is_visible(&self, min_visibility: f64) -> bool {
        self.visibility > min_visibility
    }

    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        ((self.x * width as f64) as i32, (self.y * height as f64) as i32)
    }
}

/// Landmarks detected in one image. Missing keys mean the model reported
/// nothing for that landmark, which is distinct from a low visibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frame {
    joints: BTreeMap<PoseLandmark, Joint>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a frame from model output given in landmark index order.
    /// Entries past the 33rd are ignored.
    pub fn from_indexed(landmarks: impl IntoIterator<Item = Joint>) -> Self {
        let joints = landmarks
            .into_iter()
            .enumerate()
            .filter_map(|(i, joint)| PoseLandmark::from_index(i).map(|name| (name, joint)))
            .collect();
        Self { joints }
    }

    pub fn insert(&mut self, landmark: PoseLandmark, joint: Joint) {
        self.joints.insert(landmark, joint);
    }

    pub fn with(mut self, landmark: PoseLandmark, joint: Joint) -> Self {
        self.insert(landmark, joint);
        self
    }

    pub fn get(&self, landmark: PoseLandmark) -> Option<&Joint> {
        self.joints.get(&landmark)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PoseLandmark, &Joint)> {
        self.joints.iter().map(|(name, joint)| (*name, joint))
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Looks up a bilateral body part, preferring the left side and falling
    /// back to the right side only when the left landmark is absent.
    pub fn resolve(&self, part: BodyPart) -> Option<(PoseLandmark, &Joint)> {
        let (left, right) = part.landmarks();
        self.get(left)
            .map(|joint| (left, joint))
            .or_else(|| self.get(right).map(|joint| (right, joint)))
    }

    /// Like [`Frame::resolve`], but also applies the visibility gate.
    pub fn lookup(&self, part: BodyPart, min_visibility: f64) -> JointLookup<'_> {
        match self.resolve(part) {
            None => JointLookup::Absent,
            Some((landmark, joint)) if joint.is_visible(min_visibility) => {
                JointLookup::Resolved { landmark, joint }
            }
            Some((landmark, joint)) => JointLookup::BelowThreshold {
                landmark,
                visibility: joint.visibility,
            },
        }
    }
}

/// An ordered list of frames in capture order.
pub type Sequence = Vec<Frame>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Body parts the squat checks use. Each maps to a left/right landmark pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPart {
    Shoulder,
    Hip,
    Knee,
    Ankle,
}

impl BodyPart {
    pub fn landmarks(self) -> (PoseLandmark, PoseLandmark) {
        match self {
            Self::Shoulder => (PoseLandmark::LeftShoulder, PoseLandmark::RightShoulder),
            Self::Hip => (PoseLandmark::LeftHip, PoseLandmark::RightHip),
            Self::Knee => (PoseLandmark::LeftKnee, PoseLandmark::RightKnee),
            Self::Ankle => (PoseLandmark::LeftAnkle, PoseLandmark::RightAnkle),
        }
    }

    pub fn on(self, side: Side) -> PoseLandmark {
        let (left, right) = self.landmarks();
        match side {
            Side::Left => left,
            Side::Right => right,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Shoulder => "shoulder",
            Self::Hip => "hip",
            Self::Knee => "knee",
            Self::Ankle => "ankle",
        }
    }
}

/// Outcome of a confidence-gated joint lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointLookup<'a> {
    Resolved {
        landmark: PoseLandmark,
        joint: &'a Joint,
    },
    BelowThreshold {
        landmark: PoseLandmark,
        visibility: f64,
    },
    Absent,
}

impl<'a> JointLookup<'a> {
    pub fn joint(&self) -> Option<&'a Joint> {
        match self {
            Self::Resolved { joint, .. } => Some(joint),
            _ => None,
        }
    }
}
