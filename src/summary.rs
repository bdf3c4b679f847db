// src/summary.rs - Whole-sequence hip/knee flexion summary
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::geometry::vertex_angle;
use crate::landmarks::{BodyPart, Frame, Joint, Side};

const STRAIGHT: f64 = 180.0;
const STRAIGHT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlexionDepth {
    Deep,
    Shallow,
    NoBend,
    NoValidFrames,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexionSummary {
    pub valid_frames: usize,
    pub min_hip_angle: Option<f64>,
    pub min_knee_angle: Option<f64>,
    pub depth: FlexionDepth,
}

/// The four joints of one side, taken together. Unlike the bottom-frame
/// checks this does not mix sides: the left limb is used when all four left
/// landmarks are present, otherwise the right limb when all four are.
struct Limb<'a> {
    shoulder: &'a Joint,
    hip: &'a Joint,
    knee: &'a Joint,
    ankle: &'a Joint,
}

impl<'a> Limb<'a> {
    fn from_frame(frame: &'a Frame) -> Option<Self> {
        Self::on_side(frame, Side::Left).or_else(|| Self::on_side(frame, Side::Right))
    }

    fn on_side(frame: &'a Frame, side: Side) -> Option<Self> {
        Some(Self {
            shoulder: frame.get(BodyPart::Shoulder.on(side))?,
            hip: frame.get(BodyPart::Hip.on(side))?,
            knee: frame.get(BodyPart::Knee.on(side))?,
            ankle: frame.get(BodyPart::Ankle.on(side))?,
        })
    }

    fn is_visible(&self, min_visibility: f64) -> bool {
        [self.shoulder, self.hip, self.knee, self.ankle]
            .iter()
            .all(|joint| joint.is_visible(min_visibility))
    }
}

/// Tracks the tightest hip and knee angles over every frame where one side
/// is fully and confidently visible.
pub fn summarize_flexion(sequence: &[Frame], config: &AnalysisConfig) -> FlexionSummary {
    let mut valid_frames = 0;
    let mut min_hip = STRAIGHT;
    let mut min_knee = STRAIGHT;

    for frame in sequence {
        let Some(limb) = Limb::from_frame(frame) else {
            continue;
        };
        if !limb.is_visible(config.min_visibility) {
            continue;
        }
        valid_frames += 1;

        let (Some(hip_angle), Some(knee_angle)) = (
            vertex_angle(limb.shoulder, limb.hip, limb.knee),
            vertex_angle(limb.hip, limb.knee, limb.ankle),
        ) else {
            continue;
        };
        min_hip = min_hip.min(hip_angle);
        min_knee = min_knee.min(knee_angle);
    }

    let depth = if valid_frames == 0 {
        FlexionDepth::NoValidFrames
    } else if min_hip >= STRAIGHT - STRAIGHT_TOLERANCE {
        FlexionDepth::NoBend
    } else if min_hip < config.depth_angle_threshold {
        FlexionDepth::Deep
    } else {
        FlexionDepth::Shallow
    };

    let observed = valid_frames > 0;
    FlexionSummary {
        valid_frames,
        min_hip_angle: observed.then_some(min_hip),
        min_knee_angle: observed.then_some(min_knee),
        depth,
    }
}
