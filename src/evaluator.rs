// src/evaluator.rs - Depth and back-angle verdicts at the bottom frame
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::geometry::{round2, segment_angle_from_horizontal, vertex_angle};
use crate::landmarks::{BodyPart, Frame, JointLookup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthVerdict {
    Good,
    TooHigh,
    NotAnalyzed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackVerdict {
    Good,
    LeanedForward,
    NotAnalyzed,
}

/// Form judgment for one squat.
///
/// `diagnostics` only explains the verdicts; nothing in it feeds back into
/// them. `bottom_frame_index` serializes as `-1` when no frame was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub depth_verdict: DepthVerdict,
    pub back_verdict: BackVerdict,
    pub hip_below_knee: bool,
    #[serde(
        serialize_with = "serialize_frame_index",
        deserialize_with = "deserialize_frame_index"
    )]
    pub bottom_frame_index: Option<usize>,
    pub diagnostics: BTreeMap<String, Value>,
}

fn serialize_frame_index<S: Serializer>(index: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
    match index {
        Some(index) => s.serialize_u64(*index as u64),
        None => s.serialize_i64(-1),
    }
}

fn deserialize_frame_index<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
    let raw = i64::deserialize(d)?;
    Ok(usize::try_from(raw).ok())
}

/// Evaluates the frame at `bottom_index`.
///
/// Each check gates its own joints, so a missing ankle does not stop the
/// depth check. Evaluating the same input twice gives the same result.
pub fn evaluate(
    sequence: &[Frame],
    bottom_index: usize,
    config: &AnalysisConfig,
) -> Result<EvaluationResult, AnalysisError> {
    let frame = sequence
        .get(bottom_index)
        .ok_or(AnalysisError::FrameOutOfRange {
            index: bottom_index,
            len: sequence.len(),
        })?;
    Ok(evaluate_frame(frame, bottom_index, config))
}

pub fn evaluate_frame(frame: &Frame, index: usize, config: &AnalysisConfig) -> EvaluationResult {
    let min_visibility = config.min_visibility;
    let shoulder = frame.lookup(BodyPart::Shoulder, min_visibility);
    let hip = frame.lookup(BodyPart::Hip, min_visibility);
    let knee = frame.lookup(BodyPart::Knee, min_visibility);
    let ankle = frame.lookup(BodyPart::Ankle, min_visibility);

    let mut diagnostics = BTreeMap::new();
    for (part, lookup) in [(BodyPart::Hip, &hip), (BodyPart::Knee, &knee)] {
        if let Some((landmark, joint)) = frame.resolve(part) {
            diagnostics.insert(format!("{}_visibility", part.label()), json!(round2(joint.visibility)));
            diagnostics.insert(format!("{}_landmark", part.label()), json!(landmark.name()));
        }
        if let Some(message) = describe_unresolved(part, lookup, min_visibility) {
            tracing::debug!(part = part.label(), %message, "joint unavailable at bottom frame");
        }
    }

    let (depth_verdict, hip_below_knee) = match (hip.joint(), knee.joint()) {
        (Some(hip), Some(knee)) => {
            let below = hip.y > knee.y;
            let verdict = if below { DepthVerdict::Good } else { DepthVerdict::TooHigh };
            (verdict, below)
        }
        _ => {
            let reasons: Vec<String> = [(BodyPart::Hip, &hip), (BodyPart::Knee, &knee)]
                .into_iter()
                .filter_map(|(part, lookup)| describe_unresolved(part, lookup, min_visibility))
                .collect();
            diagnostics.insert("depth_error".into(), json!(reasons.join("; ")));
            (DepthVerdict::NotAnalyzed, false)
        }
    };

    let back_verdict = match (shoulder.joint(), hip.joint(), knee.joint(), ankle.joint()) {
        (Some(shoulder), Some(hip), Some(knee), Some(ankle)) => {
            match (
                segment_angle_from_horizontal(shoulder, hip),
                segment_angle_from_horizontal(knee, ankle),
            ) {
                (Some(torso), Some(shin)) => {
                    let difference = (torso.abs() - shin.abs()).abs();
                    diagnostics.insert("torso_angle_deg".into(), json!(round2(torso)));
                    diagnostics.insert("shin_angle_deg".into(), json!(round2(shin)));
                    diagnostics.insert("back_shin_difference_deg".into(), json!(round2(difference)));
                    if difference < config.back_angle_threshold {
                        BackVerdict::Good
                    } else {
                        BackVerdict::LeanedForward
                    }
                }
                _ => BackVerdict::NotAnalyzed,
            }
        }
        _ => BackVerdict::NotAnalyzed,
    };

    if let (Some(shoulder), Some(hip), Some(knee)) = (shoulder.joint(), hip.joint(), knee.joint()) {
        if let Some(angle) = vertex_angle(shoulder, hip, knee) {
            diagnostics.insert("hip_angle_deg".into(), json!(round2(angle)));
        }
    }
    if let (Some(hip), Some(knee), Some(ankle)) = (hip.joint(), knee.joint(), ankle.joint()) {
        if let Some(angle) = vertex_angle(hip, knee, ankle) {
            diagnostics.insert("knee_angle_deg".into(), json!(round2(angle)));
        }
    }

    EvaluationResult {
        depth_verdict,
        back_verdict,
        hip_below_knee,
        bottom_frame_index: Some(index),
        diagnostics,
    }
}

fn describe_unresolved(part: BodyPart, lookup: &JointLookup<'_>, min_visibility: f64) -> Option<String> {
    match lookup {
        JointLookup::Resolved { .. } => None,
        JointLookup::Absent => Some(format!(
            "{} joint was not found at the bottom frame",
            part.label()
        )),
        JointLookup::BelowThreshold { landmark, visibility } => Some(format!(
            "{} visibility ({:.2}) was not above the threshold of {}",
            landmark.name(),
            visibility,
            min_visibility
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Joint, PoseLandmark};
    use assert_matches::assert_matches;

    fn at(x: f64, y: f64) -> Joint {
        Joint::new(x, y, 0.0, 0.9)
    }

    /// Upright torso with the hip below the knee.
    fn deep_upright() -> Frame {
        Frame::new()
            .with(PoseLandmark::LeftShoulder, at(0.5, 0.3))
            .with(PoseLandmark::LeftHip, at(0.5, 0.66))
            .with(PoseLandmark::LeftKnee, at(0.6, 0.65))
            .with(PoseLandmark::LeftAnkle, at(0.55, 0.9))
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    #[test]
    fn deep_upright_squat_is_good_on_both_counts() {
        let result = evaluate(&[deep_upright()], 0, &config()).unwrap();
        assert_eq!(result.depth_verdict, DepthVerdict::Good);
        assert_eq!(result.back_verdict, BackVerdict::Good);
        assert!(result.hip_below_knee);
        assert_eq!(result.bottom_frame_index, Some(0));
        assert_eq!(result.diagnostics["hip_visibility"], json!(0.9));
        assert_eq!(result.diagnostics["hip_landmark"], json!("LEFT_HIP"));
        assert!(result.diagnostics.contains_key("back_shin_difference_deg"));
        assert!(!result.diagnostics.contains_key("depth_error"));
    }

    #[test]
    fn hip_level_with_knee_is_too_high() {
        let frame = deep_upright().with(PoseLandmark::LeftHip, at(0.5, 0.65));
        let result = evaluate_frame(&frame, 0, &config());
        assert_eq!(result.depth_verdict, DepthVerdict::TooHigh);
        assert!(!result.hip_below_knee);
    }

    #[test]
    fn forward_lean_is_flagged() {
        let frame = deep_upright().with(PoseLandmark::LeftShoulder, at(0.8, 0.5));
        let result = evaluate_frame(&frame, 0, &config());
        assert_eq!(result.back_verdict, BackVerdict::LeanedForward);
        let difference = result.diagnostics["back_shin_difference_deg"].as_f64().unwrap();
        assert!(difference >= 35.0, "got {difference}");
    }

    #[test]
    fn weak_knee_is_excluded_whatever_its_position() {
        let frame = deep_upright().with(PoseLandmark::LeftKnee, Joint::new(0.6, 0.1, 0.0, 0.25));
        let result = evaluate_frame(&frame, 3, &config());
        assert_eq!(result.depth_verdict, DepthVerdict::NotAnalyzed);
        assert_eq!(result.back_verdict, BackVerdict::NotAnalyzed);
        assert!(!result.hip_below_knee);
        let error = result.diagnostics["depth_error"].as_str().unwrap();
        assert!(error.contains("LEFT_KNEE visibility (0.25)"), "got {error}");
        assert_eq!(result.diagnostics["knee_visibility"], json!(0.25));
    }

    #[test]
    fn missing_knee_is_reported_as_absent() {
        let mut frame = Frame::new();
        for (landmark, joint) in deep_upright().iter() {
            if landmark != PoseLandmark::LeftKnee {
                frame.insert(landmark, *joint);
            }
        }
        let result = evaluate_frame(&frame, 0, &config());
        assert_eq!(result.depth_verdict, DepthVerdict::NotAnalyzed);
        assert_eq!(
            result.diagnostics["depth_error"],
            json!("knee joint was not found at the bottom frame")
        );
        assert!(!result.diagnostics.contains_key("knee_visibility"));
    }

    #[test]
    fn missing_ankle_only_blocks_the_back_check() {
        let mut frame = Frame::new();
        for (landmark, joint) in deep_upright().iter() {
            if landmark != PoseLandmark::LeftAnkle {
                frame.insert(landmark, *joint);
            }
        }
        let result = evaluate_frame(&frame, 0, &config());
        assert_eq!(result.depth_verdict, DepthVerdict::Good);
        assert_eq!(result.back_verdict, BackVerdict::NotAnalyzed);
        assert!(!result.diagnostics.contains_key("back_shin_difference_deg"));
    }

    #[test]
    fn right_side_gives_the_same_verdicts_as_left() {
        let left = deep_upright().with(PoseLandmark::LeftShoulder, at(0.8, 0.5));
        let mut right = Frame::new();
        for (landmark, joint) in left.iter() {
            let part = match landmark {
                PoseLandmark::LeftShoulder => BodyPart::Shoulder,
                PoseLandmark::LeftHip => BodyPart::Hip,
                PoseLandmark::LeftKnee => BodyPart::Knee,
                _ => BodyPart::Ankle,
            };
            right.insert(part.on(crate::landmarks::Side::Right), *joint);
        }

        let from_left = evaluate_frame(&left, 0, &config());
        let from_right = evaluate_frame(&right, 0, &config());
        assert_eq!(from_left.depth_verdict, from_right.depth_verdict);
        assert_eq!(from_left.back_verdict, from_right.back_verdict);
        assert_eq!(from_left.hip_below_knee, from_right.hip_below_knee);
        assert_eq!(from_right.diagnostics["hip_landmark"], json!("RIGHT_HIP"));
    }

    #[test]
    fn evaluation_is_repeatable() {
        let sequence = vec![Frame::new(), deep_upright()];
        let first = evaluate(&sequence, 1, &config()).unwrap();
        let second = evaluate(&sequence, 1, &config()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        assert_matches!(
            evaluate(&[deep_upright()], 1, &config()),
            Err(AnalysisError::FrameOutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn result_serializes_with_sentinel_index() {
        let mut result = evaluate_frame(&deep_upright(), 4, &config());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["bottom_frame_index"], 4);
        assert_eq!(value["depth_verdict"], "Good");

        result.bottom_frame_index = None;
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["bottom_frame_index"], -1);
        let back: EvaluationResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.bottom_frame_index, None);
    }
}
