//! End-to-end tests for the analysis session, driven by a scripted detector
//! instead of a real pose model.

use std::collections::VecDeque;

use assert_matches::assert_matches;
use image::{Rgb, RgbImage};
use squat_coach::config::AnalysisConfig;
use squat_coach::data::{export_json, load_sequence};
use squat_coach::error::{AnalysisError, DetectorError, VideoError};
use squat_coach::landmarks::{BodyPart, Frame, Joint, Side};
use squat_coach::mediapipe_bridge::LandmarkDetector;
use squat_coach::session::{analyse_sequence, run_session, Session};
use squat_coach::summary::{summarize_flexion, FlexionDepth};
use squat_coach::video::{BestEffortSink, FrameSink};
use squat_coach::{BackVerdict, DepthVerdict};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Replays a fixed list of detector replies, one per image.
struct ScriptedDetector {
    replies: VecDeque<Result<Option<Frame>, DetectorError>>,
}

impl ScriptedDetector {
    fn new(replies: Vec<Option<Frame>>) -> Self {
        Self {
            replies: replies.into_iter().map(Ok).collect(),
        }
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<Option<Frame>, DetectorError> {
        self.replies.pop_front().unwrap_or(Ok(None))
    }
}

#[derive(Default)]
struct CollectingSink {
    frames: Vec<RgbImage>,
}

impl FrameSink for CollectingSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), VideoError> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

/// An encoder whose pipe is gone.
struct BrokenEncoder;

impl FrameSink for BrokenEncoder {
    fn write_frame(&mut self, _frame: &RgbImage) -> Result<(), VideoError> {
        Err(VideoError::Io(std::io::ErrorKind::BrokenPipe.into()))
    }
}

fn blank_images(count: usize) -> Vec<Result<RgbImage, VideoError>> {
    (0..count).map(|_| Ok(RgbImage::new(40, 40))).collect()
}

/// Upright torso, knee at y = 0.65, hip at `hip_y`, all on one side.
fn squat_frame(side: Side, hip_y: f64, visibility: f64) -> Frame {
    Frame::new()
        .with(BodyPart::Shoulder.on(side), Joint::new(0.5, 0.3, 0.0, visibility))
        .with(BodyPart::Hip.on(side), Joint::new(0.5, hip_y, 0.0, visibility))
        .with(BodyPart::Knee.on(side), Joint::new(0.6, 0.65, 0.0, visibility))
        .with(BodyPart::Ankle.on(side), Joint::new(0.55, 0.9, 0.0, visibility))
}

fn descent(side: Side) -> Vec<Frame> {
    [0.4, 0.7, 0.5]
        .into_iter()
        .map(|y| squat_frame(side, y, 0.9))
        .collect()
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Images without a person are dropped but their source index is kept.
#[test]
fn undetected_images_are_skipped_and_indexed() {
    let mut detector = ScriptedDetector::new(vec![
        None,
        Some(squat_frame(Side::Left, 0.4, 0.9)),
        None,
        Some(squat_frame(Side::Left, 0.7, 0.9)),
    ]);
    let mut sink = CollectingSink::default();

    let mut session = Session::new(&mut detector).with_sink(&mut sink);
    session.consume(blank_images(4)).unwrap();
    assert_eq!(session.sequence().len(), 2);
    let recording = session.finish();

    assert_eq!(recording.frames_read, 4);
    assert_eq!(recording.source_frames, vec![1, 3]);
    assert_eq!(recording.sequence[1].get(BodyPart::Hip.on(Side::Left)).unwrap().y, 0.7);

    assert_eq!(sink.frames.len(), 4);
    let untouched = |img: &RgbImage| img.pixels().all(|p| *p == Rgb([0, 0, 0]));
    assert!(untouched(&sink.frames[0]));
    assert!(!untouched(&sink.frames[1]));
}

/// A required sink aborts the session when it fails.
#[test]
fn failing_sink_ends_the_session() {
    let mut detector = ScriptedDetector::new(descent(Side::Left).into_iter().map(Some).collect());
    let mut sink = BrokenEncoder;
    let result = run_session(
        blank_images(3),
        &mut detector,
        Some(&mut sink),
        &AnalysisConfig::default(),
    );
    assert_matches!(result, Err(AnalysisError::Video(VideoError::Io(_))));
}

/// An optional debug sink that fails does not cost the analysis.
#[test]
fn failing_debug_sink_still_yields_a_result() {
    let mut detector = ScriptedDetector::new(descent(Side::Left).into_iter().map(Some).collect());
    let mut sink = BestEffortSink::new(Some(BrokenEncoder));
    let (recording, result) = run_session(
        blank_images(3),
        &mut detector,
        Some(&mut sink),
        &AnalysisConfig::default(),
    )
    .unwrap();

    assert_eq!(recording.sequence.len(), 3);
    assert_eq!(result.depth_verdict, DepthVerdict::Good);
    assert!(sink.into_inner().is_none());
}

#[test]
fn video_without_people_is_no_detection() {
    let mut detector = ScriptedDetector::new(vec![None, None, None]);
    let result = run_session(blank_images(3), &mut detector, None, &AnalysisConfig::default());
    assert_matches!(result, Err(AnalysisError::NoDetection));
}

#[test]
fn faint_hips_are_untrackable() {
    let frames = vec![
        Some(squat_frame(Side::Left, 0.5, 0.1)),
        Some(squat_frame(Side::Left, 0.7, 0.3)),
    ];
    let mut detector = ScriptedDetector::new(frames);
    let result = run_session(blank_images(2), &mut detector, None, &AnalysisConfig::default());
    assert_matches!(result, Err(AnalysisError::UntrackableHip));
}

#[test]
fn detector_failure_ends_the_session() {
    let mut detector = ScriptedDetector {
        replies: VecDeque::from(vec![
            Ok(Some(squat_frame(Side::Left, 0.4, 0.9))),
            Err(DetectorError::Exited),
        ]),
    };
    let result = run_session(blank_images(3), &mut detector, None, &AnalysisConfig::default());
    assert_matches!(result, Err(AnalysisError::Detector(DetectorError::Exited)));
}

#[test]
fn decode_failure_ends_the_session() {
    let mut images = blank_images(1);
    images.push(Err(VideoError::FrameSize {
        expected: (40, 40),
        actual: (20, 20),
    }));
    let mut detector = ScriptedDetector::new(vec![Some(squat_frame(Side::Left, 0.4, 0.9))]);

    let result = run_session(images, &mut detector, None, &AnalysisConfig::default());
    assert_matches!(result, Err(AnalysisError::Video(VideoError::FrameSize { .. })));
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[test]
fn deepest_frame_is_evaluated() {
    let mut detector = ScriptedDetector::new(descent(Side::Left).into_iter().map(Some).collect());
    let (recording, result) =
        run_session(blank_images(3), &mut detector, None, &AnalysisConfig::default()).unwrap();

    assert_eq!(recording.sequence.len(), 3);
    assert_eq!(result.bottom_frame_index, Some(1));
    assert!(result.hip_below_knee);
    assert_eq!(result.depth_verdict, DepthVerdict::Good);
    assert_eq!(result.back_verdict, BackVerdict::Good);
}

#[test]
fn right_side_only_gives_the_same_verdicts() {
    let config = AnalysisConfig::default();
    let left = analyse_sequence(&descent(Side::Left), &config).unwrap();
    let right = analyse_sequence(&descent(Side::Right), &config).unwrap();

    assert_eq!(left.bottom_frame_index, right.bottom_frame_index);
    assert_eq!(left.depth_verdict, right.depth_verdict);
    assert_eq!(left.back_verdict, right.back_verdict);
    assert_eq!(left.hip_below_knee, right.hip_below_knee);
}

#[test]
fn shallow_squat_is_too_high() {
    let sequence: Vec<Frame> = [0.4, 0.6, 0.5]
        .into_iter()
        .map(|y| squat_frame(Side::Left, y, 0.9))
        .collect();
    let result = analyse_sequence(&sequence, &AnalysisConfig::default()).unwrap();

    assert_eq!(result.bottom_frame_index, Some(1));
    assert!(!result.hip_below_knee);
    assert_eq!(result.depth_verdict, DepthVerdict::TooHigh);
}

/// Saved keypoints evaluate exactly like the live session did.
#[test]
fn reloaded_keypoints_give_the_same_result() {
    let config = AnalysisConfig::default();
    let sequence = descent(Side::Left);
    let live = analyse_sequence(&sequence, &config).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = export_json(&sequence, dir.path().join("keypoints.json")).unwrap();
    let reloaded = load_sequence(&path).unwrap();

    assert_eq!(analyse_sequence(&reloaded, &config).unwrap(), live);
    assert_eq!(
        summarize_flexion(&reloaded, &config),
        summarize_flexion(&sequence, &config)
    );
}

#[test]
fn flexion_summary_over_a_session() {
    let summary = summarize_flexion(&descent(Side::Left), &AnalysisConfig::default());
    assert_eq!(summary.valid_frames, 3);
    assert!(summary.min_hip_angle.is_some());
    assert_ne!(summary.depth, FlexionDepth::NoValidFrames);
}
