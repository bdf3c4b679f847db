// src/overlay.rs - Skeleton overlay for annotated output videos
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::landmarks::{Frame, PoseLandmark};
use crate::landmarks::PoseLandmark::*;

const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CONNECTION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LANDMARK_RADIUS: i32 = 2;

/// Bone list of the 33-point pose model.
pub const POSE_CONNECTIONS: [(PoseLandmark, PoseLandmark); 35] = [
    (Nose, RightEyeInner),
    (RightEyeInner, RightEye),
    (RightEye, RightEyeOuter),
    (RightEyeOuter, RightEar),
    (Nose, LeftEyeInner),
    (LeftEyeInner, LeftEye),
    (LeftEye, LeftEyeOuter),
    (LeftEyeOuter, LeftEar),
    (MouthRight, MouthLeft),
    (RightShoulder, LeftShoulder),
    (RightShoulder, RightElbow),
    (RightElbow, RightWrist),
    (RightWrist, RightPinky),
    (RightWrist, RightIndex),
    (RightWrist, RightThumb),
    (RightPinky, RightIndex),
    (LeftShoulder, LeftElbow),
    (LeftElbow, LeftWrist),
    (LeftWrist, LeftPinky),
    (LeftWrist, LeftIndex),
    (LeftWrist, LeftThumb),
    (LeftPinky, LeftIndex),
    (RightShoulder, RightHip),
    (LeftShoulder, LeftHip),
    (RightHip, LeftHip),
    (RightHip, RightKnee),
    (LeftHip, LeftKnee),
    (RightKnee, RightAnkle),
    (LeftKnee, LeftAnkle),
    (RightAnkle, RightHeel),
    (LeftAnkle, LeftHeel),
    (RightHeel, RightFootIndex),
    (LeftHeel, LeftFootIndex),
    (RightAnkle, RightFootIndex),
    (LeftAnkle, LeftFootIndex),
];

/// Draws bones and joints of `frame` onto `image` in place.
///
/// Every detected landmark is drawn whatever its visibility; the overlay is
/// for eyeballing the tracker, not for judging form.
pub fn draw_skeleton(image: &mut RgbImage, frame: &Frame) {
    let (width, height) = image.dimensions();
    let to_point = |landmark: PoseLandmark| {
        frame.get(landmark).and_then(|joint| {
            let (x, y) = (joint.x * width as f64, joint.y * height as f64);
            (x.is_finite() && y.is_finite()).then_some((x as f32, y as f32))
        })
    };

    for (from, to) in POSE_CONNECTIONS {
        if let (Some(start), Some(end)) = (to_point(from), to_point(to)) {
            draw_line_segment_mut(image, start, end, CONNECTION_COLOR);
        }
    }

    for (_, joint) in frame.iter() {
        if !(joint.x.is_finite() && joint.y.is_finite()) {
            continue;
        }
        let center = joint.to_pixel(width, height);
        draw_filled_circle_mut(image, center, LANDMARK_RADIUS, LANDMARK_COLOR);
    }
}
