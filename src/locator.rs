// src/locator.rs - Finds the bottom of the squat in a frame sequence
use crate::landmarks::{BodyPart, Frame};

/// Returns the index of the frame whose hip sits lowest in the image.
///
/// Only frames whose hip (left preferred, right if the left is absent) is
/// visible above `min_visibility` take part. Ties keep the earliest frame.
/// No smoothing is applied, so a single outlier frame can win.
pub fn locate_bottom_frame(sequence: &[Frame], min_visibility: f64) -> Option<usize> {
    let mut deepest: Option<(usize, f64)> = None;

    for (index, frame) in sequence.iter().enumerate() {
        let Some((_, hip)) = frame.resolve(BodyPart::Hip) else {
            continue;
        };
        if !hip.is_visible(min_visibility) || !hip.y.is_finite() {
            continue;
        }
        if deepest.map_or(true, |(_, max_y)| hip.y > max_y) {
            deepest = Some((index, hip.y));
        }
    }

    if let Some((index, hip_y)) = deepest {
        tracing::debug!(index, hip_y, "located bottom frame");
    }
    deepest.map(|(index, _)| index)
}
