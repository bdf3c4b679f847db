// src/session.rs - Per-video analysis session
use image::RgbImage;

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, VideoError};
use crate::evaluator::{evaluate, EvaluationResult};
use crate::landmarks::{Frame, Sequence};
use crate::locator::locate_bottom_frame;
use crate::mediapipe_bridge::LandmarkDetector;
use crate::overlay::draw_skeleton;
use crate::video::FrameSink;

/// Landmarks gathered from one video.
///
/// Images without a detected person are left out of `sequence`, so
/// `source_frames[i]` records which input image sequence frame `i` came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    pub sequence: Sequence,
    pub source_frames: Vec<usize>,
    pub frames_read: usize,
}

/// Feeds images through a detector one at a time and accumulates the
/// resulting landmark frames. A session owns its state exclusively and is
/// consumed by [`Session::finish`].
pub struct Session<'a, D: LandmarkDetector + ?Sized> {
    detector: &'a mut D,
    sink: Option<&'a mut dyn FrameSink>,
    recording: Recording,
}

impl<'a, D: LandmarkDetector + ?Sized> Session<'a, D> {
    pub fn new(detector: &'a mut D) -> Self {
        Self {
            detector,
            sink: None,
            recording: Recording::default(),
        }
    }

    /// Every pushed image is also written to `sink`, with the skeleton drawn
    /// on it when a person was detected.
    pub fn with_sink(mut self, sink: &'a mut dyn FrameSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Runs detection on one image. Returns the frame that was appended, if any.
    pub fn push_image(&mut self, mut image: RgbImage) -> Result<Option<&Frame>, AnalysisError> {
        let source_index = self.recording.frames_read;
        self.recording.frames_read += 1;

        let detected = self.detector.detect(&image)?;

        if let Some(sink) = self.sink.as_mut() {
            if let Some(frame) = &detected {
                draw_skeleton(&mut image, frame);
            }
            sink.write_frame(&image)?;
        }

        match detected {
            Some(frame) => {
                tracing::debug!(source_index, landmarks = frame.len(), "pose detected");
                self.recording.sequence.push(frame);
                self.recording.source_frames.push(source_index);
                Ok(self.recording.sequence.last())
            }
            None => {
                tracing::debug!(source_index, "no pose detected");
                Ok(None)
            }
        }
    }

    /// Drains a stream of decoded images. A decode error ends the session.
    pub fn consume<I>(&mut self, images: I) -> Result<(), AnalysisError>
    where
        I: IntoIterator<Item = Result<RgbImage, VideoError>>,
    {
        for image in images {
            self.push_image(image?)?;
        }
        Ok(())
    }

    pub fn sequence(&self) -> &[Frame] {
        &self.recording.sequence
    }

    pub fn finish(self) -> Recording {
        tracing::info!(
            frames_read = self.recording.frames_read,
            frames_detected = self.recording.sequence.len(),
            "session finished"
        );
        self.recording
    }
}

/// Locates the bottom of the squat and evaluates it.
///
/// An empty sequence is [`AnalysisError::NoDetection`]; a sequence in which
/// no hip clears the visibility threshold is [`AnalysisError::UntrackableHip`].
pub fn analyse_sequence(
    sequence: &[Frame],
    config: &AnalysisConfig,
) -> Result<EvaluationResult, AnalysisError> {
    if sequence.is_empty() {
        return Err(AnalysisError::NoDetection);
    }
    let bottom = locate_bottom_frame(sequence, config.min_visibility)
        .ok_or(AnalysisError::UntrackableHip)?;

    let result = evaluate(sequence, bottom, config)?;
    tracing::info!(
        bottom_frame = bottom,
        depth = ?result.depth_verdict,
        back = ?result.back_verdict,
        "squat evaluated"
    );
    Ok(result)
}

/// Runs a whole session over `images` and evaluates it.
pub fn run_session<D, I>(
    images: I,
    detector: &mut D,
    sink: Option<&mut dyn FrameSink>,
    config: &AnalysisConfig,
) -> Result<(Recording, EvaluationResult), AnalysisError>
where
    D: LandmarkDetector + ?Sized,
    I: IntoIterator<Item = Result<RgbImage, VideoError>>,
{
    let mut session = Session::new(detector);
    if let Some(sink) = sink {
        session = session.with_sink(sink);
    }
    session.consume(images)?;

    let recording = session.finish();
    let result = analyse_sequence(&recording.sequence, config)?;
    Ok((recording, result))
}
