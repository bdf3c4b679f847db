// src/lib.rs
//! Squat form analysis from pose landmarks.
//!
//! Re-exports internal modules for the binaries and for integration testing.

pub mod config;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod geometry;
pub mod landmarks;
pub mod locator;
pub mod mediapipe_bridge;
pub mod overlay;
pub mod server;
pub mod session;
pub mod summary;
pub mod video;

pub use config::AnalysisConfig;
pub use error::AnalysisError;
pub use evaluator::{evaluate, BackVerdict, DepthVerdict, EvaluationResult};
pub use landmarks::{Frame, Joint, PoseLandmark, Sequence};
pub use locator::locate_bottom_frame;
pub use session::{analyse_sequence, run_session, Recording, Session};
pub use summary::{summarize_flexion, FlexionDepth, FlexionSummary};
