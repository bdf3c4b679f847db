// src/main.rs - One-shot batch analysis of a squat video
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::json;
use squat_coach::config::{AnalysisConfig, BatchConfig, DetectorConfig};
use squat_coach::data::{export_csv, export_json};
use squat_coach::mediapipe_bridge::MediaPipeBridge;
use squat_coach::session::{analyse_sequence, Session};
use squat_coach::summary::summarize_flexion;
use squat_coach::video::{VideoFileReader, VideoFileWriter};
use tracing_subscriber::EnvFilter;

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "squat_coach=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut batch = BatchConfig::from_env();
    if let Some(input) = std::env::args_os().nth(1) {
        batch.input_video = PathBuf::from(input);
    }
    let config = AnalysisConfig::from_env()?;
    let detector_config = DetectorConfig::from_env()?;

    let reader = VideoFileReader::open(&batch.input_video)
        .with_context(|| format!("could not open {}", batch.input_video.display()))?;
    let info = reader.info().clone();

    let mut detector =
        MediaPipeBridge::spawn(&detector_config).context("failed to start the pose detector")?;
    let mut writer = VideoFileWriter::create(&batch.output_video, info.width, info.height, info.fps)
        .with_context(|| format!("could not create {}", batch.output_video.display()))?;

    let recording = {
        let mut session = Session::new(&mut detector).with_sink(&mut writer);
        session.consume(reader)?;
        session.finish()
    };
    let video_path = writer.finish()?;
    println!("Annotated video saved to {}", video_path.display());

    let json_path = export_json(&recording.sequence, &batch.output_json)?;
    println!(
        "Saved {} keypoint frames to {}",
        recording.sequence.len(),
        json_path.display()
    );
    if let Some(csv) = &batch.output_csv {
        let csv_path = export_csv(&recording.sequence, &recording.source_frames, csv)?;
        println!("Frame table saved to {}", csv_path.display());
    }

    let evaluation = analyse_sequence(&recording.sequence, &config)?;
    let flexion = summarize_flexion(&recording.sequence, &config);

    let report = json!({
        "evaluation": evaluation,
        "flexion": flexion,
        "frames_read": recording.frames_read,
        "frames_detected": recording.sequence.len(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
