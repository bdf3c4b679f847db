// src/bin/evaluate_keypoints.rs - Re-run the evaluation on saved keypoints
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::json;
use squat_coach::config::AnalysisConfig;
use squat_coach::data::load_sequence;
use squat_coach::session::analyse_sequence;
use squat_coach::summary::summarize_flexion;
use tracing_subscriber::EnvFilter;

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "squat_coach=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("SQUAT_OUTPUT_JSON").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("keypoints.json"));
    let config = AnalysisConfig::from_env()?;

    let sequence = load_sequence(&path)
        .with_context(|| format!("could not load keypoints from {}", path.display()))?;

    let evaluation = analyse_sequence(&sequence, &config)?;
    let flexion = summarize_flexion(&sequence, &config);

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "evaluation": evaluation,
            "flexion": flexion,
        }))?
    );
    Ok(())
}
