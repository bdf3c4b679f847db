// src/bin/squat_server.rs - HTTP front end for squat analysis
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use squat_coach::config::{AnalysisConfig, DetectorConfig, ServerConfig};
use squat_coach::mediapipe_bridge::CommandDetectorFactory;
use squat_coach::server::{build_cors_layer, router, AppState};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "squat_coach=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = ServerConfig::from_env()?;
    let config = AnalysisConfig::from_env()?;
    let detector = DetectorConfig::from_env()?;

    tracing::info!(
        min_visibility = config.min_visibility,
        back_angle_threshold = config.back_angle_threshold,
        detector = %detector.program,
        "configuration loaded"
    );

    let state = AppState {
        config: Arc::new(config),
        detectors: Arc::new(CommandDetectorFactory::new(detector)),
        debug_video: server.debug_video.map(Arc::new),
        upload_dir: Arc::new(server.upload_dir),
    };
    let cors = build_cors_layer(&server.cors_origins).context("SQUAT_CORS_ORIGINS is invalid")?;

    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", server.host, server.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router(state, cors)).await?;
    Ok(())
}
