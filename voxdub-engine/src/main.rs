//! VoxDub - Main entry point
//!
//! Runs a dubbing session against a subtitle/synthesis server and drives
//! the synchronization engine from a wall-clock playhead. This binary is
//! the reference host; embedders drive the same engine contract from
//! their own video clock instead.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voxdub_common::config::Config;
use voxdub_engine::control::{spawn_control_loop, ControlCommand};
use voxdub_engine::net::HttpSynthesisClient;
use voxdub_engine::playback::engine::{NullVideoControl, StartDubbing};
use voxdub_engine::playback::output::{AudioOutput, NullOutput, RodioOutput};
use voxdub_engine::DubEngine;

/// Command-line arguments for voxdub
#[derive(Parser, Debug)]
#[command(name = "voxdub")]
#[command(about = "Overlay synthesized speech onto a video timeline")]
#[command(version)]
struct Args {
    /// Video to dub
    #[arg(short = 'i', long)]
    video_id: String,

    /// Subtitle/synthesis server base URL
    #[arg(short, long, env = "VOXDUB_SERVER")]
    server: Option<String>,

    /// TTS voice override
    #[arg(long)]
    voice: Option<String>,

    /// Target language override
    #[arg(short = 'l', long)]
    target_language: Option<String>,

    /// Source-language hint for translation
    #[arg(long)]
    translate_source: Option<String>,

    /// Dub channel gain (0.0-1.0)
    #[arg(long)]
    dub_volume: Option<f32>,

    /// Attenuated original-track gain (0.0-1.0)
    #[arg(long)]
    original_volume: Option<f32>,

    /// Playhead offset to start from, in seconds
    #[arg(long, default_value = "0.0")]
    start_at: f64,

    /// Configuration file path
    #[arg(short, long, env = "VOXDUB_CONFIG")]
    config: Option<PathBuf>,

    /// Run without a sound device (decode and schedule only)
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voxdub=info,voxdub_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(server) = &args.server {
        config.server.base_url = server.clone();
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    info!("VoxDub starting against {}", config.server.base_url);

    let provider = Arc::new(
        HttpSynthesisClient::new(
            config.server.base_url.clone(),
            Duration::from_secs(config.server.request_timeout_sec),
        )
        .context("Failed to create synthesis client")?,
    );

    let output: Arc<dyn AudioOutput> = if args.headless {
        Arc::new(NullOutput)
    } else {
        match RodioOutput::new() {
            Ok(output) => Arc::new(output),
            Err(e) => {
                warn!("No audio device ({}); running headless", e);
                Arc::new(NullOutput)
            }
        }
    };

    let engine = Arc::new(DubEngine::new(
        provider,
        output,
        Arc::new(NullVideoControl),
        config.clone(),
    ));
    engine.start();

    // Event log for the terminal
    let mut event_rx = engine.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            info!("{}", serde_json::to_string(&event).unwrap_or_default());
        }
    });

    let (control_tx, control_rx) = mpsc::channel(16);
    let control_handle = spawn_control_loop(Arc::clone(&engine), control_rx);

    control_tx
        .send(ControlCommand::StartDubbing(StartDubbing {
            video_id: args.video_id.clone(),
            voice: args.voice,
            target_language: args.target_language,
            translate_source: args.translate_source,
            dub_volume: args.dub_volume,
            original_volume: args.original_volume,
            position: args.start_at,
        }))
        .await
        .context("Control loop unavailable")?;

    // Wall-clock playhead standing in for the video clock
    let tick_engine = Arc::clone(&engine);
    let start_at = args.start_at;
    let tick_handle = tokio::spawn(async move {
        let started = Instant::now();
        let mut tick = tokio::time::interval(Duration::from_millis(250));
        loop {
            tick.tick().await;
            let position = start_at + started.elapsed().as_secs_f64();
            tick_engine.on_tick(position).await;
        }
    });

    signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
    info!("Shutting down");

    tick_handle.abort();
    control_tx
        .send(ControlCommand::StopDubbing)
        .await
        .context("Control loop unavailable")?;
    drop(control_tx);
    let _ = control_handle.await;
    engine.shutdown();

    Ok(())
}
