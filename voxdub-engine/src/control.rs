//! In-process control surface
//!
//! The host UI (settings panel, sliders) talks to the engine through
//! [`ControlCommand`] messages over an mpsc channel rather than calling
//! into engine internals; this keeps the synchronization engine's contract
//! stable while UI concerns evolve independently.

use crate::playback::engine::{DubEngine, StartDubbing};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Commands accepted from the control surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum ControlCommand {
    /// Begin a dubbing session
    StartDubbing(StartDubbing),
    /// Live-adjust the dub channel gain
    UpdateDubVolume { volume: f32 },
    /// Live-adjust the source video's own gain (balance)
    UpdateBalance { original_volume: f32 },
    /// Tear the session down
    StopDubbing,
}

/// Spawn the command dispatch loop.
///
/// The loop ends when every sender is dropped.
pub fn spawn_control_loop(
    engine: Arc<DubEngine>,
    mut rx: mpsc::Receiver<ControlCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            debug!("Control command: {:?}", command);
            match command {
                ControlCommand::StartDubbing(request) => {
                    if let Err(e) = engine.start_dubbing(request).await {
                        warn!("start_dubbing failed: {}", e);
                    }
                }
                ControlCommand::UpdateDubVolume { volume } => {
                    engine.set_volumes(Some(volume), None).await;
                }
                ControlCommand::UpdateBalance { original_volume } => {
                    engine.set_volumes(None, Some(original_volume)).await;
                }
                ControlCommand::StopDubbing => {
                    engine.stop_dubbing().await;
                }
            }
        }
        debug!("Control loop ended");
    })
}
