//! Audio output sink
//!
//! [`AudioOutput`] is the seam between the synchronization engine and the
//! actual sound device. The engine only ever needs five verbs (play,
//! volume, pause/resume, stop) plus a "still sounding?" query, so the
//! trait surface is synchronous and object-safe.
//!
//! [`RodioOutput`] is the real implementation. rodio's `OutputStream` is
//! not `Send`, so a dedicated playback thread owns the stream and the
//! active `Sink`, driven by commands over an mpsc channel; a shared atomic
//! flag reports when the sink has drained.

use crate::error::{Error, Result};
use crate::playback::clip::DecodedAudio;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Abstraction over the dub-channel sound device
pub trait AudioOutput: Send + Sync {
    /// Start sounding `audio` at the given rate multiplier and volume,
    /// hard-cutting anything currently sounding.
    fn play(&self, audio: Arc<DecodedAudio>, rate: f32, volume: f32) -> Result<()>;

    /// Adjust the gain of the sounding clip (and any future clip)
    fn set_volume(&self, volume: f32);

    /// Pause the sounding clip in place
    fn pause(&self);

    /// Resume a paused clip
    fn resume(&self);

    /// Stop and discard the sounding clip
    fn stop(&self);

    /// Whether a clip is currently audible (or paused mid-clip)
    fn is_sounding(&self) -> bool;
}

/// Commands handled by the playback thread
enum OutputCommand {
    Play {
        audio: Arc<DecodedAudio>,
        rate: f32,
        volume: f32,
    },
    SetVolume(f32),
    Pause,
    Resume,
    Stop,
    Shutdown,
}

/// rodio-backed implementation of [`AudioOutput`]
pub struct RodioOutput {
    cmd_tx: mpsc::Sender<OutputCommand>,
    sounding: Arc<AtomicBool>,
}

impl RodioOutput {
    /// Open the default output device and start the playback thread
    pub fn new() -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<OutputCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(), String>>();
        let sounding = Arc::new(AtomicBool::new(false));
        let sounding_thread = Arc::clone(&sounding);

        thread::Builder::new()
            .name("voxdub-audio".to_string())
            .spawn(move || {
                // The OutputStream must stay alive on this thread for sound
                // to keep flowing.
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => {
                        let _ = ready_tx.send(Ok(()));
                        pair
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                let mut current: Option<Sink> = None;

                loop {
                    match cmd_rx.recv_timeout(Duration::from_millis(50)) {
                        Ok(OutputCommand::Play { audio, rate, volume }) => {
                            if let Some(old) = current.take() {
                                old.stop();
                            }
                            match Sink::try_new(&handle) {
                                Ok(sink) => {
                                    sink.set_speed(rate);
                                    sink.set_volume(volume);
                                    sink.append(SamplesBuffer::new(
                                        audio.channels,
                                        audio.sample_rate,
                                        audio.samples.clone(),
                                    ));
                                    sounding_thread.store(true, Ordering::SeqCst);
                                    current = Some(sink);
                                }
                                Err(e) => {
                                    warn!("Cannot create audio sink: {}", e);
                                    sounding_thread.store(false, Ordering::SeqCst);
                                }
                            }
                        }
                        Ok(OutputCommand::SetVolume(v)) => {
                            if let Some(sink) = &current {
                                sink.set_volume(v);
                            }
                        }
                        Ok(OutputCommand::Pause) => {
                            if let Some(sink) = &current {
                                sink.pause();
                            }
                        }
                        Ok(OutputCommand::Resume) => {
                            if let Some(sink) = &current {
                                sink.play();
                            }
                        }
                        Ok(OutputCommand::Stop) => {
                            if let Some(sink) = current.take() {
                                sink.stop();
                            }
                            sounding_thread.store(false, Ordering::SeqCst);
                        }
                        Ok(OutputCommand::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                            debug!("Audio output thread shutting down");
                            break;
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => {}
                    }

                    // Drained sink means the clip finished on its own
                    if let Some(sink) = &current {
                        if sink.empty() {
                            current = None;
                            sounding_thread.store(false, Ordering::SeqCst);
                        }
                    }
                }
            })
            .map_err(|e| Error::Playback(format!("cannot spawn audio thread: {}", e)))?;

        ready_rx
            .recv()
            .map_err(|_| Error::Playback("audio thread died during startup".to_string()))?
            .map_err(Error::Playback)?;

        Ok(Self { cmd_tx, sounding })
    }

    fn send(&self, cmd: OutputCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::Playback("audio thread is gone".to_string()))
    }
}

impl AudioOutput for RodioOutput {
    fn play(&self, audio: Arc<DecodedAudio>, rate: f32, volume: f32) -> Result<()> {
        self.send(OutputCommand::Play { audio, rate, volume })
    }

    fn set_volume(&self, volume: f32) {
        let _ = self.send(OutputCommand::SetVolume(volume));
    }

    fn pause(&self) {
        let _ = self.send(OutputCommand::Pause);
    }

    fn resume(&self) {
        let _ = self.send(OutputCommand::Resume);
    }

    fn stop(&self) {
        let _ = self.send(OutputCommand::Stop);
    }

    fn is_sounding(&self) -> bool {
        self.sounding.load(Ordering::SeqCst)
    }
}

impl Drop for RodioOutput {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(OutputCommand::Shutdown);
    }
}

/// Discarding output for headless runs (no sound device)
///
/// Clips "complete" instantly; the selector simply advances on its next
/// tick.
#[derive(Debug, Default)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn play(&self, audio: Arc<DecodedAudio>, rate: f32, volume: f32) -> Result<()> {
        debug!(
            "NullOutput: would play {:.2}s of audio at rate {} volume {}",
            audio.duration_sec(),
            rate,
            volume
        );
        Ok(())
    }

    fn set_volume(&self, _volume: f32) {}
    fn pause(&self) {}
    fn resume(&self) {}
    fn stop(&self) {}

    fn is_sounding(&self) -> bool {
        false
    }
}
