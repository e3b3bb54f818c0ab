//! Audio controller
//!
//! Owns the currently sounding clip. Enforces single-clip-at-a-time
//! playback (starting a clip hard-cuts whatever was sounding), computes
//! the playback-rate multiplier that fits a clip inside its remaining
//! slot, and mirrors the video's pause/resume transitions onto the
//! sounding clip. Seeks are not mirrored here; a seek invalidates the
//! current clip entirely and routes through the session coordinator.

use crate::error::{Error, Result};
use crate::playback::clip::SynthesizedClip;
use crate::playback::output::AudioOutput;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use voxdub_common::config::TimingConfig;

/// The output thread consumes play commands asynchronously, so the sink
/// may not report sounding for a few tens of milliseconds after a start.
/// Within this window a silent output means "not started yet", not
/// "finished".
const START_GRACE_SEC: f64 = 0.2;

/// Per-clip lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipState {
    Idle,
    Loading,
    Sounding,
    Ended,
}

#[derive(Debug)]
struct CurrentClip {
    id: usize,
    state: ClipState,
    started: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl CurrentClip {
    /// Wall time the clip has actually been audible
    fn audible_elapsed(&self) -> Duration {
        let gross = self.started.elapsed();
        let paused = self.paused_total
            + self
                .paused_at
                .map(|at| at.elapsed())
                .unwrap_or(Duration::ZERO);
        gross.saturating_sub(paused)
    }
}

/// Compute the playback-rate multiplier that fits `audio_duration` inside
/// `slot_time` seconds.
///
/// Rate stays 1.0 when the audio already fits or when the slot is below
/// the minimum threshold (fitting into a sliver helps nobody). Speed-up is
/// capped so speech stays intelligible.
pub fn compute_rate(audio_duration: f64, slot_time: f64, timing: &TimingConfig) -> f64 {
    if slot_time < timing.min_slot_sec {
        return 1.0;
    }
    if audio_duration > slot_time {
        (audio_duration / slot_time).min(timing.max_playback_rate)
    } else {
        1.0
    }
}

/// Controller for the single dub-channel voice
pub struct AudioController {
    output: Arc<dyn AudioOutput>,
    current: Mutex<Option<CurrentClip>>,
    timing: TimingConfig,
}

impl AudioController {
    pub fn new(output: Arc<dyn AudioOutput>, timing: TimingConfig) -> Self {
        Self {
            output,
            current: Mutex::new(None),
            timing,
        }
    }

    /// Start sounding a due clip inside `available_slot` seconds.
    ///
    /// Any currently sounding clip is stopped first (hard cut, no
    /// crossfade). Returns the rate multiplier applied.
    pub fn start_clip(
        &self,
        clip: &SynthesizedClip,
        available_slot: f64,
        volume: f32,
    ) -> Result<f32> {
        let mut current = self.current.lock().expect("controller lock poisoned");

        if current.is_some() {
            self.output.stop();
        }
        *current = Some(CurrentClip {
            id: clip.id,
            state: ClipState::Loading,
            started: Instant::now(),
            paused_at: None,
            paused_total: Duration::ZERO,
        });

        let rate = compute_rate(clip.audio.duration_sec(), available_slot, &self.timing) as f32;
        debug!(
            "Starting clip {} (audio {:.2}s, slot {:.2}s, rate {:.2})",
            clip.id,
            clip.audio.duration_sec(),
            available_slot,
            rate
        );

        if let Err(e) = self.output.play(Arc::new(clip.audio.clone()), rate, volume) {
            warn!("Clip {} failed to start: {}", clip.id, e);
            *current = None;
            return Err(Error::Playback(format!("clip {}: {}", clip.id, e)));
        }

        if let Some(c) = current.as_mut() {
            c.state = ClipState::Sounding;
            c.started = Instant::now();
        }
        Ok(rate)
    }

    /// Whether a clip is loading or sounding right now
    pub fn is_busy(&self) -> bool {
        self.current
            .lock()
            .expect("controller lock poisoned")
            .as_ref()
            .map(|c| matches!(c.state, ClipState::Loading | ClipState::Sounding))
            .unwrap_or(false)
    }

    /// Id of the clip currently sounding, if any
    pub fn current_id(&self) -> Option<usize> {
        self.current
            .lock()
            .expect("controller lock poisoned")
            .as_ref()
            .map(|c| c.id)
    }

    /// Detect natural completion of the sounding clip.
    ///
    /// Returns the finished clip's id the first time the drained sink is
    /// observed (after the start grace window, and never while paused).
    pub fn poll_finished(&self) -> Option<usize> {
        let mut current = self.current.lock().expect("controller lock poisoned");
        let clip = current.as_mut()?;
        if clip.state != ClipState::Sounding || clip.paused_at.is_some() {
            return None;
        }
        if clip.audible_elapsed().as_secs_f64() < START_GRACE_SEC {
            return None;
        }
        if self.output.is_sounding() {
            return None;
        }

        clip.state = ClipState::Ended;
        let id = clip.id;
        *current = None;
        Some(id)
    }

    /// Mirror a video pause onto the sounding clip
    pub fn pause(&self) {
        let mut current = self.current.lock().expect("controller lock poisoned");
        if let Some(clip) = current.as_mut() {
            if clip.paused_at.is_none() {
                clip.paused_at = Some(Instant::now());
            }
        }
        self.output.pause();
    }

    /// Mirror a video resume onto the paused clip
    pub fn resume(&self) {
        let mut current = self.current.lock().expect("controller lock poisoned");
        if let Some(clip) = current.as_mut() {
            if let Some(at) = clip.paused_at.take() {
                clip.paused_total += at.elapsed();
            }
        }
        self.output.resume();
    }

    /// Stop and discard the sounding clip (seek, reset, explicit stop).
    ///
    /// Returns the interrupted clip's id, if one was sounding.
    pub fn stop(&self) -> Option<usize> {
        let mut current = self.current.lock().expect("controller lock poisoned");
        if current.is_some() {
            self.output.stop();
        }
        current.take().map(|c| c.id)
    }

    /// Live-adjust the dub channel gain
    pub fn set_volume(&self, volume: f32) {
        self.output.set_volume(volume.clamp(0.0, 1.0));
    }
}
