//! Dubbing engine orchestration
//!
//! Coordinates the subtitle timeline, prefetch scheduler, playback queue,
//! and audio controller around observations of the video clock. The public
//! contract is deliberately UI-free:
//!
//! - `start_dubbing` / `stop_dubbing` — session lifecycle
//! - `feed` — install an externally supplied subtitle timeline
//! - `on_tick(position)` — video clock observation (selector)
//! - `on_seek(position)` — seek recovery (coordinator)
//! - `on_video_changed(id)` — full reset, cached audio is video-scoped
//! - `on_playback_state(state)` — pause/resume mirroring
//! - `set_volumes` — live dub/original gain
//!
//! All session state lives behind one lock; async callbacks are validated
//! against the session generation before their results apply.

use crate::error::{Error, Result};
use crate::net::client::SynthesisProvider;
use crate::playback::controller::AudioController;
use crate::playback::output::AudioOutput;
use crate::playback::prefetch::{PrefetchScheduler, SharedSession};
use crate::playback::session::DubSession;
use crate::timeline::{SubtitleSegment, SubtitleTimeline};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use voxdub_common::config::Config;
use voxdub_common::events::{DubEvent, EventBus, PlaybackState};
use voxdub_common::time;

/// Seam to the host's video surface
///
/// The engine cannot touch the video element itself; whatever embeds the
/// engine applies the attenuated original-track gain ("balance") through
/// this trait.
pub trait VideoControl: Send + Sync {
    fn set_volume(&self, volume: f32);
}

/// VideoControl that only logs; used headless and in tests
#[derive(Debug, Default)]
pub struct NullVideoControl;

impl VideoControl for NullVideoControl {
    fn set_volume(&self, volume: f32) {
        debug!("Video volume -> {:.2}", volume);
    }
}

/// Parameters for starting a dubbing session
///
/// Unset fields fall back to the configured session defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartDubbing {
    pub video_id: String,
    pub voice: Option<String>,
    pub target_language: Option<String>,
    pub translate_source: Option<String>,
    pub dub_volume: Option<f32>,
    pub original_volume: Option<f32>,
    /// Playhead position at session start (seconds)
    #[serde(default)]
    pub position: f64,
}

/// Point-in-time view of the engine for status surfaces and tests
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub video_id: String,
    pub buffering: bool,
    pub queued_ids: Vec<usize>,
    pub cached_clips: usize,
    pub processed_segments: usize,
    pub next_fetch_index: usize,
    pub sounding_clip: Option<usize>,
    pub last_position: f64,
}

/// Playback-synchronization engine for one dub channel
pub struct DubEngine {
    session: SharedSession,
    /// Monotonic staleness counter; bumped on every reset
    generation: AtomicU64,
    provider: Arc<dyn SynthesisProvider>,
    scheduler: Arc<PrefetchScheduler>,
    controller: Arc<AudioController>,
    video: Arc<dyn VideoControl>,
    events: Arc<EventBus>,
    config: Config,
}

impl DubEngine {
    pub fn new(
        provider: Arc<dyn SynthesisProvider>,
        output: Arc<dyn AudioOutput>,
        video: Arc<dyn VideoControl>,
        config: Config,
    ) -> Self {
        let session: SharedSession = Arc::new(RwLock::new(None));
        let events = Arc::new(EventBus::new(256));
        let scheduler = Arc::new(PrefetchScheduler::new(
            Arc::clone(&provider),
            Arc::clone(&session),
            Arc::clone(&events),
            config.timing.clone(),
        ));
        let controller = Arc::new(AudioController::new(output, config.timing.clone()));

        Self {
            session,
            generation: AtomicU64::new(0),
            provider,
            scheduler,
            controller,
            video,
            events,
            config,
        }
    }

    /// Start the background replenishment loop
    pub fn start(self: &Arc<Self>) {
        self.scheduler.spawn_replenish_loop();
    }

    /// Stop background work; in-flight responses will be discarded by the
    /// generation check
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DubEvent> {
        self.events.subscribe()
    }

    /// Event bus handle
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Scheduler handle (status surfaces and tests)
    pub fn scheduler(&self) -> &Arc<PrefetchScheduler> {
        &self.scheduler
    }

    // ========================================
    // Session lifecycle
    // ========================================

    /// Begin a dubbing session for a video.
    ///
    /// Fetches subtitles, builds the session, applies the balance volumes,
    /// and greedily fills the buffer from the starting position. An empty
    /// subtitle list is terminal: the session never starts.
    pub async fn start_dubbing(&self, request: StartDubbing) -> Result<()> {
        // A previous session, if any, dies first
        self.teardown(true).await;

        let voice = request
            .voice
            .unwrap_or_else(|| self.config.session.voice.clone());
        let target_language = request
            .target_language
            .unwrap_or_else(|| self.config.session.target_language.clone());
        let translate_source = request
            .translate_source
            .or_else(|| self.config.session.translate_source.clone());
        let dub_volume = request
            .dub_volume
            .unwrap_or(self.config.volumes.dub_volume)
            .clamp(0.0, 1.0);
        let original_volume = request
            .original_volume
            .unwrap_or(self.config.volumes.original_volume)
            .clamp(0.0, 1.0);

        info!(
            "Starting dubbing for video {} ({} -> {})",
            request.video_id,
            translate_source.as_deref().unwrap_or("auto"),
            target_language
        );

        let segments = match self
            .provider
            .fetch_subtitles(
                &request.video_id,
                &target_language,
                translate_source.as_deref(),
            )
            .await
        {
            Ok(segments) => segments,
            Err(e) => {
                self.events.emit(DubEvent::SessionError {
                    message: e.to_string(),
                    timestamp: time::now(),
                });
                return Err(e);
            }
        };

        let timeline = SubtitleTimeline::new(segments);
        if timeline.is_empty() {
            let err = Error::NoSubtitles(request.video_id.clone());
            self.events.emit(DubEvent::SessionError {
                message: err.to_string(),
                timestamp: time::now(),
            });
            return Err(err);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let start_index = timeline.seek_index(request.position);
        let segment_count = timeline.len();

        {
            let mut guard = self.session.write().await;
            let mut session = DubSession::new(request.video_id.clone(), generation);
            session.voice = voice;
            session.target_language = target_language.clone();
            session.translate_source = translate_source;
            session.timeline = timeline;
            session.last_position = request.position;
            session.dub_volume = dub_volume;
            session.original_volume = original_volume;
            session.cursor.next_fetch_index = start_index.unwrap_or(segment_count);
            session.is_buffering = start_index.is_some();
            *guard = Some(session);
        }

        self.video.set_volume(original_volume);
        self.events.emit(DubEvent::SessionStarted {
            video_id: request.video_id,
            target_language,
            segment_count,
            timestamp: time::now(),
        });
        self.events.emit(DubEvent::VolumeChanged {
            dub_volume,
            original_volume,
            timestamp: time::now(),
        });

        // Initial greedy fill ahead of the playhead. A failure here is not
        // terminal: the session stays buffering and the replenish loop
        // retries on its next tick.
        if let Some(start) = start_index {
            self.events.emit(DubEvent::BufferingChanged {
                buffering: true,
                timestamp: time::now(),
            });
            if let Err(e) = self.scheduler.request_window(start).await {
                warn!("Initial buffer fill failed: {}", e);
            }
        }

        Ok(())
    }

    /// Install an externally supplied subtitle timeline into the live
    /// session, replacing the current one and restarting prefetch.
    pub async fn feed(&self, segments: Vec<SubtitleSegment>) -> Result<()> {
        let start = {
            let mut guard = self.session.write().await;
            let session = guard
                .as_mut()
                .ok_or_else(|| Error::InvalidState("no active session".to_string()))?;

            self.controller.stop();
            session.timeline = SubtitleTimeline::new(segments);
            session.cache.clear();
            session.queue.clear();
            session.cursor = Default::default();
            let start = session.timeline.seek_index(session.last_position);
            session.cursor.next_fetch_index = start.unwrap_or(session.timeline.len());
            start
        };

        if let Some(start) = start {
            if let Err(e) = self.scheduler.request_window(start).await {
                warn!("Buffer fill after feed failed: {}", e);
            }
        }
        Ok(())
    }

    /// Tear down the active session per the reset path
    pub async fn stop_dubbing(&self) {
        info!("Stopping dubbing");
        self.teardown(true).await;
    }

    /// Full session reset: generation bump, audio stopped synchronously,
    /// cache/queue/processed set dropped with the session.
    async fn teardown(&self, emit_end: bool) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(id) = self.controller.stop() {
            self.events.emit(DubEvent::ClipFinished {
                segment_index: id,
                completed: false,
                timestamp: time::now(),
            });
        }

        let old = self.session.write().await.take();
        if let Some(session) = old {
            if emit_end {
                self.events.emit(DubEvent::SessionEnded {
                    video_id: session.video_id,
                    timestamp: time::now(),
                });
            }
        }
    }

    // ========================================
    // Playback selector
    // ========================================

    /// Observe the video clock.
    ///
    /// While a clip is sounding nothing is preempted. Otherwise clips
    /// whose slot has fully elapsed are dropped (catch-up), and the head
    /// clip starts once the playhead reaches its slot minus the lead
    /// tolerance, with the remaining slot time floored at the minimum
    /// window.
    pub async fn on_tick(&self, position: f64) {
        let timing = self.config.timing.clone();
        let mut guard = self.session.write().await;
        let session = match guard.as_mut() {
            Some(s) => s,
            None => return,
        };
        session.last_position = position;

        if session.video_state == PlaybackState::Paused {
            return;
        }

        if let Some(id) = self.controller.poll_finished() {
            debug!("Clip {} completed", id);
            self.events.emit(DubEvent::ClipFinished {
                segment_index: id,
                completed: true,
                timestamp: time::now(),
            });
        }
        if self.controller.is_busy() {
            return; // no preemption mid-clip
        }

        debug_assert!(session.queue.is_strictly_sorted());

        // Clips arrived since the last tick; we are no longer starved even
        // if the head is not due yet.
        if session.is_buffering && !session.queue.is_empty() {
            session.is_buffering = false;
            self.events.emit(DubEvent::BufferingChanged {
                buffering: false,
                timestamp: time::now(),
            });
        }

        loop {
            // Catch-up: a clip whose slot already elapsed is never played
            // late; synchrony wins over completeness.
            while let Some(head) = session.queue.peek() {
                if head.slot_end <= position {
                    let dropped = session.queue.pop().expect("peeked head");
                    warn!(
                        "Dropping clip {} (slot ended {:.2}s ago)",
                        dropped.id,
                        position - dropped.slot_end
                    );
                    self.events.emit(DubEvent::ClipDropped {
                        segment_index: dropped.id,
                        position,
                        timestamp: time::now(),
                    });
                } else {
                    break;
                }
            }

            let due = match session.queue.peek() {
                Some(head) => position >= head.slot_start - timing.lead_tolerance_sec,
                None => break,
            };
            if !due {
                break;
            }

            let clip = session.queue.pop().expect("due head");
            let available_slot = (clip.slot_end - position).max(timing.min_slot_sec);
            match self
                .controller
                .start_clip(&clip, available_slot, session.dub_volume)
            {
                Ok(rate) => {
                    self.events.emit(DubEvent::ClipStarted {
                        segment_index: clip.id,
                        rate,
                        slot_start: clip.slot_start,
                        slot_end: clip.slot_end,
                        timestamp: time::now(),
                    });
                    break;
                }
                Err(e) => {
                    // Skipped clip; try the next due one instead of halting
                    warn!("Clip {} unplayable: {}", clip.id, e);
                }
            }
        }
    }

    // ========================================
    // Seek/session coordinator
    // ========================================

    /// Recover from a seek: the sounding clip is invalidated, the queue is
    /// rebuilt from every cached clip still ahead of the new position, and
    /// the first gap inside the seek window is delegated to the prefetch
    /// scheduler. Cached clips are never window-bounded; only the
    /// immediate gap-fill fetch is.
    pub async fn on_seek(&self, position: f64) {
        let timing = self.config.timing.clone();
        let fetch_from = {
            let mut guard = self.session.write().await;
            let session = match guard.as_mut() {
                Some(s) => s,
                None => return,
            };

            info!("Seek to {:.2}s", position);
            if let Some(id) = self.controller.stop() {
                self.events.emit(DubEvent::ClipFinished {
                    segment_index: id,
                    completed: false,
                    timestamp: time::now(),
                });
            }
            session.queue.clear();
            session.last_position = position;

            let target = match session.timeline.seek_index(position) {
                Some(target) => target,
                None => {
                    // Past the last subtitle: nothing left to dub
                    session.cursor.next_fetch_index = session.timeline.len();
                    if session.is_buffering {
                        session.is_buffering = false;
                        self.events.emit(DubEvent::BufferingChanged {
                            buffering: false,
                            timestamp: time::now(),
                        });
                    }
                    return;
                }
            };

            let window_end = (target + timing.seek_window_segments).min(session.timeline.len());
            let mut fetch_from = None;
            let mut next_missing = None;
            for index in target..session.timeline.len() {
                match session.cache.get(index) {
                    Some(clip) if clip.slot_end >= position => session.queue.insert(clip),
                    Some(_) => {} // cached but already elapsed at the new position
                    None => {
                        if next_missing.is_none() {
                            next_missing = Some(index);
                            // Only a gap near the playhead warrants an
                            // immediate fetch; later gaps are the
                            // replenish loop's business.
                            if index < window_end {
                                fetch_from = Some(index);
                            }
                        }
                    }
                }
            }
            session.cursor.next_fetch_index = next_missing.unwrap_or(session.timeline.len());

            let buffering = session.queue.is_empty();
            if buffering != session.is_buffering {
                session.is_buffering = buffering;
                self.events.emit(DubEvent::BufferingChanged {
                    buffering,
                    timestamp: time::now(),
                });
            }
            fetch_from
        };

        // Gap-fill fetch outside the session lock; the scheduler's
        // generation check covers any reset racing this.
        if let Some(start) = fetch_from {
            let scheduler = Arc::clone(&self.scheduler);
            tokio::spawn(async move {
                if let Err(e) = scheduler.request_window(start).await {
                    warn!("Seek gap-fill failed: {}", e);
                }
            });
        }
    }

    /// The addressable video changed: cached audio is invalid, perform a
    /// full session reset (distinct from a seek).
    pub async fn on_video_changed(&self, video_id: &str) {
        let changed = {
            let guard = self.session.read().await;
            match guard.as_ref() {
                Some(session) => session.video_id != video_id,
                None => false,
            }
        };
        if changed {
            info!("Active video changed to {}; resetting session", video_id);
            self.teardown(true).await;
        }
    }

    /// Mirror the video's pause/resume onto the dub channel
    pub async fn on_playback_state(&self, state: PlaybackState) {
        let mut guard = self.session.write().await;
        let session = match guard.as_mut() {
            Some(s) => s,
            None => return,
        };
        if session.video_state == state {
            return;
        }
        let old_state = session.video_state;
        session.video_state = state;

        match state {
            PlaybackState::Paused => self.controller.pause(),
            PlaybackState::Playing => self.controller.resume(),
        }
        self.events.emit(DubEvent::PlaybackStateChanged {
            old_state,
            new_state: state,
            timestamp: time::now(),
        });
    }

    /// Live-adjust dub and/or original-track gain
    pub async fn set_volumes(&self, dub: Option<f32>, original: Option<f32>) {
        let mut guard = self.session.write().await;
        let session = match guard.as_mut() {
            Some(s) => s,
            None => return,
        };

        if let Some(dub) = dub {
            session.dub_volume = dub.clamp(0.0, 1.0);
            self.controller.set_volume(session.dub_volume);
        }
        if let Some(original) = original {
            session.original_volume = original.clamp(0.0, 1.0);
            self.video.set_volume(session.original_volume);
        }
        self.events.emit(DubEvent::VolumeChanged {
            dub_volume: session.dub_volume,
            original_volume: session.original_volume,
            timestamp: time::now(),
        });
    }

    /// Current engine status, None when no session is active
    pub async fn status(&self) -> Option<EngineStatus> {
        let guard = self.session.read().await;
        guard.as_ref().map(|session| EngineStatus {
            video_id: session.video_id.clone(),
            buffering: session.is_buffering,
            queued_ids: session.queue.ids(),
            cached_clips: session.cache.len(),
            processed_segments: session.cursor.processed_count(),
            next_fetch_index: session.cursor.next_fetch_index,
            sounding_clip: self.controller.current_id(),
            last_position: session.last_position,
        })
    }
}
