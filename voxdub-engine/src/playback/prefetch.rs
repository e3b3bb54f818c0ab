//! Prefetch scheduler
//!
//! Decides which timeline regions still need synthesis, issues them as one
//! batched request, and merges the results into the segment cache and
//! playback queue. At most one batch is in flight at a time (atomic busy
//! flag); a request while busy is a no-op. A background replenishment loop
//! tops the buffer up whenever headroom drops below the low-water mark.
//!
//! Failure policy: a failed batch is logged and rolled back; the next
//! timer tick re-evaluates and retries naturally, so a failing backend is
//! probed once per tick instead of hot-looped against.

use crate::error::Result;
use crate::net::client::{SynthesisBatch, SynthesisProvider};
use crate::playback::clip::{DecodedAudio, SynthesizedClip};
use crate::playback::session::DubSession;
use crate::timeline::SubtitleSegment;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, warn};
use voxdub_common::config::TimingConfig;
use voxdub_common::events::{DubEvent, EventBus};
use voxdub_common::time;

/// Tracks how much of the subtitle timeline has been requested from the
/// synthesis server
#[derive(Debug, Default)]
pub struct BufferCursor {
    /// First index not yet covered by an issued batch
    pub next_fetch_index: usize,
    /// Authoritative "already requested" set; an id in here is never sent
    /// to the server again
    processed: HashSet<usize>,
}

impl BufferCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processed(&self, id: usize) -> bool {
        self.processed.contains(&id)
    }

    pub fn mark_processed(&mut self, id: usize) {
        self.processed.insert(id);
    }

    /// Roll back ids from a batch that never reached the server
    pub fn unmark(&mut self, ids: &[usize]) {
        for id in ids {
            self.processed.remove(id);
        }
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }
}

/// Shared handle to the optional live session
pub type SharedSession = Arc<RwLock<Option<DubSession>>>;

/// Batched synthesis scheduler with single-in-flight discipline
pub struct PrefetchScheduler {
    provider: Arc<dyn SynthesisProvider>,
    session: SharedSession,
    events: Arc<EventBus>,
    timing: TimingConfig,
    /// Mutual exclusion for the one outstanding batch
    busy: AtomicBool,
    /// Cleared to stop the replenishment loop on its next tick
    running: AtomicBool,
}

impl PrefetchScheduler {
    pub fn new(
        provider: Arc<dyn SynthesisProvider>,
        session: SharedSession,
        events: Arc<EventBus>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            provider,
            session,
            events,
            timing,
            busy: AtomicBool::new(false),
            running: AtomicBool::new(true),
        }
    }

    /// Request synthesis for a window of unprocessed segments starting at
    /// `start_index`.
    ///
    /// Returns the number of clips added to the cache. A call while a
    /// batch is already in flight is a no-op returning 0.
    pub async fn request_window(&self, start_index: usize) -> Result<usize> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Synthesis batch already in flight; skipping request");
            return Ok(0);
        }

        let result = self.run_batch(start_index).await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn run_batch(&self, start_index: usize) -> Result<usize> {
        // Assemble the batch and mark its ids processed at issue time, so
        // an overlapping request window cannot duplicate synthesis calls.
        let (generation, batch, batch_ids) = {
            let mut guard = self.session.write().await;
            let session = match guard.as_mut() {
                Some(s) => s,
                None => return Ok(0),
            };

            let segments = assemble_batch(
                session.timeline.segments(),
                &session.cursor,
                start_index,
                &self.timing,
            );
            if segments.is_empty() {
                return Ok(0);
            }

            let ids: Vec<usize> = segments.iter().map(|s| s.index).collect();
            for id in &ids {
                session.cursor.mark_processed(*id);
            }
            let last = *ids.last().expect("non-empty batch");
            if last + 1 > session.cursor.next_fetch_index {
                session.cursor.next_fetch_index = last + 1;
            }

            self.events.emit(DubEvent::BatchRequested {
                start_index,
                segment_count: ids.len(),
                timestamp: time::now(),
            });

            (
                session.generation,
                SynthesisBatch {
                    segments,
                    voice: session.voice.clone(),
                    target_language: session.target_language.clone(),
                },
                ids,
            )
        };

        let clips = match self.provider.synthesize(batch).await {
            Ok(clips) => clips,
            Err(e) => {
                warn!("Synthesis batch failed, dropping: {}", e);
                // Roll back so the next replenish tick retries this window
                let mut guard = self.session.write().await;
                if let Some(session) = guard.as_mut() {
                    if session.generation == generation {
                        session.cursor.unmark(&batch_ids);
                        session.cursor.next_fetch_index = session
                            .cursor
                            .next_fetch_index
                            .min(batch_ids[0]);
                    }
                }
                return Err(e);
            }
        };

        let mut added = 0;
        let mut guard = self.session.write().await;
        let session = match guard.as_mut() {
            Some(s) => s,
            None => {
                debug!("Discarding synthesis response: session is gone");
                return Ok(0);
            }
        };
        if session.generation != generation {
            debug!("Discarding stale synthesis response (generation changed)");
            return Ok(0);
        }

        for raw in clips {
            let audio = match DecodedAudio::decode(raw.audio) {
                Ok(audio) => audio,
                Err(e) => {
                    warn!("Skipping clip {}: {}", raw.id, e);
                    continue;
                }
            };
            let clip = Arc::new(SynthesizedClip {
                id: raw.id,
                slot_start: raw.start_time,
                slot_end: raw.end_time,
                audio,
            });
            session.cache.insert(Arc::clone(&clip));
            // Only clips the playhead has not already passed belong in the
            // queue; a slot that elapsed mid-flight is catch-up's to drop.
            if clip.slot_end >= session.last_position {
                session.queue.insert(clip);
            }
            added += 1;
        }

        debug!("Synthesis batch merged: {} clips", added);
        Ok(added)
    }

    /// One replenishment evaluation: top up when buffered headroom ahead
    /// of the playhead is below the low-water mark.
    pub async fn replenish_once(&self) -> Result<usize> {
        let start_index = {
            let guard = self.session.read().await;
            let session = match guard.as_ref() {
                Some(s) => s,
                None => return Ok(0),
            };
            let next = session.cursor.next_fetch_index;
            if next >= session.timeline.len() {
                return Ok(0); // whole timeline requested
            }

            let buffered_until = if next == 0 {
                session.last_position
            } else {
                session
                    .timeline
                    .get(next - 1)
                    .map(|s| s.end_sec)
                    .unwrap_or(session.last_position)
            };
            let headroom = buffered_until - session.last_position;
            if headroom >= self.timing.low_water_sec {
                return Ok(0);
            }
            next
        };

        self.request_window(start_index).await
    }

    /// Spawn the steady-state replenishment loop.
    ///
    /// The loop observes `shutdown()` and session teardown on its very
    /// next tick; synthesis errors are logged and retried on the tick
    /// after.
    pub fn spawn_replenish_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = interval(Duration::from_millis(scheduler.timing.replenish_interval_ms));
            loop {
                tick.tick().await;
                if !scheduler.running.load(Ordering::SeqCst) {
                    debug!("Replenish loop stopping");
                    break;
                }
                if let Err(e) = scheduler.replenish_once().await {
                    warn!("Replenish tick failed: {}", e);
                }
            }
        })
    }

    /// Stop the replenishment loop on its next tick
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Collect unprocessed segments from `start_index`, bounded by segment
/// count and cumulative slot duration, whichever fills first.
fn assemble_batch(
    segments: &[SubtitleSegment],
    cursor: &BufferCursor,
    start_index: usize,
    timing: &TimingConfig,
) -> Vec<SubtitleSegment> {
    let mut batch = Vec::new();
    let mut slot_total = 0.0;

    for segment in segments.iter().skip(start_index) {
        if batch.len() >= timing.lookahead_segments || slot_total >= timing.lookahead_sec {
            break;
        }
        if cursor.is_processed(segment.index) {
            continue;
        }
        slot_total += segment.slot_duration();
        batch.push(segment.clone());
    }
    batch
}
