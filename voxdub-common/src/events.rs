//! Event types for the VoxDub event system
//!
//! Events are broadcast via [`EventBus`] and can be serialized for
//! transmission to a host UI. Subscribers include the control surface,
//! logging, and integration tests.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Video transport state mirrored by the dub channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Playing,
    Paused,
}

/// VoxDub event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DubEvent {
    /// A dubbing session was created for a video
    SessionStarted {
        video_id: String,
        target_language: String,
        segment_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session torn down (explicit stop or video change)
    SessionEnded {
        video_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Engine entered or left the buffering state
    ///
    /// Buffering means no clip is available for the current playhead and a
    /// synthesis batch is pending.
    BufferingChanged {
        buffering: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A synthesized clip began sounding
    ClipStarted {
        segment_index: usize,
        /// Playback-rate multiplier applied to fit the slot
        rate: f32,
        slot_start: f64,
        slot_end: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A sounding clip finished
    ClipFinished {
        segment_index: usize,
        /// false when the clip was cut off by a seek/stop
        completed: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A clip was discarded because its slot elapsed before it could start
    /// (catch-up policy). Hosts wanting out-of-band replay of lost lines
    /// subscribe to this.
    ClipDropped {
        segment_index: usize,
        /// Playhead position at the time of the drop
        position: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A synthesis batch was issued to the server
    BatchRequested {
        start_index: usize,
        segment_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Dub and/or original-track gain changed
    VolumeChanged {
        dub_volume: f32,
        original_volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Video transport state mirrored onto the dub channel
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Non-fatal session error surfaced to the host
    SessionError {
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Broadcast bus carrying [`DubEvent`]s to all subscribers
pub struct EventBus {
    tx: broadcast::Sender<DubEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<DubEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Having no subscribers is not an error; the event is simply dropped.
    pub fn emit(&self, event: DubEvent) {
        let _ = self.tx.send(event);
    }

    /// Channel capacity this bus was created with
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
