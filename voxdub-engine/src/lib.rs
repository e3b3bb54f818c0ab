//! # VoxDub Engine Library
//!
//! Playback-synchronization engine for overlaying synthesized
//! foreign-language speech onto a video timeline.
//!
//! **Purpose:** Decide moment to moment which pre-synthesized audio clip
//! should be sounding, keep it aligned with the video's clock, prefetch
//! upcoming segments without starving the current one, and recover
//! coherently from seeks and video changes.
//!
//! The engine observes playback position only; it has no control over the
//! source video's internal timing. Clips are strictly ordered by subtitle
//! index within a session, never by network arrival order.

pub mod control;
pub mod error;
pub mod net;
pub mod playback;
pub mod timeline;

pub use error::{Error, Result};
pub use playback::engine::DubEngine;
