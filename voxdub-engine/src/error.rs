//! Error types for voxdub-engine
//!
//! Module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the dubbing engine
#[derive(Error, Debug)]
pub enum Error {
    /// Subtitle fetch or synthesis call failed or timed out
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server returned no subtitles for the video (terminal for a session)
    #[error("No subtitles available for video {0}")]
    NoSubtitles(String),

    /// Audio payload could not be decoded into playable samples
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// The audio handle could not start or be controlled
    #[error("Playback error: {0}")]
    Playback(String),

    /// Operation invalid for the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed server response
    #[error("Response parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
