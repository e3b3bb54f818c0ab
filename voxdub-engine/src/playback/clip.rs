//! Synthesized clip types
//!
//! Audio arrives from the synthesis server as encoded bytes (MP3 from the
//! reference backend). It is decoded eagerly on the response path into
//! interleaved PCM so the intrinsic duration is known before the clip is
//! ever due, and handing it to the output sink is allocation-only work.

use crate::error::{Error, Result};
use rodio::Source;
use std::io::Cursor;

/// Fully decoded PCM audio
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved channel count
    pub channels: u16,
    /// Frames per second
    pub sample_rate: u32,
    /// Interleaved samples
    pub samples: Vec<i16>,
}

impl DecodedAudio {
    /// Decode encoded audio bytes (any format rodio understands)
    pub fn decode(bytes: Vec<u8>) -> Result<Self> {
        let decoder = rodio::Decoder::new(Cursor::new(bytes))
            .map_err(|e| Error::Decode(e.to_string()))?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Vec<i16> = decoder.collect();

        if channels == 0 || sample_rate == 0 || samples.is_empty() {
            return Err(Error::Decode("decoded stream is empty".to_string()));
        }

        Ok(Self {
            channels,
            sample_rate,
            samples,
        })
    }

    /// Intrinsic duration of the decoded audio in seconds
    pub fn duration_sec(&self) -> f64 {
        let frames = self.samples.len() as f64 / self.channels as f64;
        frames / self.sample_rate as f64
    }
}

/// A synthesized audio rendering of one subtitle segment
///
/// The intrinsic audio duration is independent of the slot the clip is
/// meant to occupy and may exceed it; fitting is the audio controller's
/// job. Immutable once created.
#[derive(Debug, Clone)]
pub struct SynthesizedClip {
    /// Subtitle segment index this clip renders
    pub id: usize,
    /// Slot start on the video timeline (seconds)
    pub slot_start: f64,
    /// Slot end on the video timeline (seconds)
    pub slot_end: f64,
    /// Decoded speech audio
    pub audio: DecodedAudio,
}

impl SynthesizedClip {
    /// Duration of the timeline slot this clip is meant to occupy
    pub fn slot_duration(&self) -> f64 {
        self.slot_end - self.slot_start
    }
}
