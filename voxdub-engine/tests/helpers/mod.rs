//! Test helpers for voxdub-engine integration tests
//!
//! - `FakeProvider`: scripted synthesis backend (per-id audio durations,
//!   injectable delay/failure, call recording)
//! - `RecordingOutput`: audio output fake with an externally drivable
//!   "sounding" flag
//! - `wav_bytes`: in-memory WAV payloads of a given duration

// Not every suite uses every helper
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use voxdub_engine::error::{Error, Result};
use voxdub_engine::net::client::{RawClip, SynthesisBatch, SynthesisProvider};
use voxdub_engine::playback::clip::DecodedAudio;
use voxdub_engine::playback::output::AudioOutput;
use voxdub_engine::timeline::SubtitleSegment;

pub const SAMPLE_RATE: u32 = 8000;

/// Silence WAV of the given duration (16-bit mono)
pub fn wav_bytes(duration_sec: f64) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = (duration_sec * SAMPLE_RATE as f64) as usize;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Convenience subtitle builder
pub fn segments(raw: &[(f64, f64, &str)]) -> Vec<SubtitleSegment> {
    raw.iter()
        .enumerate()
        .map(|(index, (start, end, text))| SubtitleSegment {
            index,
            start_sec: *start,
            end_sec: *end,
            text: text.to_string(),
        })
        .collect()
}

/// Scripted synthesis backend
pub struct FakeProvider {
    pub subtitles: Mutex<Vec<SubtitleSegment>>,
    /// Audio duration per id; ids absent here are omitted from results,
    /// mirroring the server filtering out failed items
    pub audio_secs: Mutex<HashMap<usize, f64>>,
    pub delay: Mutex<Option<Duration>>,
    pub fail_synthesis: AtomicBool,
    pub synth_calls: AtomicUsize,
    pub requested: Mutex<Vec<Vec<usize>>>,
}

impl FakeProvider {
    pub fn new(subtitles: Vec<SubtitleSegment>, audio_secs: &[(usize, f64)]) -> Arc<Self> {
        Arc::new(Self {
            subtitles: Mutex::new(subtitles),
            audio_secs: Mutex::new(audio_secs.iter().copied().collect()),
            delay: Mutex::new(None),
            fail_synthesis: AtomicBool::new(false),
            synth_calls: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        })
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.synth_calls.load(Ordering::SeqCst)
    }

    pub fn requested_batches(&self) -> Vec<Vec<usize>> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl SynthesisProvider for FakeProvider {
    async fn fetch_subtitles(
        &self,
        video_id: &str,
        _target_lang: &str,
        _translate_source: Option<&str>,
    ) -> Result<Vec<SubtitleSegment>> {
        let subtitles = self.subtitles.lock().unwrap().clone();
        if subtitles.is_empty() {
            return Err(Error::NoSubtitles(video_id.to_string()));
        }
        Ok(subtitles)
    }

    async fn synthesize(&self, batch: SynthesisBatch) -> Result<Vec<RawClip>> {
        self.synth_calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap()
            .push(batch.segments.iter().map(|s| s.index).collect());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_synthesis.load(Ordering::SeqCst) {
            return Err(Error::Internal("synthesis backend down".to_string()));
        }

        let audio_secs = self.audio_secs.lock().unwrap().clone();
        // Deliver in reverse id order: the queue must re-establish
        // ascending order regardless of arrival order.
        let mut clips: Vec<RawClip> = batch
            .segments
            .iter()
            .filter_map(|segment| {
                audio_secs.get(&segment.index).map(|secs| RawClip {
                    id: segment.index,
                    audio: wav_bytes(*secs),
                    start_time: segment.start_sec,
                    end_time: segment.end_sec,
                })
            })
            .collect();
        clips.reverse();
        Ok(clips)
    }
}

/// Audio output fake that records plays and lets the test decide when a
/// clip finishes
#[derive(Default)]
pub struct RecordingOutput {
    sounding: AtomicBool,
    pub paused: AtomicBool,
    pub stops: AtomicUsize,
    /// (rate, volume) per play call, in order
    pub plays: Mutex<Vec<(f32, f32)>>,
}

impl RecordingOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulate the sink draining naturally
    pub fn finish(&self) {
        self.sounding.store(false, Ordering::SeqCst);
    }

    pub fn play_count(&self) -> usize {
        self.plays.lock().unwrap().len()
    }

    pub fn rates(&self) -> Vec<f32> {
        self.plays.lock().unwrap().iter().map(|(r, _)| *r).collect()
    }
}

impl AudioOutput for RecordingOutput {
    fn play(&self, _audio: Arc<DecodedAudio>, rate: f32, volume: f32) -> Result<()> {
        self.plays.lock().unwrap().push((rate, volume));
        self.sounding.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_volume(&self, _volume: f32) {}

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.sounding.store(false, Ordering::SeqCst);
    }

    fn is_sounding(&self) -> bool {
        self.sounding.load(Ordering::SeqCst)
    }
}

/// Sleep past the controller's start-grace window so a drained sink is
/// recognized as completion on the next tick
pub async fn past_grace() {
    tokio::time::sleep(Duration::from_millis(250)).await;
}
