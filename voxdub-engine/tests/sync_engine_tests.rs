//! Playback selector and session lifecycle integration tests
//!
//! Drive a DubEngine through its public contract (start_dubbing, on_tick,
//! on_playback_state) with a scripted synthesis provider and a recording
//! audio output.

mod helpers;

use helpers::{past_grace, FakeProvider, RecordingOutput};
use std::sync::Arc;
use voxdub_common::config::Config;
use voxdub_common::events::{DubEvent, PlaybackState};
use voxdub_engine::playback::engine::{DubEngine, NullVideoControl, StartDubbing};
use voxdub_engine::Error;

fn build_engine(provider: Arc<FakeProvider>, output: Arc<RecordingOutput>) -> DubEngine {
    build_engine_with(provider, output, Config::default())
}

fn build_engine_with(
    provider: Arc<FakeProvider>,
    output: Arc<RecordingOutput>,
    config: Config,
) -> DubEngine {
    DubEngine::new(provider, output, Arc::new(NullVideoControl), config)
}

fn start_request(video_id: &str) -> StartDubbing {
    StartDubbing {
        video_id: video_id.to_string(),
        ..Default::default()
    }
}

/// Drain everything currently buffered on an event receiver
fn drain(rx: &mut tokio::sync::broadcast::Receiver<DubEvent>) -> Vec<DubEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn clips_play_in_order_with_slot_fitted_rates() {
    // Slots: a 0-2s, b 2-5s, c 5-9s; audio runs 3s, 2s, 5s.
    let subs = helpers::segments(&[(0.0, 2.0, "a"), (2.0, 5.0, "b"), (5.0, 9.0, "c")]);
    let provider = FakeProvider::new(subs, &[(0, 3.0), (1, 2.0), (2, 5.0)]);
    let output = RecordingOutput::new();
    let engine = build_engine(provider.clone(), output.clone());

    engine.start_dubbing(start_request("vid")).await.unwrap();
    assert_eq!(provider.calls(), 1);

    let status = engine.status().await.unwrap();
    assert_eq!(status.queued_ids, vec![0, 1, 2]);
    assert_eq!(status.cached_clips, 3);

    engine.on_tick(0.0).await;
    assert_eq!(output.play_count(), 1);

    past_grace().await;
    output.finish();
    engine.on_tick(2.0).await;
    assert_eq!(output.play_count(), 2);

    past_grace().await;
    output.finish();
    engine.on_tick(5.0).await;
    assert_eq!(output.play_count(), 3);

    // a is 1s over its 2s slot (1.5x), b fits (1.0x), c is 1s over 4s (1.25x)
    let rates = output.rates();
    assert!((rates[0] - 1.5).abs() < 1e-3, "rates: {:?}", rates);
    assert!((rates[1] - 1.0).abs() < 1e-3, "rates: {:?}", rates);
    assert!((rates[2] - 1.25).abs() < 1e-3, "rates: {:?}", rates);
}

#[tokio::test]
async fn sounding_clip_is_never_preempted() {
    let subs = helpers::segments(&[(0.0, 2.0, "a"), (2.0, 5.0, "b")]);
    let provider = FakeProvider::new(subs, &[(0, 2.0), (1, 2.0)]);
    let output = RecordingOutput::new();
    let engine = build_engine(provider, output.clone());

    engine.start_dubbing(start_request("vid")).await.unwrap();
    engine.on_tick(0.0).await;
    assert_eq!(output.play_count(), 1);

    // b becomes due while a is still sounding; nothing is cut off
    engine.on_tick(2.5).await;
    engine.on_tick(3.0).await;
    assert_eq!(output.play_count(), 1);
    assert_eq!(engine.status().await.unwrap().sounding_clip, Some(0));
}

#[tokio::test]
async fn elapsed_clips_are_dropped_not_played_late() {
    let subs = helpers::segments(&[(0.0, 2.0, "a"), (2.0, 5.0, "b"), (5.0, 9.0, "c")]);
    let provider = FakeProvider::new(subs, &[(0, 1.0), (1, 1.0), (2, 1.0)]);
    let output = RecordingOutput::new();
    let engine = build_engine(provider, output.clone());
    let mut rx = engine.subscribe();

    engine.start_dubbing(start_request("vid")).await.unwrap();
    drain(&mut rx);

    // First observed position is already past a and b
    engine.on_tick(6.0).await;

    let events = drain(&mut rx);
    let dropped: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            DubEvent::ClipDropped { segment_index, .. } => Some(*segment_index),
            _ => None,
        })
        .collect();
    assert_eq!(dropped, vec![0, 1]);

    assert_eq!(output.play_count(), 1);
    assert_eq!(engine.status().await.unwrap().sounding_clip, Some(2));
}

#[tokio::test]
async fn head_starts_within_lead_tolerance() {
    let subs = helpers::segments(&[(1.0, 3.0, "a")]);
    let provider = FakeProvider::new(subs, &[(0, 1.0)]);
    let output = RecordingOutput::new();
    let engine = build_engine(provider, output.clone());

    engine.start_dubbing(start_request("vid")).await.unwrap();

    // 0.5s early: outside the 0.3s tolerance, not yet due
    engine.on_tick(0.5).await;
    assert_eq!(output.play_count(), 0);

    // 0.25s early: inside the tolerance
    engine.on_tick(0.75).await;
    assert_eq!(output.play_count(), 1);
}

#[tokio::test]
async fn pause_mirrors_to_dub_channel() {
    let subs = helpers::segments(&[(0.0, 4.0, "a"), (4.0, 8.0, "b")]);
    let provider = FakeProvider::new(subs, &[(0, 3.0), (1, 3.0)]);
    let output = RecordingOutput::new();
    let engine = build_engine(provider, output.clone());

    engine.start_dubbing(start_request("vid")).await.unwrap();
    engine.on_tick(0.0).await;
    assert_eq!(output.play_count(), 1);

    past_grace().await;
    output.finish();
    engine.on_playback_state(PlaybackState::Paused).await;
    assert!(output.paused.load(std::sync::atomic::Ordering::SeqCst));

    // Paused ticks select nothing, even with b due
    engine.on_tick(4.0).await;
    assert_eq!(output.play_count(), 1);

    engine.on_playback_state(PlaybackState::Playing).await;
    assert!(!output.paused.load(std::sync::atomic::Ordering::SeqCst));
    engine.on_tick(4.0).await;
    assert_eq!(output.play_count(), 2);
}

#[tokio::test]
async fn buffering_clears_once_clips_arrive() {
    let subs = helpers::segments(&[(0.0, 2.0, "a")]);
    let provider = FakeProvider::new(subs, &[(0, 1.0)]);
    let output = RecordingOutput::new();
    let engine = build_engine(provider, output.clone());
    let mut rx = engine.subscribe();

    engine.start_dubbing(start_request("vid")).await.unwrap();
    engine.on_tick(0.0).await;

    let events = drain(&mut rx);
    let transitions: Vec<bool> = events
        .iter()
        .filter_map(|e| match e {
            DubEvent::BufferingChanged { buffering, .. } => Some(*buffering),
            _ => None,
        })
        .collect();
    assert_eq!(transitions, vec![true, false]);
    assert!(!engine.status().await.unwrap().buffering);
}

#[tokio::test]
async fn empty_subtitles_never_start_a_session() {
    let provider = FakeProvider::new(Vec::new(), &[]);
    let output = RecordingOutput::new();
    let engine = build_engine(provider.clone(), output);
    let mut rx = engine.subscribe();

    let err = engine.start_dubbing(start_request("vid")).await.unwrap_err();
    assert!(matches!(err, Error::NoSubtitles(_)));
    assert!(engine.status().await.is_none());
    assert_eq!(provider.calls(), 0);

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, DubEvent::SessionError { .. })));
}

#[tokio::test]
async fn requested_segments_are_never_requested_twice() {
    let subs = helpers::segments(&[(0.0, 2.0, "a"), (2.0, 4.0, "b"), (4.0, 6.0, "c")]);
    let provider = FakeProvider::new(subs, &[(0, 1.0), (1, 1.0), (2, 1.0)]);
    let output = RecordingOutput::new();
    let engine = build_engine(provider.clone(), output);

    engine.start_dubbing(start_request("vid")).await.unwrap();
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.requested_batches(), vec![vec![0, 1, 2]]);

    // The whole timeline is already requested; nothing left to fetch
    engine.scheduler().replenish_once().await.unwrap();
    engine.scheduler().request_window(0).await.unwrap();
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn results_arriving_out_of_order_queue_sorted() {
    // FakeProvider reverses result order; the queue must come out ascending
    let subs = helpers::segments(&[(0.0, 1.0, "a"), (1.0, 2.0, "b"), (2.0, 3.0, "c")]);
    let provider = FakeProvider::new(subs, &[(0, 0.5), (1, 0.5), (2, 0.5)]);
    let output = RecordingOutput::new();
    let engine = build_engine(provider, output);

    engine.start_dubbing(start_request("vid")).await.unwrap();
    assert_eq!(engine.status().await.unwrap().queued_ids, vec![0, 1, 2]);
}

#[tokio::test]
async fn missing_results_leave_gaps_not_errors() {
    // Server only produced audio for c; a and b stay un-dubbed
    let subs = helpers::segments(&[(0.0, 2.0, "a"), (2.0, 5.0, "b"), (5.0, 9.0, "c")]);
    let provider = FakeProvider::new(subs, &[(2, 3.0)]);
    let output = RecordingOutput::new();
    let engine = build_engine(provider.clone(), output.clone());

    engine.start_dubbing(start_request("vid")).await.unwrap();
    let status = engine.status().await.unwrap();
    assert_eq!(status.cached_clips, 1);
    assert_eq!(status.queued_ids, vec![2]);
    // The failed ids stay consumed; no re-request storm
    assert_eq!(status.processed_segments, 3);

    engine.on_tick(5.0).await;
    assert_eq!(output.play_count(), 1);
    assert_eq!(provider.calls(), 1);
}
