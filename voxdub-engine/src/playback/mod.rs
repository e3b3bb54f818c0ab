//! Playback synchronization engine

pub mod cache;
pub mod clip;
pub mod controller;
pub mod engine;
pub mod output;
pub mod prefetch;
pub mod queue;
pub mod session;

pub use cache::SegmentCache;
pub use clip::{DecodedAudio, SynthesizedClip};
pub use controller::AudioController;
pub use engine::{DubEngine, StartDubbing, VideoControl};
pub use output::{AudioOutput, NullOutput, RodioOutput};
pub use prefetch::PrefetchScheduler;
pub use queue::PlaybackQueue;
pub use session::DubSession;
