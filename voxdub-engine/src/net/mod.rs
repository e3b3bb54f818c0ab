//! Network collaborators
//!
//! The subtitle/synthesis server is the engine's only remote dependency.
//! [`client::SynthesisProvider`] is the seam: the engine depends on the
//! trait, the binary wires in the HTTP implementation, tests wire in fakes.

pub mod client;

pub use client::{HttpSynthesisClient, RawClip, SynthesisBatch, SynthesisProvider};
