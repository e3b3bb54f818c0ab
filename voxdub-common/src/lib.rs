//! # VoxDub Common Library
//!
//! Shared code for the VoxDub dubbing engine:
//! - Error types
//! - Event types (DubEvent enum) and EventBus
//! - Configuration loading
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
