//! Recognition session: a stateful audio-fingerprint engine wrapped in a
//! worker that models `Unconfigured -> Configured -> Listening` and back.

pub mod engine;
pub mod session;


pub use engine::{EngineCallback, EngineConfig, RecognitionEngine};
