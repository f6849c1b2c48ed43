//! # auralite-audio
//!
//! Uncompressed WAV playback for AuraLite.
//!
//! Features:
//! - RIFF/WAVE container decoding into an in-memory [`SoundBuffer`]
//! - One playback contract over three native output strategies
//! - Low-latency cpal output

pub mod backend;
pub mod buffer;
pub mod decode;
pub mod engine;
pub mod output;
pub mod pcm;
pub mod sound;

pub use backend::{
    BlockingBackend, CallbackBackend, NullBackend, PlatformBackend, PlaybackBackend,
    QueuedBackend,
};
pub use decode::{load, load_with, ParseMode};
pub use engine::Player;
pub use output::{CompletionMode, OutputConfig};
pub use sound::SoundBuffer;
