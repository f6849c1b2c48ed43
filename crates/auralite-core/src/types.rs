//! Core domain types for AuraLite.

pub mod format;

pub use format::{SampleEncoding, SoundFormat};
