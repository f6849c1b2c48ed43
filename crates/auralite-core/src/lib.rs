//! # auralite-core
//!
//! Core types and error handling for the AuraLite WAV player.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
