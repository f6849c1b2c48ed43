//! Playback engine owning one output stream.

use crate::backend::{PlatformBackend, PlaybackBackend};
use crate::output::OutputConfig;
use crate::sound::SoundBuffer;
use auralite_core::{Result, SoundFormat};
use tracing::{debug, info, trace};

/// Owner of a single native output stream.
///
/// Creating a player opens the stream. [`Player::close`] releases it and
/// reports any error; dropping the player releases it silently. A stream can
/// never be used before it is opened or after it is released.
/// The player only borrows sounds; the caller keeps ownership.
///
/// ```no_run
/// use auralite_audio::{load, Player};
///
/// let sound = load("music.wav")?;
/// let mut player: Player = Player::for_sound(&sound)?;
/// player.seek(&sound, 1.5);
/// player.play(&sound)?;
/// player.close()?;
/// # Ok::<(), auralite_core::Error>(())
/// ```
pub struct Player<B: PlaybackBackend = PlatformBackend> {
    backend: B,
    format: SoundFormat,
}

impl<B: PlaybackBackend> Player<B> {
    /// Open the output for `format` with the default configuration.
    pub fn init(format: SoundFormat) -> Result<Self> {
        Self::with_config(format, &OutputConfig::default())
    }

    /// Open the output for `format`.
    pub fn with_config(format: SoundFormat, config: &OutputConfig) -> Result<Self> {
        format.validate()?;
        debug!("Opening {} output for {format}", B::NAME);

        let backend = B::init(format, config)?;
        info!("Audio output initialized: {format} ({} backend)", B::NAME);

        Ok(Self { backend, format })
    }

    /// Open the output for the format of `sound`.
    pub fn for_sound(sound: &SoundBuffer) -> Result<Self> {
        Self::init(sound.format())
    }

    pub const fn format(&self) -> SoundFormat {
        self.format
    }

    pub const fn backend_name(&self) -> &'static str {
        B::NAME
    }

    /// Play `sound` from its cursor to the end. Blocks until done.
    pub fn play(&mut self, sound: &SoundBuffer) -> Result<()> {
        debug!(
            "Playing {:.2}s from {:.2}s",
            sound.duration(),
            sound.current_time()
        );
        self.backend.play(sound)
    }

    /// Cursor of `sound` in seconds.
    pub fn current_time(&self, sound: &SoundBuffer) -> f64 {
        self.backend.query_time(sound)
    }

    /// Move the cursor of `sound`, clamped to the sound. Returns the new time.
    pub fn seek(&self, sound: &SoundBuffer, seconds: f64) -> f64 {
        let position = self.backend.seek(sound, seconds);
        trace!("Cursor at byte {position}");
        debug!("Seeked to {:.3}s", sound.current_time());
        sound.current_time()
    }

    /// Release the output stream.
    pub fn close(self) -> Result<()> {
        debug!("Closing {} output", B::NAME);
        self.backend.close()
    }
}
