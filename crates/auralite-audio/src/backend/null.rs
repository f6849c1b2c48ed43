//! Backend without an output device.

use super::{encoding_of, ensure_format, PlaybackBackend};
use crate::output::OutputConfig;
use crate::pcm::decode_samples;
use crate::sound::SoundBuffer;
use auralite_core::{Result, SampleEncoding, SoundFormat};
use tracing::debug;

/// Converts and discards audio as fast as it can.
///
/// The cursor moves exactly as it would on a device backend, so callers can
/// run the full player lifecycle on machines without audio hardware.
pub struct NullBackend {
    format: SoundFormat,
    encoding: SampleEncoding,
    scratch: Vec<f32>,
}

impl PlaybackBackend for NullBackend {
    const NAME: &'static str = "null";

    fn init(format: SoundFormat, config: &OutputConfig) -> Result<Self> {
        let encoding = encoding_of(format)?;
        let period = config.period_frames.max(1) as usize;
        Ok(Self {
            format,
            encoding,
            scratch: vec![0.0; period * usize::from(format.channels)],
        })
    }

    fn format(&self) -> SoundFormat {
        self.format
    }

    fn play(&mut self, sound: &SoundBuffer) -> Result<()> {
        ensure_format(self.format, sound)?;

        let source = sound.source();
        let period_bytes = self.scratch.len() * self.encoding.width();
        let mut frames = 0;
        loop {
            let chunk = source.take_chunk(period_bytes);
            if chunk.is_empty() {
                break;
            }
            decode_samples(&chunk, self.encoding, &mut self.scratch);
            frames += chunk.len() / source.frame_bytes();
        }

        debug!("Discarded {frames} frames");
        Ok(())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auralite_core::Error;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_play_consumes_to_end() {
        let sound = SoundBuffer::new(SoundFormat::new(22_050, 1, 24), vec![0u8; 3 * 5_000]).unwrap();
        let mut backend = NullBackend::init(sound.format(), &OutputConfig::default()).unwrap();

        sound.seek(0.1);
        backend.play(&sound).unwrap();
        assert_eq!(sound.position(), sound.len());

        // Already at the end: nothing to do.
        backend.play(&sound).unwrap();
        assert_eq!(sound.position(), sound.len());
        backend.close().unwrap();
    }

    #[test]
    fn test_init_rejects_bad_format() {
        let result = NullBackend::init(SoundFormat::new(44_100, 2, 20), &OutputConfig::default());
        assert!(matches!(result, Err(Error::Format(_))));
    }
}
