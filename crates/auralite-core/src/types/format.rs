//! PCM format descriptors.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Linear PCM sample layout, derived from the bit depth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// Unsigned 8-bit, biased at 128.
    U8,
    /// Signed 16-bit little-endian.
    S16,
    /// Signed 24-bit little-endian, packed in 3 bytes.
    S24,
    /// Signed 32-bit little-endian.
    S32,
}

impl SampleEncoding {
    /// Map a bit depth to its encoding.
    pub const fn from_bits(bits_per_sample: u16) -> Option<Self> {
        match bits_per_sample {
            8 => Some(Self::U8),
            16 => Some(Self::S16),
            24 => Some(Self::S24),
            32 => Some(Self::S32),
            _ => None,
        }
    }

    /// Width of one sample in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S24 => 3,
            Self::S32 => 4,
        }
    }
}

/// Format of an interleaved PCM payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SoundFormat {
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Bits per sample (8, 16, 24 or 32).
    pub bits_per_sample: u16,
}

impl SoundFormat {
    /// 44.1 kHz stereo 16-bit.
    pub const CD: Self = Self::new(44_100, 2, 16);

    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Check that the descriptors are usable for playback arithmetic.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Format("sample rate is zero".to_string()));
        }
        if self.channels == 0 {
            return Err(Error::Format("channel count is zero".to_string()));
        }
        if self.encoding().is_none() {
            return Err(Error::Format(format!(
                "unsupported bit depth: {}",
                self.bits_per_sample
            )));
        }
        Ok(())
    }

    /// Sample encoding, if the bit depth is supported.
    pub const fn encoding(&self) -> Option<SampleEncoding> {
        SampleEncoding::from_bits(self.bits_per_sample)
    }

    pub const fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample / 8) as usize
    }

    /// Size of one frame (one sample per channel) in bytes.
    pub const fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.bytes_per_sample()
    }

    /// Bytes consumed per second of playback.
    pub const fn byte_rate(&self) -> u64 {
        self.sample_rate as u64 * self.bytes_per_frame() as u64
    }

    /// Number of whole frames in `bytes`.
    pub const fn frames_in(&self, bytes: usize) -> usize {
        match self.bytes_per_frame() {
            0 => 0,
            frame => bytes / frame,
        }
    }

    /// Playback duration of `bytes` of payload, in seconds.
    pub fn seconds_for(&self, bytes: usize) -> f64 {
        match self.byte_rate() {
            0 => 0.0,
            rate => bytes as f64 / rate as f64,
        }
    }
}

impl Default for SoundFormat {
    fn default() -> Self {
        Self::CD
    }
}

impl fmt::Display for SoundFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {}-bit, {} channels",
            self.sample_rate, self.bits_per_sample, self.channels
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cd_format_arithmetic() {
        let format = SoundFormat::CD;
        assert_eq!(format.bytes_per_sample(), 2);
        assert_eq!(format.bytes_per_frame(), 4);
        assert_eq!(format.byte_rate(), 176_400);
        assert_eq!(format.frames_in(176_400), 44_100);
        assert!((format.seconds_for(176_400) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_packed_24_bit_frame() {
        let format = SoundFormat::new(48_000, 6, 24);
        assert_eq!(format.encoding(), Some(SampleEncoding::S24));
        assert_eq!(format.bytes_per_frame(), 18);
        assert_eq!(format.byte_rate(), 864_000);
    }

    #[test]
    fn test_validate_rejects_degenerate_formats() {
        assert!(SoundFormat::CD.validate().is_ok());
        assert!(matches!(
            SoundFormat::new(0, 2, 16).validate(),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            SoundFormat::new(44_100, 0, 16).validate(),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            SoundFormat::new(44_100, 2, 12).validate(),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(SoundFormat::CD.to_string(), "44100 Hz, 16-bit, 2 channels");
    }

    #[test]
    fn test_encoding_widths() {
        for bits in [8u16, 16, 24, 32] {
            let encoding = SampleEncoding::from_bits(bits).unwrap();
            assert_eq!(encoding.width(), usize::from(bits / 8));
        }
        assert_eq!(SampleEncoding::from_bits(20), None);
    }

    proptest! {
        #[test]
        fn prop_byte_rate_matches_frame_size(
            rate in 1u32..=384_000,
            channels in 1u16..=32,
            bits in prop::sample::select(vec![8u16, 16, 24, 32]),
        ) {
            let format = SoundFormat::new(rate, channels, bits);
            prop_assert!(format.validate().is_ok());
            prop_assert_eq!(
                format.byte_rate(),
                u64::from(rate) * u64::from(channels) * u64::from(bits / 8)
            );
            prop_assert_eq!(format.frames_in(format.bytes_per_frame() * 7), 7);
        }

        #[test]
        fn prop_one_second_of_payload(
            rate in 1u32..=192_000,
            channels in 1u16..=8,
        ) {
            let format = SoundFormat::new(rate, channels, 16);
            let one_second = format.byte_rate() as usize;
            prop_assert!((format.seconds_for(one_second) - 1.0).abs() < 1e-12);
        }
    }
}
