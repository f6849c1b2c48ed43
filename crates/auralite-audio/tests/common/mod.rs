//! Test fixture generation for WAV containers.

#![allow(dead_code)]

use auralite_core::SoundFormat;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Build a canonical 44-byte-header WAV around `payload`.
///
/// `declared_len` overrides the payload length written into the header.
pub fn canonical_wav(format: SoundFormat, payload: &[u8], declared_len: Option<u32>) -> Vec<u8> {
    let data_len = declared_len.unwrap_or(payload.len() as u32);
    let mut out = Vec::with_capacity(44 + payload.len());

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&format.channels.to_le_bytes());
    out.extend_from_slice(&format.sample_rate.to_le_bytes());
    out.extend_from_slice(&(format.byte_rate() as u32).to_le_bytes());
    out.extend_from_slice(&(format.bytes_per_frame() as u16).to_le_bytes());
    out.extend_from_slice(&format.bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Deterministic non-silent payload of `len` bytes.
pub fn ramp(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

/// Write `bytes` to `name` inside `dir`.
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path)?;
    file.write_all(bytes)?;
    Ok(path)
}

/// Write a 16-bit tone with hound and return the samples written.
pub fn write_hound_tone(
    path: &Path,
    sample_rate: u32,
    channels: u16,
    frames: usize,
) -> Result<Vec<i16>, hound::Error> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let mut samples = Vec::with_capacity(frames * usize::from(channels));
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let value = (0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin() * f32::from(i16::MAX)) as i16;
        for _ in 0..channels {
            writer.write_sample(value)?;
            samples.push(value);
        }
    }
    writer.finalize()?;
    Ok(samples)
}
