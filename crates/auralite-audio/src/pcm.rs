//! Conversion of raw little-endian PCM bytes to normalized `f32` samples.

use auralite_core::SampleEncoding;

/// Decode interleaved samples from `bytes` into `out`.
///
/// Converts as many whole samples as fit in both slices and returns the
/// number of samples written. Trailing bytes that do not form a whole
/// sample are ignored.
pub fn decode_samples(bytes: &[u8], encoding: SampleEncoding, out: &mut [f32]) -> usize {
    let width = encoding.width();
    let count = (bytes.len() / width).min(out.len());

    for (sample, raw) in out[..count].iter_mut().zip(bytes.chunks_exact(width)) {
        *sample = match encoding {
            SampleEncoding::U8 => (f32::from(raw[0]) - 128.0) / 128.0,
            SampleEncoding::S16 => f32::from(i16::from_le_bytes([raw[0], raw[1]])) / 32_768.0,
            SampleEncoding::S24 => {
                // Shift into the top of an i32 to sign-extend.
                let value = i32::from_le_bytes([0, raw[0], raw[1], raw[2]]) >> 8;
                value as f32 / 8_388_608.0
            }
            SampleEncoding::S32 => {
                i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f32 / 2_147_483_648.0
            }
        };
    }

    count
}

/// Number of payload bytes that fill `samples` output slots.
pub const fn bytes_for_samples(samples: usize, encoding: SampleEncoding) -> usize {
    samples * encoding.width()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_u8_bias() {
        let mut out = [1.0f32; 3];
        assert_eq!(decode_samples(&[0, 128, 255], SampleEncoding::U8, &mut out), 3);
        assert_eq!(out[0], -1.0);
        assert_eq!(out[1], 0.0);
        assert!((out[2] - 127.0 / 128.0).abs() < f32::EPSILON);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_s16_little_endian() {
        let bytes = [0x00, 0x80, 0xff, 0x7f, 0x00, 0x40];
        let mut out = [0.0f32; 3];
        assert_eq!(decode_samples(&bytes, SampleEncoding::S16, &mut out), 3);
        assert_eq!(out[0], -1.0);
        assert!((out[1] - 32_767.0 / 32_768.0).abs() < f32::EPSILON);
        assert_eq!(out[2], 0.5);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_s24_sign_extension() {
        let bytes = [0x00, 0x00, 0x80, 0xff, 0xff, 0xff, 0x00, 0x00, 0x40];
        let mut out = [0.0f32; 3];
        assert_eq!(decode_samples(&bytes, SampleEncoding::S24, &mut out), 3);
        assert_eq!(out[0], -1.0);
        assert_eq!(out[1], -1.0 / 8_388_608.0);
        assert_eq!(out[2], 0.5);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_s32_range() {
        let bytes = [0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0xc0];
        let mut out = [0.0f32; 2];
        assert_eq!(decode_samples(&bytes, SampleEncoding::S32, &mut out), 2);
        assert_eq!(out[0], -1.0);
        assert_eq!(out[1], -0.5);
    }

    #[test]
    fn test_output_bounds_count() {
        let bytes = [0u8; 10];
        let mut out = [0.0f32; 2];
        assert_eq!(decode_samples(&bytes, SampleEncoding::S16, &mut out), 2);

        let mut wide = [0.0f32; 16];
        // 10 bytes of 24-bit audio is three whole samples.
        assert_eq!(decode_samples(&bytes, SampleEncoding::S24, &mut wide), 3);
    }

    #[test]
    fn test_bytes_for_samples() {
        assert_eq!(bytes_for_samples(1024, SampleEncoding::S16), 2048);
        assert_eq!(bytes_for_samples(10, SampleEncoding::S24), 30);
    }
}
