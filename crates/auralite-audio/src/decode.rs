//! RIFF/WAVE container decoding.
//!
//! Two header parsers are available. [`ParseMode::ChunkWalk`] locates the
//! `fmt ` and `data` sub-chunks by tag and skips anything else, which is what
//! real-world files need. [`ParseMode::Canonical`] reads the fields at the
//! fixed offsets of the minimal 44-byte layout, and rejects files whose tags
//! are not where that layout puts them.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::sound::SoundBuffer;
use auralite_core::{Error, Result, SampleEncoding, SoundFormat};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Cursor, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, error, info, trace, warn};

const RIFF_TAG: &[u8; 4] = b"RIFF";
const WAVE_TAG: &[u8; 4] = b"WAVE";
const FMT_TAG: &[u8; 4] = b"fmt ";
const DATA_TAG: &[u8; 4] = b"data";

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Size of the minimal header: RIFF descriptor, 16-byte `fmt `, `data` header.
const CANONICAL_HEADER_LEN: usize = 44;

/// Largest `fmt ` chunk accepted. The extensible layout needs 40 bytes.
const MAX_FMT_CHUNK_LEN: u32 = 1024;

/// How the container header is located.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ParseMode {
    /// Walk sub-chunks by tag.
    #[default]
    ChunkWalk,
    /// Fixed offsets of the 44-byte layout.
    Canonical,
}

/// Header fields needed to locate and interpret the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub format: SoundFormat,
    /// Absolute offset of the first payload byte.
    pub data_offset: u64,
    /// Declared payload length in bytes.
    pub data_len: u32,
}

/// Load a WAV file, walking its chunks.
pub fn load(path: impl AsRef<Path>) -> Result<SoundBuffer> {
    load_with(path, ParseMode::default())
}

/// Load a WAV file with an explicit header parser.
pub fn load_with(path: impl AsRef<Path>, mode: ParseMode) -> Result<SoundBuffer> {
    let path = path.as_ref();
    debug!("Loading {} ({mode:?})", path.display());

    let file = File::open(path).map_err(|e| {
        error!("Failed to open file {}: {e}", path.display());
        Error::Io(e)
    })?;

    decode(&mut BufReader::new(file), mode)
        .inspect_err(|e| error!("Failed to load {}: {e}", path.display()))
}

/// Decode a container from any seekable reader.
pub fn decode<R: Read + Seek>(reader: &mut R, mode: ParseMode) -> Result<SoundBuffer> {
    let header = read_header(reader, mode)?;

    let end = reader.seek(SeekFrom::End(0))?;
    check_available(&header, end.saturating_sub(header.data_offset))?;

    reader.seek(SeekFrom::Start(header.data_offset))?;
    let data = read_payload(reader, header.data_len as usize)?;

    let sound = SoundBuffer::new(header.format, data)?;
    log_loaded(&sound);
    Ok(sound)
}

/// Decode a container held in memory. The payload is not copied.
pub fn from_bytes(bytes: impl Into<Bytes>, mode: ParseMode) -> Result<SoundBuffer> {
    let bytes = bytes.into();
    let header = read_header(&mut Cursor::new(&bytes[..]), mode)?;

    let start = (header.data_offset as usize).min(bytes.len());
    check_available(&header, (bytes.len() - start) as u64)?;

    let end = start + header.data_len as usize;
    let sound = SoundBuffer::new(header.format, bytes.slice(start..end))?;
    log_loaded(&sound);
    Ok(sound)
}

/// Parse and validate the header, leaving the reader somewhere past it.
pub fn read_header<R: Read + Seek>(reader: &mut R, mode: ParseMode) -> Result<ContainerHeader> {
    let mut signature = [0u8; 4];
    read_field(reader, &mut signature, "RIFF signature")?;
    if &signature != RIFF_TAG {
        return Err(Error::Format(format!(
            "missing RIFF signature (found {:?})",
            String::from_utf8_lossy(&signature)
        )));
    }

    let header = match mode {
        ParseMode::ChunkWalk => walk_chunks(reader)?,
        ParseMode::Canonical => read_canonical(reader)?,
    };

    header.format.validate()?;
    let frame = header.format.bytes_per_frame();
    if header.data_len as usize % frame != 0 {
        return Err(Error::Format(format!(
            "payload length {} is not a multiple of the {frame}-byte frame",
            header.data_len
        )));
    }

    debug!(
        "WAV header: {}, {} payload bytes at offset {}",
        header.format, header.data_len, header.data_offset
    );
    Ok(header)
}

fn read_canonical<R: Read>(reader: &mut R) -> Result<ContainerHeader> {
    let mut bytes = [0u8; CANONICAL_HEADER_LEN];
    read_field(reader, &mut bytes[4..], "canonical header")?;

    if &bytes[8..12] != WAVE_TAG {
        return Err(Error::Format("missing WAVE form type".to_string()));
    }
    if &bytes[12..16] != FMT_TAG {
        return Err(Error::Format(
            "no fmt chunk at offset 12; file is not in canonical layout".to_string(),
        ));
    }
    let tag = u16_at(&bytes, 20);
    if tag != WAVE_FORMAT_PCM {
        return Err(unsupported_tag(tag));
    }
    if &bytes[36..40] != DATA_TAG {
        return Err(Error::Format(
            "no data chunk at offset 36; file is not in canonical layout".to_string(),
        ));
    }

    Ok(ContainerHeader {
        format: container_format(
            u32_at(&bytes, 24),
            u16_at(&bytes, 22),
            u16_at(&bytes, 34),
            u16_at(&bytes, 32),
        ),
        data_offset: CANONICAL_HEADER_LEN as u64,
        data_len: u32_at(&bytes, 40),
    })
}

fn walk_chunks<R: Read + Seek>(reader: &mut R) -> Result<ContainerHeader> {
    let mut form = [0u8; 8];
    read_field(reader, &mut form, "RIFF header")?;
    if &form[4..8] != WAVE_TAG {
        return Err(Error::Format("missing WAVE form type".to_string()));
    }

    let mut format = None;
    loop {
        let Some((id, size)) = read_chunk_header(reader)? else {
            let missing = if format.is_none() { "fmt" } else { "data" };
            return Err(Error::Format(format!("no {missing} chunk found")));
        };
        trace!("Chunk {:?}: {size} bytes", String::from_utf8_lossy(&id));

        match &id {
            b"fmt " => format = Some(read_fmt_chunk(reader, size)?),
            b"data" => {
                let format = format.ok_or_else(|| {
                    Error::Format("data chunk precedes fmt chunk".to_string())
                })?;
                return Ok(ContainerHeader {
                    format,
                    data_offset: reader.stream_position()?,
                    data_len: size,
                });
            }
            _ => skip_chunk(reader, size)?,
        }
    }
}

fn read_chunk_header<R: Read>(reader: &mut R) -> Result<Option<([u8; 4], u32)>> {
    let mut header = [0u8; 8];
    match reader.read_exact(&mut header) {
        Ok(()) => Ok(Some((
            [header[0], header[1], header[2], header[3]],
            u32_at(&header, 4),
        ))),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn read_fmt_chunk<R: Read + Seek>(reader: &mut R, size: u32) -> Result<SoundFormat> {
    if !(16..=MAX_FMT_CHUNK_LEN).contains(&size) {
        return Err(Error::Format(format!("fmt chunk has invalid size {size}")));
    }

    let mut body = vec![0u8; size as usize];
    read_field(reader, &mut body, "fmt chunk")?;
    if size % 2 == 1 {
        reader.seek(SeekFrom::Current(1))?;
    }

    let mut tag = u16_at(&body, 0);
    if tag == WAVE_FORMAT_EXTENSIBLE {
        // The sub-format GUID starts at 24; its first two bytes carry the tag.
        if body.len() < 26 {
            return Err(Error::Format("extensible fmt chunk is truncated".to_string()));
        }
        tag = u16_at(&body, 24);
    }
    if tag != WAVE_FORMAT_PCM {
        return Err(unsupported_tag(tag));
    }

    Ok(container_format(
        u32_at(&body, 4),
        u16_at(&body, 2),
        u16_at(&body, 14),
        u16_at(&body, 12),
    ))
}

/// Sample layout described by the `fmt ` fields.
///
/// Samples narrower than their container (20 bits stored in 3 bytes) are
/// left-justified, so they are read at the container width.
fn container_format(sample_rate: u32, channels: u16, bits: u16, block_align: u16) -> SoundFormat {
    let format = SoundFormat::new(sample_rate, channels, bits);
    if channels == 0 || block_align % channels != 0 {
        return format;
    }

    let container_bits = (block_align / channels).saturating_mul(8);
    if bits % 8 != 0 && bits < container_bits && SampleEncoding::from_bits(container_bits).is_some() {
        debug!("{bits}-bit samples in {container_bits}-bit containers");
        return SoundFormat::new(sample_rate, channels, container_bits);
    }

    if usize::from(block_align) != format.bytes_per_frame() {
        warn!(
            "fmt block align {block_align} disagrees with {} bytes per frame; using the latter",
            format.bytes_per_frame()
        );
    }
    format
}

fn skip_chunk<R: Seek>(reader: &mut R, size: u32) -> Result<()> {
    // Chunks are word aligned; odd sizes carry one pad byte.
    let padded = i64::from(size) + i64::from(size & 1);
    reader.seek(SeekFrom::Current(padded))?;
    Ok(())
}

fn read_payload<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| Error::Allocation { requested: len })?;

    reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if data.len() < len {
        return Err(Error::TruncatedData {
            declared: len as u64,
            available: data.len() as u64,
        });
    }

    Ok(data)
}

fn check_available(header: &ContainerHeader, available: u64) -> Result<()> {
    let declared = u64::from(header.data_len);
    if declared > available {
        return Err(Error::TruncatedData {
            declared,
            available,
        });
    }
    Ok(())
}

/// `read_exact` that reports a short header as a format error.
fn read_field<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            Error::Format(format!("file ends inside the {what}"))
        } else {
            Error::Io(e)
        }
    })
}

fn unsupported_tag(tag: u16) -> Error {
    Error::Format(format!(
        "unsupported audio format tag {tag:#06x}; only linear PCM is supported"
    ))
}

fn log_loaded(sound: &SoundBuffer) {
    info!(
        "Loaded WAV: {} Hz, {}-bit, {} channels",
        sound.sample_rate(),
        sound.bits_per_sample(),
        sound.channels()
    );
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
