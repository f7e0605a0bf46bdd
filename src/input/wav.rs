use std::io::Read;
use log::debug;
use thiserror::Error;

/// The only sample rate the FM pipeline is clocked for
pub const SUPPORTED_SAMPLE_RATE: u32 = 48_000;

const FORMAT_PCM: u16 = 1;

/// Header validation failures. All of them abort before any broadcast starts.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("not a WAV file")]
    NotWav,

    #[error("not uncompressed PCM (format code {0})")]
    NotPcm(u16),

    #[error("not mono ({0} channels)")]
    NotMono(u16),

    #[error("unsupported sample rate {0} Hz, expected 48000")]
    UnsupportedSampleRate(u32),

    #[error("not 16-bit ({0} bits per sample)")]
    Not16Bit(u16),

    #[error("not a WAV file: unexpected chunk {0:02x?} after fmt")]
    UnexpectedChunk([u8; 4]),

    #[error("not a WAV file: header truncated reading {0}")]
    Truncated(&'static str),
}

/// Format of a validated stream. Only 16-bit mono PCM at 48 kHz ever gets built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channel_count: u16,
    pub encoding: u16,
}

impl WavFormat {
    /// How long each sample is held, in nanoseconds (truncated)
    pub fn sample_interval_nanos(&self) -> u32 {
        sample_interval_nanos(self.sample_rate)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.channel_count) * u32::from(self.bits_per_sample / 8)
    }
}

pub fn sample_interval_nanos(sample_rate: u32) -> u32 {
    (1e9 / sample_rate as f64) as u32
}

/// Read one fixed-width header field. A short read is a format error.
fn read_field<R: Read, const N: usize>(reader: &mut R, field: &'static str) -> Result<[u8; N], FormatError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|_| FormatError::Truncated(field))?;
    Ok(buf)
}

fn read_u16<R: Read>(reader: &mut R, field: &'static str) -> Result<u16, FormatError> {
    read_field(reader, field).map(u16::from_le_bytes)
}

fn read_u32<R: Read>(reader: &mut R, field: &'static str) -> Result<u32, FormatError> {
    read_field(reader, field).map(u32::from_le_bytes)
}

/// Validate a RIFF/WAVE header and leave `reader` at the first PCM sample byte.
///
/// Reads strictly forward, one field at a time, so it works on pipes and sockets.
/// Two leniencies are deliberate:
/// - the fmt chunk size is not checked against 16 (some encoders write 18)
/// - `\0\0LI` where `data` is expected is accepted: avconv pads the fmt chunk
///   and follows it with a LIST chunk. Two more bytes are consumed to realign
///   and the chunk is not inspected any further.
pub fn parse_header<R: Read>(reader: &mut R) -> Result<WavFormat, FormatError> {
    let riff: [u8; 4] = read_field(reader, "RIFF tag")?;
    if &riff != b"RIFF" {
        return Err(FormatError::NotWav);
    }

    let _riff_size = read_u32(reader, "RIFF size")?;

    let wave: [u8; 4] = read_field(reader, "WAVE tag")?;
    if &wave != b"WAVE" {
        return Err(FormatError::NotWav);
    }

    let fmt: [u8; 4] = read_field(reader, "fmt tag")?;
    if &fmt != b"fmt " {
        return Err(FormatError::NotWav);
    }

    let fmt_size = read_u32(reader, "fmt size")?;
    if fmt_size != 16 {
        debug!("fmt chunk size is {} (expected 16), continuing", fmt_size);
    }

    let encoding = read_u16(reader, "audio format")?;
    if encoding != FORMAT_PCM {
        return Err(FormatError::NotPcm(encoding));
    }

    let channel_count = read_u16(reader, "channel count")?;
    if channel_count != 1 {
        return Err(FormatError::NotMono(channel_count));
    }

    let sample_rate = read_u32(reader, "sample rate")?;
    if sample_rate != SUPPORTED_SAMPLE_RATE {
        return Err(FormatError::UnsupportedSampleRate(sample_rate));
    }

    let _byte_rate = read_u32(reader, "byte rate")?;
    let _block_align = read_u16(reader, "block align")?;

    let bits_per_sample = read_u16(reader, "bits per sample")?;
    if bits_per_sample != 16 {
        return Err(FormatError::Not16Bit(bits_per_sample));
    }

    let chunk: [u8; 4] = read_field(reader, "data tag")?;
    if chunk == [0, 0, b'L', b'I'] {
        let _: [u8; 2] = read_field(reader, "LIST realignment")?;
        debug!("skipping LIST chunk prefix");
    } else if &chunk != b"data" {
        return Err(FormatError::UnexpectedChunk(chunk));
    }

    let data_size = read_u32(reader, "data size")?;
    debug!("header ok: {} Hz, data size field {}", sample_rate, data_size);

    Ok(WavFormat {
        sample_rate,
        bits_per_sample,
        channel_count,
        encoding,
    })
}
