use std::io::{ErrorKind, Read};
use log::{debug, warn};

use crate::input::wav::sample_interval_nanos;
use crate::input::WavFormat;

/// Samples decoded per refill
pub const BATCH_SIZE: usize = 1024;

/// FM deviation at full-scale amplitude, in Hz
pub const EXCURSION_HZ: f64 = 6000.0;

/// Size of one encoded `FrequencySample`: f64 offset, u32 interval, 4 bytes padding
pub const RECORD_SIZE: usize = 16;

/// One output record: hold `frequency_offset_hz` for `sample_interval_nanos`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencySample {
    pub frequency_offset_hz: f64,
    pub sample_interval_nanos: u32,
}

impl FrequencySample {
    pub fn from_sample(sample: f32, sample_interval_nanos: u32) -> Self {
        Self {
            frequency_offset_hz: sample as f64 * EXCURSION_HZ * 2.0,
            sample_interval_nanos,
        }
    }

    /// Write the record into the first `RECORD_SIZE` bytes of `out`
    pub fn encode_into(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.frequency_offset_hz.to_le_bytes());
        out[8..12].copy_from_slice(&self.sample_interval_nanos.to_le_bytes());
        out[12..RECORD_SIZE].fill(0);
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < RECORD_SIZE {
            return None;
        }
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&bytes[0..8]);
        let mut interval = [0u8; 4];
        interval.copy_from_slice(&bytes[8..12]);
        Some(Self {
            frequency_offset_hz: f64::from_le_bytes(offset),
            sample_interval_nanos: u32::from_le_bytes(interval),
        })
    }
}

/// Decode one little-endian signed 16-bit sample.
/// Divides by 32768, so full negative scale is -1.0 and positive tops out just below 1.0.
pub fn decode_sample(bytes: [u8; 2]) -> f32 {
    i16::from_le_bytes(bytes) as f32 / 32768.0
}

/// Fixed-capacity batch of decoded samples with a read cursor.
/// Always `cursor <= filled <= BATCH_SIZE`.
pub struct SampleBuffer {
    samples: Box<[f32; BATCH_SIZE]>,
    raw: Box<[u8; BATCH_SIZE * 2]>,
    cursor: usize,
    filled: usize,
    errored: bool,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleBuffer {
    /// Empty buffer; the first pull triggers a refill
    pub fn new() -> Self {
        Self {
            samples: Box::new([0.0; BATCH_SIZE]),
            raw: Box::new([0; BATCH_SIZE * 2]),
            cursor: 0,
            filled: 0,
            errored: false,
        }
    }

    pub fn is_drained(&self) -> bool {
        self.cursor == self.filled
    }

    fn next(&mut self) -> Option<f32> {
        if self.is_drained() {
            return None;
        }
        let sample = self.samples[self.cursor];
        self.cursor += 1;
        Some(sample)
    }

    /// Replace the contents with up to `BATCH_SIZE` samples from `reader`.
    ///
    /// Reads until the batch is full or the reader reports end of stream. A read
    /// error ends the batch early and is remembered in `errored`; the stream
    /// offset is unknown after that, so it must not be read again. A dangling
    /// odd byte at the end is dropped. Returns the number of samples now available.
    fn refill_from<R: Read>(&mut self, reader: &mut R) -> usize {
        let mut total = 0;
        while total < self.raw.len() {
            match reader.read(&mut self.raw[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("read failed, treating as end of stream: {}", e);
                    self.errored = true;
                    break;
                }
            }
        }

        let count = total / 2;
        for (sample, bytes) in self.samples.iter_mut().zip(self.raw[..count * 2].chunks_exact(2)) {
            *sample = decode_sample([bytes[0], bytes[1]]);
        }
        self.filled = count;
        self.cursor = 0;
        count
    }
}

/// Pull-driven converter from 16-bit PCM to `FrequencySample` records.
///
/// Owns the decode buffer and the end-of-stream latch. Once the stream runs dry
/// every later `fill` returns 0.
pub struct FrequencyConverter<R> {
    reader: R,
    sample_rate: u32,
    buffer: SampleBuffer,
    finished: bool,
    samples_decoded: u64,
    records_emitted: u64,
}

impl<R: Read> FrequencyConverter<R> {
    /// `reader` must already be positioned at the first sample byte
    pub fn new(reader: R, format: &WavFormat) -> Self {
        Self::with_sample_rate(reader, format.sample_rate)
    }

    pub fn with_sample_rate(reader: R, sample_rate: u32) -> Self {
        Self {
            reader,
            sample_rate,
            buffer: SampleBuffer::new(),
            finished: false,
            samples_decoded: 0,
            records_emitted: 0,
        }
    }

    /// Fill `out` with as many whole records as fit. Returns bytes written.
    ///
    /// Never writes a partial record and never reads upstream when `out` cannot
    /// hold at least one record. Returns 0 once the stream is exhausted.
    pub fn fill(&mut self, out: &mut [u8]) -> usize {
        if self.finished {
            return 0;
        }

        let interval = sample_interval_nanos(self.sample_rate);
        let mut written = 0;

        while written + RECORD_SIZE <= out.len() {
            while written + RECORD_SIZE <= out.len() {
                let Some(x) = self.buffer.next() else {
                    break;
                };
                FrequencySample::from_sample(x, interval).encode_into(&mut out[written..]);
                written += RECORD_SIZE;
                self.records_emitted += 1;
            }

            if self.buffer.is_drained() && written + RECORD_SIZE <= out.len() {
                if self.buffer.errored {
                    debug!("stream errored after {} samples", self.samples_decoded);
                    self.finished = true;
                    break;
                }
                let count = self.buffer.refill_from(&mut self.reader);
                if count == 0 {
                    debug!("end of stream after {} samples", self.samples_decoded);
                    self.finished = true;
                    break;
                }
                self.samples_decoded += count as u64;
            }
        }

        written
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn samples_decoded(&self) -> u64 {
        self.samples_decoded
    }

    pub fn records_emitted(&self) -> u64 {
        self.records_emitted
    }

    /// Give the stream back to the caller
    #[cfg(test)]
    pub fn into_inner(self) -> R {
        self.reader
    }
}
