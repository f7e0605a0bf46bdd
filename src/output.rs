use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{Seek, Write};
use std::time::Duration;
use chrono::{DateTime, Local};
use log::debug;

use crate::broadcast::{BroadcastConfig, BroadcastError, EngineStats, RfEngine, SampleSource};
use crate::converter::{FrequencySample, EXCURSION_HZ, RECORD_SIZE};

/// Bytes requested per pull. Deliberately not a multiple of the converter batch.
pub const PULL_CHUNK_BYTES: usize = 4096;

/// Pull until the source is exhausted, handing each chunk to `sink`
fn pump<F>(source: &mut dyn SampleSource, mut sink: F) -> Result<EngineStats, BroadcastError>
where
    F: FnMut(&[u8]) -> Result<(), BroadcastError>,
{
    let mut buffer = vec![0u8; PULL_CHUNK_BYTES];
    let mut stats = EngineStats::default();
    let mut nanos: u64 = 0;

    loop {
        let n = source.pull(&mut buffer);
        if n == 0 {
            break;
        }
        let chunk = &buffer[..n];
        nanos += chunk
            .chunks_exact(RECORD_SIZE)
            .filter_map(FrequencySample::decode)
            .map(|r| r.sample_interval_nanos as u64)
            .sum::<u64>();
        sink(chunk)?;
        stats.records += (n / RECORD_SIZE) as u64;
        stats.bytes += n as u64;
    }

    stats.duration = Duration::from_nanos(nanos);
    Ok(stats)
}

/// Writes records verbatim, in the raw format an RF engine replays
pub struct RecordFileEngine<W> {
    sink: W,
}

impl<W: Write> RecordFileEngine<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write> RfEngine for RecordFileEngine<W> {
    fn run(&mut self, config: &BroadcastConfig, source: &mut dyn SampleSource) -> Result<EngineStats, BroadcastError> {
        debug!(
            "record file engine: carrier {} kHz, ignoring {:?}",
            config.carrier_khz(),
            config.ignored_signals
        );
        let sink = &mut self.sink;
        let stats = pump(source, |chunk| sink.write_all(chunk).map_err(BroadcastError::from))?;
        self.sink.flush()?;
        Ok(stats)
    }
}

/// Renders the deviation as a mono float32 WAV, 1.0 being full-scale deviation
pub struct PreviewEngine<W> {
    sink: W,
}

impl<W: Write + Seek> PreviewEngine<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write + Seek> RfEngine for PreviewEngine<W> {
    fn run(&mut self, config: &BroadcastConfig, source: &mut dyn SampleSource) -> Result<EngineStats, BroadcastError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: config.sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let full_scale = EXCURSION_HZ * 2.0;

        let mut writer = WavWriter::new(&mut self.sink, spec)?;
        let stats = pump(source, |chunk| {
            for record in chunk.chunks_exact(RECORD_SIZE).filter_map(FrequencySample::decode) {
                writer.write_sample((record.frequency_offset_hz / full_scale) as f32)?;
            }
            Ok(())
        })?;
        writer.finalize()?;
        Ok(stats)
    }
}

/// Generate an output filename for a broadcast capture
pub fn generate_filename(prefix: &str, frequency_mhz: f64, base_time: DateTime<Local>, extension: &str) -> String {
    format!(
        "{}_{:.1}MHz_{}.{}",
        prefix,
        frequency_mhz,
        base_time.format("%Y-%m-%d_%H-%M-%S"),
        extension
    )
}
