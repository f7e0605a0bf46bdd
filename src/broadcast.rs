use std::io::{self, Read};
use std::time::Duration;
use log::{info, warn};
use thiserror::Error;

use crate::converter::FrequencyConverter;
use crate::input::{parse_header, FormatError};

/// Signals the RF engine is told to ignore while it runs (it forks internally)
pub const DEFAULT_IGNORED_SIGNALS: [&str; 4] = ["SIGALRM", "SIGVTALRM", "SIGCHLD", "SIGWINCH"];

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("WAV output error: {0}")]
    Wav(#[from] hound::Error),

    #[error("invalid carrier frequency: {0} MHz")]
    InvalidFrequency(f64),
}

/// Pull side of the engine contract: fill `out` with whole records, 0 once exhausted
pub trait SampleSource {
    fn pull(&mut self, out: &mut [u8]) -> usize;
}

impl<R: Read> SampleSource for FrequencyConverter<R> {
    fn pull(&mut self, out: &mut [u8]) -> usize {
        self.fill(out)
    }
}

/// Settings handed through to the RF engine
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastConfig {
    pub frequency_mhz: f64,
    pub sample_rate: u32,
    pub ignored_signals: Vec<String>,
}

impl BroadcastConfig {
    pub fn new(frequency_mhz: f64, sample_rate: u32, ignored_signals: Vec<String>) -> Result<Self, BroadcastError> {
        if !frequency_mhz.is_finite() || frequency_mhz <= 0.0 {
            return Err(BroadcastError::InvalidFrequency(frequency_mhz));
        }
        Ok(Self {
            frequency_mhz,
            sample_rate,
            ignored_signals,
        })
    }

    /// Carrier in kHz, the unit the RF engine takes
    pub fn carrier_khz(&self) -> f64 {
        self.frequency_mhz * 1000.0
    }
}

/// What an engine did with the stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    pub records: u64,
    pub bytes: u64,
    pub duration: Duration,
}

/// Consumer of frequency records. Calls `source.pull` until it returns 0.
pub trait RfEngine {
    fn run(&mut self, config: &BroadcastConfig, source: &mut dyn SampleSource) -> Result<EngineStats, BroadcastError>;
}

/// Validate the WAV header on `stream`, then feed its samples to `engine`.
///
/// Header problems are reported before the engine sees anything.
pub fn broadcast_fm<R: Read, E: RfEngine + ?Sized>(
    mut stream: R,
    frequency_mhz: f64,
    ignored_signals: Vec<String>,
    engine: &mut E,
) -> Result<EngineStats, BroadcastError> {
    let format = parse_header(&mut stream)?;
    let config = BroadcastConfig::new(frequency_mhz, format.sample_rate, ignored_signals)?;

    info!(
        "Broadcasting on {:.3} MHz ({} Hz mono, {} bytes/s, {} ns per sample)",
        config.frequency_mhz,
        format.sample_rate,
        format.byte_rate(),
        format.sample_interval_nanos()
    );

    let mut converter = FrequencyConverter::new(stream, &format);
    let stats = engine.run(&config, &mut converter)?;

    if !converter.is_finished() {
        warn!("engine stopped before the stream was exhausted");
    }
    info!(
        "Stream finished: {} samples decoded, {} records ({:.2}s of audio)",
        converter.samples_decoded(),
        converter.records_emitted(),
        stats.duration.as_secs_f64()
    );
    Ok(stats)
}
