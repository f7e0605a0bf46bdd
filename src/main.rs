use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use chrono::Local;
use log::info;

mod broadcast;
mod converter;
mod input;
mod output;

use broadcast::{broadcast_fm, RfEngine, DEFAULT_IGNORED_SIGNALS};
use input::Source;
use output::{generate_filename, PreviewEngine, RecordFileEngine};

/// Convert a mono 48kHz 16-bit WAV stream into FM frequency samples
#[derive(Parser, Debug)]
#[command(name = "wav-fm")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input WAV file, or - for stdin
    #[arg(value_name = "INPUT")]
    input_file: Option<PathBuf>,

    /// Read from an already-open pipe file descriptor (unix only)
    #[arg(long, value_name = "FD")]
    fd: Option<i32>,

    /// Read the WAV from a TCP stream
    #[arg(short, long, value_name = "HOST:PORT")]
    stream: Option<String>,

    /// Carrier frequency in MHz
    #[arg(short, long, default_value = "103.3")]
    frequency: f64,

    /// Signal the RF engine should ignore while running (repeatable)
    #[arg(long = "ignore-signal", value_name = "SIGNAL", default_values_t = DEFAULT_IGNORED_SIGNALS.map(String::from))]
    ignored_signals: Vec<String>,

    /// Output directory for record files and previews
    #[arg(short, long, default_value = "./broadcasts")]
    output_dir: PathBuf,

    /// Write a float32 WAV of the deviation instead of the raw record file
    #[arg(long)]
    preview: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// The single input source, if exactly one was given
    fn source(&self) -> Result<Source, &'static str> {
        let mut sources = Vec::new();
        if let Some(path) = &self.input_file {
            sources.push(Source::Path(path.clone()));
        }
        if let Some(fd) = self.fd {
            #[cfg(unix)]
            sources.push(Source::Fd(fd));
            #[cfg(not(unix))]
            {
                let _ = fd;
                return Err("--fd is only supported on unix");
            }
        }
        if let Some(addr) = &self.stream {
            sources.push(Source::Tcp(addr.clone()));
        }

        match sources.len() {
            0 => Err("Must specify an input file, --fd or --stream <host:port>"),
            1 => Ok(sources.remove(0)),
            _ => Err("Specify only one of input file, --fd and --stream"),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let source = match args.source() {
        Ok(source) => source,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            std::process::exit(1);
        }
    };

    std::fs::create_dir_all(&args.output_dir)?;

    let extension = if args.preview { "wav" } else { "rf" };
    let filename = generate_filename("broadcast", args.frequency, Local::now(), extension);
    let output_path = args.output_dir.join(&filename);

    info!("Reading WAV from {}", source);
    let reader = input::open_source(&source)?;
    let sink = BufWriter::new(File::create(&output_path)?);

    let mut engine: Box<dyn RfEngine> = if args.preview {
        Box::new(PreviewEngine::new(sink))
    } else {
        Box::new(RecordFileEngine::new(sink))
    };

    let result = broadcast_fm(reader, args.frequency, args.ignored_signals.clone(), engine.as_mut());
    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            drop(engine);
            let _ = std::fs::remove_file(&output_path);
            return Err(e.into());
        }
    };

    println!(
        "Wrote {} records ({:.2}s) to {}",
        stats.records,
        stats.duration.as_secs_f64(),
        output_path.display()
    );

    Ok(())
}
