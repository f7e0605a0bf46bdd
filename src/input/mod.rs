pub mod wav;
pub mod stream;

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

pub use wav::{parse_header, FormatError, WavFormat};

/// Where the WAV bytes come from
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Path on disk, or `-` for stdin
    Path(PathBuf),
    /// Already-open pipe handed over by a parent process
    #[cfg(unix)]
    Fd(i32),
    /// TCP endpoint streaming the WAV bytes
    Tcp(String),
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Path(p) if p.as_os_str() == "-" => write!(f, "stdin"),
            Source::Path(p) => write!(f, "{}", p.display()),
            #[cfg(unix)]
            Source::Fd(fd) => write!(f, "fd {}", fd),
            Source::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// Open a source for strictly sequential reading
pub fn open_source(source: &Source) -> io::Result<Box<dyn Read>> {
    match source {
        Source::Path(path) if path.as_os_str() == "-" => Ok(Box::new(io::stdin().lock())),
        Source::Path(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
        #[cfg(unix)]
        Source::Fd(fd) => Ok(Box::new(stream::BorrowedPipe::new(*fd)?)),
        Source::Tcp(addr) => Ok(Box::new(stream::connect(addr)?)),
    }
}
