use std::io::{self, BufReader, Read};
use std::net::TcpStream;
use log::debug;

/// Connect to a TCP endpoint that streams raw WAV bytes
pub fn connect(addr: &str) -> io::Result<BufReader<TcpStream>> {
    let stream = TcpStream::connect(addr)?;
    debug!("connected to {}", stream.peer_addr()?);
    Ok(BufReader::new(stream))
}

/// Reader over a pipe fd owned by someone else.
///
/// Reads go through a duplicate of the descriptor, so dropping this leaves the
/// caller's fd open.
#[cfg(unix)]
pub struct BorrowedPipe {
    file: std::fs::File,
}

#[cfg(unix)]
impl BorrowedPipe {
    /// Fails if `fd` is not an open descriptor
    pub fn new(fd: i32) -> io::Result<Self> {
        use std::os::unix::io::BorrowedFd;

        if fd < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("invalid fd {}", fd)));
        }
        // SAFETY: the borrow only lives for the dup below. If `fd` is not open
        // the dup fails with EBADF and nothing is read through it.
        let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
        let owned = borrowed.try_clone_to_owned()?;
        debug!("reading from fd {} via duplicate", fd);
        Ok(Self {
            file: std::fs::File::from(owned),
        })
    }
}

#[cfg(unix)]
impl Read for BorrowedPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    #[test]
    fn test_tcp_source_delivers_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = std::thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(b"RIFF").unwrap();
        });

        let mut reader = connect(&addr).unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"RIFF");
        server.join().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_negative_fd_rejected() {
        assert!(BorrowedPipe::new(-1).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_closed_fd_rejected() {
        assert!(BorrowedPipe::new(1_000_000).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_borrowed_fd_left_open() {
        use std::io::{Seek, SeekFrom};
        use std::os::unix::io::AsRawFd;

        let path = std::env::temp_dir().join(format!("wav-fm-fd-{}.bin", std::process::id()));
        std::fs::write(&path, b"RIFFWAVE").unwrap();
        let mut file = std::fs::File::open(&path).unwrap();

        {
            let mut pipe = BorrowedPipe::new(file.as_raw_fd()).unwrap();
            let mut buf = [0u8; 4];
            pipe.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"RIFF");
        }

        // Original descriptor still usable after the reader is dropped
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut all = Vec::new();
        file.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"RIFFWAVE");

        std::fs::remove_file(&path).unwrap();
    }
}
