use std::{
    io::{self, Read, Write},
    net::TcpStream,
    os::unix::net::UnixStream,
};

use crate::error::TransportError;

/// A banner line longer than this without a terminating `\n` is treated as a
/// malformed handshake rather than read forever.
const MAX_BANNER_LEN: usize = 4096;

/// The two concrete stream kinds a `Transport` can wrap. Both support
/// everything the handshake and frame-write path need; the enum exists so
/// `Transport` doesn't need to be generic over the stream type.
pub(crate) enum StreamHandle {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl StreamHandle {
    pub(crate) fn try_clone(&self) -> io::Result<Self> {
        Ok(match self {
            Self::Tcp(s) => Self::Tcp(s.try_clone()?),
            Self::Unix(s) => Self::Unix(s.try_clone()?),
        })
    }

    pub(crate) fn set_read_timeout(&self, dur: Option<std::time::Duration>) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.set_read_timeout(dur),
            Self::Unix(s) => s.set_read_timeout(dur),
        }
    }

    /// Half-close: no more bytes will be written, but the read side (acks)
    /// stays open so the peer's EOF is still observable.
    pub(crate) fn shutdown_write(&self) {
        let _ = match self {
            Self::Tcp(s) => s.shutdown(std::net::Shutdown::Write),
            Self::Unix(s) => s.shutdown(std::net::Shutdown::Write),
        };
    }

    pub(crate) fn shutdown(&self) {
        let _ = match self {
            Self::Tcp(s) => s.shutdown(std::net::Shutdown::Both),
            Self::Unix(s) => s.shutdown(std::net::Shutdown::Both),
        };
    }

    pub(crate) fn as_tcp(&self) -> Option<&TcpStream> {
        match self {
            Self::Tcp(s) => Some(s),
            Self::Unix(_) => None,
        }
    }
}

impl Read for StreamHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.read(buf),
            Self::Unix(s) => s.read(buf),
        }
    }
}

impl Write for StreamHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(s) => s.write(buf),
            Self::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(s) => s.flush(),
            Self::Unix(s) => s.flush(),
        }
    }
}

/// Reads a single `\n`-terminated line from `stream`, returning the line
/// without the trailing LF (or CRLF). Used for both the server and client
/// banners, which are always single ASCII lines.
///
/// A peer that never sends `\n`, sends a line over `MAX_BANNER_LEN`, or sends
/// non-UTF-8 bytes has a malformed handshake rather than a transient I/O
/// fault, so those cases report `HandshakeMalformed` instead of `Io`.
pub(crate) fn read_banner_line(stream: &mut impl Read) -> Result<String, TransportError> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte)?;
        if n == 0 {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed during banner",
            )));
        }
        if byte[0] == b'\n' {
            break;
        }
        if line.len() >= MAX_BANNER_LEN {
            return Err(TransportError::HandshakeMalformed(format!(
                "banner exceeds {MAX_BANNER_LEN} bytes without a terminating newline"
            )));
        }
        line.push(byte[0]);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line).map_err(|e| {
        TransportError::HandshakeMalformed(format!("banner is not valid UTF-8: {e}"))
    })
}
