use std::{
    io::{Read, Write},
    net::TcpStream,
    os::unix::net::UnixStream,
    sync::mpsc,
    thread,
    time::Duration,
};

use tracing::debug;

use crate::{
    endpoint::Endpoint,
    error::TransportError,
    keepalive::enable_tcp_keepalive,
    stream::{read_banner_line, StreamHandle},
};

/// Idle probe delay applied to every connection after the handshake.
const DEFAULT_KEEPALIVE_IDLE_SECS: u32 = 30;
/// Per-frame acknowledgement the server sends back; the client reads and
/// discards it so the receive buffer never backs up and stalls writes.
const ACK_FRAME_SIZE: usize = 2;
/// Bound on how long `Drop` waits for the peer to EOF after a half-close,
/// for callers that let a `Transport` go out of scope instead of calling
/// `close` explicitly.
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected, handshake-complete endpoint. Write-only from the core's
/// perspective: a background thread continuously drains and discards the
/// server's 2-byte-per-frame acknowledgements so the kernel receive buffer
/// never fills and stalls outgoing writes.
pub struct Transport {
    stream: StreamHandle,
    ack_reader: Option<thread::JoinHandle<()>>,
}

impl Transport {
    /// Connects to `endpoint`, performs the banner handshake, and starts the
    /// ack-draining background reader. Returns the transport plus the
    /// server's banner line for observer reporting.
    pub fn connect(
        endpoint: &Endpoint,
        connect_timeout: Duration,
        client_banner: &str,
    ) -> Result<(Self, String), TransportError> {
        let mut stream = Self::open(endpoint, connect_timeout)?;

        stream.set_read_timeout(Some(connect_timeout))?;
        let server_banner = read_banner_line(&mut stream)?;
        stream.write_all(format!("{client_banner}\n").as_bytes())?;
        stream.flush()?;
        // No idle-read timeout after the handshake; keepalive governs
        // liveness detection from here on.
        stream.set_read_timeout(None)?;

        if let Some(tcp) = stream.as_tcp() {
            tcp.set_nodelay(true)?;
            enable_tcp_keepalive(tcp, DEFAULT_KEEPALIVE_IDLE_SECS);
        }

        let ack_reader = {
            let mut reader = stream.try_clone()?;
            Some(thread::spawn(move || drain_acks_forever(&mut reader)))
        };

        Ok((Self { stream, ack_reader }, server_banner))
    }

    fn open(endpoint: &Endpoint, connect_timeout: Duration) -> Result<StreamHandle, TransportError> {
        match endpoint {
            Endpoint::Tcp { host, port } => {
                use std::net::ToSocketAddrs;
                let addr = (host.as_str(), *port)
                    .to_socket_addrs()
                    .map_err(TransportError::Io)?
                    .next()
                    .ok_or_else(|| {
                        TransportError::Io(std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "host did not resolve to an address",
                        ))
                    })?;
                let tcp = TcpStream::connect_timeout(&addr, connect_timeout)
                    .map_err(|_| TransportError::ConnectTimeout(connect_timeout))?;
                Ok(StreamHandle::Tcp(tcp))
            }
            Endpoint::Unix { path } => {
                let unix = UnixStream::connect(path)?;
                Ok(StreamHandle::Unix(unix))
            }
        }
    }

    /// Writes one already-framed record to the wire. Frames MUST be written
    /// whole and in submission order; the caller is responsible for
    /// serializing via `inspect_wire::Codec` first.
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(frame)?;
        Ok(())
    }

    /// Two-phase close: half-close the write side, then wait up to
    /// `peer_eof_timeout` for the peer to notice and close its own side
    /// (observed via the ack-draining thread hitting EOF), before forcing
    /// both directions down. A peer that never reacts to the half-close
    /// gets the forceful `shutdown(Both)` once the timeout elapses.
    pub fn close(&mut self, peer_eof_timeout: Duration) {
        self.stream.shutdown_write();

        if let Some(handle) = self.ack_reader.take() {
            let (tx, rx) = mpsc::channel();
            thread::spawn(move || {
                let _ = handle.join();
                let _ = tx.send(());
            });
            if rx.recv_timeout(peer_eof_timeout).is_err() {
                debug!(?peer_eof_timeout, "transport: peer did not EOF after half-close in time");
            }
        }

        self.stream.shutdown();
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close(DEFAULT_CLOSE_TIMEOUT);
    }
}

fn drain_acks_forever(reader: &mut StreamHandle) {
    let mut buf = [0u8; ACK_FRAME_SIZE * 32];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                debug!("transport: ack stream closed");
                return;
            }
            Ok(_) => {}
            Err(err) => {
                debug!(?err, "transport: ack read failed, stopping drain");
                return;
            }
        }
    }
}
