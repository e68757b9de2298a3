use std::path::PathBuf;

/// Where to open the stream connection. `Unix` covers both a named
/// domain-socket path and the platform's "named pipe" concept, which on
/// Unix is the same kernel object.
#[derive(Clone, Debug)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Unix { path: PathBuf },
}
