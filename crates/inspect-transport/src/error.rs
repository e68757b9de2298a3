use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),
    #[error("handshake malformed: {0}")]
    HandshakeMalformed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
