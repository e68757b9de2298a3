mod endpoint;
mod error;
mod keepalive;
mod stream;
mod transport;

pub use endpoint::Endpoint;
pub use error::TransportError;
pub use transport::Transport;
