use thiserror::Error;

use inspect_transport::TransportError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reconnect_interval must be > 0 when reconnect is enabled")]
    ZeroReconnectInterval,
    #[error("timeout must be > 0")]
    ZeroTimeout,
}

/// Errors surfaced to an `Observer`, never returned from `submit`/`connect`.
/// Transient transport faults are absorbed by `ProtocolCore` per the
/// propagation policy; only this observer-facing channel reports them.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("connect failed: {0}")]
    Connect(#[source] TransportError),
    #[error("write failed: {0}")]
    Write(#[source] TransportError),
}
