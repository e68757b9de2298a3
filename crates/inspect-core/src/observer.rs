use crate::error::CoreError;

/// Out-of-band telemetry surface. Every hook has a default no-op body, so a
/// caller that never registers an observer gets "silently swallow" for
/// free rather than "crash the host."
pub trait Observer: Send + Sync {
    fn on_connect(&self, _server_banner: &str) {}
    fn on_disconnect(&self) {}
    fn on_error(&self, _error: &CoreError) {}
    fn on_packet_dropped(&self, _count: usize) {}
}
