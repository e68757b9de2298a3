use std::{path::PathBuf, time::Duration};

use inspect_transport::Endpoint;
use inspect_wire::Severity;

use crate::error::ConfigError;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 4228;
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
const DEFAULT_APP_NAME: &str = "App";
const DEFAULT_ROOM: &str = "default";
const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3_000);
const DEFAULT_QUEUE_BYTES: usize = 2048 * 1024;

/// Structured configuration surface (§6.2). Connection-string parsing
/// (`protocol(key=value,...)`) is an explicit non-goal; only this builder
/// form exists.
#[derive(Clone, Debug)]
pub struct Config {
    host: String,
    port: u16,
    pipe: Option<String>,
    pipe_path: Option<PathBuf>,
    timeout: Duration,
    app_name: String,
    host_name: String,
    room: String,
    reconnect: bool,
    reconnect_interval: Duration,
    backlog_enabled: bool,
    backlog_queue_bytes: usize,
    backlog_keep_open: bool,
    async_enabled: bool,
    async_queue_bytes: usize,
    async_throttle: bool,
    async_clear_on_disconnect: bool,
    flush_on_level: Option<Severity>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            pipe: None,
            pipe_path: None,
            timeout: DEFAULT_TIMEOUT,
            app_name: DEFAULT_APP_NAME.to_owned(),
            host_name: inspect_utils::local_hostname(),
            room: DEFAULT_ROOM.to_owned(),
            reconnect: true,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            backlog_enabled: true,
            backlog_queue_bytes: DEFAULT_QUEUE_BYTES,
            backlog_keep_open: true,
            async_enabled: false,
            async_queue_bytes: DEFAULT_QUEUE_BYTES,
            async_throttle: false,
            async_clear_on_disconnect: false,
            flush_on_level: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_pipe(mut self, name: impl Into<String>) -> Self {
        self.pipe = Some(name.into());
        self
    }

    pub fn with_pipe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pipe_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = room.into();
        self
    }

    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_backlog_enabled(mut self, enabled: bool) -> Self {
        self.backlog_enabled = enabled;
        self
    }

    pub fn with_backlog_queue_bytes(mut self, bytes: usize) -> Self {
        self.backlog_queue_bytes = bytes;
        self
    }

    pub fn with_backlog_keep_open(mut self, keep_open: bool) -> Self {
        self.backlog_keep_open = keep_open;
        self
    }

    pub fn with_async_enabled(mut self, enabled: bool) -> Self {
        self.async_enabled = enabled;
        self
    }

    pub fn with_async_queue_bytes(mut self, bytes: usize) -> Self {
        self.async_queue_bytes = bytes;
        self
    }

    pub fn with_async_throttle(mut self, throttle: bool) -> Self {
        self.async_throttle = throttle;
        self
    }

    pub fn with_async_clear_on_disconnect(mut self, clear: bool) -> Self {
        self.async_clear_on_disconnect = clear;
        self
    }

    /// Opt-in extension (§9 Open Question); defaults to `None` ("off") so
    /// the normative state-based flush-on-(re)connect is what runs unless a
    /// caller explicitly asks for the level-triggered variant too.
    pub fn with_flush_on_level(mut self, level: Severity) -> Self {
        self.flush_on_level = Some(level);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconnect && self.reconnect_interval.is_zero() {
            return Err(ConfigError::ZeroReconnectInterval);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// `keep_open := !backlog.enabled || backlog.keep_open`.
    pub fn derive_keep_open(&self) -> bool {
        !self.backlog_enabled || self.backlog_keep_open
    }

    pub fn endpoint(&self) -> Endpoint {
        if let Some(path) = &self.pipe_path {
            return Endpoint::Unix { path: path.clone() };
        }
        if let Some(name) = &self.pipe {
            return Endpoint::Unix { path: PathBuf::from("/tmp").join(name) };
        }
        Endpoint::Tcp { host: self.host.clone(), port: self.port }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn reconnect(&self) -> bool {
        self.reconnect
    }

    pub fn reconnect_interval(&self) -> Duration {
        self.reconnect_interval
    }

    pub fn backlog_enabled(&self) -> bool {
        self.backlog_enabled
    }

    pub fn backlog_queue_bytes(&self) -> usize {
        self.backlog_queue_bytes
    }

    pub fn async_enabled(&self) -> bool {
        self.async_enabled
    }

    pub fn async_queue_bytes(&self) -> usize {
        self.async_queue_bytes
    }

    pub fn async_throttle(&self) -> bool {
        self.async_throttle
    }

    pub fn async_clear_on_disconnect(&self) -> bool {
        self.async_clear_on_disconnect
    }

    pub fn flush_on_level(&self) -> Option<Severity> {
        self.flush_on_level
    }
}

#[cfg(test)]
mod test {
    use super::Config;

    #[test]
    fn derive_keep_open_follows_truth_table() {
        assert!(Config::new().with_backlog_enabled(false).derive_keep_open());
        assert!(Config::new().with_backlog_enabled(true).with_backlog_keep_open(true).derive_keep_open());
        assert!(!Config::new().with_backlog_enabled(true).with_backlog_keep_open(false).derive_keep_open());
    }

    #[test]
    fn defaults_match_option_table() {
        let cfg = Config::new();
        assert_eq!(cfg.port, 4228);
        assert_eq!(cfg.host, "127.0.0.1");
        assert!(cfg.reconnect);
        assert!(cfg.backlog_enabled);
        assert!(cfg.backlog_keep_open);
        assert!(!cfg.async_enabled);
    }
}
