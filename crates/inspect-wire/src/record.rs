use crate::{color::Color, kind::RecordKind};

/// A viewer-context data payload. Textual payloads (list viewers, text
/// viewers, watch values rendered as tables, ...) are prefixed on the wire
/// with a UTF-8 BOM so the console can tell them apart from raw binary
/// payloads (images, hex dumps) without inspecting the record's sub-type.
#[derive(Clone, Debug)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Text(s) => crate::codec::BOM.len() + s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    pub fn as_bytes_cow(&self) -> Vec<u8> {
        match self {
            Self::Text(s) => {
                let mut v = Vec::with_capacity(crate::codec::BOM.len() + s.len());
                v.extend_from_slice(crate::codec::BOM);
                v.extend_from_slice(s.as_bytes());
                v
            }
            Self::Binary(b) => b.clone(),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::Binary(Vec::new())
    }
}

/// LogEntry severity. Used by no core transport logic except the optional
/// "flush-on-level" extension (see `Config::with_flush_on_level`); ordering
/// follows ascending severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Severity {
    Debug = 0,
    Verbose = 1,
    Message = 2,
    Warning = 3,
    Error = 4,
    Fatal = 5,
    Control = 6,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Message
    }
}

#[derive(Clone, Debug, Default)]
pub struct HeaderRecord {
    pub hostname: String,
    pub appname: String,
    pub room: String,
    pub extra: Vec<(String, String)>,
}

impl HeaderRecord {
    /// Builds the `key=value\r\n` content block. `hostname`, `appname`, and
    /// `room` are always emitted first, in that order.
    pub fn content(&self) -> String {
        let mut s = String::new();
        s.push_str("hostname=");
        s.push_str(&self.hostname);
        s.push_str("\r\n");
        s.push_str("appname=");
        s.push_str(&self.appname);
        s.push_str("\r\n");
        s.push_str("room=");
        s.push_str(&self.room);
        s.push_str("\r\n");
        for (k, v) in &self.extra {
            s.push_str(k);
            s.push('=');
            s.push_str(v);
            s.push_str("\r\n");
        }
        s
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogEntryRecord {
    pub log_entry_type: u32,
    pub viewer_id: u32,
    pub app_name: String,
    pub session_name: String,
    pub title: String,
    pub host_name: String,
    pub data: Payload,
    pub pid: u32,
    pub tid: u32,
    pub timestamp_ole: f64,
    pub color: Color,
    pub level: Severity,
}

#[derive(Clone, Debug, Default)]
pub struct WatchRecord {
    pub name: String,
    pub value: String,
    pub watch_type: u32,
    pub timestamp_ole: f64,
}

#[derive(Clone, Debug, Default)]
pub struct ProcessFlowRecord {
    pub process_flow_type: u32,
    pub title: String,
    pub host_name: String,
    pub pid: u32,
    pub tid: u32,
    pub timestamp_ole: f64,
}

#[derive(Clone, Debug, Default)]
pub struct ControlCommandRecord {
    pub control_command_type: u32,
    pub data: Payload,
}

#[derive(Clone, Debug, Default)]
pub struct StreamRecord {
    pub channel: String,
    pub data: Payload,
    pub type_name: String,
    pub timestamp_ole: f64,
}

/// A tagged record ready for framing. Every variant carries its own body
/// layout, documented alongside `Codec::encode`.
#[derive(Clone, Debug)]
pub enum Record {
    Header(HeaderRecord),
    LogEntry(LogEntryRecord),
    Watch(WatchRecord),
    ProcessFlow(ProcessFlowRecord),
    ControlCommand(ControlCommandRecord),
    Stream(StreamRecord),
}

impl Record {
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Header(_) => RecordKind::Header,
            Self::LogEntry(_) => RecordKind::LogEntry,
            Self::Watch(_) => RecordKind::Watch,
            Self::ProcessFlow(_) => RecordKind::ProcessFlow,
            Self::ControlCommand(_) => RecordKind::ControlCommand,
            Self::Stream(_) => RecordKind::Stream,
        }
    }

    /// `Some(level)` only for `LogEntry`; every other kind always flushes
    /// regardless of a configured flush-on-level threshold.
    pub const fn severity(&self) -> Option<Severity> {
        match self {
            Self::LogEntry(e) => Some(e.level),
            _ => None,
        }
    }
}
