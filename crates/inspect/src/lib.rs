extern crate self as inspect;

pub use inspect_core as core;
pub use inspect_queue as queue;
pub use inspect_time as time;
pub use inspect_transport as transport;
pub use inspect_utils as utils;
pub use inspect_wire as wire;
pub use tracing;

pub use inspect_core::{Config, ConnectionState, CoreError, Observer, ProtocolCore, Stats};
pub use inspect_wire::{
    Color, ControlCommandRecord, HeaderRecord, LogEntryRecord, Payload, ProcessFlowRecord, Record,
    Severity, StreamRecord, WatchRecord,
};
