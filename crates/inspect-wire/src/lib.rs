mod codec;
mod color;
mod error;
mod kind;
mod record;

pub use codec::{Codec, BOM, FRAME_HEADER_SIZE};
pub use color::Color;
pub use error::CodecError;
pub use kind::RecordKind;
pub use record::{
    ControlCommandRecord, HeaderRecord, LogEntryRecord, Payload, ProcessFlowRecord, Record,
    Severity, StreamRecord, WatchRecord,
};
