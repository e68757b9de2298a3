/// Wire-level tag for a record's frame header, per the `record_kind` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum RecordKind {
    ControlCommand = 1,
    LogEntry = 4,
    Watch = 5,
    ProcessFlow = 6,
    Header = 7,
    Stream = 8,
}

impl RecordKind {
    pub const fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            1 => Self::ControlCommand,
            4 => Self::LogEntry,
            5 => Self::Watch,
            6 => Self::ProcessFlow,
            7 => Self::Header,
            8 => Self::Stream,
            _ => return None,
        })
    }
}
