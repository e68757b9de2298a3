use crate::{
    error::CodecError,
    kind::RecordKind,
    record::{
        ControlCommandRecord, HeaderRecord, LogEntryRecord, Payload, ProcessFlowRecord, Record,
        StreamRecord, WatchRecord,
    },
};

/// UTF-8 byte-order mark prepended to textual viewer-context payloads.
pub const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// `kind(u16 LE) | body_len(u32 LE)`.
pub const FRAME_HEADER_SIZE: usize = 2 + 4;

/// Conservative per-record overhead used only for queue accounting;
/// unrelated to the actual wire size.
const ESTIMATE_BASE: usize = 64;

/// Serializes records into length-prefixed wire frames and estimates their
/// in-memory queue cost. Encoding is infallible on valid records: the only
/// way `encode` could fail is a programming defect, so it returns `Vec<u8>`
/// directly rather than a `Result`.
pub struct Codec;

impl Codec {
    /// Encodes `record` into a self-delimited frame:
    /// `kind(u16 LE) | body_len(u32 LE) | body`.
    pub fn encode(record: &Record) -> Vec<u8> {
        let mut body = Vec::new();
        Self::encode_body(record, &mut body);

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
        frame.extend_from_slice(&(record.kind() as u16).to_le_bytes());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(&body);
        frame
    }

    fn encode_body(record: &Record, out: &mut Vec<u8>) {
        match record {
            Record::Header(h) => Self::encode_header(h, out),
            Record::LogEntry(e) => Self::encode_log_entry(e, out),
            Record::Watch(w) => Self::encode_watch(w, out),
            Record::ProcessFlow(p) => Self::encode_process_flow(p, out),
            Record::ControlCommand(c) => Self::encode_control_command(c, out),
            Record::Stream(s) => Self::encode_stream(s, out),
        }
    }

    /// `u32 content_len | bytes content`.
    fn encode_header(h: &HeaderRecord, out: &mut Vec<u8>) {
        let content = h.content();
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());
        out.extend_from_slice(content.as_bytes());
    }

    /// `u32 log_entry_type | u32 viewer_id | u32 app_len | u32 session_len |
    /// u32 title_len | u32 host_len | u32 data_len | u32 pid | u32 tid |
    /// f64 timestamp | u32 color_argb | [app] [session] [title] [host] [data]`.
    fn encode_log_entry(e: &LogEntryRecord, out: &mut Vec<u8>) {
        let data_len = e.data.byte_len();
        out.extend_from_slice(&e.log_entry_type.to_le_bytes());
        out.extend_from_slice(&e.viewer_id.to_le_bytes());
        out.extend_from_slice(&(e.app_name.len() as u32).to_le_bytes());
        out.extend_from_slice(&(e.session_name.len() as u32).to_le_bytes());
        out.extend_from_slice(&(e.title.len() as u32).to_le_bytes());
        out.extend_from_slice(&(e.host_name.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data_len as u32).to_le_bytes());
        out.extend_from_slice(&e.pid.to_le_bytes());
        out.extend_from_slice(&e.tid.to_le_bytes());
        out.extend_from_slice(&e.timestamp_ole.to_le_bytes());
        out.extend_from_slice(&e.color.to_argb_le().to_le_bytes());
        out.extend_from_slice(e.app_name.as_bytes());
        out.extend_from_slice(e.session_name.as_bytes());
        out.extend_from_slice(e.title.as_bytes());
        out.extend_from_slice(e.host_name.as_bytes());
        Self::encode_payload(&e.data, out);
    }

    /// `u32 name_len | u32 value_len | u32 watch_type | f64 timestamp |
    /// [name] [value]`.
    fn encode_watch(w: &WatchRecord, out: &mut Vec<u8>) {
        out.extend_from_slice(&(w.name.len() as u32).to_le_bytes());
        out.extend_from_slice(&(w.value.len() as u32).to_le_bytes());
        out.extend_from_slice(&w.watch_type.to_le_bytes());
        out.extend_from_slice(&w.timestamp_ole.to_le_bytes());
        out.extend_from_slice(w.name.as_bytes());
        out.extend_from_slice(w.value.as_bytes());
    }

    /// `u32 process_flow_type | u32 title_len | u32 host_len | u32 pid |
    /// u32 tid | f64 timestamp | [title] [host]`.
    fn encode_process_flow(p: &ProcessFlowRecord, out: &mut Vec<u8>) {
        out.extend_from_slice(&p.process_flow_type.to_le_bytes());
        out.extend_from_slice(&(p.title.len() as u32).to_le_bytes());
        out.extend_from_slice(&(p.host_name.len() as u32).to_le_bytes());
        out.extend_from_slice(&p.pid.to_le_bytes());
        out.extend_from_slice(&p.tid.to_le_bytes());
        out.extend_from_slice(&p.timestamp_ole.to_le_bytes());
        out.extend_from_slice(p.title.as_bytes());
        out.extend_from_slice(p.host_name.as_bytes());
    }

    /// `u32 control_command_type | u32 data_len | [data]`.
    fn encode_control_command(c: &ControlCommandRecord, out: &mut Vec<u8>) {
        out.extend_from_slice(&c.control_command_type.to_le_bytes());
        out.extend_from_slice(&(c.data.byte_len() as u32).to_le_bytes());
        Self::encode_payload(&c.data, out);
    }

    /// `u32 channel_len | u32 data_len | u32 type_len | f64 timestamp |
    /// [channel] [data] [type]`.
    fn encode_stream(s: &StreamRecord, out: &mut Vec<u8>) {
        out.extend_from_slice(&(s.channel.len() as u32).to_le_bytes());
        out.extend_from_slice(&(s.data.byte_len() as u32).to_le_bytes());
        out.extend_from_slice(&(s.type_name.len() as u32).to_le_bytes());
        out.extend_from_slice(&s.timestamp_ole.to_le_bytes());
        out.extend_from_slice(s.channel.as_bytes());
        Self::encode_payload(&s.data, out);
        out.extend_from_slice(s.type_name.as_bytes());
    }

    fn encode_payload(payload: &Payload, out: &mut Vec<u8>) {
        match payload {
            Payload::Text(text) => {
                out.extend_from_slice(BOM);
                out.extend_from_slice(text.as_bytes());
            }
            Payload::Binary(bytes) => out.extend_from_slice(bytes),
        }
    }

    /// Conservative in-memory cost estimate for queue accounting. Does not
    /// need to match the wire size.
    pub fn estimate_size(record: &Record) -> usize {
        ESTIMATE_BASE
            + match record {
                Record::Header(h) => h.content().len(),
                Record::LogEntry(e) => {
                    e.title.len()
                        + e.app_name.len()
                        + e.session_name.len()
                        + e.host_name.len()
                        + e.data.byte_len()
                }
                Record::Watch(w) => w.name.len() + w.value.len(),
                Record::ProcessFlow(p) => p.title.len() + p.host_name.len(),
                Record::ControlCommand(c) => c.data.byte_len(),
                Record::Stream(s) => s.channel.len() + s.type_name.len() + s.data.byte_len(),
            }
    }

    /// Parses the 6-byte frame header. Used by test harnesses and tooling
    /// that need to read frames back off the wire; the production write path
    /// never decodes its own output.
    pub fn decode_frame_header(buf: &[u8]) -> Result<(RecordKind, u32), CodecError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(CodecError::Truncated { need: FRAME_HEADER_SIZE, have: buf.len() });
        }
        let kind_raw = u16::from_le_bytes([buf[0], buf[1]]);
        let kind = RecordKind::from_u16(kind_raw).ok_or(CodecError::UnknownKind(kind_raw))?;
        let body_len = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]);
        Ok((kind, body_len))
    }
}
