use thiserror::Error;

/// Decode-path failures only; `Codec::encode` is infallible on valid records
/// per the framing contract — anything that would make it fail is a
/// programming defect, not a `Result`.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("frame too short: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("unknown record kind {0}")]
    UnknownKind(u16),
}
