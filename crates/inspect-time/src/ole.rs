use std::time::{SystemTime, UNIX_EPOCH};

/// Days between the OLE Automation epoch (1899-12-30) and the Unix epoch
/// (1970-01-01).
const OLE_EPOCH_OFFSET_DAYS: f64 = 25569.0;
const MS_PER_DAY: f64 = 86_400_000.0;

/// Converts milliseconds since the Unix epoch to an OLE Automation date, the
/// `f64` day-count timestamp format used by the wire protocol's record
/// headers.
#[inline]
pub fn ms_since_unix_epoch_to_ole(ms: i64) -> f64 {
    ms as f64 / MS_PER_DAY + OLE_EPOCH_OFFSET_DAYS
}

/// Convenience wrapper around [`ms_since_unix_epoch_to_ole`] that reads the
/// current wall-clock time.
pub fn now_as_ole() -> f64 {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    ms_since_unix_epoch_to_ole(ms)
}

#[cfg(test)]
mod test {
    use super::ms_since_unix_epoch_to_ole;

    #[test]
    fn known_timestamp_converts_exactly() {
        // 2024-01-01T00:00:00Z
        let ole = ms_since_unix_epoch_to_ole(1_704_067_200_000);
        assert!((ole - 45292.0).abs() < 1e-9, "got {ole}");
    }
}
