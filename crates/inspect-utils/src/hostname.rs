use std::ffi::CStr;

/// Reads the local machine's hostname via `gethostname(2)`, falling back to
/// `"unknown-host"` if the syscall fails or returns non-UTF-8 bytes.
pub fn local_hostname() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: `buf` is a valid, writable buffer of the given length; gethostname
    // writes at most `buf.len()` bytes and null-terminates on success.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return "unknown-host".to_owned();
    }
    CStr::from_bytes_until_nul(&buf)
        .ok()
        .and_then(|c| c.to_str().ok())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| "unknown-host".to_owned())
}
