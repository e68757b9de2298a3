use std::os::fd::AsRawFd;

/// Enables `SO_KEEPALIVE` and sets the idle probe delay. There is no
/// idle-read timeout after the handshake; OS-level keepalive is what detects
/// a dead peer.
pub fn enable_tcp_keepalive(stream: &std::net::TcpStream, idle_secs: u32) {
    let fd = stream.as_raw_fd();
    let enable: libc::c_int = 1;
    // SAFETY: `fd` is a valid, open socket for the lifetime of this call, and
    // the option pointers reference correctly sized, live locals.
    unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_KEEPALIVE,
            std::ptr::from_ref(&enable).cast(),
            core::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        let idle = idle_secs as libc::c_int;
        #[cfg(target_os = "linux")]
        libc::setsockopt(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_KEEPIDLE,
            std::ptr::from_ref(&idle).cast(),
            core::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}
