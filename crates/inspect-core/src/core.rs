use std::{
    sync::{Arc, Mutex, Weak},
    thread,
    time::Duration,
};

use inspect_queue::{BacklogQueue, Command, ConnectionState};
use inspect_time::Repeater;
use inspect_transport::Transport;
use inspect_wire::{Codec, HeaderRecord, Record};
use tracing::debug;

use crate::{
    config::Config,
    error::CoreError,
    observer::Observer,
    scheduler::{Scheduler, SchedulerHooks},
};

const CLIENT_BANNER: &str = "inspect-client/1.0";
const GRACEFUL_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub backlog_count: usize,
    pub backlog_bytes: usize,
    pub scheduler_count: usize,
    pub scheduler_bytes: usize,
}

struct StateInner {
    state: ConnectionState,
    failed: bool,
}

/// Guards against two concurrent connect attempts performing their own
/// handshake; everyone but the first caller joins the in-flight attempt
/// instead of starting a second one (§4.6.1).
#[derive(Default)]
struct ConnectGate {
    in_progress: Mutex<bool>,
    done: std::sync::Condvar,
}

impl ConnectGate {
    /// Runs `attempt` if no connect is currently in flight; otherwise blocks
    /// until the in-flight attempt finishes, then returns without running
    /// `attempt` again.
    fn run_single_flight(&self, attempt: impl FnOnce()) {
        let mut in_progress = self.in_progress.lock().unwrap();
        if *in_progress {
            while *in_progress {
                in_progress = self.done.wait(in_progress).unwrap();
            }
            return;
        }
        *in_progress = true;
        drop(in_progress);

        attempt();

        *self.in_progress.lock().unwrap() = false;
        self.done.notify_all();
    }
}

struct Inner {
    self_weak: Weak<Inner>,
    config: Mutex<Option<Config>>,
    state: Mutex<StateInner>,
    transport: Mutex<Option<Transport>>,
    backlog: Mutex<BacklogQueue>,
    scheduler: Mutex<Option<Scheduler>>,
    connect_gate: ConnectGate,
    reconnect_repeater: Mutex<Repeater>,
    observer: Mutex<Option<Arc<dyn Observer>>>,
}

/// Orchestrates the codec, queues, transport, and scheduler: single-flight
/// connect, fire-and-forget `connect()`, buffering while disconnected,
/// time-gated auto-reconnect, auto-flush on (re)connect, and the sync/async
/// submit paths. See §4.6 for the full contract.
pub struct ProtocolCore {
    inner: Arc<Inner>,
}

impl Default for ProtocolCore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolCore {
    pub fn new() -> Self {
        let inner = Arc::new_cyclic(|self_weak| Inner {
            self_weak: self_weak.clone(),
            config: Mutex::new(None),
            state: Mutex::new(StateInner { state: ConnectionState::Disconnected, failed: false }),
            transport: Mutex::new(None),
            backlog: Mutex::new(BacklogQueue::new(0)),
            scheduler: Mutex::new(None),
            connect_gate: ConnectGate::default(),
            reconnect_repeater: Mutex::new(Repeater::every(Duration::from_millis(3_000))),
            observer: Mutex::new(None),
        });
        Self { inner }
    }

    /// Must be called before `submit`. Replaces any prior configuration;
    /// rebuilds the backlog capacity and, if `async.enabled`, a fresh
    /// Scheduler.
    pub fn configure(&self, config: Config) -> Result<(), crate::error::ConfigError> {
        config.validate()?;

        let mut backlog = BacklogQueue::new(config.backlog_queue_bytes());
        let self_weak = self.inner.self_weak.clone();
        backlog.set_drop_hook(Box::new(move |count| {
            if let Some(inner) = self_weak.upgrade() {
                if let Some(observer) = &*inner.observer.lock().unwrap() {
                    observer.on_packet_dropped(count);
                }
            }
        }));
        *self.inner.backlog.lock().unwrap() = backlog;
        *self.inner.reconnect_repeater.lock().unwrap() = Repeater::every(config.reconnect_interval());

        let scheduler = if config.async_enabled() {
            let hooks: Weak<dyn SchedulerHooks> = self.inner.self_weak.clone();
            let scheduler = Scheduler::new(config.async_queue_bytes(), config.async_throttle(), hooks);
            scheduler.start();
            Some(scheduler)
        } else {
            None
        };
        if let Some(previous) = self.inner.scheduler.lock().unwrap().take() {
            previous.stop();
        }
        *self.inner.scheduler.lock().unwrap() = scheduler;

        *self.inner.config.lock().unwrap() = Some(config);
        Ok(())
    }

    pub fn set_observer(&self, observer: Arc<dyn Observer>) {
        *self.inner.observer.lock().unwrap() = Some(observer);
    }

    /// Fire-and-forget: returns immediately and drives the handshake on a
    /// background thread (or via the Scheduler, in async mode).
    pub fn connect(&self) {
        // §4.6.4: an explicit `connect()` always bypasses the reconnect
        // gate, in both sync and async mode.
        self.inner.reconnect_repeater.lock().unwrap().force_fire();

        let async_enabled = self.config_snapshot().map(|c| c.async_enabled()).unwrap_or(false);
        if async_enabled {
            if let Some(scheduler) = &*self.inner.scheduler.lock().unwrap() {
                scheduler.schedule(Command::Connect);
            }
            return;
        }
        let inner = self.inner.clone();
        thread::spawn(move || inner.maybe_reconnect());
    }

    /// Never blocks on I/O. In async mode wraps `record` in a `Write`
    /// command; in sync mode applies the disconnected/connected policy in
    /// §4.6.2/§4.6.3 synchronously with respect to enqueue.
    pub fn submit(&self, record: Record) {
        let Some(config) = self.config_snapshot() else {
            inspect_utils::safe_panic!("submit called before configure");
            return;
        };
        if config.async_enabled() {
            if let Some(scheduler) = &*self.inner.scheduler.lock().unwrap() {
                scheduler.schedule(Command::Write(record));
            }
            return;
        }
        self.inner.handle_write(record, &config);
    }

    /// In async+throttled mode, suspends the calling thread until queue
    /// space is available. In any other mode, behaves like `submit`.
    pub fn submit_with_backpressure(&self, record: Record) -> bool {
        let Some(config) = self.config_snapshot() else {
            inspect_utils::safe_panic!("submit_with_backpressure called before configure");
            return false;
        };
        if config.async_enabled() {
            if let Some(scheduler) = &*self.inner.scheduler.lock().unwrap() {
                return scheduler.schedule_async(Command::Write(record));
            }
            return false;
        }
        self.inner.handle_write(record, &config);
        true
    }

    pub fn disconnect(&self) {
        let Some(config) = self.config_snapshot() else { return };
        if config.async_enabled() {
            if let Some(scheduler) = &*self.inner.scheduler.lock().unwrap() {
                if config.async_clear_on_disconnect() {
                    scheduler.clear();
                }
                scheduler.schedule(Command::Disconnect);
                scheduler.stop();
            }
            return;
        }
        self.inner.impl_disconnect();
    }

    pub fn stats(&self) -> Stats {
        let backlog = self.inner.backlog.lock().unwrap();
        let (scheduler_count, scheduler_bytes) = self
            .inner
            .scheduler
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| (s.len(), s.size_bytes()))
            .unwrap_or((0, 0));
        Stats {
            backlog_count: backlog.count(),
            backlog_bytes: backlog.size_bytes(),
            scheduler_count,
            scheduler_bytes,
        }
    }

    fn config_snapshot(&self) -> Option<Config> {
        self.inner.config.lock().unwrap().clone()
    }
}

impl Inner {
    fn require_config(&self) -> Config {
        self.config.lock().unwrap().clone().unwrap_or_else(|| {
            inspect_utils::safe_panic!("ProtocolCore used before configure");
            Config::new()
        })
    }

    /// §4.6.2/§4.6.3: if connected, write immediately; otherwise apply the
    /// disconnected-state policy synchronously before returning.
    fn handle_write(&self, record: Record, config: &Config) {
        let connected = self.state.lock().unwrap().state == ConnectionState::Connected;
        if connected {
            self.write_connected(record, config);
            return;
        }

        if !config.reconnect() {
            return;
        }
        if !config.backlog_enabled() {
            return;
        }
        let meets_flush_threshold = config
            .flush_on_level()
            .and_then(|threshold| record.severity().map(|level| level >= threshold))
            .unwrap_or(false);
        self.backlog.lock().unwrap().push(record);
        if config.derive_keep_open() || meets_flush_threshold {
            self.schedule_background_reconnect();
        }
    }

    fn write_connected(&self, record: Record, config: &Config) {
        let frame = Codec::encode(&record);
        let mut transport_slot = self.transport.lock().unwrap();
        let Some(transport) = transport_slot.as_mut() else {
            return;
        };
        match transport.write_frame(&frame) {
            Ok(()) => {
                if !config.derive_keep_open() {
                    let mut transport = transport_slot.take();
                    drop(transport_slot);
                    if let Some(transport) = &mut transport {
                        transport.close(GRACEFUL_CLOSE_TIMEOUT);
                    }
                    self.set_state(ConnectionState::Disconnected);
                }
            }
            Err(err) => {
                *transport_slot = None;
                drop(transport_slot);
                self.mark_failed_and_gate();
                self.notify_error(CoreError::Write(err));
            }
        }
    }

    /// Non-blocking: hands the actual connect attempt off so `submit`'s
    /// disconnected-state path never suspends. In async mode this enqueues
    /// onto the Scheduler's single executor thread, so the resulting state
    /// transition stays serialized with every other command; in sync mode
    /// there is no executor to enqueue onto, so a one-off thread runs it.
    fn schedule_background_reconnect(&self) {
        if let Some(scheduler) = &*self.scheduler.lock().unwrap() {
            scheduler.schedule(Command::Connect);
            return;
        }
        let Some(strong) = self.self_weak.upgrade() else { return };
        thread::spawn(move || strong.maybe_reconnect());
    }

    /// Time-gated, single-flight reconnect attempt. The gate is only a
    /// read-only check here: per §4.6.4, a successful attempt leaves it
    /// untouched, and only `mark_failed_and_gate` arms it (to `now`) on
    /// failure.
    fn maybe_reconnect(&self) {
        let due = self.reconnect_repeater.lock().unwrap().is_due();
        if !due {
            return;
        }
        self.connect_gate.run_single_flight(|| self.do_connect_attempt());
    }

    fn do_connect_attempt(&self) {
        let config = self.require_config();
        self.set_state(ConnectionState::Connecting);

        let endpoint = config.endpoint();
        match Transport::connect(&endpoint, config.timeout(), CLIENT_BANNER) {
            Ok((transport, server_banner)) => {
                *self.transport.lock().unwrap() = Some(transport);
                {
                    let mut state = self.state.lock().unwrap();
                    state.state = ConnectionState::Connected;
                    state.failed = false;
                }
                self.notify_connect(&server_banner);
                self.emit_header_and_flush(&config);
            }
            Err(err) => {
                self.mark_failed_and_gate();
                self.notify_error(CoreError::Connect(err));
            }
        }
    }

    /// §4.6.6: emits the Header record, then drains the backlog in FIFO
    /// order. Interruptible by a subsequent disconnect.
    fn emit_header_and_flush(&self, config: &Config) {
        let header = Record::Header(HeaderRecord {
            hostname: config.host_name().to_owned(),
            appname: config.app_name().to_owned(),
            room: config.room().to_owned(),
            extra: Vec::new(),
        });
        {
            let frame = Codec::encode(&header);
            let mut transport_slot = self.transport.lock().unwrap();
            let Some(transport) = transport_slot.as_mut() else { return };
            if let Err(err) = transport.write_frame(&frame) {
                *transport_slot = None;
                drop(transport_slot);
                self.mark_failed_and_gate();
                self.notify_error(CoreError::Write(err));
                return;
            }
        }

        loop {
            if self.state.lock().unwrap().state != ConnectionState::Connected {
                break;
            }
            let Some(record) = self.backlog.lock().unwrap().pop() else { break };
            let frame = Codec::encode(&record);
            let mut transport_slot = self.transport.lock().unwrap();
            let Some(transport) = transport_slot.as_mut() else { break };
            if let Err(err) = transport.write_frame(&frame) {
                *transport_slot = None;
                drop(transport_slot);
                self.mark_failed_and_gate();
                self.notify_error(CoreError::Write(err));
                break;
            }
        }
    }

    /// §4.6.4: on failure, mark failed/Disconnected and arm the reconnect
    /// gate to `now` — a successful attempt never touches the gate.
    fn mark_failed_and_gate(&self) {
        let mut state = self.state.lock().unwrap();
        state.failed = true;
        state.state = ConnectionState::Disconnected;
        drop(state);
        self.reconnect_repeater.lock().unwrap().reset();
    }

    fn set_state(&self, new_state: ConnectionState) {
        self.state.lock().unwrap().state = new_state;
    }

    /// Half-closes the transport and waits up to `GRACEFUL_CLOSE_TIMEOUT`
    /// for the peer to notice and EOF before the forceful close (§9);
    /// `Transport::close` owns the actual wait.
    fn impl_disconnect(&self) {
        let transport = self.transport.lock().unwrap().take();
        if let Some(mut transport) = transport {
            transport.close(GRACEFUL_CLOSE_TIMEOUT);
        }
        self.set_state(ConnectionState::Disconnected);
        self.notify_disconnect();
    }

    fn notify_connect(&self, server_banner: &str) {
        if let Some(observer) = &*self.observer.lock().unwrap() {
            observer.on_connect(server_banner);
        }
    }

    fn notify_disconnect(&self) {
        if let Some(observer) = &*self.observer.lock().unwrap() {
            observer.on_disconnect();
        }
    }

    fn notify_error(&self, error: CoreError) {
        debug!(?error, "protocol core error");
        if let Some(observer) = &*self.observer.lock().unwrap() {
            observer.on_error(&error);
        }
    }
}

impl SchedulerHooks for Inner {
    fn impl_connect(&self) {
        self.maybe_reconnect();
    }

    fn impl_write_packet(&self, record: Record) {
        let config = self.require_config();
        self.handle_write(record, &config);
    }

    fn impl_disconnect(&self) {
        Inner::impl_disconnect(self);
    }

    fn impl_dispatch(&self, state: ConnectionState) {
        self.set_state(state);
        if state == ConnectionState::Disconnected {
            self.notify_disconnect();
        }
    }

    fn is_failed(&self) -> bool {
        self.state.lock().unwrap().failed
    }
}
