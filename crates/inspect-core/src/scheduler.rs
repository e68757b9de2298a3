use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Condvar, Mutex, Weak,
    },
    thread,
};

use inspect_queue::{Command, CommandQueue, ConnectionState};

/// Commands the Scheduler's background executor hands back to
/// `ProtocolCore`. The Scheduler holds only a `Weak` reference: it does not
/// own the core's lifetime, matching §3 ("non-owning reference").
pub trait SchedulerHooks: Send + Sync {
    fn impl_connect(&self);
    fn impl_write_packet(&self, record: inspect_wire::Record);
    fn impl_disconnect(&self);
    fn impl_dispatch(&self, state: ConnectionState);
    fn is_failed(&self) -> bool;
}

/// Commands are handed to the hooks in batches of at most this many per
/// executor slice before the next stop/failed check.
const MAX_BATCH: usize = 16;

struct Shared {
    queue: Mutex<CommandQueue>,
    not_empty: Condvar,
    stopped: AtomicBool,
    capacity_bytes: AtomicUsize,
    throttle: AtomicBool,
    hooks: Mutex<Weak<dyn SchedulerHooks>>,
    /// Ticket dispenser for `schedule_async` throttle waiters. A plain
    /// `notify_all` on `not_empty` wakes every blocked thread regardless of
    /// arrival order, so fairness is enforced separately: each waiter takes
    /// a ticket and only proceeds once `now_serving` reaches it, guaranteeing
    /// release in FIFO order (§4.6's throttle back-pressure contract).
    next_ticket: AtomicU64,
    now_serving: AtomicU64,
}

/// Background drainer of a `CommandQueue`. Exactly one executor thread per
/// instance — never a thread pool.
pub struct Scheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(capacity_bytes: usize, throttle: bool, hooks: Weak<dyn SchedulerHooks>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(CommandQueue::new()),
                not_empty: Condvar::new(),
                stopped: AtomicBool::new(false),
                capacity_bytes: AtomicUsize::new(capacity_bytes),
                throttle: AtomicBool::new(throttle),
                hooks: Mutex::new(hooks),
                next_ticket: AtomicU64::new(0),
                now_serving: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Idempotent. Spawns the single background executor if it is not
    /// already running.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return;
        }
        let shared = self.shared.clone();
        *worker = Some(thread::spawn(move || run_executor(&shared)));
    }

    /// Non-blocking enqueue. Returns `false` if stopped, or if a single
    /// command exceeds `capacity_bytes` even after trimming.
    pub fn schedule(&self, cmd: Command) -> bool {
        if self.shared.stopped.load(Ordering::Acquire) {
            return false;
        }
        self.schedule_locked(cmd)
    }

    /// Like `schedule`, but if `throttle` is set and the core is not
    /// `failed`, blocks the calling thread until space frees, the scheduler
    /// stops, or a `clear()` is observed, released strictly in the order
    /// callers arrived. There is no async runtime in this stack, so
    /// "suspend the caller" is a condvar wait rather than a pollable future.
    pub fn schedule_async(&self, cmd: Command) -> bool {
        let cost = cmd.cost();
        if self.shared.throttle.load(Ordering::Acquire) && !self.hooks_failed() {
            let ticket = self.shared.next_ticket.fetch_add(1, Ordering::AcqRel);
            let mut queue = self.shared.queue.lock().unwrap();
            loop {
                if self.shared.stopped.load(Ordering::Acquire) {
                    return false;
                }
                let my_turn = self.shared.now_serving.load(Ordering::Acquire) == ticket;
                let capacity = self.shared.capacity_bytes.load(Ordering::Acquire);
                if my_turn && queue.size_bytes() + cost <= capacity {
                    break;
                }
                queue = self.shared.not_empty.wait(queue).unwrap();
            }
            self.shared.now_serving.fetch_add(1, Ordering::AcqRel);
            self.shared.not_empty.notify_all();
        }
        self.schedule_locked(cmd)
    }

    fn schedule_locked(&self, cmd: Command) -> bool {
        let capacity = self.shared.capacity_bytes.load(Ordering::Acquire);
        if cmd.cost() > capacity {
            return false;
        }
        let mut queue = self.shared.queue.lock().unwrap();
        let projected = queue.size_bytes() + cmd.cost();
        if projected > capacity {
            queue.trim(projected - capacity);
        }
        queue.push_back(cmd);
        drop(queue);
        self.shared.not_empty.notify_all();
        true
    }

    /// Idempotent. Releases throttle waiters with a rejection, trims the
    /// queue down to its remaining `Disconnect` commands, and waits for the
    /// executor to drain them before returning.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        {
            let mut queue = self.shared.queue.lock().unwrap();
            let disconnects = queue.retain_disconnects_only();
            for cmd in disconnects {
                queue.push_back(cmd);
            }
        }
        self.shared.not_empty.notify_all();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub fn clear(&self) {
        self.shared.queue.lock().unwrap().clear();
        self.shared.not_empty.notify_all();
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    pub fn size_bytes(&self) -> usize {
        self.shared.queue.lock().unwrap().size_bytes()
    }

    fn hooks_failed(&self) -> bool {
        self.shared
            .hooks
            .lock()
            .unwrap()
            .upgrade()
            .map(|h| h.is_failed())
            .unwrap_or(true)
    }
}

fn run_executor(shared: &Arc<Shared>) {
    loop {
        let mut processed_in_slice = 0usize;
        let mut should_exit = false;

        while processed_in_slice < MAX_BATCH {
            let cmd = {
                let mut queue = shared.queue.lock().unwrap();
                loop {
                    if let Some(cmd) = queue.pop_front() {
                        break Some(cmd);
                    }
                    if shared.stopped.load(Ordering::Acquire) {
                        break None;
                    }
                    queue = shared.not_empty.wait(queue).unwrap();
                }
            };
            shared.not_empty.notify_all();

            let Some(cmd) = cmd else {
                should_exit = true;
                break;
            };

            let Some(hooks) = shared.hooks.lock().unwrap().upgrade() else {
                return;
            };
            dispatch(&*hooks, cmd);
            processed_in_slice += 1;

            if shared.stopped.load(Ordering::Acquire) && hooks.is_failed() {
                shared.queue.lock().unwrap().clear();
                break;
            }
        }

        if should_exit && shared.queue.lock().unwrap().is_empty() {
            return;
        }
    }
}

fn dispatch(hooks: &dyn SchedulerHooks, cmd: Command) {
    match cmd {
        Command::Connect => hooks.impl_connect(),
        Command::Write(record) => hooks.impl_write_packet(record),
        Command::Disconnect => hooks.impl_disconnect(),
        Command::Dispatch(state) => hooks.impl_dispatch(state),
    }
}
