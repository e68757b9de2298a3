use std::collections::VecDeque;

use inspect_wire::{Codec, Record};

use crate::backlog::ITEM_OVERHEAD;

/// The 3-state connection state machine, carried as payload on `Dispatch`
/// commands so the Scheduler can hand state transitions back to
/// `ProtocolCore` through the same FIFO as everything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A unit of work drained by the Scheduler. Only `Write` carries non-zero
/// cost; `Connect`/`Disconnect`/`Dispatch` are weightless so that
/// `CommandQueue::trim` never removes them.
pub enum Command {
    Connect,
    Write(Record),
    Disconnect,
    Dispatch(ConnectionState),
}

impl Command {
    pub fn cost(&self) -> usize {
        match self {
            Self::Write(record) => Codec::estimate_size(record) + ITEM_OVERHEAD,
            _ => 0,
        }
    }

    fn is_write(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}

/// FIFO of `Command`s with the same byte-bounded-overflow behavior as
/// `BacklogQueue`, except that `trim` only ever removes `Write` commands —
/// `Connect`/`Disconnect`/`Dispatch` are structural and must reach
/// `ProtocolCore` regardless of back-pressure.
#[derive(Default)]
pub struct CommandQueue {
    items: VecDeque<Command>,
    size_bytes: usize,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn push_back(&mut self, cmd: Command) {
        self.size_bytes += cmd.cost();
        self.items.push_back(cmd);
    }

    pub fn pop_front(&mut self) -> Option<Command> {
        let cmd = self.items.pop_front()?;
        self.size_bytes -= cmd.cost();
        Some(cmd)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.size_bytes = 0;
    }

    /// Removes only the oldest `Write` commands, in order, until at least
    /// `n` bytes have been freed or no `Write` command remains. Returns
    /// `true` iff at least `n` bytes were freed. Non-`Write` commands keep
    /// their relative position.
    pub fn trim(&mut self, n: usize) -> bool {
        let mut freed = 0usize;
        let mut kept = VecDeque::with_capacity(self.items.len());
        while let Some(cmd) = self.items.pop_front() {
            if freed < n && cmd.is_write() {
                freed += cmd.cost();
                self.size_bytes -= cmd.cost();
                continue;
            }
            kept.push_back(cmd);
        }
        self.items = kept;
        freed >= n
    }

    /// Removes every `Disconnect` command still queued, in order, leaving
    /// everything else untouched. Used by `Scheduler::stop` to keep only the
    /// commands that must still reach the transport.
    pub fn retain_disconnects_only(&mut self) -> VecDeque<Command> {
        let mut disconnects = VecDeque::new();
        while let Some(cmd) = self.items.pop_front() {
            self.size_bytes -= cmd.cost();
            if matches!(cmd, Command::Disconnect) {
                disconnects.push_back(cmd);
            }
        }
        disconnects
    }
}

#[cfg(test)]
mod test {
    use inspect_wire::{Record, WatchRecord};

    use super::*;

    fn write(name: &str) -> Command {
        Command::Write(Record::Watch(WatchRecord {
            name: name.into(),
            value: "v".repeat(4096),
            ..Default::default()
        }))
    }

    #[test]
    fn trim_preserves_non_write_positions() {
        let mut q = CommandQueue::new();
        q.push_back(Command::Connect);
        q.push_back(write("a"));
        q.push_back(write("b"));
        q.push_back(write("c"));
        q.push_back(Command::Disconnect);

        let freed_enough = q.trim(usize::MAX);
        assert!(freed_enough);

        let remaining: Vec<_> = std::iter::from_fn(|| q.pop_front()).collect();
        assert!(matches!(remaining.first(), Some(Command::Connect)));
        assert!(matches!(remaining.last(), Some(Command::Disconnect)));
        assert!(remaining.iter().all(|c| !c.is_write()));
    }

    #[test]
    fn trim_returns_false_when_not_enough_writes_to_free() {
        let mut q = CommandQueue::new();
        q.push_back(write("a"));
        let small_target = q.size_bytes() * 10;
        assert!(!q.trim(small_target));
    }

    #[test]
    fn clear_empties_queue() {
        let mut q = CommandQueue::new();
        q.push_back(write("a"));
        q.push_back(Command::Connect);
        q.clear();
        assert_eq!(q.len(), 0);
        assert_eq!(q.size_bytes(), 0);
    }
}
