use std::collections::VecDeque;

use inspect_wire::{Codec, Record};

/// Fixed per-item bookkeeping overhead folded into every record's queued
/// byte cost, on top of `Codec::estimate_size`.
pub const ITEM_OVERHEAD: usize = 24;

struct Entry {
    record: Record,
    cost: usize,
}

/// Size-bounded FIFO of pending records, held while the transport is not
/// `Connected`. Oldest records are evicted first when a push would put
/// `size_bytes` over `capacity_bytes`; the configured drop hook is invoked
/// once per push that caused an eviction, with the total number of records
/// dropped by that push.
pub struct BacklogQueue {
    capacity_bytes: usize,
    items: VecDeque<Entry>,
    size_bytes: usize,
    drop_hook: Option<Box<dyn FnMut(usize) + Send>>,
}

impl BacklogQueue {
    pub fn new(capacity_bytes: usize) -> Self {
        Self { capacity_bytes, items: VecDeque::new(), size_bytes: 0, drop_hook: None }
    }

    pub fn set_drop_hook(&mut self, hook: Box<dyn FnMut(usize) + Send>) {
        self.drop_hook = Some(hook);
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    /// Appends `record` to the tail, then evicts from the head until
    /// `size_bytes <= capacity_bytes`. If any eviction occurred, the drop
    /// hook is invoked exactly once with the number of records dropped by
    /// this push.
    pub fn push(&mut self, record: Record) {
        let cost = Codec::estimate_size(&record) + ITEM_OVERHEAD;
        self.size_bytes += cost;
        self.items.push_back(Entry { record, cost });
        self.resize();
    }

    pub fn pop(&mut self) -> Option<Record> {
        let entry = self.items.pop_front()?;
        self.size_bytes -= entry.cost;
        Some(entry.record)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.size_bytes = 0;
    }

    /// Re-applies `capacity_bytes` and evicts if the new capacity is now
    /// exceeded.
    pub fn configure(&mut self, capacity_bytes: usize) {
        self.capacity_bytes = capacity_bytes;
        self.resize();
    }

    fn resize(&mut self) {
        let mut dropped = 0usize;
        while self.size_bytes > self.capacity_bytes {
            let Some(entry) = self.items.pop_front() else { break };
            self.size_bytes -= entry.cost;
            dropped += 1;
        }
        if dropped > 0 {
            tracing::warn!(dropped, "backlog overflow, evicting oldest records");
            if let Some(hook) = &mut self.drop_hook {
                hook(dropped);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use inspect_wire::{Record, WatchRecord};

    use super::*;

    fn watch(name: &str) -> Record {
        Record::Watch(WatchRecord { name: name.into(), value: "v".into(), ..Default::default() })
    }

    #[test]
    fn pops_in_push_order() {
        let mut q = BacklogQueue::new(1_000_000);
        q.push(watch("a"));
        q.push(watch("b"));
        let Some(Record::Watch(first)) = q.pop() else { panic!("expected watch") };
        assert_eq!(first.name, "a");
    }

    #[test]
    fn evicts_oldest_and_reports_drop_count() {
        let dropped = Arc::new(Mutex::new(0usize));
        let dropped_clone = dropped.clone();

        let one_record_cost = Codec::estimate_size(&watch("x")) + ITEM_OVERHEAD;
        let mut q = BacklogQueue::new(one_record_cost);
        q.set_drop_hook(Box::new(move |n| *dropped_clone.lock().unwrap() += n));

        q.push(watch("a"));
        assert_eq!(*dropped.lock().unwrap(), 0);

        q.push(watch("b"));
        assert_eq!(q.count(), 1);
        assert_eq!(*dropped.lock().unwrap(), 1);

        let Some(Record::Watch(remaining)) = q.pop() else { panic!("expected watch") };
        assert_eq!(remaining.name, "b");
    }

    #[test]
    fn configure_shrinking_capacity_evicts() {
        let mut q = BacklogQueue::new(1_000_000);
        q.push(watch("a"));
        q.push(watch("b"));
        q.configure(0);
        assert_eq!(q.count(), 0);
        assert_eq!(q.size_bytes(), 0);
    }
}
