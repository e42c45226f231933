//! Timer queue on a virtual millisecond clock.
//!
//! Every scheduled task gets a [`TimerId`] that cancels it. Cancelled entries stay in the
//! heap as tombstones and are skipped when popped; `cancel_all` drops everything at once.
//! Tasks due at the same instant run `schedule_first` ones before the rest, then in the
//! order they were scheduled.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Cancellation token for one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
pub struct TimerQueue<T> {
    /// `(due, rank, id)`; rank 0 runs before rank 1 at the same due time.
    heap: BinaryHeap<Reverse<(u64, u8, u64)>>,
    live: HashMap<u64, T>,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_id: 0,
        }
    }

    /// Schedule `task` to fire at `due_ms`.
    pub fn schedule(&mut self, due_ms: u64, task: T) -> TimerId {
        self.push(due_ms, 1, task)
    }

    /// Like `schedule`, but fires before ordinary tasks due at the same instant.
    pub fn schedule_first(&mut self, due_ms: u64, task: T) -> TimerId {
        self.push(due_ms, 0, task)
    }

    fn push(&mut self, due_ms: u64, rank: u8, task: T) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(Reverse((due_ms, rank, id)));
        self.live.insert(id, task);
        TimerId(id)
    }

    /// Cancel one task. Returns it if it had not fired or been cancelled yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        self.live.remove(&id.0)
    }

    /// Cancel every pending task; returns how many were pending.
    pub fn cancel_all(&mut self) -> usize {
        let n = self.live.len();
        self.live.clear();
        self.heap.clear();
        n
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    #[cfg(test)]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.live.contains_key(&id.0)
    }

    /// Due time of the earliest live task.
    #[cfg(test)]
    pub fn next_due(&mut self) -> Option<u64> {
        self.drop_tombstones();
        self.heap.peek().map(|Reverse((due, _, _))| *due)
    }

    /// Remove and return the earliest live task due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(TimerId, u64, T)> {
        self.drop_tombstones();
        let &Reverse((due, _, id)) = self.heap.peek()?;
        if due > now_ms {
            return None;
        }
        self.heap.pop();
        self.live.remove(&id).map(|task| (TimerId(id), due, task))
    }

    fn drop_tombstones(&mut self) {
        while let Some(Reverse((_, _, id))) = self.heap.peek() {
            if self.live.contains_key(id) {
                break;
            }
            self.heap.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_due_order_then_schedule_order() {
        let mut q = TimerQueue::new();
        q.schedule(300, "c");
        q.schedule(100, "a");
        q.schedule(100, "b");
        assert_eq!(q.pop_due(50).map(|t| t.2), None);
        assert_eq!(q.pop_due(1000).map(|t| t.2), Some("a"));
        assert_eq!(q.pop_due(1000).map(|t| t.2), Some("b"));
        assert_eq!(q.pop_due(1000).map(|t| (t.1, t.2)), Some((300, "c")));
        assert!(q.pop_due(1000).is_none());
    }

    #[test]
    fn schedule_first_wins_ties() {
        let mut q = TimerQueue::new();
        q.schedule(100, "expire");
        q.schedule(50, "early");
        q.schedule_first(100, "tick");
        assert_eq!(q.pop_due(1000).map(|t| t.2), Some("early"));
        assert_eq!(q.pop_due(1000).map(|t| t.2), Some("tick"));
        assert_eq!(q.pop_due(1000).map(|t| t.2), Some("expire"));
    }

    #[test]
    fn cancelled_task_never_fires() {
        let mut q = TimerQueue::new();
        let a = q.schedule(100, 1);
        q.schedule(200, 2);
        assert_eq!(q.cancel(a), Some(1));
        assert_eq!(q.cancel(a), None);
        assert!(!q.is_pending(a));
        assert_eq!(q.next_due(), Some(200));
        assert_eq!(q.pop_due(1000).map(|t| t.2), Some(2));
        assert_eq!(q.pending(), 0);
    }

    #[test]
    fn cancel_all_empties_queue() {
        let mut q = TimerQueue::new();
        for i in 0..5 {
            q.schedule(i * 10, i);
        }
        assert_eq!(q.cancel_all(), 5);
        assert_eq!(q.pending(), 0);
        assert!(q.next_due().is_none());
        assert!(q.pop_due(u64::MAX).is_none());
    }
}
