//! Bounded work queue
//!
//! The bound counts unfinished work, not buffered items: a slot is taken when
//! an item is sent and handed back only when a worker calls
//! [`WorkQueue::task_done`]. With capacity N at most N items are queued or
//! being processed at any moment.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// The queue no longer accepts work
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("work queue closed")]
pub struct Closed;

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    unfinished: usize,
    peak: usize,
    closed: bool,
}

/// Multi-producer, multi-consumer queue bounded by unfinished work
#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<State<T>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> WorkQueue<T> {
    /// Queue admitting at most `capacity` unfinished items (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                unfinished: 0,
                peak: 0,
                closed: false,
            }),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue `value`, blocking while the queue is at capacity
    pub fn send(&self, value: T) -> Result<(), Closed> {
        let mut state = self.lock();
        while state.unfinished >= self.capacity && !state.closed {
            state = self.not_full.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            return Err(Closed);
        }

        state.unfinished += 1;
        state.peak = state.peak.max(state.unfinished);
        state.items.push_back(value);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the next item; `None` once the queue is closed and drained
    pub fn recv(&self) -> Option<T> {
        let mut state = self.lock();
        while state.items.is_empty() && !state.closed {
            state = self.not_empty.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.items.pop_front()
    }

    /// Mark one received item as finished, freeing its slot
    pub fn task_done(&self) {
        let mut state = self.lock();
        state.unfinished = state.unfinished.saturating_sub(1);
        self.not_full.notify_one();
    }

    /// Stop accepting work; queued items are still delivered
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Highest number of unfinished items observed
    pub fn peak(&self) -> usize {
        self.lock().peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_send_recv_done() {
        let q = WorkQueue::with_capacity(2);
        q.send(1).unwrap();
        q.send(2).unwrap();
        assert_eq!(q.lock().unfinished, 2);
        assert_eq!(q.recv(), Some(1));
        // received but not done still holds its slot
        assert_eq!(q.lock().unfinished, 2);
        q.task_done();
        assert_eq!(q.lock().unfinished, 1);
        assert_eq!(q.peak(), 2);
    }

    #[test]
    fn test_zero_capacity_means_one() {
        let q: WorkQueue<u8> = WorkQueue::with_capacity(0);
        assert_eq!(q.capacity, 1);
    }

    #[test]
    fn test_close_drains_then_ends() {
        let q = WorkQueue::with_capacity(4);
        q.send("a").unwrap();
        q.close();
        assert_eq!(q.send("b"), Err(Closed));
        assert_eq!(q.recv(), Some("a"));
        assert_eq!(q.recv(), None);
    }

    #[test]
    fn test_send_blocks_until_task_done() {
        let q = WorkQueue::with_capacity(1);
        let sent = AtomicUsize::new(0);
        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..3 {
                    q.send(i).unwrap();
                    sent.fetch_add(1, Ordering::SeqCst);
                }
                q.close();
            });
            std::thread::sleep(Duration::from_millis(50));
            assert_eq!(sent.load(Ordering::SeqCst), 1);
            while let Some(_) = q.recv() {
                q.task_done();
            }
        });
        assert_eq!(sent.load(Ordering::SeqCst), 3);
        assert_eq!(q.peak(), 1);
    }

    #[test]
    fn test_workers_drain_every_item() {
        let q = WorkQueue::with_capacity(8);
        let done = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| {
                    while let Some(_) = q.recv() {
                        std::thread::sleep(Duration::from_millis(5));
                        done.fetch_add(1, Ordering::SeqCst);
                        q.task_done();
                    }
                });
            }
            for i in 0..20 {
                q.send(i).unwrap();
            }
            q.close();
        });
        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert_eq!(q.lock().unfinished, 0);
        assert!(q.peak() <= 8);
    }

    #[test]
    fn test_close_wakes_blocked_sender() {
        let q = WorkQueue::with_capacity(1);
        q.send(0).unwrap();
        std::thread::scope(|s| {
            let blocked = s.spawn(|| q.send(1));
            std::thread::sleep(Duration::from_millis(20));
            q.close();
            assert_eq!(blocked.join().unwrap(), Err(Closed));
        });
    }
}
