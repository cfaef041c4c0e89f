//! Thread-safe FIFO handing accepted connections to worker threads.
//!
//! ```text
//!   accept thread ──push(PopOldest)──▶ [ c1 c2 c3 ] ──pop(Blocking)──▶ workers
//!                                         │
//!                                 join(): wake everyone
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    Ok,
    Overflow,
    Joinable,
}

/// What `push` does when the queue is at its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOverflowStrategy {
    /// Block until space is available or the queue is joined.
    Wait,
    /// Evict the oldest element and report `Overflow`.
    PopOldest,
    /// Reject the new element and report `Overflow`.
    DontPush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePopStrategy {
    Blocking,
    Nonblocking,
}

/// What `join` shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueJoinStrategy {
    /// Pushes and pops both stop; queued elements are abandoned.
    ShutdownPushPop,
    /// Only pushes stop; queued elements can still be popped.
    ShutdownPush,
}

pub struct Queue<T> {
    items: Mutex<VecDeque<T>>,
    limit: Option<usize>,
    join_strategy: QueueJoinStrategy,
    joinable: AtomicBool,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> Queue<T> {
    /// Creates a queue; `None` means unbounded.
    pub fn new(limit: Option<usize>) -> Self {
        Self::with_join_strategy(limit, QueueJoinStrategy::ShutdownPushPop)
    }

    pub fn with_join_strategy(limit: Option<usize>, join_strategy: QueueJoinStrategy) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            limit,
            join_strategy,
            joinable: AtomicBool::new(false),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Current size; may be stale by the time the caller looks at it.
    pub fn approx_size(&self) -> usize {
        self.items.lock().len()
    }

    pub fn joinable(&self) -> bool {
        self.joinable.load(Ordering::Acquire)
    }

    fn is_full(&self, items: &VecDeque<T>) -> bool {
        self.limit.is_some_and(|limit| items.len() >= limit)
    }

    /// Pushes `value`, returning the status and the size afterwards.
    pub fn push(&self, value: T, strategy: QueueOverflowStrategy) -> (QueueStatus, usize) {
        let mut items = self.items.lock();
        if self.joinable() {
            return (QueueStatus::Joinable, items.len());
        }
        let mut status = QueueStatus::Ok;
        if self.is_full(&items) {
            match strategy {
                QueueOverflowStrategy::Wait => {
                    while self.is_full(&items) && !self.joinable() {
                        self.not_full.wait(&mut items);
                    }
                    if self.joinable() {
                        return (QueueStatus::Joinable, items.len());
                    }
                }
                QueueOverflowStrategy::PopOldest => {
                    // A zero limit has nothing to evict and nowhere to put the value.
                    if items.pop_front().is_none() {
                        return (QueueStatus::Overflow, 0);
                    }
                    status = QueueStatus::Overflow;
                }
                QueueOverflowStrategy::DontPush => {
                    return (QueueStatus::Overflow, items.len());
                }
            }
        }
        items.push_back(value);
        let size = items.len();
        drop(items);
        self.not_empty.notify_one();
        (status, size)
    }

    /// Like `push` with `PopOldest`, but hands back the evicted element.
    pub fn push_evicting(&self, value: T) -> (QueueStatus, Option<T>) {
        let mut items = self.items.lock();
        if self.joinable() {
            return (QueueStatus::Joinable, Some(value));
        }
        let evicted = if self.is_full(&items) {
            match items.pop_front() {
                Some(oldest) => Some(oldest),
                None => return (QueueStatus::Overflow, Some(value)),
            }
        } else {
            None
        };
        items.push_back(value);
        drop(items);
        self.not_empty.notify_one();
        let status = if evicted.is_some() {
            QueueStatus::Overflow
        } else {
            QueueStatus::Ok
        };
        (status, evicted)
    }

    /// Pops the oldest element with the remaining size.
    ///
    /// A blocking pop waits until an element arrives, the optional timeout
    /// expires, or the queue is joined.
    pub fn pop(&self, strategy: QueuePopStrategy, timeout: Option<Duration>) -> Option<(T, usize)> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut items = self.items.lock();
        loop {
            if self.joinable() && self.join_strategy == QueueJoinStrategy::ShutdownPushPop {
                return None;
            }
            if let Some(value) = items.pop_front() {
                return Some(self.popped(items, value));
            }
            if strategy == QueuePopStrategy::Nonblocking || self.joinable() {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.not_empty.wait_until(&mut items, deadline).timed_out() {
                        let value = items.pop_front()?;
                        return Some(self.popped(items, value));
                    }
                }
                None => self.not_empty.wait(&mut items),
            }
        }
    }

    fn popped(&self, items: MutexGuard<'_, VecDeque<T>>, value: T) -> (T, usize) {
        let size = items.len();
        drop(items);
        self.not_full.notify_one();
        (value, size)
    }

    /// Removes everything currently queued without blocking.
    pub fn drain(&self) -> Vec<T> {
        let drained: Vec<T> = self.items.lock().drain(..).collect();
        self.not_full.notify_all();
        drained
    }

    /// Marks the queue joinable and wakes every blocked caller.
    pub fn join(&self) {
        let _items = self.items.lock();
        self.joinable.store(true, Ordering::Release);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn pop_all<T>(queue: &Queue<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Some((value, _)) = queue.pop(QueuePopStrategy::Nonblocking, None) {
            out.push(value);
        }
        out
    }

    #[test]
    fn test_pop_oldest_keeps_last_n() {
        let queue = Queue::new(Some(3));
        let mut statuses = Vec::new();
        for i in 0..7 {
            statuses.push(queue.push(i, QueueOverflowStrategy::PopOldest));
        }
        assert_eq!(statuses[2], (QueueStatus::Ok, 3));
        assert_eq!(statuses[3], (QueueStatus::Overflow, 3));
        assert_eq!(statuses[6], (QueueStatus::Overflow, 3));
        assert_eq!(pop_all(&queue), vec![4, 5, 6]);
    }

    #[test]
    fn test_dont_push_keeps_first_n() {
        let queue = Queue::new(Some(2));
        assert_eq!(queue.push("a", QueueOverflowStrategy::DontPush), (QueueStatus::Ok, 1));
        assert_eq!(queue.push("b", QueueOverflowStrategy::DontPush), (QueueStatus::Ok, 2));
        assert_eq!(queue.push("c", QueueOverflowStrategy::DontPush), (QueueStatus::Overflow, 2));
        assert_eq!(queue.push("d", QueueOverflowStrategy::DontPush), (QueueStatus::Overflow, 2));
        assert_eq!(queue.approx_size(), 2);
        assert_eq!(pop_all(&queue), vec!["a", "b"]);
    }

    #[test]
    fn test_unbounded_fifo() {
        let queue = Queue::new(None);
        for i in 0..100 {
            assert_eq!(queue.push(i, QueueOverflowStrategy::DontPush).0, QueueStatus::Ok);
        }
        assert_eq!(queue.pop(QueuePopStrategy::Nonblocking, None), Some((0, 99)));
        assert_eq!(pop_all(&queue).len(), 99);
    }

    #[test]
    fn test_nonblocking_pop_on_empty() {
        let queue: Queue<u8> = Queue::new(None);
        assert_eq!(queue.pop(QueuePopStrategy::Nonblocking, None), None);
    }

    #[test]
    fn test_blocking_pop_timeout() {
        let queue: Queue<u8> = Queue::new(None);
        let start = Instant::now();
        let result = queue.pop(QueuePopStrategy::Blocking, Some(Duration::from_millis(50)));
        assert_eq!(result, None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_join_wakes_blocked_pop() {
        let queue: Arc<Queue<u8>> = Arc::new(Queue::new(None));
        let worker = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop(QueuePopStrategy::Blocking, None))
        };
        thread::sleep(Duration::from_millis(20));
        queue.join();
        assert_eq!(worker.join().unwrap(), None);
        assert_eq!(queue.push(1, QueueOverflowStrategy::Wait).0, QueueStatus::Joinable);
    }

    #[test]
    fn test_join_wakes_blocked_push() {
        let queue = Arc::new(Queue::new(Some(1)));
        queue.push(1, QueueOverflowStrategy::Wait);
        let pusher = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2, QueueOverflowStrategy::Wait))
        };
        thread::sleep(Duration::from_millis(20));
        queue.join();
        assert_eq!(pusher.join().unwrap().0, QueueStatus::Joinable);
    }

    #[test]
    fn test_blocked_push_proceeds_after_pop() {
        let queue = Arc::new(Queue::new(Some(1)));
        queue.push(1, QueueOverflowStrategy::Wait);
        let pusher = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2, QueueOverflowStrategy::Wait))
        };
        thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.pop(QueuePopStrategy::Blocking, None), Some((1, 0)));
        assert_eq!(pusher.join().unwrap(), (QueueStatus::Ok, 1));
        assert_eq!(queue.pop(QueuePopStrategy::Nonblocking, None), Some((2, 0)));
    }

    #[test]
    fn test_join_strategies() {
        let push_pop = Queue::with_join_strategy(None, QueueJoinStrategy::ShutdownPushPop);
        push_pop.push(1, QueueOverflowStrategy::Wait);
        push_pop.join();
        assert_eq!(push_pop.pop(QueuePopStrategy::Blocking, None), None);

        let push_only = Queue::with_join_strategy(None, QueueJoinStrategy::ShutdownPush);
        push_only.push(1, QueueOverflowStrategy::Wait);
        push_only.join();
        assert_eq!(push_only.pop(QueuePopStrategy::Blocking, None), Some((1, 0)));
        assert_eq!(push_only.pop(QueuePopStrategy::Blocking, None), None);
    }

    #[test]
    fn test_push_evicting_returns_oldest() {
        let queue = Queue::new(Some(1));
        assert_eq!(queue.push_evicting("a"), (QueueStatus::Ok, None));
        assert_eq!(queue.push_evicting("b"), (QueueStatus::Overflow, Some("a")));
        assert_eq!(queue.drain(), vec!["b"]);
    }
}
