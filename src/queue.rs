//! Bounded blocking queue backing the idle and frozen sets

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Why an item was handed back by [`BoundedQueue::offer`]
#[derive(Debug)]
pub(crate) enum Rejected<T> {
    Full(T),
    Closed(T),
}

/// The queue was closed while a caller waited on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueClosed;

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// FIFO with a hard capacity. A full queue rejects instead of blocking.
pub(crate) struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    pub fn offer(&self, item: T) -> Result<(), Rejected<T>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Rejected::Closed(item));
        }
        if inner.items.len() >= self.capacity {
            return Err(Rejected::Full(item));
        }
        inner.items.push_back(item);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Push `item` unless an equal item is already queued.
    ///
    /// Returns `Ok(false)` when it was already present. The check and the
    /// push happen under one lock.
    pub fn offer_if_absent<F>(&self, item: T, same: F) -> Result<bool, Rejected<T>>
    where
        F: FnMut(&T, &T) -> bool,
    {
        self.offer_if_absent_with(item, same, |_| ())
    }

    /// Like [`offer_if_absent`](Self::offer_if_absent), running `admit` under
    /// the queue lock once the item is known to end up queued.
    ///
    /// `admit` never runs when the offer is rejected, and no consumer can see
    /// the item before `admit` returns.
    pub fn offer_if_absent_with<F, A>(&self, item: T, mut same: F, admit: A) -> Result<bool, Rejected<T>>
    where
        F: FnMut(&T, &T) -> bool,
        A: FnOnce(&T),
    {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Rejected::Closed(item));
        }
        if inner.items.iter().any(|queued| same(queued, &item)) {
            admit(&item);
            return Ok(false);
        }
        if inner.items.len() >= self.capacity {
            return Err(Rejected::Full(item));
        }
        admit(&item);
        inner.items.push_back(item);
        drop(inner);
        self.not_empty.notify_one();
        Ok(true)
    }

    /// Move the first item `matches` selects into `to`, if `claim` agrees.
    ///
    /// Both locks are held for the whole step (`self` first, then `to`), so
    /// the item is never outside both queues and keeps its position when it
    /// stays. Capacity of `to` is checked before `claim` runs. Returns
    /// `Ok(false)` when nothing matched or `claim` declined.
    pub fn transfer_where<M, C>(&self, to: &BoundedQueue<T>, mut matches: M, claim: C) -> Result<bool, Rejected<()>>
    where
        M: FnMut(&T) -> bool,
        C: FnOnce(&T) -> bool,
    {
        let mut source = self.inner.lock();
        let Some(pos) = source.items.iter().position(&mut matches) else {
            return Ok(false);
        };

        let mut target = to.inner.lock();
        if target.closed {
            return Err(Rejected::Closed(()));
        }
        if target.items.len() >= to.capacity {
            return Err(Rejected::Full(()));
        }
        if !claim(&source.items[pos]) {
            return Ok(false);
        }

        if let Some(item) = source.items.remove(pos) {
            target.items.push_back(item);
        }
        drop(target);
        drop(source);
        to.not_empty.notify_one();
        Ok(true)
    }

    pub fn try_poll(&self) -> Option<T> {
        self.inner.lock().items.pop_front()
    }

    /// Wait until `accept` takes an item or `deadline` passes.
    ///
    /// `accept` runs under the queue lock against every queued item in order;
    /// the first item it accepts is removed and returned. Items it declines
    /// stay queued. The queue is rescanned on every push and at least once
    /// per `recheck`, so state that changes without a push is still seen.
    pub fn poll_where<F>(
        &self,
        deadline: Instant,
        recheck: Duration,
        mut accept: F,
    ) -> Result<Option<T>, QueueClosed>
    where
        F: FnMut(&T) -> bool,
    {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return Err(QueueClosed);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            if let Some(pos) = inner.items.iter().position(&mut accept) {
                return Ok(inner.items.remove(pos));
            }
            let wake_at = now.checked_add(recheck).map_or(deadline, |at| deadline.min(at));
            self.not_empty.wait_until(&mut inner, wake_at);
        }
    }

    pub fn remove_where<F>(&self, mut matches: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut inner = self.inner.lock();
        let pos = inner.items.iter().position(&mut matches)?;
        inner.items.remove(pos)
    }

    pub fn contains_where<F>(&self, matches: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.inner.lock().items.iter().any(matches)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Reject further offers and wake every waiter
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl<T: Clone> BoundedQueue<T> {
    pub fn snapshot(&self) -> Vec<T> {
        self.inner.lock().items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_offer_rejects_when_full() {
        let queue = BoundedQueue::new(2);
        assert!(queue.offer(1).is_ok());
        assert!(queue.offer(2).is_ok());
        assert!(matches!(queue.offer(3), Err(Rejected::Full(3))));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_fifo_order() {
        let queue = BoundedQueue::new(3);
        for i in 0..3 {
            queue.offer(i).unwrap();
        }
        assert_eq!(queue.try_poll(), Some(0));
        assert_eq!(queue.try_poll(), Some(1));
        assert_eq!(queue.try_poll(), Some(2));
        assert_eq!(queue.try_poll(), None);
    }

    #[test]
    fn test_poll_where_skips_declined_items() {
        let queue = BoundedQueue::new(4);
        for i in 1..=4 {
            queue.offer(i).unwrap();
        }

        let deadline = Instant::now() + Duration::from_millis(50);
        let found = queue
            .poll_where(deadline, Duration::from_millis(5), |v| v % 2 == 0)
            .unwrap();

        assert_eq!(found, Some(2));
        assert_eq!(queue.snapshot(), vec![1, 3, 4]);
    }

    #[test]
    fn test_poll_where_times_out() {
        let queue = BoundedQueue::new(1);
        queue.offer(1).unwrap();

        let wait = Duration::from_millis(40);
        let start = Instant::now();
        let found = queue
            .poll_where(start + wait, Duration::from_millis(5), |_| false)
            .unwrap();

        assert_eq!(found, None);
        assert!(start.elapsed() >= wait);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_poll_where_wakes_on_offer() {
        let queue = Arc::new(BoundedQueue::new(1));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.offer(7).unwrap();
            })
        };

        let deadline = Instant::now() + Duration::from_secs(2);
        let found = queue
            .poll_where(deadline, Duration::from_secs(1), |_| true)
            .unwrap();

        producer.join().unwrap();
        assert_eq!(found, Some(7));
    }

    #[test]
    fn test_close_interrupts_waiters() {
        let queue: Arc<BoundedQueue<i32>> = Arc::new(BoundedQueue::new(1));
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let deadline = Instant::now() + Duration::from_secs(5);
                queue.poll_where(deadline, Duration::from_secs(5), |_| true)
            })
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();

        assert_eq!(waiter.join().unwrap(), Err(QueueClosed));
        assert!(queue.is_closed());
        assert!(matches!(queue.offer(1), Err(Rejected::Closed(1))));
    }

    #[test]
    fn test_offer_if_absent_deduplicates() {
        let queue = BoundedQueue::new(2);
        assert!(queue.offer_if_absent(1, |a, b| a == b).unwrap());
        assert!(!queue.offer_if_absent(1, |a, b| a == b).unwrap());
        assert!(queue.offer_if_absent(2, |a, b| a == b).unwrap());

        // A duplicate of a queued item is not a capacity failure
        assert!(!queue.offer_if_absent(2, |a, b| a == b).unwrap());
        assert!(matches!(queue.offer_if_absent(3, |a, b| a == b), Err(Rejected::Full(3))));
        assert_eq!(queue.snapshot(), vec![1, 2]);
    }

    #[test]
    fn test_poll_where_with_unbounded_recheck() {
        let queue = BoundedQueue::new(1);
        queue.offer(1).unwrap();

        let wait = Duration::from_millis(20);
        let start = Instant::now();
        let found = queue
            .poll_where(start + wait, Duration::MAX, |_| false)
            .unwrap();

        assert_eq!(found, None);
        assert!(start.elapsed() >= wait);
    }

    #[test]
    fn test_admit_runs_only_when_queued() {
        let queue = BoundedQueue::new(1);
        let mut admitted = Vec::new();

        assert!(queue.offer_if_absent_with(1, |a, b| a == b, |v| admitted.push(*v)).unwrap());
        assert!(!queue.offer_if_absent_with(1, |a, b| a == b, |v| admitted.push(*v)).unwrap());
        assert!(matches!(
            queue.offer_if_absent_with(2, |a, b| a == b, |v| admitted.push(*v)),
            Err(Rejected::Full(2))
        ));

        assert_eq!(admitted, vec![1, 1]);
    }

    #[test]
    fn test_transfer_where() {
        let source = BoundedQueue::new(3);
        let target = BoundedQueue::new(1);
        for i in 1..=3 {
            source.offer(i).unwrap();
        }

        // Declined items keep their place
        assert!(!source.transfer_where(&target, |v| *v == 1, |_| false).unwrap());
        assert_eq!(source.snapshot(), vec![1, 2, 3]);

        assert!(source.transfer_where(&target, |v| *v == 2, |_| true).unwrap());
        assert_eq!(source.snapshot(), vec![1, 3]);
        assert_eq!(target.snapshot(), vec![2]);

        // A full target leaves the source untouched and never consults claim
        let result = source.transfer_where(&target, |v| *v == 3, |_| panic!("claimed"));
        assert!(matches!(result, Err(Rejected::Full(()))));
        assert_eq!(source.snapshot(), vec![1, 3]);

        assert!(!source.transfer_where(&target, |v| *v == 9, |_| true).unwrap());
    }

    #[test]
    fn test_remove_where() {
        let queue = BoundedQueue::new(3);
        queue.offer("a").unwrap();
        queue.offer("b").unwrap();

        assert!(queue.contains_where(|v| *v == "b"));
        assert_eq!(queue.remove_where(|v| *v == "b"), Some("b"));
        assert!(!queue.contains_where(|v| *v == "b"));
        assert_eq!(queue.remove_where(|v| *v == "z"), None);
        assert!(!queue.is_empty());
    }
}
