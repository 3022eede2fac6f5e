//! Discrete-event queue over virtual time.
//!
//! Events run in non-decreasing time order. Events scheduled for the same
//! instant run in the order they were scheduled.

use log::warn;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

struct Scheduled<E> {
    at: Duration,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

pub struct Scheduler<E> {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Scheduled<E>>>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            queue: BinaryHeap::new(),
        }
    }

    /// Current virtual time: the timestamp of the last popped event.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Schedule `event` at absolute time `at`. Times in the past run now.
    pub fn schedule_at(&mut self, at: Duration, event: E) {
        let at = if at < self.now {
            warn!("event scheduled in the past ({:?} < {:?}), running it now", at, self.now);
            self.now
        } else {
            at
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled { at, seq, event }));
    }

    /// Schedule `event` after `delay` from now.
    pub fn schedule_in(&mut self, delay: Duration, event: E) {
        self.schedule_at(self.now + delay, event);
    }

    /// Time of the next event, if any.
    pub fn peek_time(&self) -> Option<Duration> {
        self.queue.peek().map(|Reverse(s)| s.at)
    }

    /// Remove the next event and advance the clock to it.
    pub fn pop(&mut self) -> Option<(Duration, E)> {
        let Reverse(next) = self.queue.pop()?;
        self.now = next.at;
        Some((next.at, next.event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_order() {
        let mut s = Scheduler::new();
        s.schedule_at(Duration::from_secs(3), "c");
        s.schedule_at(Duration::from_secs(1), "a");
        s.schedule_at(Duration::from_secs(2), "b");

        let order: Vec<_> = std::iter::from_fn(|| s.pop()).map(|(_, e)| e).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(s.now(), Duration::from_secs(3));
    }

    #[test]
    fn test_fifo_at_equal_time() {
        let mut s = Scheduler::new();
        for i in 0..10 {
            s.schedule_at(Duration::from_millis(5), i);
        }
        let order: Vec<_> = std::iter::from_fn(|| s.pop()).map(|(_, e)| e).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_schedule_in_is_relative() {
        let mut s = Scheduler::new();
        s.schedule_at(Duration::from_secs(1), 0);
        s.pop();
        s.schedule_in(Duration::from_millis(500), 1);
        assert_eq!(s.peek_time(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_past_events_run_now() {
        let mut s = Scheduler::new();
        s.schedule_at(Duration::from_secs(2), 0);
        s.pop();
        s.schedule_at(Duration::from_secs(1), 1);
        assert_eq!(s.pop(), Some((Duration::from_secs(2), 1)));
        assert!(s.is_empty());
    }
}
