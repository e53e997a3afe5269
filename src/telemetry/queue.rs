//! Pending event queue.

use crate::telemetry::event::Event;
use std::collections::VecDeque;

/// Events taken out of the queue for one send.
///
/// Each event keeps the sequence number it was queued with, so a batch
/// that fails can be merged back in its original position even when other
/// batches were taken, sent or re-queued in the meantime.
#[derive(Debug, Default)]
pub struct Batch {
    seqs: Vec<u64>,
    events: Vec<Event>,
}

impl Batch {
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Events waiting to be sent, ordered by when they were first queued.
///
/// The queue itself is unbounded on `push`; the pipeline flushes it once it
/// reaches `max_queue_size`. `max_buffered` only applies when a failed
/// batch is put back, which is the one path that can grow without limit
/// while the backend is down.
#[derive(Debug)]
pub struct EventQueue {
    entries: VecDeque<(u64, Event)>,
    next_seq: u64,
    max_buffered: usize,
}

impl EventQueue {
    pub fn new(max_buffered: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            next_seq: 0,
            max_buffered: max_buffered.max(1),
        }
    }

    /// Append an event, returning the new length.
    pub fn push(&mut self, event: Event) -> usize {
        self.entries.push_back((self.next_seq, event));
        self.next_seq += 1;
        self.entries.len()
    }

    /// Empty the queue into a batch.
    pub fn take_all(&mut self) -> Batch {
        let (seqs, events) = std::mem::take(&mut self.entries).into_iter().unzip();
        Batch { seqs, events }
    }

    /// Put a failed batch back where its events were queued: ahead of
    /// anything queued later, behind anything older that is already back.
    ///
    /// If that pushes the queue past `max_buffered`, the oldest events are
    /// dropped. Returns how many were dropped.
    pub fn requeue(&mut self, batch: Batch) -> usize {
        let queued = std::mem::take(&mut self.entries);
        let mut queued = queued.into_iter().peekable();
        let mut failed = batch.seqs.into_iter().zip(batch.events).peekable();

        let mut merged = VecDeque::with_capacity(queued.len() + failed.len());
        loop {
            let take_failed = match (failed.peek(), queued.peek()) {
                (Some((a, _)), Some((b, _))) => a < b,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_failed {
                failed.next()
            } else {
                queued.next()
            };
            merged.extend(next);
        }
        self.entries = merged;

        let overflow = self.entries.len().saturating_sub(self.max_buffered);
        self.entries.drain(..overflow);
        overflow
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter().map(|(_, event)| event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::event::{
        Category, DeviceInfo, EventContext, PageInfo, Properties, SessionInfo, UserInfo,
    };

    fn event(name: &str) -> Event {
        Event {
            id: name.to_string(),
            name: name.to_string(),
            category: Category::UserInteraction,
            timestamp: 0,
            session_id: "s".to_string(),
            user_id: None,
            properties: Properties::new(),
            context: EventContext {
                page: PageInfo::default(),
                user: UserInfo::default(),
                session: SessionInfo::default(),
                device: DeviceInfo::default(),
                campaign: None,
            },
            value: None,
        }
    }

    fn names(queue: &EventQueue) -> Vec<&str> {
        queue.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_push_preserves_order() {
        let mut queue = EventQueue::new(100);
        assert_eq!(queue.push(event("a")), 1);
        assert_eq!(queue.push(event("b")), 2);
        assert_eq!(names(&queue), vec!["a", "b"]);
    }

    #[test]
    fn test_take_all_empties_queue() {
        let mut queue = EventQueue::new(100);
        queue.push(event("a"));
        queue.push(event("b"));

        let batch = queue.take_all();
        assert_eq!(batch.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_keeps_failed_batch_first() {
        let mut queue = EventQueue::new(100);
        queue.push(event("a"));
        queue.push(event("b"));
        let failed = queue.take_all();

        queue.push(event("c"));
        let dropped = queue.requeue(failed);

        assert_eq!(dropped, 0);
        assert_eq!(names(&queue), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_requeue_drops_oldest_over_cap() {
        let mut queue = EventQueue::new(3);
        queue.push(event("a"));
        queue.push(event("b"));
        queue.push(event("c"));
        let failed = queue.take_all();

        queue.push(event("d"));
        let dropped = queue.requeue(failed);

        assert_eq!(dropped, 1);
        assert_eq!(names(&queue), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_requeue_out_of_order_restores_queue_order() {
        let mut queue = EventQueue::new(100);
        queue.push(event("a"));
        queue.push(event("b"));
        let older = queue.take_all();
        queue.push(event("c"));
        let newer = queue.take_all();
        queue.push(event("d"));

        // The newer batch fails first, then the older one
        queue.requeue(newer);
        queue.requeue(older);
        assert_eq!(names(&queue), vec!["a", "b", "c", "d"]);

        let everything = queue.take_all();
        queue.push(event("e"));
        queue.requeue(everything);
        assert_eq!(names(&queue), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_batch_exposes_events_in_order() {
        let mut queue = EventQueue::new(100);
        queue.push(event("a"));
        queue.push(event("b"));

        let batch = queue.take_all();
        let names: Vec<&str> = batch.events().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(EventQueue::new(1).take_all().is_empty());
    }

    #[test]
    fn test_zero_cap_is_treated_as_one() {
        let mut queue = EventQueue::new(0);
        queue.push(event("a"));
        queue.push(event("b"));
        let failed = queue.take_all();

        let dropped = queue.requeue(failed);
        assert_eq!(dropped, 1);
        assert_eq!(names(&queue), vec!["b"]);
    }
}
