//! Pending portable events, in server delivery order

use std::collections::VecDeque;

use crate::event::{Event, EventTypeMask};

/// FIFO of translated events owned by the application.
///
/// Only the main thread touches it, so there is no locking.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, event: Event, at_front: bool) {
        if at_front {
            self.events.push_front(event);
        } else {
            self.events.push_back(event);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Index of the first event whose type is in `mask`.
    pub fn position(&self, mask: EventTypeMask) -> Option<usize> {
        self.events.iter().position(|e| e.matches(mask))
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn remove(&mut self, index: usize) -> Option<Event> {
        self.events.remove(index)
    }

    /// Drop the leading run of events older than `reference`.
    /// Returns how many were dropped.
    pub fn discard_before(&mut self, reference: &Event) -> usize {
        let count = self
            .events
            .iter()
            .take_while(|e| e.timestamp() < reference.timestamp())
            .count();
        self.events.drain(..count);
        count
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventSubtype, WindowNumber};
    use std::time::Duration;

    fn at(ms: u64) -> Event {
        Event::toolkit(EventSubtype::WindowExposed, Some(WindowNumber(0)))
            .with_timestamp(Duration::from_millis(ms))
    }

    fn timestamps(queue: &EventQueue) -> Vec<u64> {
        queue.iter().map(|e| e.timestamp().as_millis() as u64).collect()
    }

    #[test]
    fn test_post_front_and_back() {
        let mut queue = EventQueue::new();
        queue.post(at(1), false);
        queue.post(at(2), false);
        queue.post(at(0), true);
        assert_eq!(timestamps(&queue), vec![0, 1, 2]);
    }

    #[test]
    fn test_discard_removes_older_prefix() {
        let mut queue = EventQueue::new();
        for ms in [1, 2, 3, 5, 4, 6] {
            queue.post(at(ms), false);
        }
        assert_eq!(queue.discard_before(&at(4)), 3);
        // 4 sits behind 5 and is kept; order is untouched
        assert_eq!(timestamps(&queue), vec![5, 4, 6]);
    }

    #[test]
    fn test_discard_is_idempotent() {
        let mut queue = EventQueue::new();
        for ms in [1, 2, 8] {
            queue.post(at(ms), false);
        }
        let reference = at(5);
        queue.discard_before(&reference);
        assert_eq!(queue.discard_before(&reference), 0);
        assert_eq!(timestamps(&queue), vec![8]);
    }

    #[test]
    fn test_discard_everything_older() {
        let mut queue = EventQueue::new();
        queue.post(at(1), false);
        queue.post(at(2), false);
        assert_eq!(queue.discard_before(&at(10)), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_position_by_mask() {
        let mut queue = EventQueue::new();
        queue.post(Event::ignored(), false);
        queue.post(at(3), false);
        assert_eq!(queue.position(EventTypeMask::TOOLKIT_DEFINED), Some(0));
        assert_eq!(queue.position(EventTypeMask::ANY_MOUSE), None);
        assert!(queue.remove(0).unwrap().is_ignored());
        assert_eq!(queue.len(), 1);
    }
}
