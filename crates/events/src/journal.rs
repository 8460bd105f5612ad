//! Append-only in-memory event journal.

use uuid::Uuid;

use crate::{Event, EventEnvelope};

/// Ordered log of everything that happened, in command order.
///
/// The journal never rewrites or drops entries. Sequence numbers start at 1 so
/// that `since(0)` means "everything".
#[derive(Debug, Clone)]
pub struct EventJournal<E> {
    entries: Vec<EventEnvelope<E>>,
}

impl<E> Default for EventJournal<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: Event> EventJournal<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payload and return the envelope it was stored in.
    pub fn append(&mut self, event_id: Uuid, payload: E) -> &EventEnvelope<E> {
        let sequence_number = self.last_sequence() + 1;
        self.entries
            .push(EventEnvelope::new(event_id, sequence_number, payload));
        &self.entries[self.entries.len() - 1]
    }
}

impl<E> EventJournal<E> {
    /// Sequence number of the newest entry (0 when empty).
    pub fn last_sequence(&self) -> u64 {
        self.entries
            .last()
            .map(|e| e.sequence_number())
            .unwrap_or(0)
    }

    /// Entries with a sequence number strictly greater than `sequence`.
    pub fn since(&self, sequence: u64) -> &[EventEnvelope<E>] {
        let start = self.entries.partition_point(|e| e.sequence_number() <= sequence);
        &self.entries[start..]
    }

    pub fn entries(&self) -> &[EventEnvelope<E>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
