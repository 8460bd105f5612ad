//! Reservation ledger: one strict-FIFO queue of waiting members per book.
//!
//! A queue exists only between its first `enqueue` and the moment it becomes
//! empty again. Every other operation treats a missing queue as an empty one
//! and never creates it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use libcirc_core::{BookId, CirculationError, CirculationResult, UserId};

/// Serializable form of one book's queue (head first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationQueue {
    pub book_id: BookId,
    pub user_ids: Vec<UserId>,
}

#[derive(Debug, Clone, Default)]
pub struct ReservationLedger {
    queues: BTreeMap<BookId, Vec<UserId>>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Members waiting for `book_id`, head first (empty if nobody is waiting).
    pub fn queue_for(&self, book_id: BookId) -> &[UserId] {
        self.queues.get(&book_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn head(&self, book_id: BookId) -> Option<UserId> {
        self.queue_for(book_id).first().copied()
    }

    /// True when somebody other than `user_id` holds priority on the book.
    pub fn head_is_other(&self, book_id: BookId, user_id: UserId) -> bool {
        self.head(book_id).is_some_and(|head| head != user_id)
    }

    /// 1-based rank of `user_id` in the book's queue.
    pub fn position_of(&self, book_id: BookId, user_id: UserId) -> Option<usize> {
        self.queue_for(book_id)
            .iter()
            .position(|&u| u == user_id)
            .map(|i| i + 1)
    }

    /// Append `user_id` at the tail, creating the queue if needed.
    ///
    /// Returns the new 1-based position.
    pub fn enqueue(&mut self, book_id: BookId, user_id: UserId) -> CirculationResult<usize> {
        if self.position_of(book_id, user_id).is_some() {
            return Err(CirculationError::AlreadyReserved);
        }
        let queue = self.queues.entry(book_id).or_default();
        queue.push(user_id);
        Ok(queue.len())
    }

    /// Remove and return the head of the queue.
    pub fn dequeue_head(&mut self, book_id: BookId) -> Option<UserId> {
        let queue = self.queues.get_mut(&book_id)?;
        if queue.is_empty() {
            return None;
        }
        let head = queue.remove(0);
        self.prune(book_id);
        Some(head)
    }

    /// Remove `user_id` wherever it is in the queue. Returns whether it was present.
    pub fn remove(&mut self, book_id: BookId, user_id: UserId) -> bool {
        let Some(queue) = self.queues.get_mut(&book_id) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|&u| u != user_id);
        let removed = queue.len() != before;
        self.prune(book_id);
        removed
    }

    /// Every book `user_id` is waiting for, with their position.
    pub fn reservations_of(&self, user_id: UserId) -> Vec<(BookId, usize)> {
        self.queues
            .iter()
            .filter_map(|(&book_id, queue)| {
                queue
                    .iter()
                    .position(|&u| u == user_id)
                    .map(|i| (book_id, i + 1))
            })
            .collect()
    }

    /// Non-empty queues in book id order.
    pub fn queues(&self) -> Vec<ReservationQueue> {
        self.queues
            .iter()
            .map(|(&book_id, user_ids)| ReservationQueue {
                book_id,
                user_ids: user_ids.clone(),
            })
            .collect()
    }

    /// Rebuild from serialized queues, rejecting duplicates.
    pub(crate) fn from_queues(queues: Vec<ReservationQueue>) -> CirculationResult<Self> {
        let mut ledger = Self::new();
        for queue in queues {
            if ledger.queues.contains_key(&queue.book_id) {
                return Err(CirculationError::invariant(format!(
                    "book {} has more than one reservation queue",
                    queue.book_id
                )));
            }
            for user_id in queue.user_ids {
                ledger.enqueue(queue.book_id, user_id).map_err(|_| {
                    CirculationError::invariant(format!(
                        "user {user_id} queued twice for book {}",
                        queue.book_id
                    ))
                })?;
            }
        }
        Ok(ledger)
    }

    fn prune(&mut self, book_id: BookId) {
        if self.queues.get(&book_id).is_some_and(Vec::is_empty) {
            self.queues.remove(&book_id);
        }
    }
}
