//! Session façade: the command/query surface used by a front end.
//!
//! `Library` adds the two things the engine deliberately does not know about:
//! who is logged in right now, and what time it is. Every command resolves
//! both and delegates to [`CirculationEngine`]. After each command, new
//! journal entries are broadcast to subscribers so that a view layer can
//! refresh from post-command state instead of sharing mutable state.

use std::sync::Arc;

use libcirc_core::{BookId, CirculationResult, IdGenerator, LoanId, UserId, UuidV7Ids};
use libcirc_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};

use crate::catalog::{Book, Catalog};
use crate::clock::{Clock, SystemClock};
use crate::engine::{CirculationEngine, ReturnReceipt};
use crate::events::CirculationEvent;
use crate::fines::{FineAssessment, FineRecord};
use crate::loans::Loan;
use crate::policy::CirculationPolicy;
use crate::snapshot::CirculationSnapshot;
use crate::users::User;

pub type CirculationBus = InMemoryEventBus<EventEnvelope<CirculationEvent>>;

#[derive(Debug)]
pub struct Library<C: Clock = SystemClock, G: IdGenerator = UuidV7Ids> {
    engine: CirculationEngine<G>,
    clock: C,
    current_user: Option<UserId>,
    bus: Arc<CirculationBus>,
    published: u64,
}

impl Library<SystemClock, UuidV7Ids> {
    /// Production wiring: system clock, UUIDv7 ids.
    pub fn new(policy: CirculationPolicy, catalog: Catalog) -> Self {
        Self::with_engine(CirculationEngine::new(policy, catalog), SystemClock)
    }
}

impl<C: Clock, G: IdGenerator> Library<C, G> {
    pub fn with_engine(engine: CirculationEngine<G>, clock: C) -> Self {
        let published = engine.last_event_sequence();
        Self {
            engine,
            clock,
            current_user: None,
            bus: Arc::new(CirculationBus::new()),
            published,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────

    /// Register and log in as the new member.
    pub fn register(&mut self, name: &str, email: &str) -> CirculationResult<User> {
        let now = self.clock.now();
        let user = self.engine.register_user(name, email, now)?;
        self.current_user = Some(user.id);
        self.publish_new_events();
        Ok(user)
    }

    pub fn login(&mut self, email: &str) -> CirculationResult<User> {
        let user = self.engine.find_user_by_email(email)?.clone();
        self.current_user = Some(user.id);
        tracing::info!(user_id = %user.id, "logged in");
        Ok(user)
    }

    pub fn logout(&mut self) {
        if let Some(user_id) = self.current_user.take() {
            tracing::info!(%user_id, "logged out");
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.and_then(|id| self.engine.user_by_id(id))
    }

    pub fn seed_if_empty(
        &mut self,
        books: impl IntoIterator<Item = Book>,
    ) -> CirculationResult<bool> {
        self.engine.seed_if_empty(books)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands (acting as the current user, at the clock's "now")
    // ─────────────────────────────────────────────────────────────────────

    pub fn borrow(&mut self, book_id: BookId) -> CirculationResult<Loan> {
        let now = self.clock.now();
        let result = self.engine.borrow(self.current_user, book_id, now);
        self.publish_new_events();
        result
    }

    pub fn return_loan(&mut self, loan_id: LoanId) -> CirculationResult<ReturnReceipt> {
        let now = self.clock.now();
        let result = self.engine.return_loan(loan_id, now);
        self.publish_new_events();
        result
    }

    pub fn renew(&mut self, loan_id: LoanId) -> CirculationResult<Loan> {
        let now = self.clock.now();
        let result = self.engine.renew(self.current_user, loan_id, now);
        self.publish_new_events();
        result
    }

    pub fn reserve(&mut self, book_id: BookId) -> CirculationResult<usize> {
        let now = self.clock.now();
        let result = self.engine.reserve(self.current_user, book_id, now);
        self.publish_new_events();
        result
    }

    pub fn cancel_reservation(&mut self, book_id: BookId) -> CirculationResult<bool> {
        let now = self.clock.now();
        let result = self.engine.cancel_reservation(self.current_user, book_id, now);
        self.publish_new_events();
        result
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    pub fn book_by_id(&self, book_id: BookId) -> Option<&Book> {
        self.engine.book_by_id(book_id)
    }

    pub fn books(&self) -> &[Book] {
        self.engine.catalog().books()
    }

    pub fn loans_of(&self, user_id: UserId) -> Vec<&Loan> {
        self.engine.open_loans_of(user_id)
    }

    pub fn reservation_position_of(&self, book_id: BookId, user_id: UserId) -> Option<usize> {
        self.engine.reservation_position_of(book_id, user_id)
    }

    /// Fine the loan would incur if returned now.
    pub fn fine_of(&self, loan: &Loan) -> FineAssessment {
        self.engine.fine_of(loan, self.clock.now())
    }

    pub fn reservations_of(&self, user_id: UserId) -> Vec<(BookId, usize)> {
        self.engine.reservations_of(user_id)
    }

    pub fn fines_of(&self, user_id: UserId) -> Vec<&FineRecord> {
        self.engine.fines_of_user(user_id)
    }

    pub fn engine(&self) -> &CirculationEngine<G> {
        &self.engine
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn snapshot(&self) -> CirculationSnapshot {
        self.engine.snapshot()
    }

    /// Receive every journal entry produced from now on.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<CirculationEvent>> {
        self.bus.subscribe()
    }

    fn publish_new_events(&mut self) {
        for envelope in self.engine.events_since(self.published) {
            if let Err(err) = self.bus.publish(envelope.clone()) {
                tracing::warn!(?err, sequence = envelope.sequence_number(), "event publish failed");
            }
        }
        self.published = self.engine.last_event_sequence();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use libcirc_core::{CirculationError, SequentialIds};

    use super::*;
    use crate::clock::FixedClock;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap()
    }

    fn test_library(copies: u32) -> (Library<FixedClock, SequentialIds>, BookId) {
        let book = Book::new(
            BookId::new(),
            "The Left Hand of Darkness",
            "Ursula K. Le Guin",
            copies,
        );
        let id = book.id;
        let engine = CirculationEngine::with_ids(
            CirculationPolicy::default(),
            Catalog::from_seed([book]).unwrap(),
            SequentialIds::new(),
        );
        (Library::with_engine(engine, FixedClock::new(test_time())), id)
    }

    #[test]
    fn commands_require_a_session() {
        let (mut library, book) = test_library(1);
        assert_eq!(library.borrow(book).unwrap_err(), CirculationError::NotAuthenticated);
        assert_eq!(library.reserve(book).unwrap_err(), CirculationError::NotAuthenticated);
        assert_eq!(
            library.cancel_reservation(book).unwrap_err(),
            CirculationError::NotAuthenticated
        );
    }

    #[test]
    fn register_logs_in_and_logout_ends_session() {
        let (mut library, book) = test_library(1);
        let ada = library.register("Ada", "ada@example.com").unwrap();
        assert_eq!(library.current_user().map(|u| u.id), Some(ada.id));

        library.borrow(book).unwrap();
        library.logout();
        assert!(library.current_user().is_none());
        assert_eq!(library.renew(LoanId::new()).unwrap_err(), CirculationError::NotAuthenticated);
    }

    #[test]
    fn login_switches_member() {
        let (mut library, _) = test_library(1);
        let ada = library.register("Ada", "ada@example.com").unwrap();
        let bob = library.register("Bob", "bob@example.com").unwrap();
        assert_eq!(library.current_user().unwrap().id, bob.id);

        library.login("ADA@example.com").unwrap();
        assert_eq!(library.current_user().unwrap().id, ada.id);

        assert_eq!(
            library.login("nobody@example.com").unwrap_err(),
            CirculationError::AccountNotFound
        );
        // A failed login keeps the previous session.
        assert_eq!(library.current_user().unwrap().id, ada.id);
    }

    #[test]
    fn duplicate_registration_keeps_session() {
        let (mut library, _) = test_library(1);
        let ada = library.register("Ada", "ada@example.com").unwrap();
        assert_eq!(
            library.register("Ada again", "ada@example.com").unwrap_err(),
            CirculationError::EmailAlreadyRegistered
        );
        assert_eq!(library.current_user().unwrap().id, ada.id);
    }

    #[test]
    fn fine_of_uses_the_clock() {
        let (mut library, book) = test_library(1);
        library.register("Ada", "ada@example.com").unwrap();
        let loan = library.borrow(book).unwrap();

        assert_eq!(library.fine_of(&loan), FineAssessment::NONE);
        library.clock().advance(Duration::days(16));
        assert_eq!(library.fine_of(&loan).days_overdue, 2);

        let receipt = library.return_loan(loan.id()).unwrap();
        assert_eq!(receipt.fine.map(|f| f.amount), Some(2));
    }

    #[test]
    fn subscribers_see_post_command_events() {
        let (mut library, book) = test_library(1);
        let events = library.subscribe();

        let ada = library.register("Ada", "ada@example.com").unwrap();
        library.reserve(book).unwrap();
        library.borrow(book).unwrap();
        // Rejected commands publish nothing.
        let _ = library.borrow(book);

        let received: Vec<String> = events
            .drain()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(
            received,
            vec![
                "circulation.member.registered",
                "circulation.book.reserved",
                "circulation.book.borrowed",
            ]
        );
        assert!(library.reservations_of(ada.id).is_empty());
    }
}
