//! Circulation engine: the command state machine over books, loans,
//! reservation queues and fines.
//!
//! Every command validates all of its preconditions against the current
//! ledgers before touching any of them, so a rejected command leaves no trace.
//! Successful commands append one or more [`CirculationEvent`]s to the journal.
//!
//! # Invariants
//! - For every book: `available_copies + open loans on it == total_copies`.
//! - A (user, book) pair has at most one open loan.
//! - `renew_count <= max_renews` for every loan.
//! - Reservation queues are strict FIFO without duplicates.

use chrono::{DateTime, Utc};

use libcirc_core::{
    BookId, CirculationError, CirculationResult, FineId, IdGenerator, LoanId, UserId, UuidV7Ids,
};
use libcirc_events::{EventEnvelope, EventJournal};

use crate::catalog::{Book, Catalog};
use crate::events::{
    BookBorrowed, BookReserved, BookReturned, CirculationEvent, FineAssessed, LoanRenewed,
    MemberRegistered, ReservationCancelled,
};
use crate::fines::{FineAssessment, FineLedger, FineRecord, compute_fine};
use crate::loans::{Loan, LoanLedger};
use crate::policy::CirculationPolicy;
use crate::reservations::ReservationLedger;
use crate::users::{User, UserRegistry};

/// Outcome of a successful return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnReceipt {
    /// The loan as stored after closing.
    pub loan: Loan,
    /// Present only when the loan came back at least one whole day late.
    pub fine: Option<FineRecord>,
}

pub struct CirculationEngine<G: IdGenerator = UuidV7Ids> {
    policy: CirculationPolicy,
    catalog: Catalog,
    users: UserRegistry,
    loans: LoanLedger,
    reservations: ReservationLedger,
    fines: FineLedger,
    journal: EventJournal<CirculationEvent>,
    ids: G,
}

impl CirculationEngine<UuidV7Ids> {
    pub fn new(policy: CirculationPolicy, catalog: Catalog) -> Self {
        Self::with_ids(policy, catalog, UuidV7Ids)
    }
}

impl<G: IdGenerator> CirculationEngine<G> {
    pub fn with_ids(policy: CirculationPolicy, catalog: Catalog, ids: G) -> Self {
        Self {
            policy,
            catalog,
            users: UserRegistry::new(),
            loans: LoanLedger::new(&policy),
            reservations: ReservationLedger::new(),
            fines: FineLedger::new(),
            journal: EventJournal::new(),
            ids,
        }
    }

    pub(crate) fn from_parts(
        policy: CirculationPolicy,
        catalog: Catalog,
        users: UserRegistry,
        loans: LoanLedger,
        reservations: ReservationLedger,
        fines: FineLedger,
        ids: G,
    ) -> Self {
        Self {
            policy,
            catalog,
            users,
            loans,
            reservations,
            fines,
            journal: EventJournal::new(),
            ids,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Members
    // ─────────────────────────────────────────────────────────────────────

    pub fn register_user(
        &mut self,
        name: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> CirculationResult<User> {
        let id: UserId = self.ids.next_id();
        let user = self
            .users
            .register(id, name, email)
            .inspect_err(|e| rejected("register", e))?
            .clone();

        self.record(CirculationEvent::MemberRegistered(MemberRegistered {
            user_id: user.id,
            email: user.email.clone(),
            occurred_at: now,
        }));
        tracing::info!(user_id = %user.id, "member registered");
        Ok(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> CirculationResult<&User> {
        self.users.find_by_email(email)
    }

    /// Populate an empty catalog. Returns `false` (and changes nothing) if
    /// books are already present.
    pub fn seed_if_empty(
        &mut self,
        books: impl IntoIterator<Item = Book>,
    ) -> CirculationResult<bool> {
        if !self.catalog.is_empty() {
            return Ok(false);
        }
        self.catalog = Catalog::from_seed(books)?;
        tracing::info!(books = self.catalog.len(), "catalog seeded");
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────

    /// Lend a copy of `book_id` to the acting member.
    ///
    /// # Errors (first failing check wins)
    /// `NotAuthenticated`, `BookNotFound`, `AlreadyBorrowed`, `ReservedByOther`,
    /// `NoCopiesAvailable`, then `InvariantViolation` if the due date would
    /// fall outside the calendar.
    pub fn borrow(
        &mut self,
        user: Option<UserId>,
        book_id: BookId,
        now: DateTime<Utc>,
    ) -> CirculationResult<Loan> {
        self.check_borrow(user, book_id, now)
            .inspect_err(|e| rejected("borrow", e))
            .and_then(|user_id| self.apply_borrow(user_id, book_id, now))
    }

    fn check_borrow(
        &self,
        user: Option<UserId>,
        book_id: BookId,
        now: DateTime<Utc>,
    ) -> CirculationResult<UserId> {
        let user_id = self.authenticate(user)?;
        let book = self
            .catalog
            .find_book(book_id)
            .ok_or(CirculationError::BookNotFound)?;
        if self.loans.open_loan_of(user_id, book_id).is_some() {
            return Err(CirculationError::AlreadyBorrowed);
        }
        if self.reservations.head_is_other(book_id, user_id) {
            return Err(CirculationError::ReservedByOther);
        }
        if !book.is_available() {
            return Err(CirculationError::NoCopiesAvailable);
        }
        self.loans.due_from(now)?;
        Ok(user_id)
    }

    fn apply_borrow(
        &mut self,
        user_id: UserId,
        book_id: BookId,
        now: DateTime<Utc>,
    ) -> CirculationResult<Loan> {
        let loan_id: LoanId = self.ids.next_id();
        self.loans.check_vacant(loan_id)?;
        self.catalog.decrement_availability(book_id)?;
        let loan = self.loans.create(loan_id, user_id, book_id, now)?.clone();

        let fulfilled_reservation = self.reservations.head(book_id) == Some(user_id);
        if fulfilled_reservation {
            self.reservations.dequeue_head(book_id);
        }

        self.record(CirculationEvent::BookBorrowed(BookBorrowed {
            loan_id,
            user_id,
            book_id,
            due_at: loan.due_at(),
            fulfilled_reservation,
            occurred_at: now,
        }));
        tracing::info!(
            %user_id,
            %book_id,
            %loan_id,
            due_at = %loan.due_at(),
            fulfilled_reservation,
            "book borrowed"
        );
        Ok(loan)
    }

    /// Close an open loan, put the copy back and assess any overdue fine.
    ///
    /// The fine is computed from the loan as it was before closing. Waiting
    /// members are not notified; the queue head simply keeps borrow priority.
    ///
    /// # Errors
    /// `InvalidLoan`, or `BookNotFound` if the loan points at a vanished book.
    pub fn return_loan(
        &mut self,
        loan_id: LoanId,
        now: DateTime<Utc>,
    ) -> CirculationResult<ReturnReceipt> {
        let loan = self
            .check_return(loan_id)
            .inspect_err(|e| rejected("return", e))?;
        let fine = compute_fine(&loan, now, self.policy.fine_per_day);
        let fine_id = if fine.is_due() {
            let id: FineId = self.ids.next_id();
            self.fines.check_vacant(id)?;
            Some(id)
        } else {
            None
        };

        self.loans.close(loan_id, now)?;
        self.catalog.increment_availability(loan.book_id())?;

        let (user_id, book_id) = (loan.user_id(), loan.book_id());
        self.record(CirculationEvent::BookReturned(BookReturned {
            loan_id,
            user_id,
            book_id,
            occurred_at: now,
        }));

        let fine = match fine_id {
            Some(id) => Some(self.assess_fine(id, &loan, fine, now)?),
            None => None,
        };
        tracing::info!(
            %user_id,
            %book_id,
            %loan_id,
            days_overdue = fine.as_ref().map_or(0, |f| f.days_overdue),
            fine_amount = fine.as_ref().map_or(0, |f| f.amount),
            "book returned"
        );

        let loan = self.loans.get(loan_id).cloned().ok_or(CirculationError::InvalidLoan)?;
        Ok(ReturnReceipt { loan, fine })
    }

    fn check_return(&self, loan_id: LoanId) -> CirculationResult<Loan> {
        let loan = self.loans.check_open(loan_id)?;
        let book = self
            .catalog
            .find_book(loan.book_id())
            .ok_or(CirculationError::BookNotFound)?;
        if book.available_copies() >= book.total_copies() {
            return Err(CirculationError::invariant(format!(
                "open loan {loan_id} on book {} but every copy is on the shelf",
                book.id
            )));
        }
        Ok(loan.clone())
    }

    fn assess_fine(
        &mut self,
        id: FineId,
        loan: &Loan,
        fine: FineAssessment,
        now: DateTime<Utc>,
    ) -> CirculationResult<FineRecord> {
        let record = FineRecord {
            id,
            user_id: loan.user_id(),
            loan_id: loan.id(),
            amount: fine.amount,
            days_overdue: fine.days_overdue,
            calculated_at: now,
        };
        self.fines.append(record.clone())?;
        self.record(CirculationEvent::FineAssessed(FineAssessed {
            fine_id: record.id,
            loan_id: record.loan_id,
            user_id: record.user_id,
            days_overdue: record.days_overdue,
            amount: record.amount,
            occurred_at: now,
        }));
        Ok(record)
    }

    /// Extend an open loan by one loan period from its current due date.
    ///
    /// Blocked while another member heads the book's reservation queue.
    ///
    /// # Errors (first failing check wins)
    /// `NotAuthenticated`, `InvalidLoan`, `RenewalLimitReached` (or
    /// `InvariantViolation` for an out-of-range due date), `ReservedByOther`.
    pub fn renew(
        &mut self,
        user: Option<UserId>,
        loan_id: LoanId,
        now: DateTime<Utc>,
    ) -> CirculationResult<Loan> {
        self.check_renew(user, loan_id)
            .inspect_err(|e| rejected("renew", e))?;

        let loan = self.loans.extend(loan_id)?.clone();
        self.record(CirculationEvent::LoanRenewed(LoanRenewed {
            loan_id,
            user_id: loan.user_id(),
            due_at: loan.due_at(),
            renew_count: loan.renew_count(),
            occurred_at: now,
        }));
        tracing::info!(
            %loan_id,
            due_at = %loan.due_at(),
            renew_count = loan.renew_count(),
            "loan renewed"
        );
        Ok(loan)
    }

    fn check_renew(&self, user: Option<UserId>, loan_id: LoanId) -> CirculationResult<()> {
        self.authenticate(user)?;
        let loan = self.loans.check_renewable(loan_id)?;
        if self.reservations.head_is_other(loan.book_id(), loan.user_id()) {
            return Err(CirculationError::ReservedByOther);
        }
        Ok(())
    }

    /// Join the tail of the book's reservation queue.
    ///
    /// Allowed even while copies are on the shelf. Returns the 1-based position.
    pub fn reserve(
        &mut self,
        user: Option<UserId>,
        book_id: BookId,
        now: DateTime<Utc>,
    ) -> CirculationResult<usize> {
        let user_id = self
            .check_reserve(user, book_id)
            .inspect_err(|e| rejected("reserve", e))?;

        let position = self.reservations.enqueue(book_id, user_id)?;
        self.record(CirculationEvent::BookReserved(BookReserved {
            user_id,
            book_id,
            position,
            occurred_at: now,
        }));
        tracing::info!(%user_id, %book_id, position, "book reserved");
        Ok(position)
    }

    fn check_reserve(&self, user: Option<UserId>, book_id: BookId) -> CirculationResult<UserId> {
        let user_id = self.authenticate(user)?;
        if !self.catalog.contains(book_id) {
            return Err(CirculationError::BookNotFound);
        }
        if self.reservations.position_of(book_id, user_id).is_some() {
            return Err(CirculationError::AlreadyReserved);
        }
        Ok(user_id)
    }

    /// Leave the book's reservation queue.
    ///
    /// Not being in the queue is not an error; the return value says whether
    /// anything was removed.
    pub fn cancel_reservation(
        &mut self,
        user: Option<UserId>,
        book_id: BookId,
        now: DateTime<Utc>,
    ) -> CirculationResult<bool> {
        let user_id = self
            .authenticate(user)
            .inspect_err(|e| rejected("cancel_reservation", e))?;

        let removed = self.reservations.remove(book_id, user_id);
        if removed {
            self.record(CirculationEvent::ReservationCancelled(ReservationCancelled {
                user_id,
                book_id,
                occurred_at: now,
            }));
            tracing::info!(%user_id, %book_id, "reservation cancelled");
        }
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    pub fn policy(&self) -> &CirculationPolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn users(&self) -> &UserRegistry {
        &self.users
    }

    pub fn loans(&self) -> &LoanLedger {
        &self.loans
    }

    pub fn reservations(&self) -> &ReservationLedger {
        &self.reservations
    }

    pub fn fines(&self) -> &FineLedger {
        &self.fines
    }

    pub fn book_by_id(&self, book_id: BookId) -> Option<&Book> {
        self.catalog.find_book(book_id)
    }

    pub fn user_by_id(&self, user_id: UserId) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn loan_by_id(&self, loan_id: LoanId) -> Option<&Loan> {
        self.loans.get(loan_id)
    }

    pub fn open_loans_of(&self, user_id: UserId) -> Vec<&Loan> {
        self.loans.loans_of(user_id)
    }

    pub fn overdue_loans(&self, now: DateTime<Utc>) -> Vec<&Loan> {
        self.loans.overdue(now)
    }

    pub fn reservation_position_of(&self, book_id: BookId, user_id: UserId) -> Option<usize> {
        self.reservations.position_of(book_id, user_id)
    }

    pub fn reservations_of(&self, user_id: UserId) -> Vec<(BookId, usize)> {
        self.reservations.reservations_of(user_id)
    }

    /// What the loan would owe if returned at `now`.
    pub fn fine_of(&self, loan: &Loan, now: DateTime<Utc>) -> FineAssessment {
        compute_fine(loan, now, self.policy.fine_per_day)
    }

    pub fn fines_of_user(&self, user_id: UserId) -> Vec<&FineRecord> {
        self.fines.of_user(user_id)
    }

    pub fn total_fines_of(&self, user_id: UserId) -> u64 {
        self.fines.total_of(user_id)
    }

    /// Journal entries appended after `sequence` (0 = everything).
    pub fn events_since(&self, sequence: u64) -> &[EventEnvelope<CirculationEvent>] {
        self.journal.since(sequence)
    }

    pub fn last_event_sequence(&self) -> u64 {
        self.journal.last_sequence()
    }

    /// Verify `available + open loans == total` for every book.
    pub fn check_conservation(&self) -> CirculationResult<()> {
        for book in self.catalog.books() {
            let open = self.loans.open_count_for(book.id);
            let accounted = book.available_copies() as usize + open;
            if accounted != book.total_copies() as usize {
                return Err(CirculationError::invariant(format!(
                    "book {}: {} available + {} on loan != {} total",
                    book.id,
                    book.available_copies(),
                    open,
                    book.total_copies()
                )));
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────

    fn authenticate(&self, user: Option<UserId>) -> CirculationResult<UserId> {
        match user {
            Some(id) if self.users.contains(id) => Ok(id),
            _ => Err(CirculationError::NotAuthenticated),
        }
    }

    fn record(&mut self, event: CirculationEvent) {
        let event_id = self.ids.next_uuid();
        self.journal.append(event_id, event);
    }
}

fn rejected(command: &'static str, err: &CirculationError) {
    tracing::debug!(command, code = err.code(), reason = %err, "command rejected");
}

impl<G: IdGenerator> core::fmt::Debug for CirculationEngine<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CirculationEngine")
            .field("policy", &self.policy)
            .field("books", &self.catalog.len())
            .field("users", &self.users.len())
            .field("loans", &self.loans.all().len())
            .field("fines", &self.fines.records().len())
            .field("events", &self.journal.len())
            .finish()
    }
}
