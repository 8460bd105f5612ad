//! Facts recorded after each successful circulation command.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use libcirc_core::{BookId, FineId, LoanId, UserId};
use libcirc_events::Event;

/// Event: a member was registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRegistered {
    pub user_id: UserId,
    pub email: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BookBorrowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookBorrowed {
    pub loan_id: LoanId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub due_at: DateTime<Utc>,
    /// The borrower was at the head of the reservation queue and left it.
    pub fulfilled_reservation: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BookReturned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReturned {
    pub loan_id: LoanId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LoanRenewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRenewed {
    pub loan_id: LoanId,
    pub user_id: UserId,
    pub due_at: DateTime<Utc>,
    pub renew_count: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BookReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReserved {
    pub user_id: UserId,
    pub book_id: BookId,
    pub position: usize,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationCancelled. Only recorded when the member was actually queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCancelled {
    pub user_id: UserId,
    pub book_id: BookId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FineAssessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineAssessed {
    pub fine_id: FineId,
    pub loan_id: LoanId,
    pub user_id: UserId,
    pub days_overdue: u64,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CirculationEvent {
    MemberRegistered(MemberRegistered),
    BookBorrowed(BookBorrowed),
    BookReturned(BookReturned),
    LoanRenewed(LoanRenewed),
    BookReserved(BookReserved),
    ReservationCancelled(ReservationCancelled),
    FineAssessed(FineAssessed),
}

impl Event for CirculationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CirculationEvent::MemberRegistered(_) => "circulation.member.registered",
            CirculationEvent::BookBorrowed(_) => "circulation.book.borrowed",
            CirculationEvent::BookReturned(_) => "circulation.book.returned",
            CirculationEvent::LoanRenewed(_) => "circulation.loan.renewed",
            CirculationEvent::BookReserved(_) => "circulation.book.reserved",
            CirculationEvent::ReservationCancelled(_) => "circulation.reservation.cancelled",
            CirculationEvent::FineAssessed(_) => "circulation.fine.assessed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CirculationEvent::MemberRegistered(e) => e.occurred_at,
            CirculationEvent::BookBorrowed(e) => e.occurred_at,
            CirculationEvent::BookReturned(e) => e.occurred_at,
            CirculationEvent::LoanRenewed(e) => e.occurred_at,
            CirculationEvent::BookReserved(e) => e.occurred_at,
            CirculationEvent::ReservationCancelled(e) => e.occurred_at,
            CirculationEvent::FineAssessed(e) => e.occurred_at,
        }
    }
}
