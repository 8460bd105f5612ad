//! Library circulation domain (borrow, return, renew, reserve, fines).
//!
//! This crate contains the circulation state machine implemented as
//! deterministic domain logic: no IO, no HTTP, no storage. Time and identity
//! are injected, so a sequence of `(command, timestamp)` pairs always replays
//! to the same ledgers.

pub mod catalog;
pub mod clock;
pub mod engine;
pub mod events;
pub mod fines;
pub mod library;
pub mod loans;
pub mod policy;
pub mod reservations;
pub mod snapshot;
pub mod users;

pub use catalog::{Book, Catalog, Category};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{CirculationEngine, ReturnReceipt};
pub use events::CirculationEvent;
pub use fines::{FineAssessment, FineLedger, FineRecord, compute_fine};
pub use library::Library;
pub use loans::{Loan, LoanLedger};
pub use policy::CirculationPolicy;
pub use reservations::{ReservationLedger, ReservationQueue};
pub use snapshot::CirculationSnapshot;
pub use users::{User, UserRegistry};

pub use libcirc_core::{
    BookId, CirculationError, CirculationResult, FineId, IdGenerator, LoanId, SequentialIds,
    UserId, UuidV7Ids,
};
