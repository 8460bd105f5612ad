//! Whole-state export and validated import.
//!
//! Persistence is the caller's business; the engine only hands out an
//! immutable, serializable picture of its ledgers and refuses to come back
//! from one that breaks an invariant.

use serde::{Deserialize, Serialize};

use libcirc_core::{CirculationError, CirculationResult, IdGenerator};

use crate::catalog::{Book, Catalog};
use crate::engine::CirculationEngine;
use crate::fines::{FineLedger, FineRecord};
use crate::loans::{Loan, LoanLedger};
use crate::policy::CirculationPolicy;
use crate::reservations::{ReservationLedger, ReservationQueue};
use crate::users::{User, UserRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CirculationSnapshot {
    pub books: Vec<Book>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub loans: Vec<Loan>,
    #[serde(default)]
    pub reservations: Vec<ReservationQueue>,
    #[serde(default)]
    pub fines: Vec<FineRecord>,
}

impl CirculationSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl<G: IdGenerator> CirculationEngine<G> {
    /// Copy every ledger into a snapshot. The event journal is not included.
    pub fn snapshot(&self) -> CirculationSnapshot {
        CirculationSnapshot {
            books: self.catalog().books().to_vec(),
            users: self.users().users().to_vec(),
            loans: self.loans().all().to_vec(),
            reservations: self.reservations().queues(),
            fines: self.fines().records().to_vec(),
        }
    }

    /// Rebuild an engine from a snapshot.
    ///
    /// Rejects (with `InvariantViolation`) duplicate ids, dangling references,
    /// more than one open loan per (user, book), renew counts over the
    /// policy's ceiling, duplicate queue members, a loan fined twice, and any
    /// book whose copies do not add up.
    ///
    /// Every restored id is passed to [`IdGenerator::observe`], so `ids`
    /// never hands out one that is already taken.
    pub fn restore(
        policy: CirculationPolicy,
        snapshot: CirculationSnapshot,
        mut ids: G,
    ) -> CirculationResult<Self> {
        let catalog = Catalog::from_seed(snapshot.books)?;

        let mut users = UserRegistry::new();
        for user in snapshot.users {
            users.insert(user)?;
        }

        let mut loans = LoanLedger::new(&policy);
        for loan in snapshot.loans {
            if !catalog.contains(loan.book_id()) {
                return Err(dangling("loan", loan.id(), "book", loan.book_id()));
            }
            if !users.contains(loan.user_id()) {
                return Err(dangling("loan", loan.id(), "user", loan.user_id()));
            }
            loans.insert(loan)?;
        }

        for queue in &snapshot.reservations {
            if !catalog.contains(queue.book_id) {
                return Err(CirculationError::invariant(format!(
                    "reservation queue for unknown book {}",
                    queue.book_id
                )));
            }
            if let Some(user) = queue.user_ids.iter().find(|&&u| !users.contains(u)) {
                return Err(CirculationError::invariant(format!(
                    "unknown user {user} queued for book {}",
                    queue.book_id
                )));
            }
        }
        let reservations = ReservationLedger::from_queues(snapshot.reservations)?;

        let mut fines = FineLedger::new();
        for fine in snapshot.fines {
            let Some(loan) = loans.get(fine.loan_id) else {
                return Err(dangling("fine", fine.id, "loan", fine.loan_id));
            };
            if loan.user_id() != fine.user_id {
                return Err(CirculationError::invariant(format!(
                    "fine {} charged to {} but loan {} belongs to {}",
                    fine.id,
                    fine.user_id,
                    loan.id(),
                    loan.user_id()
                )));
            }
            if fines.for_loan(fine.loan_id).is_some() {
                return Err(CirculationError::invariant(format!(
                    "loan {} fined more than once",
                    fine.loan_id
                )));
            }
            fines.append(fine)?;
        }

        for user in users.users() {
            ids.observe(user.id.as_uuid());
        }
        for loan in loans.all() {
            ids.observe(loan.id().as_uuid());
        }
        for fine in fines.records() {
            ids.observe(fine.id.as_uuid());
        }

        let engine =
            CirculationEngine::from_parts(policy, catalog, users, loans, reservations, fines, ids);
        engine.check_conservation()?;

        tracing::info!(
            books = engine.catalog().len(),
            users = engine.users().len(),
            loans = engine.loans().all().len(),
            "circulation state restored"
        );
        Ok(engine)
    }
}

fn dangling(
    kind: &str,
    id: impl core::fmt::Display,
    target: &str,
    target_id: impl core::fmt::Display,
) -> CirculationError {
    CirculationError::invariant(format!("{kind} {id} references unknown {target} {target_id}"))
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use libcirc_core::{BookId, SequentialIds};

    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 4, 9, 0, 0).unwrap()
    }

    fn busy_engine() -> CirculationEngine<SequentialIds> {
        let a = Book::new(BookId::new(), "A", "X", 2);
        let b = Book::new(BookId::new(), "B", "Y", 1);
        let (a_id, b_id) = (a.id, b.id);
        let catalog = Catalog::from_seed([a, b]).unwrap();
        let mut engine =
            CirculationEngine::with_ids(CirculationPolicy::default(), catalog, SequentialIds::new());

        let ada = engine.register_user("Ada", "ada@example.com", test_time()).unwrap().id;
        let bob = engine.register_user("Bob", "bob@example.com", test_time()).unwrap().id;

        let late = engine.borrow(Some(ada), a_id, test_time()).unwrap();
        engine.borrow(Some(bob), b_id, test_time()).unwrap();
        engine.reserve(Some(ada), b_id, test_time()).unwrap();
        engine
            .return_loan(late.id(), late.due_at() + Duration::days(4))
            .unwrap();
        engine.borrow(Some(ada), a_id, test_time() + Duration::days(20)).unwrap();
        engine
    }

    #[test]
    fn snapshot_restores_to_identical_state() {
        let engine = busy_engine();
        let snapshot = engine.snapshot();

        let json = snapshot.to_json().unwrap();
        let parsed = CirculationSnapshot::from_json(&json).unwrap();
        assert_eq!(parsed, snapshot);

        let restored = CirculationEngine::restore(
            CirculationPolicy::default(),
            parsed,
            SequentialIds::starting_after(1_000),
        )
        .unwrap();
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.fines().records().len(), 1);
    }

    #[test]
    fn restore_rejects_broken_conservation() {
        let mut snapshot = busy_engine().snapshot();
        // Pretend one of B's copies is back on the shelf while still on loan.
        let b = snapshot.books[1].clone();
        snapshot.books[1] = b.clone().with_available_copies(b.total_copies());

        let err = CirculationEngine::restore(
            CirculationPolicy::default(),
            snapshot,
            SequentialIds::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CirculationError::InvariantViolation(_)));
    }

    #[test]
    fn restore_rejects_dangling_loan() {
        let mut snapshot = busy_engine().snapshot();
        snapshot.books.remove(1);

        let err = CirculationEngine::restore(
            CirculationPolicy::default(),
            snapshot,
            SequentialIds::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CirculationError::InvariantViolation(_)));
    }

    #[test]
    fn restore_rejects_renew_count_over_stricter_policy() {
        let mut engine = busy_engine();
        let ada = engine.users().find_by_email("ada@example.com").unwrap().id;
        let loan_id = engine.open_loans_of(ada)[0].id();
        engine.renew(Some(ada), loan_id, test_time()).unwrap();

        let strict = CirculationPolicy {
            max_renews: 0,
            ..CirculationPolicy::default()
        };
        let err = CirculationEngine::restore(strict, engine.snapshot(), SequentialIds::new())
            .unwrap_err();
        assert!(matches!(err, CirculationError::InvariantViolation(_)));
    }

    #[test]
    fn restore_rejects_fine_for_unknown_loan() {
        let mut snapshot = busy_engine().snapshot();
        snapshot.fines[0].loan_id = libcirc_core::LoanId::new();

        assert!(
            CirculationEngine::restore(CirculationPolicy::default(), snapshot, SequentialIds::new())
                .is_err()
        );
    }

    #[test]
    fn restore_rejects_second_fine_for_same_loan() {
        let mut snapshot = busy_engine().snapshot();
        let mut again = snapshot.fines[0].clone();
        again.id = libcirc_core::FineId::new();
        snapshot.fines.push(again);

        let err = CirculationEngine::restore(
            CirculationPolicy::default(),
            snapshot,
            SequentialIds::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CirculationError::InvariantViolation(_)));
    }

    #[test]
    fn restored_engine_never_reissues_a_loan_id() {
        let engine = busy_engine();
        let ada = engine.users().find_by_email("ada@example.com").unwrap().id;
        let bob = engine.users().find_by_email("bob@example.com").unwrap().id;
        let ada_loan = engine.open_loans_of(ada)[0].clone();
        let existing: Vec<_> = engine.loans().all().iter().map(|l| l.id()).collect();

        // Counter restarts from zero; restore must move it past the snapshot.
        let mut restored = CirculationEngine::restore(
            CirculationPolicy::default(),
            engine.snapshot(),
            SequentialIds::new(),
        )
        .unwrap();

        let book = ada_loan.book_id();
        let later = test_time() + Duration::days(21);
        for _ in 0..10 {
            let loan = restored.borrow(Some(bob), book, later).unwrap();
            assert!(!existing.contains(&loan.id()));
            restored.return_loan(loan.id(), later).unwrap();
        }

        let receipt = restored.return_loan(ada_loan.id(), later).unwrap();
        assert_eq!(receipt.loan.user_id(), ada);
        assert!(restored.open_loans_of(ada).is_empty());
        assert_eq!(restored.loans().all().len(), existing.len() + 10);
        restored.check_conservation().unwrap();
    }

    #[test]
    fn empty_snapshot_restores_to_empty_engine() {
        let engine = CirculationEngine::restore(
            CirculationPolicy::default(),
            CirculationSnapshot::default(),
            SequentialIds::new(),
        )
        .unwrap();
        assert!(engine.catalog().is_empty());
        assert_eq!(engine.last_event_sequence(), 0);
    }
}
