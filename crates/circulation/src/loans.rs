//! Loan ledger: every borrow ever made, open or closed.
//!
//! Loans are never deleted. A loan is open until `returned_at` is set, and a
//! (user, book) pair has at most one open loan at a time.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use libcirc_core::{BookId, CirculationError, CirculationResult, Entity, LoanId, UserId};

use crate::policy::CirculationPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    id: LoanId,
    user_id: UserId,
    book_id: BookId,
    borrowed_at: DateTime<Utc>,
    due_at: DateTime<Utc>,
    #[serde(default)]
    returned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    renew_count: u32,
}

impl Loan {
    pub fn id(&self) -> LoanId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn borrowed_at(&self) -> DateTime<Utc> {
        self.borrowed_at
    }

    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        self.returned_at
    }

    pub fn renew_count(&self) -> u32 {
        self.renew_count
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && now > self.due_at
    }
}

impl Entity for Loan {
    type Id = LoanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone)]
pub struct LoanLedger {
    loans: Vec<Loan>,
    index: HashMap<LoanId, usize>,
    loan_period: Duration,
    max_renews: u32,
}

impl LoanLedger {
    pub fn new(policy: &CirculationPolicy) -> Self {
        Self {
            loans: Vec::new(),
            index: HashMap::new(),
            loan_period: policy.loan_period(),
            max_renews: policy.max_renews,
        }
    }

    pub fn get(&self, id: LoanId) -> Option<&Loan> {
        self.index.get(&id).map(|&i| &self.loans[i])
    }

    /// The open loan `user_id` holds on `book_id`, if any.
    pub fn open_loan_of(&self, user_id: UserId, book_id: BookId) -> Option<&Loan> {
        self.loans
            .iter()
            .find(|l| l.is_open() && l.user_id == user_id && l.book_id == book_id)
    }

    /// Open loans of a member, oldest first. Closed loans stay in storage but
    /// are not listed.
    pub fn loans_of(&self, user_id: UserId) -> Vec<&Loan> {
        self.loans
            .iter()
            .filter(|l| l.is_open() && l.user_id == user_id)
            .collect()
    }

    pub fn open_count_for(&self, book_id: BookId) -> usize {
        self.loans
            .iter()
            .filter(|l| l.is_open() && l.book_id == book_id)
            .count()
    }

    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<&Loan> {
        self.loans.iter().filter(|l| l.is_overdue(now)).collect()
    }

    /// Every loan in creation order, including closed ones.
    pub fn all(&self) -> &[Loan] {
        &self.loans
    }

    /// Due date one loan period after `start`, or `InvariantViolation` when it
    /// falls outside the representable calendar.
    pub fn due_from(&self, start: DateTime<Utc>) -> CirculationResult<DateTime<Utc>> {
        start.checked_add_signed(self.loan_period).ok_or_else(|| {
            CirculationError::invariant(format!(
                "due date {} days after {start} is out of range",
                self.loan_period.num_days()
            ))
        })
    }

    /// Fails if `id` already names a loan.
    pub fn check_vacant(&self, id: LoanId) -> CirculationResult<()> {
        if self.index.contains_key(&id) {
            return Err(CirculationError::invariant(format!("duplicate loan id {id}")));
        }
        Ok(())
    }

    /// Open a new loan due one loan period from `now`.
    pub(crate) fn create(
        &mut self,
        id: LoanId,
        user_id: UserId,
        book_id: BookId,
        now: DateTime<Utc>,
    ) -> CirculationResult<&Loan> {
        self.check_vacant(id)?;
        let loan = Loan {
            id,
            user_id,
            book_id,
            borrowed_at: now,
            due_at: self.due_from(now)?,
            returned_at: None,
            renew_count: 0,
        };
        let idx = self.loans.len();
        self.index.insert(id, idx);
        self.loans.push(loan);
        Ok(&self.loans[idx])
    }

    /// The loan if it exists and is still open.
    pub fn check_open(&self, id: LoanId) -> CirculationResult<&Loan> {
        match self.get(id) {
            Some(loan) if loan.is_open() => Ok(loan),
            _ => Err(CirculationError::InvalidLoan),
        }
    }

    /// The loan if it can be renewed once more.
    pub fn check_renewable(&self, id: LoanId) -> CirculationResult<&Loan> {
        let loan = self.check_open(id)?;
        if loan.renew_count >= self.max_renews {
            return Err(CirculationError::RenewalLimitReached);
        }
        self.due_from(loan.due_at)?;
        Ok(loan)
    }

    /// Close the loan and return its state as it was before closing.
    pub(crate) fn close(&mut self, id: LoanId, now: DateTime<Utc>) -> CirculationResult<Loan> {
        let before = self.check_open(id)?.clone();
        let loan = self.get_mut(id)?;
        loan.returned_at = Some(now);
        Ok(before)
    }

    /// Push the due date out by one loan period, counted from the current due date.
    pub(crate) fn extend(&mut self, id: LoanId) -> CirculationResult<&Loan> {
        let due_at = self.due_from(self.check_renewable(id)?.due_at)?;
        let loan = self.get_mut(id)?;
        loan.due_at = due_at;
        loan.renew_count += 1;
        Ok(loan)
    }

    /// Insert a serialized loan (snapshot restore).
    pub(crate) fn insert(&mut self, loan: Loan) -> CirculationResult<()> {
        self.check_vacant(loan.id)?;
        if loan.renew_count > self.max_renews {
            return Err(CirculationError::invariant(format!(
                "loan {} renewed {} times (max {})",
                loan.id, loan.renew_count, self.max_renews
            )));
        }
        if loan.is_open() && self.open_loan_of(loan.user_id, loan.book_id).is_some() {
            return Err(CirculationError::invariant(format!(
                "user {} has two open loans on book {}",
                loan.user_id, loan.book_id
            )));
        }
        self.index.insert(loan.id, self.loans.len());
        self.loans.push(loan);
        Ok(())
    }

    fn get_mut(&mut self, id: LoanId) -> CirculationResult<&mut Loan> {
        match self.index.get(&id) {
            Some(&i) => Ok(&mut self.loans[i]),
            None => Err(CirculationError::InvalidLoan),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_loan(
    user_id: UserId,
    book_id: BookId,
    borrowed_at: DateTime<Utc>,
    due_at: DateTime<Utc>,
) -> Loan {
    Loan {
        id: LoanId::new(),
        user_id,
        book_id,
        borrowed_at,
        due_at,
        returned_at: None,
        renew_count: 0,
    }
}
