//! Overdue fines: the pure calculator and the append-only fine ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use libcirc_core::{
    CirculationError, CirculationResult, Entity, FineId, LoanId, UserId, ValueObject,
};

use crate::loans::Loan;

/// Result of evaluating a loan against a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineAssessment {
    pub days_overdue: u64,
    pub amount: u64,
}

impl ValueObject for FineAssessment {}

impl FineAssessment {
    pub const NONE: Self = Self {
        days_overdue: 0,
        amount: 0,
    };

    pub fn is_due(&self) -> bool {
        self.days_overdue > 0
    }
}

/// Whole days overdue times the daily rate.
///
/// Closed loans always assess to zero: their fine, if any, was fixed at
/// return time. Partial days never round up, so `now == due_at` and anything
/// less than 24h late is free.
pub fn compute_fine(loan: &Loan, now: DateTime<Utc>, fine_per_day: u64) -> FineAssessment {
    if !loan.is_open() {
        return FineAssessment::NONE;
    }
    let days_overdue = u64::try_from((now - loan.due_at()).num_days()).unwrap_or(0);
    FineAssessment {
        days_overdue,
        amount: days_overdue.saturating_mul(fine_per_day),
    }
}

/// Historical fine entry, written once when an overdue loan is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineRecord {
    pub id: FineId,
    pub user_id: UserId,
    pub loan_id: LoanId,
    pub amount: u64,
    pub days_overdue: u64,
    pub calculated_at: DateTime<Utc>,
}

impl Entity for FineRecord {
    type Id = FineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct FineLedger {
    records: Vec<FineRecord>,
}

impl FineLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if `id` already names a fine.
    pub fn check_vacant(&self, id: FineId) -> CirculationResult<()> {
        if self.records.iter().any(|f| f.id == id) {
            return Err(CirculationError::invariant(format!("duplicate fine id {id}")));
        }
        Ok(())
    }

    pub(crate) fn append(&mut self, record: FineRecord) -> CirculationResult<&FineRecord> {
        self.check_vacant(record.id)?;
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    pub fn records(&self) -> &[FineRecord] {
        &self.records
    }

    pub fn of_user(&self, user_id: UserId) -> Vec<&FineRecord> {
        self.records.iter().filter(|f| f.user_id == user_id).collect()
    }

    pub fn total_of(&self, user_id: UserId) -> u64 {
        self.records
            .iter()
            .filter(|f| f.user_id == user_id)
            .map(|f| f.amount)
            .sum()
    }

    pub fn for_loan(&self, loan_id: LoanId) -> Option<&FineRecord> {
        self.records.iter().find(|f| f.loan_id == loan_id)
    }
}
