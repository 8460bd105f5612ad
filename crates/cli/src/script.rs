//! Replay scripts: a seed catalog plus timestamped member commands.

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use libcirc_circulation::{
    Book, BookId, Catalog, CirculationEngine, CirculationError, CirculationPolicy, FixedClock,
    Library, LoanId, SequentialIds,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    /// Falls back to `LIBCIRC_*` environment variables when absent.
    #[serde(default)]
    pub policy: Option<CirculationPolicy>,
    pub books: Vec<Book>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub at: DateTime<Utc>,
    pub command: Command,
}

/// Loans are referred to by creation order (0 = first loan ever made).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Register { name: String, email: String },
    Login { email: String },
    Logout,
    Borrow { book_id: BookId },
    Return { loan: usize },
    Renew { loan: usize },
    Reserve { book_id: BookId },
    CancelReservation { book_id: BookId },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Register { .. } => "register",
            Command::Login { .. } => "login",
            Command::Logout => "logout",
            Command::Borrow { .. } => "borrow",
            Command::Return { .. } => "return",
            Command::Renew { .. } => "renew",
            Command::Reserve { .. } => "reserve",
            Command::CancelReservation { .. } => "cancel_reservation",
        }
    }
}

/// How one step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub step: usize,
    pub command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub type ReplayLibrary = Library<FixedClock, SequentialIds>;

impl Script {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("failed to parse replay script")
    }

    /// Run every step in order against a fresh, deterministic library.
    ///
    /// Business-rule rejections are recorded as outcomes; with `fail_fast`
    /// the first rejection aborts the replay instead.
    pub fn replay(
        self,
        fallback_policy: CirculationPolicy,
        fail_fast: bool,
    ) -> anyhow::Result<(ReplayLibrary, Vec<Outcome>)> {
        let policy = self.policy.unwrap_or(fallback_policy);
        let catalog = Catalog::from_seed(self.books).context("invalid seed catalog")?;
        let start = self.steps.first().map(|s| s.at).unwrap_or_else(Utc::now);

        let engine = CirculationEngine::with_ids(policy, catalog, SequentialIds::new());
        let mut library = Library::with_engine(engine, FixedClock::new(start));

        let mut outcomes = Vec::with_capacity(self.steps.len());
        for (step, Step { at, command }) in self.steps.into_iter().enumerate() {
            library.clock().set(at);
            let name = command.name();
            let error = execute(&mut library, command).err().map(|e| e.to_string());

            match &error {
                None => tracing::info!(step, command = name, "step applied"),
                Some(reason) => {
                    tracing::warn!(step, command = name, %reason, "step rejected");
                    if fail_fast {
                        bail!("step {step} ({name}) rejected: {reason}");
                    }
                }
            }
            outcomes.push(Outcome {
                step,
                command: name,
                error,
            });
        }

        Ok((library, outcomes))
    }
}

fn execute(library: &mut ReplayLibrary, command: Command) -> Result<(), CirculationError> {
    match command {
        Command::Register { name, email } => library.register(&name, &email).map(drop),
        Command::Login { email } => library.login(&email).map(drop),
        Command::Logout => {
            library.logout();
            Ok(())
        }
        Command::Borrow { book_id } => library.borrow(book_id).map(drop),
        Command::Return { loan } => {
            let loan_id = loan_at(library, loan)?;
            library.return_loan(loan_id).map(drop)
        }
        Command::Renew { loan } => {
            let loan_id = loan_at(library, loan)?;
            library.renew(loan_id).map(drop)
        }
        Command::Reserve { book_id } => library.reserve(book_id).map(drop),
        Command::CancelReservation { book_id } => library.cancel_reservation(book_id).map(drop),
    }
}

fn loan_at(library: &ReplayLibrary, index: usize) -> Result<LoanId, CirculationError> {
    library
        .engine()
        .loans()
        .all()
        .get(index)
        .map(|loan| loan.id())
        .ok_or(CirculationError::InvalidLoan)
}
