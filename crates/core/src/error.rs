//! Circulation error model.

use thiserror::Error;

/// Result type used across the circulation domain.
pub type CirculationResult<T> = Result<T, CirculationError>;

/// Business-rule rejection returned by circulation commands.
///
/// Every variant is local and non-fatal: a command that returns one of these
/// has not mutated any state. The `Display` text is the message shown to the
/// member.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CirculationError {
    /// No member is logged in (or the acting member is unknown).
    #[error("please log in first")]
    NotAuthenticated,

    /// The referenced book is not in the catalog.
    #[error("book not found")]
    BookNotFound,

    /// The member already holds an open loan on this book.
    #[error("you already borrowed this book")]
    AlreadyBorrowed,

    /// Another member is at the head of the reservation queue.
    #[error("reserved by another member")]
    ReservedByOther,

    #[error("no copies available, consider reserving")]
    NoCopiesAvailable,

    /// The loan does not exist or has already been returned.
    #[error("invalid loan")]
    InvalidLoan,

    #[error("renewal limit reached")]
    RenewalLimitReached,

    /// The member is already waiting in this book's queue.
    #[error("already reserved this book")]
    AlreadyReserved,

    #[error("email already registered")]
    EmailAlreadyRegistered,

    #[error("no account found for this email")]
    AccountNotFound,

    /// Malformed registration input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A ledger invariant would be (or was found to be) violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl CirculationError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Stable machine-readable code for renderers and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not_authenticated",
            Self::BookNotFound => "book_not_found",
            Self::AlreadyBorrowed => "already_borrowed",
            Self::ReservedByOther => "reserved_by_other",
            Self::NoCopiesAvailable => "no_copies_available",
            Self::InvalidLoan => "invalid_loan",
            Self::RenewalLimitReached => "renewal_limit_reached",
            Self::AlreadyReserved => "already_reserved",
            Self::EmailAlreadyRegistered => "email_already_registered",
            Self::AccountNotFound => "account_not_found",
            Self::Validation(_) => "validation",
            Self::InvalidId(_) => "invalid_id",
            Self::InvariantViolation(_) => "invariant_violation",
        }
    }
}
