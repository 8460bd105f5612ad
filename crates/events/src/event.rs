use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// In circulation these are the facts a successful command leaves behind
/// (a book borrowed, a fine assessed); rejected commands produce none.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - designed to be **append-only**
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "circulation.book.borrowed").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
