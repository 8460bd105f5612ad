//! `libcirc-core`: domain building blocks for library circulation.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{CirculationError, CirculationResult};
pub use id::{BookId, FineId, IdGenerator, LoanId, SequentialIds, UserId, UuidV7Ids};
pub use value_object::ValueObject;
