//! Member registry.
//!
//! Identity lookup only: logging in by email is a session convenience, not a
//! security boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use libcirc_core::{CirculationError, CirculationResult, Entity, UserId};

/// A registered member. Immutable after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Canonical form used for uniqueness and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct UserRegistry {
    users: Vec<User>,
    by_id: HashMap<UserId, usize>,
    by_email: HashMap<String, usize>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new member.
    ///
    /// # Errors
    /// - `Validation` for a blank name or an email without `@`
    /// - `EmailAlreadyRegistered` if the normalized email is taken
    pub fn register(
        &mut self,
        id: UserId,
        name: &str,
        email: &str,
    ) -> CirculationResult<&User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CirculationError::validation("name cannot be empty"));
        }
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(CirculationError::validation("invalid email format"));
        }
        if self.by_email.contains_key(&email) {
            return Err(CirculationError::EmailAlreadyRegistered);
        }
        if self.by_id.contains_key(&id) {
            return Err(CirculationError::invariant(format!("duplicate user id {id}")));
        }

        self.insert(User {
            id,
            name: name.to_string(),
            email,
        })
    }

    /// Insert an already-validated record (snapshot restore).
    pub(crate) fn insert(&mut self, user: User) -> CirculationResult<&User> {
        let email = normalize_email(&user.email);
        if self.by_id.contains_key(&user.id) || self.by_email.contains_key(&email) {
            return Err(CirculationError::invariant(format!(
                "duplicate user {} <{}>",
                user.id, user.email
            )));
        }
        let idx = self.users.len();
        self.by_id.insert(user.id, idx);
        self.by_email.insert(email, idx);
        self.users.push(user);
        Ok(&self.users[idx])
    }

    pub fn get(&self, id: UserId) -> Option<&User> {
        self.by_id.get(&id).map(|&i| &self.users[i])
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Look a member up by email for login.
    pub fn find_by_email(&self, email: &str) -> CirculationResult<&User> {
        self.by_email
            .get(&normalize_email(email))
            .map(|&i| &self.users[i])
            .ok_or(CirculationError::AccountNotFound)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
