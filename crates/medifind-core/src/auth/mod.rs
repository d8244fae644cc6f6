//! Auth session store.
//!
//! [`AuthStore`] is the single source of truth for who is signed in. It owns a
//! [`SessionState`](crate::models::SessionState), publishes every change on a
//! watch channel and writes the identity fields through a
//! [`SessionPersistence`] so a restart can skip the blocking session fetch.

mod guard;
mod persistence;
mod store;

pub use guard::*;
pub use persistence::*;
pub use store::*;

use thiserror::Error;

use crate::backend::BackendError;
use crate::models::Role;

/// Auth errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("This account is registered as a {actual}, not a {expected}")]
    RoleMismatch { expected: Role, actual: Role },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl AuthError {
    pub fn is_role_mismatch(&self) -> bool {
        matches!(self, AuthError::RoleMismatch { .. })
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
