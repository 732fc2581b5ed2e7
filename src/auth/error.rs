// Authentication error types

use crate::auth::{
    models::UserId, password::HashError, repository::RepositoryError, token::TokenError,
};
use thiserror::Error;

/// Failures raised by the auth service.
///
/// Collaborator failures are carried unchanged; the HTTP boundary classifies
/// them (see `crate::error::classify`).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username or email already exists")]
    DuplicateIdentity,

    #[error("wrong credentials")]
    WrongCredentials,

    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error(transparent)]
    Hashing(#[from] HashError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("{operation}: {source}")]
    Repository {
        operation: &'static str,
        #[source]
        source: RepositoryError,
    },

    #[error("{operation}: context deadline exceeded")]
    Timeout { operation: &'static str },
}
