//! Domain error type. One variant per row of the error-kind table; the API
//! crate maps these to HTTP status codes, the worker crate just logs them.

use crate::peer_client::PeerError;

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("missing or invalid bearer token")]
    Unauthenticated,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid mfa code")]
    InvalidMfa,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("gone: {0}")]
    Gone(String),

    #[error("too many tries")]
    TooManyTries,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
