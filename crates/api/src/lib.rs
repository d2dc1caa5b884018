//! HTTP surface for the session control plane: axum route handlers, scoped
//! bearer/admin-token extractors, and the CORS/tracing/security-header
//! layers wrapping the router. Domain logic lives in `sessiond-core`; this
//! crate only does framing, per spec.md §1.

pub mod error;
pub mod extract;
pub mod routes;
pub mod security;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;
