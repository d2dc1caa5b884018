//! Ambient stack shared by the API and worker binaries: configuration,
//! database bootstrap, the advisory-lock helper used by the pool
//! synchronizer, and a single clock source for "now".

pub mod advisory_lock;
pub mod config;
pub mod db;
pub mod time_source;

pub use config::Config;
pub use db::{create_migration_pool, create_pool, run_migrations};
pub use time_source::now_utc;
