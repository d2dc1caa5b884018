//! Single clock source for "now".
//!
//! `sqlx` gives back `OffsetDateTime` in UTC for `TIMESTAMPTZ` columns, so
//! there is no naive-datetime class of bug to guard against here the way
//! the Python original had to with its `_ensure_aware` helper. We still
//! route every comparison through one function so the whole codebase reads
//! "now" the same way.

use time::OffsetDateTime;

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}
