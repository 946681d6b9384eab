mod url;
mod schema;
pub mod db;
pub mod migrations;
pub mod models;
pub mod pool;

pub(crate) use schema::*;

pub use url::*;

pub use diesel::{Connection, PgConnection};

pub type QueryError = diesel::result::Error;

/// The dedup discipline leans on unique indexes instead of pre-queries, so
/// callers need to tell "already there" apart from real failures.
pub fn is_unique_violation(err: &QueryError) -> bool {
    matches!(
        err,
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )
    )
}
