//! Small repository utilities, trimmed from the teacher's
//! `repository/util.rs` to the single error-conversion helper this crate
//! needs (the SQLite/Postgres URL-validation split has no counterpart:
//! this crate is Postgres-only).

use diesel::result::DatabaseErrorInformation;

#[derive(Debug)]
pub struct DbErrorInfo(pub String);

impl DatabaseErrorInformation for DbErrorInfo {
    fn message(&self) -> &str {
        &self.0
    }
    fn details(&self) -> Option<&str> {
        None
    }
    fn hint(&self) -> Option<&str> {
        None
    }
    fn table_name(&self) -> Option<&str> {
        None
    }
    fn column_name(&self) -> Option<&str> {
        None
    }
    fn constraint_name(&self) -> Option<&str> {
        None
    }
    fn statement_position(&self) -> Option<i32> {
        None
    }
}

/// Convert any displayable error (e.g. a deadpool `PoolError`) to a diesel
/// error so pool/connection failures compose with `?` alongside query
/// errors.
pub fn to_diesel_error(e: impl std::fmt::Display) -> diesel::result::Error {
    diesel::result::Error::DatabaseError(
        diesel::result::DatabaseErrorKind::Unknown,
        Box::new(DbErrorInfo(e.to_string())),
    )
}
