//! Postgres-only connection pool. Grounded on the teacher's
//! `repository/pool.rs::PgPool` (the SQLite half of that file's `DbPool`
//! enum has no counterpart here -- both `VECTOR_DB_URL` and
//! `LOGS_DATABASE_URL` are Postgres-with-pgvector by construction).

use diesel_async::pooled_connection::deadpool::{Object, Pool as DeadPool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

/// Diesel error type alias, matching the teacher's `DbError` naming.
pub type DbError = diesel::result::Error;

pub type PgConn = Object<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Overflow cap multiplier applied on top of the requested pool size
/// (spec §4.6: "overflow capped at 2x pool_cap").
const OVERFLOW_MULTIPLIER: usize = 2;

#[derive(Clone)]
pub struct PgPool {
    pool: DeadPool<AsyncPgConnection>,
}

impl PgPool {
    /// `pool_cap` is `min(W, pool_cap)` per spec §4.6; callers compute that
    /// before calling `new`.
    pub fn new(database_url: &str, pool_cap: usize) -> Result<Self, DbError> {
        let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = DeadPool::builder(config)
            .max_size(pool_cap * OVERFLOW_MULTIPLIER)
            .build()
            .map_err(super::util::to_diesel_error)?;
        Ok(Self { pool })
    }

    pub async fn get(&self) -> Result<PgConn, DbError> {
        self.pool.get().await.map_err(super::util::to_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_cap_applies_overflow_multiplier() {
        // new() itself requires a live connection string to build; this
        // just documents the sizing formula the spec pins down.
        let worker_count = 8usize;
        let pool_cap = 4usize;
        let effective = worker_count.min(pool_cap) * OVERFLOW_MULTIPLIER;
        assert_eq!(effective, 8);
    }
}
