pub mod migrations;
pub mod pool;
pub mod schema;
pub mod store;
pub mod util;

pub use pool::PgPool;
pub use store::{DocumentStore, PersistenceStore, StoreError};
