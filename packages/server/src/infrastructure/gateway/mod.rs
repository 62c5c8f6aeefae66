//! Persistence gateway implementations.
//!
//! - `inmemory`: process-local store, also used as the test double
//! - `sqlite`: durable store backed by `sqlx`

pub mod inmemory;
pub mod sqlite;

pub use inmemory::InMemoryGateway;
pub use sqlite::SqliteGateway;
