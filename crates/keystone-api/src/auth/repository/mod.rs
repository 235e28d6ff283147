//! Account repository implementations
//!
//! - `InMemoryAccountRepository`: process-local store for tests and local runs
//! - `PgAccountRepository`: PostgreSQL store with unique indexes on email and username

mod memory;
mod postgres;

pub use memory::InMemoryAccountRepository;
pub use postgres::PgAccountRepository;
