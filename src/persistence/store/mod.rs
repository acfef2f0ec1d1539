pub mod memory;
pub mod postgres;

pub use memory::{InMemoryStore, InMemoryUnitOfWork};
pub use postgres::{PgStore, PgUnitOfWork};
