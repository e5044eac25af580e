//! Storage collaborators for the generation engine.
//!
//! The engine talks to storage only through [`Store`] and [`Transaction`];
//! an in-memory store backs tests and dry runs, and a PostgreSQL store backs
//! real databases.

pub mod adapter;
pub mod error;
pub mod memory;
pub mod postgres;

pub use adapter::{Store, Transaction};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

pub use pressgen_core::{Row, Value};
