//! Persistence substrate
//!
//! A bounded connection pool plus an async query executor with per-statement
//! timeouts, tagged failures, and one-shot lazy reinitialization. All SQL in
//! the crate goes through [`Database`] with positional parameter binding.

mod executor;
mod pool;
mod schema;

pub use executor::{Database, SqlParam};
pub use schema::TABLES;
