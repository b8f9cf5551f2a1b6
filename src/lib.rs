//! Game-server allow/deny list engine
//!
//! Grants or denies server access based on persisted allow/deny lists keyed
//! by player identity, network address, or domain name.
//!
//! ## Architecture
//!
//! ```text
//! command → classifier → (resolution) → lifecycle engine → store → sink
//! ```
//!
//! - **Classifier** turns the raw identifier an administrator typed into a
//!   tagged kind (account name, IPv4/IPv6 literal, secondary-platform name,
//!   domain), pure and total.
//! - **Resolvers** turn a mutable display name into the immutable stable
//!   identifier the lists are keyed by, via an external HTTP lookup.
//! - **Engine** drives the idempotent, race-safe mutation: fresh existence
//!   check and write inside a per-key critical section, rename-on-resolve
//!   relabeling, and MOTD shadow maintenance with failure isolation.
//! - **Store** holds the SQL for the six list tables; the **db** layer runs
//!   it on a bounded pool (embedded SQLite or networked MariaDB) with a
//!   15-second statement ceiling.
//! - **Sink** receives one event per committed mutation, fire-and-forget.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod identifier;
pub mod notify;
pub mod resolver;
pub mod store;

// Re-export main types
pub use config::{AppConfig, load_config};
pub use engine::{ListEngine, Outcome, Rejection};
pub use error::{AppError, Result};
pub use store::{ListKind, ListStore};
