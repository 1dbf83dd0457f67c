//! Data access layer.
//!
//! Every service operation runs inside exactly one unit of work obtained from a [`Store`]:
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (api::handlers - transport only)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │  Services   │  (authorization predicates, then mutations)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │  StoreTx    │  (one transaction per operation)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┬──────────────┐
//! │ InMemory    │  PostgreSQL  │
//! └─────────────┴──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`store`]: the [`Store`] / [`StoreTx`] traits
//! - [`in_memory`]: mutex-serialized store used by tests and `database.type = memory`
//! - [`postgres`]: `sqlx` implementation with row and advisory locks
//! - [`models`]: row structures
//! - [`errors`]: storage error classification
//!
//! # Transactions
//!
//! A [`StoreTx`] must be committed explicitly; dropping it discards every write:
//!
//! ```ignore
//! let mut tx = store.begin().await?;
//! tx.create_membership(&user, group_id, GroupRole::Member).await?;
//! tx.commit().await?;
//! ```
//!
//! # Migrations
//!
//! The Postgres schema lives in `migrations/` and is applied on startup through
//! [`crate::migrator`].

pub mod errors;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{Store, StoreTx};
