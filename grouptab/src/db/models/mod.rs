//! Database record models matching table schemas.
//!
//! These structs correspond to rows of the tables in `migrations/` and are shared by both
//! [`Store`](crate::db::store::Store) implementations, so the in-memory store keeps exactly
//! the shape Postgres returns.
//!
//! # Design Principles
//!
//! - **Schema Mapping**: Each response struct matches a table row and derives `sqlx::FromRow`
//! - **Separation**: Database models are distinct from API models; requests are built from
//!   API payloads plus the authenticated actor, never from the payload alone
//! - **Immutability**: Fields that may not change after creation (group, creator) are absent
//!   from update requests
//!
//! # Models
//!
//! - [`users`]: externally identified accounts
//! - [`groups`]: groups with currency and optional budget
//! - [`memberships`]: (user, group) role rows
//! - [`invitations`]: pending (invited user, group) rows with their inviter
//! - [`expenses`]: expenses and their CREATOR/PAYER participants
//! - [`resources`]: event, document and photo metadata

pub mod expenses;
pub mod groups;
pub mod invitations;
pub mod memberships;
pub mod resources;
pub mod users;
