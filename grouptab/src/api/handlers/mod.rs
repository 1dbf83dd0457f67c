//! HTTP request handlers for all API endpoints.
//!
//! Handlers are thin: each one extracts the caller, path and body, calls one service operation,
//! and converts the result into a response model. Authorization and validation happen in the
//! services.
//!
//! # Handler Modules
//!
//! - [`users`]: Registration, the current user, profiles, a user's groups and invitations
//! - [`groups`]: Group CRUD and member listing
//! - [`invitations`]: Invite, accept, revoke/decline
//! - [`memberships`]: Promotion and removal
//! - [`expenses`]: The expense ledger
//! - [`resources`]: Event, document and photo metadata
//!
//! # Authentication
//!
//! Every handler except registration takes a
//! [`CurrentUser`](crate::api::models::users::CurrentUser), resolved from the trusted identity
//! header by [`crate::auth::current_user`].
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to the appropriate HTTP status code.

pub mod expenses;
pub mod groups;
pub mod invitations;
pub mod memberships;
pub mod resources;
pub mod users;
