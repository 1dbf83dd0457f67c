//! API request and response data models.
//!
//! These structures define the public JSON contract. They are distinct from the database
//! models in [`crate::db::models`] so storage and API representations can evolve separately.
//! Identity never travels in a request body: the acting user always comes from
//! [`CurrentUser`](users::CurrentUser).
//!
//! - [`users`]: registration, profiles and the authenticated caller
//! - [`groups`]: groups and their memberships
//! - [`invitations`]: pending invitations
//! - [`expenses`]: expenses and their participants
//! - [`resources`]: event, document and photo metadata

pub mod expenses;
pub mod groups;
pub mod invitations;
pub mod resources;
pub mod users;
