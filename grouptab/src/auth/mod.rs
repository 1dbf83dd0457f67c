//! Caller identity and authorization.
//!
//! # Authentication
//!
//! Identity verification happens upstream. A trusted proxy or gateway authenticates the caller
//! and forwards the opaque identity in a header (`auth.identity_header`, `x-grouptab-user` by
//! default). This crate never inspects credentials; it only resolves the identity to a
//! registered user.
//!
//! # Authorization
//!
//! Every group-scoped operation is gated by a predicate of [`policy::AccessPolicy`]:
//! - **Membership**: the caller belongs to the group (directly, or via the document, photo or
//!   event being acted on)
//! - **Administration**: the caller's membership has the ADMINISTRATOR role
//! - **Ownership**: the caller created the expense, or is the account being changed
//!
//! # Modules
//!
//! - [`current_user`]: Extractors for the authenticated caller in handlers
//! - [`policy`]: The predicates and their production and allow-all implementations
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use grouptab::api::models::users::CurrentUser;
//! use axum::extract::State;
//!
//! async fn handler(current_user: CurrentUser, State(state): State<AppState>) -> Result<String, Error> {
//!     Ok(format!("Hello, {}!", current_user.display_name))
//! }
//! ```

pub mod current_user;
pub mod policy;
