//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Everything is served under `/api/v1`:
//!
//! - **Users** (`/users/*`): registration, profiles, a user's groups and pending invitations
//! - **Groups** (`/groups/*`): groups, members, invitations, expenses and group resources
//! - **Expenses** (`/expenses/{id}`): update and delete by the creator
//! - **Resources** (`/resources/{collection}/{id}`): rename and delete events, documents, photos

pub mod handlers;
pub mod models;
