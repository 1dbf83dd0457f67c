//! Database models for users.

use crate::api::models::users::UserCreate;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database request for creating a new user. The identity is issued externally.
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
}

impl UserCreateDBRequest {
    pub fn new(id: UserId, create: UserCreate) -> Self {
        Self {
            id,
            display_name: create.display_name.trim().to_string(),
            email: create.email.trim().to_lowercase(),
        }
    }
}

/// Database request for updating a user's profile
#[derive(Debug, Clone)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
}

/// Database response for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
