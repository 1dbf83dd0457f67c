//! Database models for group memberships.

use crate::types::{GroupId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a user within a group, stored as TEXT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupRole {
    Member,
    Administrator,
}

/// Database response for a membership row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MembershipDBResponse {
    pub user_id: UserId,
    pub group_id: GroupId,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

impl MembershipDBResponse {
    pub fn is_administrator(&self) -> bool {
        self.role == GroupRole::Administrator
    }
}
