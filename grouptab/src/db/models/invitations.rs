//! Database models for pending invitations.

use crate::types::{GroupId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database request for creating a pending invitation
#[derive(Debug, Clone)]
pub struct InvitationCreateDBRequest {
    pub invited_user: UserId,
    pub group_id: GroupId,
    pub inviter: UserId,
}

/// Database response for an invitation row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InvitationDBResponse {
    pub invited_user: UserId,
    pub group_id: GroupId,
    pub inviter: UserId,
    pub created_at: DateTime<Utc>,
}
