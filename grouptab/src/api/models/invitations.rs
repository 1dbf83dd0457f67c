//! API request/response models for invitations.

use crate::db::models::invitations::InvitationDBResponse;
use crate::types::{GroupId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for inviting a registered user to a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationCreate {
    /// Contact email of the user to invite
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationResponse {
    pub invited_user: UserId,
    pub group_id: GroupId,
    pub inviter: UserId,
    pub created_at: DateTime<Utc>,
}

impl From<InvitationDBResponse> for InvitationResponse {
    fn from(db: InvitationDBResponse) -> Self {
        Self {
            invited_user: db.invited_user,
            group_id: db.group_id,
            inviter: db.inviter,
            created_at: db.created_at,
        }
    }
}
