//! API request/response models for groups and their members.

use crate::db::models::{
    groups::GroupDBResponse,
    memberships::{GroupRole, MembershipDBResponse},
};
use crate::types::{GroupId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request body for creating a new group. The caller becomes its first administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCreate {
    pub name: String,
    /// ISO 4217 code, e.g. "EUR"
    pub currency: String,
    /// Optional spending ceiling, in `currency`
    #[serde(default)]
    pub budget: Option<Decimal>,
}

/// Request body for updating an existing group. All fields are optional;
/// only provided fields will be updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub budget: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResponse {
    pub id: GroupId,
    pub name: String,
    pub currency: String,
    pub budget: Option<Decimal>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// A member of a group and their role in it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipResponse {
    pub user_id: UserId,
    pub group_id: GroupId,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

impl From<GroupDBResponse> for GroupResponse {
    fn from(db: GroupDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            currency: db.currency,
            budget: db.budget,
            created_by: db.created_by,
            created_at: db.created_at,
        }
    }
}

impl From<MembershipDBResponse> for MembershipResponse {
    fn from(db: MembershipDBResponse) -> Self {
        Self {
            user_id: db.user_id,
            group_id: db.group_id,
            role: db.role,
            joined_at: db.joined_at,
        }
    }
}
