//! Database models for groups.

use crate::api::models::groups::GroupCreate;
use crate::types::{GroupId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Database request for creating a new group
#[derive(Debug, Clone)]
pub struct GroupCreateDBRequest {
    pub name: String,
    pub currency: String,
    pub budget: Option<Decimal>,
    pub created_by: UserId,
}

impl GroupCreateDBRequest {
    pub fn new(created_by: UserId, create: GroupCreate) -> Self {
        Self {
            name: create.name,
            currency: create.currency.to_uppercase(),
            budget: create.budget,
            created_by,
        }
    }
}

/// Database request for updating a group. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct GroupUpdateDBRequest {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub budget: Option<Decimal>,
}

/// Database response for a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroupDBResponse {
    pub id: GroupId,
    pub name: String,
    pub currency: String,
    pub budget: Option<Decimal>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}
