//! Database models for group resources (events, documents, photos).
//!
//! Only metadata lives here; document and photo bytes are kept by the file store.

use crate::types::{GroupId, ResourceId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceKind {
    Event,
    Document,
    Photo,
}

/// Database request for attaching a resource to a group
#[derive(Debug, Clone)]
pub struct ResourceCreateDBRequest {
    pub group_id: GroupId,
    pub kind: ResourceKind,
    pub name: String,
    pub created_by: UserId,
}

/// Database response for a group resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResourceDBResponse {
    pub id: ResourceId,
    pub group_id: GroupId,
    pub kind: ResourceKind,
    pub name: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}
