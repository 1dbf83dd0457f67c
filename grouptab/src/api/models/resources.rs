//! API request/response models for events, documents and photos.

use crate::db::models::resources::{ResourceDBResponse, ResourceKind};
use crate::types::{GroupId, ResourceId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Path segment naming a resource collection: `events`, `documents` or `photos`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCollection {
    Events,
    Documents,
    Photos,
}

impl From<ResourceCollection> for ResourceKind {
    fn from(collection: ResourceCollection) -> Self {
        match collection {
            ResourceCollection::Events => ResourceKind::Event,
            ResourceCollection::Documents => ResourceKind::Document,
            ResourceCollection::Photos => ResourceKind::Photo,
        }
    }
}

/// Request body for attaching a resource to a group, or renaming one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCreate {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub id: ResourceId,
    pub group_id: GroupId,
    pub kind: ResourceKind,
    pub name: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl From<ResourceDBResponse> for ResourceResponse {
    fn from(db: ResourceDBResponse) -> Self {
        Self {
            id: db.id,
            group_id: db.group_id,
            kind: db.kind,
            name: db.name,
            created_by: db.created_by,
            created_at: db.created_at,
        }
    }
}
