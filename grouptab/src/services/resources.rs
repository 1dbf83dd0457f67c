//! Event, document and photo metadata attached to a group.
//!
//! Creating and listing need group membership. Renaming and deleting resolve the owning group
//! from the resource itself; an id that resolves to nothing is denied rather than reported
//! missing.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::auth::policy::AccessPolicy;
use crate::db::models::resources::{ResourceCreateDBRequest, ResourceDBResponse, ResourceKind};
use crate::db::{Store, StoreTx};
use crate::errors::{Error, Result};
use crate::services::{denied, required_text};
use crate::types::{GroupId, Operation, Permission, Resource, ResourceId, UserId, abbrev_user};

#[derive(Clone)]
pub struct ResourceService {
    store: Arc<dyn Store>,
    policy: Arc<dyn AccessPolicy>,
}

fn resource_of(kind: ResourceKind) -> Resource {
    match kind {
        ResourceKind::Event => Resource::Events,
        ResourceKind::Document => Resource::Documents,
        ResourceKind::Photo => Resource::Photos,
    }
}

fn entity_name(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Event => "Event",
        ResourceKind::Document => "Document",
        ResourceKind::Photo => "Photo",
    }
}

impl ResourceService {
    pub fn new(store: Arc<dyn Store>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self { store, policy }
    }

    /// Check that `actor` may change the resource, then load it.
    ///
    /// Events need membership (rename) or administration (delete) of the group that owns them.
    /// Documents and photos need membership of their owning group for both.
    async fn authorize_change(
        &self,
        tx: &mut dyn StoreTx,
        actor: &UserId,
        kind: ResourceKind,
        id: ResourceId,
        operation: Operation,
    ) -> Result<ResourceDBResponse> {
        if let Some(owned) = tx.get_resource(kind, id).await? {
            tx.lock_members(&[actor], owned.group_id).await?;
        }
        let allowed = match kind {
            ResourceKind::Event => {
                let required = match operation {
                    Operation::Delete => Permission::EventGroupAdministrator(id),
                    _ => Permission::EventGroupMember(id),
                };
                let Some(event) = tx.get_resource(kind, id).await? else {
                    return Err(denied(required, operation, Resource::Events));
                };
                let allowed = match operation {
                    Operation::Delete => self.policy.is_group_administrator(tx, actor, event.group_id).await?,
                    _ => self.policy.is_group_member(tx, actor, event.group_id).await?,
                };
                if !allowed {
                    return Err(denied(required, operation, Resource::Events));
                }
                return Ok(event);
            }
            ResourceKind::Document => self.policy.is_group_member_by_document(tx, actor, id).await?,
            ResourceKind::Photo => self.policy.is_group_member_by_photo(tx, actor, id).await?,
        };
        if !allowed {
            let required = match kind {
                ResourceKind::Document => Permission::DocumentGroupMember(id),
                _ => Permission::PhotoGroupMember(id),
            };
            return Err(denied(required, operation, resource_of(kind)));
        }
        tx.get_resource(kind, id)
            .await?
            .ok_or_else(|| Error::not_found(entity_name(kind), id))
    }

    /// Attach a new resource to the group. Members only.
    #[instrument(skip(self, name), fields(actor = %abbrev_user(actor)), err)]
    pub async fn create_resource(&self, actor: &UserId, group: GroupId, kind: ResourceKind, name: String) -> Result<ResourceDBResponse> {
        let mut tx = self.store.begin().await?;
        tx.lock_members(&[actor], group).await?;
        if !self.policy.is_group_member(tx.as_mut(), actor, group).await? {
            return Err(denied(Permission::GroupMember(group), Operation::Create, resource_of(kind)));
        }
        let name = required_text("name", &name)?;

        let created = tx
            .create_resource(&ResourceCreateDBRequest {
                group_id: group,
                kind,
                name,
                created_by: actor.clone(),
            })
            .await?;
        tx.commit().await?;

        info!(resource_id = created.id, group_id = group, ?kind, "Group resource created");
        Ok(created)
    }

    /// Resources of one kind in the group, ordered by id. Members only.
    pub async fn list_resources(&self, caller: &UserId, group: GroupId, kind: ResourceKind) -> Result<Vec<ResourceDBResponse>> {
        let mut tx = self.store.begin().await?;
        if !self.policy.is_group_member(tx.as_mut(), caller, group).await? {
            return Err(denied(Permission::GroupMember(group), Operation::Read, resource_of(kind)));
        }
        Ok(tx.list_group_resources(group, kind).await?)
    }

    #[instrument(skip(self, name), fields(actor = %abbrev_user(actor)), err)]
    pub async fn rename_resource(&self, actor: &UserId, kind: ResourceKind, id: ResourceId, name: String) -> Result<ResourceDBResponse> {
        let mut tx = self.store.begin().await?;
        self.authorize_change(tx.as_mut(), actor, kind, id, Operation::Update).await?;
        let name = required_text("name", &name)?;

        let renamed = tx.rename_resource(kind, id, &name).await?;
        tx.commit().await?;
        Ok(renamed)
    }

    #[instrument(skip(self), fields(actor = %abbrev_user(actor)), err)]
    pub async fn delete_resource(&self, actor: &UserId, kind: ResourceKind, id: ResourceId) -> Result<ResourceDBResponse> {
        let mut tx = self.store.begin().await?;
        self.authorize_change(tx.as_mut(), actor, kind, id, Operation::Delete).await?;

        let deleted = tx
            .delete_resource(kind, id)
            .await?
            .ok_or_else(|| Error::not_found(entity_name(kind), id))?;
        tx.commit().await?;

        info!(resource_id = id, group_id = deleted.group_id, ?kind, "Group resource deleted");
        Ok(deleted)
    }
}
