//! Authorization predicates.
//!
//! Every group-scoped operation calls one of these before it writes anything. Predicates read
//! through the caller's own [`StoreTx`], so the decision and the mutation it guards see the same
//! state. A predicate that cannot resolve its target (unknown document, photo or expense) answers
//! `false`; only storage faults are errors.

use async_trait::async_trait;
use tracing::{instrument, trace};

use crate::db::errors::Result;
use crate::db::models::{memberships::GroupRole, resources::ResourceKind};
use crate::db::store::StoreTx;
use crate::types::{ExpenseId, GroupId, ResourceId, UserId, abbrev_user};

/// The capability set consulted by the services.
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    /// A membership row exists for (caller, group).
    async fn is_group_member(&self, tx: &mut dyn StoreTx, caller: &UserId, group: GroupId) -> Result<bool>;

    /// The caller's membership in the group has the ADMINISTRATOR role.
    async fn is_group_administrator(&self, tx: &mut dyn StoreTx, caller: &UserId, group: GroupId) -> Result<bool>;

    /// The caller is a member of the group owning the document.
    async fn is_group_member_by_document(&self, tx: &mut dyn StoreTx, caller: &UserId, document: ResourceId) -> Result<bool>;

    /// The caller is a member of the group owning the photo.
    async fn is_group_member_by_photo(&self, tx: &mut dyn StoreTx, caller: &UserId, photo: ResourceId) -> Result<bool>;

    /// The caller is the recorded creator of an expense.
    fn is_expense_creator(&self, caller: &UserId, creator: &UserId) -> bool;

    /// The caller created the expense with this id.
    async fn is_expense_creator_by_expense_id(&self, tx: &mut dyn StoreTx, caller: &UserId, expense: ExpenseId) -> Result<bool>;

    /// The caller may act on the target account. Only the account itself qualifies.
    fn is_authorized_for_account(&self, caller: &UserId, target: &UserId) -> bool;
}

/// Production policy backed by the membership table and expense ownership.
#[derive(Debug, Clone, Copy, Default)]
pub struct MembershipPolicy;

impl MembershipPolicy {
    async fn is_member_by_resource(
        &self,
        tx: &mut dyn StoreTx,
        caller: &UserId,
        kind: ResourceKind,
        id: ResourceId,
    ) -> Result<bool> {
        match tx.get_resource(kind, id).await? {
            Some(resource) => self.is_group_member(tx, caller, resource.group_id).await,
            None => {
                trace!(?kind, resource_id = id, "Resource not found, denying");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl AccessPolicy for MembershipPolicy {
    #[instrument(skip(self, tx), fields(caller = %abbrev_user(caller)), err)]
    async fn is_group_member(&self, tx: &mut dyn StoreTx, caller: &UserId, group: GroupId) -> Result<bool> {
        Ok(tx.get_membership(caller, group).await?.is_some())
    }

    #[instrument(skip(self, tx), fields(caller = %abbrev_user(caller)), err)]
    async fn is_group_administrator(&self, tx: &mut dyn StoreTx, caller: &UserId, group: GroupId) -> Result<bool> {
        Ok(tx
            .get_membership(caller, group)
            .await?
            .is_some_and(|m| m.role == GroupRole::Administrator))
    }

    #[instrument(skip(self, tx), fields(caller = %abbrev_user(caller)), err)]
    async fn is_group_member_by_document(&self, tx: &mut dyn StoreTx, caller: &UserId, document: ResourceId) -> Result<bool> {
        self.is_member_by_resource(tx, caller, ResourceKind::Document, document).await
    }

    #[instrument(skip(self, tx), fields(caller = %abbrev_user(caller)), err)]
    async fn is_group_member_by_photo(&self, tx: &mut dyn StoreTx, caller: &UserId, photo: ResourceId) -> Result<bool> {
        self.is_member_by_resource(tx, caller, ResourceKind::Photo, photo).await
    }

    fn is_expense_creator(&self, caller: &UserId, creator: &UserId) -> bool {
        caller == creator
    }

    #[instrument(skip(self, tx), fields(caller = %abbrev_user(caller)), err)]
    async fn is_expense_creator_by_expense_id(&self, tx: &mut dyn StoreTx, caller: &UserId, expense: ExpenseId) -> Result<bool> {
        Ok(tx
            .get_expense(expense)
            .await?
            .is_some_and(|e| self.is_expense_creator(caller, &e.creator)))
    }

    fn is_authorized_for_account(&self, caller: &UserId, target: &UserId) -> bool {
        caller == target
    }
}

/// Policy that grants every predicate. Lets tests exercise service logic in isolation from
/// membership state.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPolicy;

#[async_trait]
impl AccessPolicy for AllowAllPolicy {
    async fn is_group_member(&self, _tx: &mut dyn StoreTx, _caller: &UserId, _group: GroupId) -> Result<bool> {
        Ok(true)
    }

    async fn is_group_administrator(&self, _tx: &mut dyn StoreTx, _caller: &UserId, _group: GroupId) -> Result<bool> {
        Ok(true)
    }

    async fn is_group_member_by_document(&self, _tx: &mut dyn StoreTx, _caller: &UserId, _document: ResourceId) -> Result<bool> {
        Ok(true)
    }

    async fn is_group_member_by_photo(&self, _tx: &mut dyn StoreTx, _caller: &UserId, _photo: ResourceId) -> Result<bool> {
        Ok(true)
    }

    fn is_expense_creator(&self, _caller: &UserId, _creator: &UserId) -> bool {
        true
    }

    async fn is_expense_creator_by_expense_id(&self, _tx: &mut dyn StoreTx, _caller: &UserId, _expense: ExpenseId) -> Result<bool> {
        Ok(true)
    }

    fn is_authorized_for_account(&self, _caller: &UserId, _target: &UserId) -> bool {
        true
    }
}
