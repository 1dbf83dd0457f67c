//! Role changes and member removal.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::auth::policy::AccessPolicy;
use crate::config::MemberRemovalPolicy;
use crate::db::models::memberships::{GroupRole, MembershipDBResponse};
use crate::db::{Store, StoreTx};
use crate::errors::{Error, Result};
use crate::services::denied;
use crate::types::{GroupId, Operation, Permission, Resource, UserId, abbrev_user};

#[derive(Clone)]
pub struct MembershipService {
    store: Arc<dyn Store>,
    policy: Arc<dyn AccessPolicy>,
    removal_policy: MemberRemovalPolicy,
}

/// Delete the group's expenses whose only participant is `user`. Returns how many went.
async fn purge_sole_participant_expenses(tx: &mut dyn StoreTx, user: &UserId, group: GroupId) -> Result<u64> {
    let mut purged = 0;
    for expense in tx.list_group_expenses(group).await? {
        let participants = tx.list_participants(expense.id).await?;
        if participants.len() == 1 && &participants[0].user_id == user {
            tx.delete_participants(expense.id).await?;
            tx.delete_expense(expense.id).await?;
            purged += 1;
        }
    }
    Ok(purged)
}

impl MembershipService {
    pub fn new(store: Arc<dyn Store>, policy: Arc<dyn AccessPolicy>, removal_policy: MemberRemovalPolicy) -> Self {
        Self {
            store,
            policy,
            removal_policy,
        }
    }

    /// Promote a member to ADMINISTRATOR. Promoting an administrator changes nothing.
    #[instrument(skip(self), fields(actor = %abbrev_user(actor), target = %abbrev_user(target)), err)]
    pub async fn promote_to_administrator(&self, actor: &UserId, target: &UserId, group: GroupId) -> Result<MembershipDBResponse> {
        let mut tx = self.store.begin().await?;
        tx.lock_members(&[actor, target], group).await?;
        if !self.policy.is_group_administrator(tx.as_mut(), actor, group).await? {
            return Err(denied(Permission::GroupAdministrator(group), Operation::Promote, Resource::Groups));
        }

        let membership = tx
            .get_membership(target, group)
            .await?
            .ok_or_else(|| Error::not_found("Membership", format!("{target}/{group}")))?;
        if membership.role == GroupRole::Administrator {
            return Ok(membership);
        }

        let promoted = tx.update_membership_role(target, group, GroupRole::Administrator).await?;
        tx.commit().await?;

        info!(group_id = group, user_id = %abbrev_user(target), "Member promoted to administrator");
        Ok(promoted)
    }

    /// Remove a member from the group. What happens to their expenses follows the configured
    /// [`MemberRemovalPolicy`].
    #[instrument(skip(self), fields(actor = %abbrev_user(actor), target = %abbrev_user(target)), err)]
    pub async fn remove_member(&self, actor: &UserId, target: &UserId, group: GroupId) -> Result<MembershipDBResponse> {
        let mut tx = self.store.begin().await?;
        tx.lock_members(&[actor, target], group).await?;
        if !self.policy.is_group_administrator(tx.as_mut(), actor, group).await? {
            return Err(denied(Permission::GroupAdministrator(group), Operation::Remove, Resource::Groups));
        }

        let membership = tx
            .get_membership(target, group)
            .await?
            .ok_or_else(|| Error::not_found("Membership", format!("{target}/{group}")))?;
        tx.delete_membership(target, group).await?;

        let purged = match self.removal_policy {
            MemberRemovalPolicy::RetainHistory => 0,
            MemberRemovalPolicy::PurgeSoleParticipantExpenses => purge_sole_participant_expenses(tx.as_mut(), target, group).await?,
        };
        tx.commit().await?;

        info!(group_id = group, user_id = %abbrev_user(target), purged_expenses = purged, "Member removed");
        Ok(membership)
    }
}
