//! Invitation lifecycle: `NONE -> PENDING -> {ACCEPTED, REVOKED}`.
//!
//! Both terminal states delete the invitation row; acceptance replaces it with a MEMBER
//! membership in the same unit of work. Every transition first locks the (user, group) pair, so
//! an invitation and a membership for the same pair never coexist.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::api::models::invitations::InvitationCreate;
use crate::auth::policy::AccessPolicy;
use crate::config::InvitePolicy;
use crate::db::Store;
use crate::db::models::{
    invitations::{InvitationCreateDBRequest, InvitationDBResponse},
    memberships::{GroupRole, MembershipDBResponse},
};
use crate::errors::{Error, Result};
use crate::services::denied;
use crate::types::{GroupId, Operation, Permission, Resource, UserId, abbrev_user};

#[derive(Clone)]
pub struct InvitationService {
    store: Arc<dyn Store>,
    policy: Arc<dyn AccessPolicy>,
    invite_policy: InvitePolicy,
}

impl InvitationService {
    pub fn new(store: Arc<dyn Store>, policy: Arc<dyn AccessPolicy>, invite_policy: InvitePolicy) -> Self {
        Self {
            store,
            policy,
            invite_policy,
        }
    }

    /// Invite the user registered under `invite.email` into the group.
    #[instrument(skip(self, invite), fields(inviter = %abbrev_user(inviter)), err)]
    pub async fn invite(&self, inviter: &UserId, group: GroupId, invite: InvitationCreate) -> Result<InvitationDBResponse> {
        let email = invite.email.trim().to_lowercase();
        let mut tx = self.store.begin().await?;
        let invitee = tx.get_user_by_email(&email).await?;
        match &invitee {
            Some(invitee) => tx.lock_members(&[inviter, &invitee.id], group).await?,
            None => tx.lock_members(&[inviter], group).await?,
        }

        let allowed = match self.invite_policy {
            InvitePolicy::AnyMember => self.policy.is_group_member(tx.as_mut(), inviter, group).await?,
            InvitePolicy::AdministratorsOnly => self.policy.is_group_administrator(tx.as_mut(), inviter, group).await?,
        };
        if !allowed {
            let required = match self.invite_policy {
                InvitePolicy::AnyMember => Permission::GroupMember(group),
                InvitePolicy::AdministratorsOnly => Permission::GroupAdministrator(group),
            };
            return Err(denied(required, Operation::Invite, Resource::Groups));
        }

        let invitee = invitee.ok_or_else(|| Error::not_found("User", &email))?;
        if tx.get_membership(&invitee.id, group).await?.is_some() {
            return Err(Error::conflict("User is already a member of this group"));
        }
        if tx.get_invitation(&invitee.id, group).await?.is_some() {
            return Err(Error::conflict("User already has a pending invitation to this group"));
        }

        let invitation = tx
            .create_invitation(&InvitationCreateDBRequest {
                invited_user: invitee.id,
                group_id: group,
                inviter: inviter.clone(),
            })
            .await?;
        tx.commit().await?;

        info!(
            group_id = group,
            invited_user = %abbrev_user(&invitation.invited_user),
            inviter = %abbrev_user(inviter),
            "Invitation created"
        );
        Ok(invitation)
    }

    /// Accept a pending invitation. Self-service only.
    ///
    /// The invitation is deleted and the MEMBER membership created atomically. Of two concurrent
    /// accepts exactly one succeeds; the other finds no invitation.
    #[instrument(skip(self), fields(actor = %abbrev_user(actor)), err)]
    pub async fn accept(&self, actor: &UserId, user: &UserId, group: GroupId) -> Result<MembershipDBResponse> {
        if !self.policy.is_authorized_for_account(actor, user) {
            return Err(denied(Permission::AccountOwner(user.clone()), Operation::Accept, Resource::Invitations));
        }

        let mut tx = self.store.begin().await?;
        tx.lock_pair(user, group).await?;
        if tx.delete_invitation(user, group).await?.is_none() {
            return Err(Error::not_found("Invitation", format!("{user}/{group}")));
        }
        let membership = tx.create_membership(user, group, GroupRole::Member).await?;
        tx.commit().await?;

        info!(group_id = group, user_id = %abbrev_user(user), "Invitation accepted");
        Ok(membership)
    }

    /// Withdraw or decline a pending invitation.
    ///
    /// Allowed for the invited user, the inviter, and administrators of the group.
    #[instrument(skip(self), fields(actor = %abbrev_user(actor)), err)]
    pub async fn revoke(&self, actor: &UserId, user: &UserId, group: GroupId) -> Result<InvitationDBResponse> {
        let mut tx = self.store.begin().await?;
        tx.lock_members(&[actor, user], group).await?;

        let pending = tx.get_invitation(user, group).await?;
        let allowed = self.policy.is_authorized_for_account(actor, user)
            || pending.as_ref().is_some_and(|i| &i.inviter == actor)
            || self.policy.is_group_administrator(tx.as_mut(), actor, group).await?;
        if !allowed {
            return Err(denied(
                Permission::Any(vec![
                    Permission::AccountOwner(user.clone()),
                    Permission::GroupAdministrator(group),
                ]),
                Operation::Revoke,
                Resource::Invitations,
            ));
        }

        let invitation = tx
            .delete_invitation(user, group)
            .await?
            .ok_or_else(|| Error::not_found("Invitation", format!("{user}/{group}")))?;
        tx.commit().await?;

        info!(group_id = group, user_id = %abbrev_user(user), actor = %abbrev_user(actor), "Invitation revoked");
        Ok(invitation)
    }

    /// Pending invitations naming the user, ordered by group id. Self-service only.
    pub async fn list_pending(&self, actor: &UserId, user: &UserId) -> Result<Vec<InvitationDBResponse>> {
        if !self.policy.is_authorized_for_account(actor, user) {
            return Err(denied(Permission::AccountOwner(user.clone()), Operation::Read, Resource::Invitations));
        }
        let mut tx = self.store.begin().await?;
        Ok(tx.list_user_invitations(user).await?)
    }
}
