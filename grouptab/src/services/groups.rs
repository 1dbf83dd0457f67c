//! Group lifecycle.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::api::models::groups::{GroupCreate, GroupUpdate};
use crate::auth::policy::AccessPolicy;
use crate::db::Store;
use crate::db::models::{
    groups::{GroupCreateDBRequest, GroupDBResponse, GroupUpdateDBRequest},
    memberships::{GroupRole, MembershipDBResponse},
};
use crate::errors::{Error, Result};
use crate::services::{denied, required_text, validate_money};
use crate::types::{GroupId, Operation, Permission, Resource, UserId, abbrev_user};

#[derive(Clone)]
pub struct GroupService {
    store: Arc<dyn Store>,
    policy: Arc<dyn AccessPolicy>,
}

fn validate_currency(currency: &str) -> Result<String> {
    let currency = currency.trim().to_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::bad_request(format!("'{currency}' is not a three-letter currency code")));
    }
    Ok(currency)
}

fn validate_budget(budget: Option<Decimal>) -> Result<Option<Decimal>> {
    budget.map(|b| validate_money("budget", b)).transpose()
}

impl GroupService {
    pub fn new(store: Arc<dyn Store>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self { store, policy }
    }

    /// Create a group. The creator becomes its first ADMINISTRATOR in the same unit of work.
    #[instrument(skip(self, create), fields(actor = %abbrev_user(actor)), err)]
    pub async fn create_group(&self, actor: &UserId, mut create: GroupCreate) -> Result<GroupDBResponse> {
        create.name = required_text("name", &create.name)?;
        create.currency = validate_currency(&create.currency)?;
        create.budget = validate_budget(create.budget)?;

        let mut tx = self.store.begin().await?;
        if tx.get_user(actor).await?.is_none() {
            return Err(Error::not_found("User", actor));
        }
        let group = tx.create_group(&GroupCreateDBRequest::new(actor.clone(), create)).await?;
        tx.create_membership(actor, group.id, GroupRole::Administrator).await?;
        tx.commit().await?;

        info!(group_id = group.id, actor = %abbrev_user(actor), "Group created");
        Ok(group)
    }

    pub async fn get_group(&self, caller: &UserId, group: GroupId) -> Result<GroupDBResponse> {
        let mut tx = self.store.begin().await?;
        if !self.policy.is_group_member(tx.as_mut(), caller, group).await? {
            return Err(denied(Permission::GroupMember(group), Operation::Read, Resource::Groups));
        }
        tx.get_group(group).await?.ok_or_else(|| Error::not_found("Group", group))
    }

    /// Partially update a group. Administrators only.
    #[instrument(skip(self, update), fields(actor = %abbrev_user(actor)), err)]
    pub async fn update_group(&self, actor: &UserId, group: GroupId, update: GroupUpdate) -> Result<GroupDBResponse> {
        let mut tx = self.store.begin().await?;
        tx.lock_members(&[actor], group).await?;
        if !self.policy.is_group_administrator(tx.as_mut(), actor, group).await? {
            return Err(denied(Permission::GroupAdministrator(group), Operation::Update, Resource::Groups));
        }

        let request = GroupUpdateDBRequest {
            name: update.name.map(|n| required_text("name", &n)).transpose()?,
            currency: update.currency.map(|c| validate_currency(&c)).transpose()?,
            budget: validate_budget(update.budget)?,
        };
        if tx.get_group(group).await?.is_none() {
            return Err(Error::not_found("Group", group));
        }
        let updated = tx.update_group(group, &request).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Delete a group and everything that belongs to it, in one unit of work.
    ///
    /// Dependents go first, in order: expense participants, expenses, events/documents/photos,
    /// invitations, memberships. The group row goes last.
    #[instrument(skip(self), fields(actor = %abbrev_user(actor)), err)]
    pub async fn delete_group(&self, actor: &UserId, group: GroupId) -> Result<GroupDBResponse> {
        let mut tx = self.store.begin().await?;
        // Every member is locked, so no membership-gated write can land between the cascade steps.
        let members = tx.list_group_memberships(group).await?;
        let mut locked: Vec<&UserId> = members.iter().map(|m| &m.user_id).collect();
        locked.push(actor);
        tx.lock_members(&locked, group).await?;
        if !self.policy.is_group_administrator(tx.as_mut(), actor, group).await? {
            return Err(denied(Permission::GroupAdministrator(group), Operation::Delete, Resource::Groups));
        }
        let existing = tx.get_group(group).await?.ok_or_else(|| Error::not_found("Group", group))?;

        let participants = tx.delete_group_participants(group).await?;
        let expenses = tx.delete_group_expenses(group).await?;
        let resources = tx.delete_group_resources(group).await?;
        let invitations = tx.delete_group_invitations(group).await?;
        let memberships = tx.delete_group_memberships(group).await?;
        if !tx.delete_group(group).await? {
            return Err(Error::not_found("Group", group));
        }
        tx.commit().await?;

        info!(
            group_id = group,
            participants, expenses, resources, invitations, memberships, "Group deleted"
        );
        Ok(existing)
    }

    /// Members of a group ordered by user id. Visible to members only.
    pub async fn list_members(&self, caller: &UserId, group: GroupId) -> Result<Vec<MembershipDBResponse>> {
        let mut tx = self.store.begin().await?;
        if !self.policy.is_group_member(tx.as_mut(), caller, group).await? {
            return Err(denied(Permission::GroupMember(group), Operation::Read, Resource::Memberships));
        }
        Ok(tx.list_group_memberships(group).await?)
    }

    /// Groups the user belongs to, ordered by group id.
    pub async fn list_user_groups(&self, actor: &UserId, user: &UserId) -> Result<Vec<GroupDBResponse>> {
        if !self.policy.is_authorized_for_account(actor, user) {
            return Err(denied(Permission::AccountOwner(user.clone()), Operation::Read, Resource::Groups));
        }
        let mut tx = self.store.begin().await?;
        let mut groups = Vec::new();
        for membership in tx.list_user_memberships(user).await? {
            if let Some(group) = tx.get_group(membership.group_id).await? {
                groups.push(group);
            }
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::expenses::ExpenseCreate;
    use crate::api::models::invitations::InvitationCreate;
    use crate::db::Store;
    use crate::db::models::resources::ResourceKind;
    use crate::test_utils::{add_member, create_test_group, register_user, services};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_creator_becomes_administrator() {
        let (services, _store) = services();
        let admin = register_user(&services, "admin").await;

        let group = services
            .groups
            .create_group(
                &admin,
                GroupCreate {
                    name: "Wakacje 2025".to_string(),
                    currency: "pln".to_string(),
                    budget: Some(Decimal::new(500000, 2)),
                },
            )
            .await
            .unwrap();
        assert_eq!(group.currency, "PLN");
        assert_eq!(group.created_by, admin);

        let members = services.groups.list_members(&admin, group.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].role, GroupRole::Administrator);
    }

    #[tokio::test]
    async fn test_create_group_validates_input() {
        let (services, _store) = services();
        let admin = register_user(&services, "admin").await;

        let cases = [
            ("", "EUR", None),
            ("Trip", "EURO", None),
            ("Trip", "EUR", Some(Decimal::new(-1, 0))),
            ("Trip", "EUR", Some(Decimal::new(10_001, 3))),
            ("Trip", "EUR", Some(Decimal::new(1_000_000_000_000, 0))),
        ];
        for (name, currency, budget) in cases {
            let err = services
                .groups
                .create_group(
                    &admin,
                    GroupCreate {
                        name: name.to_string(),
                        currency: currency.to_string(),
                        budget,
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
        assert!(services.groups.list_user_groups(&admin, &admin).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_members_read_and_only_administrators_update() {
        let (services, _store) = services();
        let admin = register_user(&services, "admin").await;
        let member = register_user(&services, "member").await;
        let outsider = register_user(&services, "outsider").await;
        let group = create_test_group(&services, &admin).await;
        add_member(&services, &admin, group, &member).await;

        assert!(services.groups.get_group(&member, group).await.is_ok());
        let err = services.groups.get_group(&outsider, group).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let rename = GroupUpdate {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        let err = services.groups.update_group(&member, group, rename.clone()).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let updated = services.groups.update_group(&admin, group, rename).await.unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.currency, "EUR");
    }

    #[tokio::test]
    async fn test_unknown_group_fails_closed() {
        let (services, _store) = services();
        let admin = register_user(&services, "admin").await;

        let err = services.groups.get_group(&admin, 4242).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        let err = services.groups.delete_group(&admin, 4242).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_delete_group_cascades_everything() {
        let (services, store) = services();
        let admin = register_user(&services, "admin").await;
        let member = register_user(&services, "member").await;
        let invitee = register_user(&services, "invitee").await;
        let group = create_test_group(&services, &admin).await;
        add_member(&services, &admin, group, &member).await;
        services
            .invitations
            .invite(
                &admin,
                group,
                InvitationCreate {
                    email: "invitee@example.com".to_string(),
                },
            )
            .await
            .unwrap();
        let expense = services
            .expenses
            .create_expense(
                &member,
                group,
                ExpenseCreate {
                    name: "Tickets".to_string(),
                    description: None,
                    category: None,
                    amount: Decimal::new(9000, 2),
                    spent_at: None,
                    participants: vec![admin.clone()],
                },
            )
            .await
            .unwrap();
        services
            .resources
            .create_resource(&member, group, ResourceKind::Photo, "beach.jpg".to_string())
            .await
            .unwrap();

        let err = services.groups.delete_group(&member, group).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let deleted = services.groups.delete_group(&admin, group).await.unwrap();
        assert_eq!(deleted.id, group);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.get_group(group).await.unwrap().is_none());
        assert!(tx.list_group_memberships(group).await.unwrap().is_empty());
        assert!(tx.list_user_invitations(&invitee).await.unwrap().is_empty());
        assert!(tx.get_expense(expense.expense.id).await.unwrap().is_none());
        assert!(tx.list_participants(expense.expense.id).await.unwrap().is_empty());
        assert!(tx.list_group_resources(group, ResourceKind::Photo).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_user_groups_is_self_only() {
        let (services, _store) = services();
        let admin = register_user(&services, "admin").await;
        let other = register_user(&services, "other").await;
        let first = create_test_group(&services, &admin).await;
        let second = create_test_group(&services, &admin).await;

        let groups = services.groups.list_user_groups(&admin, &admin).await.unwrap();
        assert_eq!(groups.iter().map(|g| g.id).collect::<Vec<_>>(), vec![first, second]);

        let err = services.groups.list_user_groups(&other, &admin).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }
}
