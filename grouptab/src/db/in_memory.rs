//! In-memory store.
//!
//! All tables live behind a single async mutex. A unit of work holds the lock for its whole
//! lifetime. Its first write takes a private copy of the tables, which replaces the shared state
//! on commit. Units of work are therefore fully serialized, and an uncommitted one leaves no trace.
//!
//! Reference checks mirror the foreign keys of the Postgres schema (restrict on delete), so code
//! exercised against this store fails the same way it would against Postgres.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::instrument;

use crate::db::errors::{DbError, Result};
use crate::db::models::{
    expenses::{ExpenseCreateDBRequest, ExpenseDBResponse, ExpenseUpdateDBRequest, ParticipantDBResponse, ParticipantRole},
    groups::{GroupCreateDBRequest, GroupDBResponse, GroupUpdateDBRequest},
    invitations::{InvitationCreateDBRequest, InvitationDBResponse},
    memberships::{GroupRole, MembershipDBResponse},
    resources::{ResourceCreateDBRequest, ResourceDBResponse, ResourceKind},
    users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::db::store::{Store, StoreTx};
use crate::types::{ExpenseId, GroupId, ResourceId, UserId};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, UserDBResponse>,
    groups: BTreeMap<GroupId, GroupDBResponse>,
    memberships: BTreeMap<(GroupId, UserId), MembershipDBResponse>,
    invitations: BTreeMap<(GroupId, UserId), InvitationDBResponse>,
    expenses: BTreeMap<ExpenseId, ExpenseDBResponse>,
    participants: BTreeMap<(ExpenseId, UserId), ParticipantDBResponse>,
    resources: BTreeMap<ResourceId, ResourceDBResponse>,
    last_group_id: GroupId,
    last_expense_id: ExpenseId,
    last_resource_id: ResourceId,
}

fn foreign_key(table: &str, constraint: &str) -> DbError {
    DbError::ForeignKeyViolation {
        constraint: Some(constraint.to_string()),
        table: Some(table.to_string()),
        message: format!("insert or update on table \"{table}\" violates foreign key constraint \"{constraint}\""),
    }
}

fn still_referenced(table: &str, constraint: &str) -> DbError {
    DbError::ForeignKeyViolation {
        constraint: Some(constraint.to_string()),
        table: Some(table.to_string()),
        message: format!("update or delete violates foreign key constraint \"{constraint}\" on table \"{table}\""),
    }
}

fn check(table: &str, constraint: &str) -> DbError {
    DbError::CheckViolation {
        constraint: Some(constraint.to_string()),
        table: Some(table.to_string()),
        message: format!("new row for relation \"{table}\" violates check constraint \"{constraint}\""),
    }
}

impl Tables {
    fn require_user(&self, id: &UserId, table: &str, constraint: &str) -> Result<()> {
        if self.users.contains_key(id) {
            Ok(())
        } else {
            Err(foreign_key(table, constraint))
        }
    }

    fn require_group(&self, id: GroupId, table: &str, constraint: &str) -> Result<()> {
        if self.groups.contains_key(&id) {
            Ok(())
        } else {
            Err(foreign_key(table, constraint))
        }
    }

    fn group_expense_ids(&self, group: GroupId) -> Vec<ExpenseId> {
        self.expenses.values().filter(|e| e.group_id == group).map(|e| e.id).collect()
    }
}

/// Store keeping every table in process memory. Contents are lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx { guard, working: None }))
    }
}

/// Unit of work over [`InMemoryStore`]; owns the store lock until committed or dropped.
///
/// The tables are copied on the first write only, so read-only units of work cost nothing
/// beyond the lock.
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Option<Tables>,
}

impl InMemoryTx {
    fn tables(&self) -> &Tables {
        self.working.as_ref().unwrap_or(&*self.guard)
    }

    fn tables_mut(&mut self) -> &mut Tables {
        let guard = &self.guard;
        self.working.get_or_insert_with(|| (**guard).clone())
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn get_user(&mut self, id: &UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.tables().users.get(id).cloned())
    }

    async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let email = email.to_lowercase();
        Ok(self.tables().users.values().find(|u| u.email == email).cloned())
    }

    #[instrument(skip(self, request), fields(user_id = %request.id), err)]
    async fn create_user(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let tables = self.tables_mut();
        if tables.users.contains_key(&request.id) {
            return Err(DbError::duplicate("users", "users_pkey"));
        }
        let email = request.email.to_lowercase();
        if tables.users.values().any(|u| u.email == email) {
            return Err(DbError::duplicate("users", "users_email_key"));
        }

        let user = UserDBResponse {
            id: request.id.clone(),
            display_name: request.display_name.clone(),
            email,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn update_user(&mut self, id: &UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let user = self.tables_mut().users.get_mut(id).ok_or(DbError::NotFound)?;
        if let Some(display_name) = &request.display_name {
            user.display_name = display_name.clone();
        }
        Ok(user.clone())
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create_group(&mut self, request: &GroupCreateDBRequest) -> Result<GroupDBResponse> {
        let tables = self.tables_mut();
        tables.require_user(&request.created_by, "groups", "groups_created_by_fkey")?;
        if request.budget.is_some_and(|b| b.is_sign_negative()) {
            return Err(check("groups", "groups_budget_check"));
        }

        tables.last_group_id += 1;
        let group = GroupDBResponse {
            id: tables.last_group_id,
            name: request.name.clone(),
            currency: request.currency.clone(),
            budget: request.budget,
            created_by: request.created_by.clone(),
            created_at: Utc::now(),
        };
        tables.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn get_group(&mut self, id: GroupId) -> Result<Option<GroupDBResponse>> {
        Ok(self.tables().groups.get(&id).cloned())
    }

    async fn update_group(&mut self, id: GroupId, request: &GroupUpdateDBRequest) -> Result<GroupDBResponse> {
        if request.budget.is_some_and(|b| b.is_sign_negative()) {
            return Err(check("groups", "groups_budget_check"));
        }
        let group = self.tables_mut().groups.get_mut(&id).ok_or(DbError::NotFound)?;
        if let Some(name) = &request.name {
            group.name = name.clone();
        }
        if let Some(currency) = &request.currency {
            group.currency = currency.clone();
        }
        if let Some(budget) = request.budget {
            group.budget = Some(budget);
        }
        Ok(group.clone())
    }

    async fn delete_group(&mut self, id: GroupId) -> Result<bool> {
        let tables = self.tables_mut();
        if tables.memberships.keys().any(|(g, _)| *g == id) {
            return Err(still_referenced("memberships", "memberships_group_id_fkey"));
        }
        if tables.invitations.keys().any(|(g, _)| *g == id) {
            return Err(still_referenced("invitations", "invitations_group_id_fkey"));
        }
        if tables.expenses.values().any(|e| e.group_id == id) {
            return Err(still_referenced("expenses", "expenses_group_id_fkey"));
        }
        if tables.resources.values().any(|r| r.group_id == id) {
            return Err(still_referenced("group_resources", "group_resources_group_id_fkey"));
        }
        Ok(tables.groups.remove(&id).is_some())
    }

    async fn get_membership(&mut self, user: &UserId, group: GroupId) -> Result<Option<MembershipDBResponse>> {
        Ok(self.tables().memberships.get(&(group, user.clone())).cloned())
    }

    async fn create_membership(&mut self, user: &UserId, group: GroupId, role: GroupRole) -> Result<MembershipDBResponse> {
        let tables = self.tables_mut();
        tables.require_user(user, "memberships", "memberships_user_id_fkey")?;
        tables.require_group(group, "memberships", "memberships_group_id_fkey")?;
        let key = (group, user.clone());
        if tables.memberships.contains_key(&key) {
            return Err(DbError::duplicate("memberships", "memberships_pkey"));
        }

        let membership = MembershipDBResponse {
            user_id: user.clone(),
            group_id: group,
            role,
            joined_at: Utc::now(),
        };
        tables.memberships.insert(key, membership.clone());
        Ok(membership)
    }

    async fn update_membership_role(&mut self, user: &UserId, group: GroupId, role: GroupRole) -> Result<MembershipDBResponse> {
        let membership = self
            .tables_mut()
            .memberships
            .get_mut(&(group, user.clone()))
            .ok_or(DbError::NotFound)?;
        membership.role = role;
        Ok(membership.clone())
    }

    async fn delete_membership(&mut self, user: &UserId, group: GroupId) -> Result<bool> {
        Ok(self.tables_mut().memberships.remove(&(group, user.clone())).is_some())
    }

    async fn list_group_memberships(&mut self, group: GroupId) -> Result<Vec<MembershipDBResponse>> {
        Ok(self
            .tables()
            .memberships
            .range((group, UserId::new(""))..)
            .take_while(|((g, _), _)| *g == group)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn list_user_memberships(&mut self, user: &UserId) -> Result<Vec<MembershipDBResponse>> {
        Ok(self.tables().memberships.values().filter(|m| &m.user_id == user).cloned().collect())
    }

    async fn delete_group_memberships(&mut self, group: GroupId) -> Result<u64> {
        let before = self.tables().memberships.len();
        self.tables_mut().memberships.retain(|(g, _), _| *g != group);
        Ok((before - self.tables().memberships.len()) as u64)
    }

    async fn get_invitation(&mut self, user: &UserId, group: GroupId) -> Result<Option<InvitationDBResponse>> {
        Ok(self.tables().invitations.get(&(group, user.clone())).cloned())
    }

    #[instrument(skip(self, request), fields(group_id = request.group_id), err)]
    async fn create_invitation(&mut self, request: &InvitationCreateDBRequest) -> Result<InvitationDBResponse> {
        let tables = self.tables_mut();
        tables.require_user(&request.invited_user, "invitations", "invitations_invited_user_fkey")?;
        tables.require_user(&request.inviter, "invitations", "invitations_inviter_fkey")?;
        tables.require_group(request.group_id, "invitations", "invitations_group_id_fkey")?;
        let key = (request.group_id, request.invited_user.clone());
        if tables.invitations.contains_key(&key) {
            return Err(DbError::duplicate("invitations", "invitations_pkey"));
        }

        let invitation = InvitationDBResponse {
            invited_user: request.invited_user.clone(),
            group_id: request.group_id,
            inviter: request.inviter.clone(),
            created_at: Utc::now(),
        };
        tables.invitations.insert(key, invitation.clone());
        Ok(invitation)
    }

    async fn delete_invitation(&mut self, user: &UserId, group: GroupId) -> Result<Option<InvitationDBResponse>> {
        Ok(self.tables_mut().invitations.remove(&(group, user.clone())))
    }

    async fn list_user_invitations(&mut self, user: &UserId) -> Result<Vec<InvitationDBResponse>> {
        Ok(self
            .tables()
            .invitations
            .values()
            .filter(|i| &i.invited_user == user)
            .cloned()
            .collect())
    }

    async fn delete_group_invitations(&mut self, group: GroupId) -> Result<u64> {
        let before = self.tables().invitations.len();
        self.tables_mut().invitations.retain(|(g, _), _| *g != group);
        Ok((before - self.tables().invitations.len()) as u64)
    }

    async fn lock_pair(&mut self, _user: &UserId, _group: GroupId) -> Result<()> {
        // The unit of work already holds the store-wide lock.
        Ok(())
    }

    #[instrument(skip(self, request), fields(group_id = request.group_id), err)]
    async fn create_expense(&mut self, request: &ExpenseCreateDBRequest) -> Result<ExpenseDBResponse> {
        let tables = self.tables_mut();
        tables.require_group(request.group_id, "expenses", "expenses_group_id_fkey")?;
        tables.require_user(&request.creator, "expenses", "expenses_creator_fkey")?;
        if request.amount.is_sign_negative() && !request.amount.is_zero() {
            return Err(check("expenses", "expenses_amount_check"));
        }

        tables.last_expense_id += 1;
        let now = Utc::now();
        let expense = ExpenseDBResponse {
            id: tables.last_expense_id,
            group_id: request.group_id,
            name: request.name.clone(),
            description: request.description.clone(),
            category: request.category.clone(),
            amount: request.amount,
            spent_at: request.spent_at,
            creator: request.creator.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.expenses.insert(expense.id, expense.clone());
        Ok(expense)
    }

    async fn get_expense(&mut self, id: ExpenseId) -> Result<Option<ExpenseDBResponse>> {
        Ok(self.tables().expenses.get(&id).cloned())
    }

    async fn lock_expense(&mut self, id: ExpenseId) -> Result<Option<ExpenseDBResponse>> {
        self.get_expense(id).await
    }

    async fn update_expense(&mut self, id: ExpenseId, request: &ExpenseUpdateDBRequest) -> Result<ExpenseDBResponse> {
        if request.amount.is_sign_negative() && !request.amount.is_zero() {
            return Err(check("expenses", "expenses_amount_check"));
        }
        let expense = self.tables_mut().expenses.get_mut(&id).ok_or(DbError::NotFound)?;
        expense.name = request.name.clone();
        expense.description = request.description.clone();
        expense.category = request.category.clone();
        expense.amount = request.amount;
        expense.spent_at = request.spent_at;
        expense.updated_at = Utc::now();
        Ok(expense.clone())
    }

    async fn delete_expense(&mut self, id: ExpenseId) -> Result<Option<ExpenseDBResponse>> {
        let tables = self.tables_mut();
        if tables.participants.keys().any(|(e, _)| *e == id) {
            return Err(still_referenced("expense_participants", "expense_participants_expense_id_fkey"));
        }
        Ok(tables.expenses.remove(&id))
    }

    async fn list_group_expenses(&mut self, group: GroupId) -> Result<Vec<ExpenseDBResponse>> {
        Ok(self
            .tables()
            .expenses
            .values()
            .filter(|e| e.group_id == group)
            .cloned()
            .collect())
    }

    async fn delete_group_expenses(&mut self, group: GroupId) -> Result<u64> {
        let tables = self.tables_mut();
        let ids = tables.group_expense_ids(group);
        if tables.participants.keys().any(|(e, _)| ids.contains(e)) {
            return Err(still_referenced("expense_participants", "expense_participants_expense_id_fkey"));
        }
        for id in &ids {
            tables.expenses.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn add_participant(&mut self, expense: ExpenseId, user: &UserId, role: ParticipantRole) -> Result<ParticipantDBResponse> {
        let tables = self.tables_mut();
        if !tables.expenses.contains_key(&expense) {
            return Err(foreign_key("expense_participants", "expense_participants_expense_id_fkey"));
        }
        tables.require_user(user, "expense_participants", "expense_participants_user_id_fkey")?;
        let key = (expense, user.clone());
        if tables.participants.contains_key(&key) {
            return Err(DbError::duplicate("expense_participants", "expense_participants_pkey"));
        }
        if role == ParticipantRole::Creator
            && tables
                .participants
                .values()
                .any(|p| p.expense_id == expense && p.role == ParticipantRole::Creator)
        {
            return Err(DbError::duplicate("expense_participants", "expense_participants_one_creator"));
        }

        let participant = ParticipantDBResponse {
            expense_id: expense,
            user_id: user.clone(),
            role,
        };
        tables.participants.insert(key, participant.clone());
        Ok(participant)
    }

    async fn list_participants(&mut self, expense: ExpenseId) -> Result<Vec<ParticipantDBResponse>> {
        let mut participants: Vec<_> = self
            .tables()
            .participants
            .values()
            .filter(|p| p.expense_id == expense)
            .cloned()
            .collect();
        // Keys are ordered by user id already; a stable sort keeps that order among payers.
        participants.sort_by_key(|p| p.role != ParticipantRole::Creator);
        Ok(participants)
    }

    async fn delete_participants(&mut self, expense: ExpenseId) -> Result<u64> {
        let before = self.tables().participants.len();
        self.tables_mut().participants.retain(|(e, _), _| *e != expense);
        Ok((before - self.tables().participants.len()) as u64)
    }

    async fn delete_group_participants(&mut self, group: GroupId) -> Result<u64> {
        let ids = self.tables().group_expense_ids(group);
        let before = self.tables().participants.len();
        self.tables_mut().participants.retain(|(e, _), _| !ids.contains(e));
        Ok((before - self.tables().participants.len()) as u64)
    }

    #[instrument(skip(self, request), fields(group_id = request.group_id, kind = ?request.kind), err)]
    async fn create_resource(&mut self, request: &ResourceCreateDBRequest) -> Result<ResourceDBResponse> {
        let tables = self.tables_mut();
        tables.require_group(request.group_id, "group_resources", "group_resources_group_id_fkey")?;
        tables.require_user(&request.created_by, "group_resources", "group_resources_created_by_fkey")?;

        tables.last_resource_id += 1;
        let resource = ResourceDBResponse {
            id: tables.last_resource_id,
            group_id: request.group_id,
            kind: request.kind,
            name: request.name.clone(),
            created_by: request.created_by.clone(),
            created_at: Utc::now(),
        };
        tables.resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn get_resource(&mut self, kind: ResourceKind, id: ResourceId) -> Result<Option<ResourceDBResponse>> {
        Ok(self.tables().resources.get(&id).filter(|r| r.kind == kind).cloned())
    }

    async fn list_group_resources(&mut self, group: GroupId, kind: ResourceKind) -> Result<Vec<ResourceDBResponse>> {
        Ok(self
            .tables()
            .resources
            .values()
            .filter(|r| r.group_id == group && r.kind == kind)
            .cloned()
            .collect())
    }

    async fn rename_resource(&mut self, kind: ResourceKind, id: ResourceId, name: &str) -> Result<ResourceDBResponse> {
        let resource = self
            .tables_mut()
            .resources
            .get_mut(&id)
            .filter(|r| r.kind == kind)
            .ok_or(DbError::NotFound)?;
        resource.name = name.to_string();
        Ok(resource.clone())
    }

    async fn delete_resource(&mut self, kind: ResourceKind, id: ResourceId) -> Result<Option<ResourceDBResponse>> {
        let tables = self.tables_mut();
        if tables.resources.get(&id).is_some_and(|r| r.kind == kind) {
            Ok(tables.resources.remove(&id))
        } else {
            Ok(None)
        }
    }

    async fn delete_group_resources(&mut self, group: GroupId) -> Result<u64> {
        let before = self.tables().resources.len();
        self.tables_mut().resources.retain(|_, r| r.group_id != group);
        Ok((before - self.tables().resources.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTx { mut guard, working } = *self;
        if let Some(working) = working {
            *guard = working;
        }
        Ok(())
    }
}
