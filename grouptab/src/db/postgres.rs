//! PostgreSQL store.
//!
//! Each unit of work is a database transaction. Concurrency guarantees come from the database:
//!
//! - invitation and membership transitions for one (user, group) pair take a transaction-scoped
//!   advisory lock on the pair ([`StoreTx::lock_pair`]), and so does every write whose
//!   authorization depends on that pair's membership ([`StoreTx::lock_members`]);
//! - expense update and delete read the row `FOR UPDATE`, so the second writer waits and then
//!   observes the first writer's outcome;
//! - accepting or revoking an invitation deletes it with `DELETE ... RETURNING`, so only one of
//!   two racing transactions gets the row back.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
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
use crate::types::{ExpenseId, GroupId, ResourceId, UserId, abbrev_user};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTx { tx }))
    }
}

/// Unit of work over [`PostgresStore`]. Dropping it rolls the transaction back.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn get_user(&mut self, id: &UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT id, display_name, email, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user =
            sqlx::query_as::<_, UserDBResponse>("SELECT id, display_name, email, created_at FROM users WHERE email = lower($1)")
                .bind(email)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(user)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_user(&request.id)), err)]
    async fn create_user(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (id, display_name, email)
            VALUES ($1, $2, lower($3))
            RETURNING id, display_name, email, created_at
            "#,
        )
        .bind(&request.id)
        .bind(&request.display_name)
        .bind(&request.email)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_user(id)), err)]
    async fn update_user(&mut self, id: &UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users SET display_name = COALESCE($2, display_name)
            WHERE id = $1
            RETURNING id, display_name, email, created_at
            "#,
        )
        .bind(id)
        .bind(&request.display_name)
        .fetch_optional(&mut *self.tx)
        .await?;
        user.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create_group(&mut self, request: &GroupCreateDBRequest) -> Result<GroupDBResponse> {
        let group = sqlx::query_as::<_, GroupDBResponse>(
            r#"
            INSERT INTO groups (name, currency, budget, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, currency, budget, created_by, created_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.currency)
        .bind(request.budget)
        .bind(&request.created_by)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(group)
    }

    async fn get_group(&mut self, id: GroupId) -> Result<Option<GroupDBResponse>> {
        let group = sqlx::query_as::<_, GroupDBResponse>(
            "SELECT id, name, currency, budget, created_by, created_at FROM groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(group)
    }

    #[instrument(skip(self, request), err)]
    async fn update_group(&mut self, id: GroupId, request: &GroupUpdateDBRequest) -> Result<GroupDBResponse> {
        let group = sqlx::query_as::<_, GroupDBResponse>(
            r#"
            UPDATE groups SET
                name = COALESCE($2, name),
                currency = COALESCE($3, currency),
                budget = COALESCE($4, budget)
            WHERE id = $1
            RETURNING id, name, currency, budget, created_by, created_at
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.currency)
        .bind(request.budget)
        .fetch_optional(&mut *self.tx)
        .await?;
        group.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), err)]
    async fn delete_group(&mut self, id: GroupId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_membership(&mut self, user: &UserId, group: GroupId) -> Result<Option<MembershipDBResponse>> {
        let membership = sqlx::query_as::<_, MembershipDBResponse>(
            "SELECT user_id, group_id, role, joined_at FROM memberships WHERE user_id = $1 AND group_id = $2",
        )
        .bind(user)
        .bind(group)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(membership)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_user(user)), err)]
    async fn create_membership(&mut self, user: &UserId, group: GroupId, role: GroupRole) -> Result<MembershipDBResponse> {
        let membership = sqlx::query_as::<_, MembershipDBResponse>(
            r#"
            INSERT INTO memberships (user_id, group_id, role)
            VALUES ($1, $2, $3)
            RETURNING user_id, group_id, role, joined_at
            "#,
        )
        .bind(user)
        .bind(group)
        .bind(role)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(membership)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_user(user)), err)]
    async fn update_membership_role(&mut self, user: &UserId, group: GroupId, role: GroupRole) -> Result<MembershipDBResponse> {
        let membership = sqlx::query_as::<_, MembershipDBResponse>(
            r#"
            UPDATE memberships SET role = $3
            WHERE user_id = $1 AND group_id = $2
            RETURNING user_id, group_id, role, joined_at
            "#,
        )
        .bind(user)
        .bind(group)
        .bind(role)
        .fetch_optional(&mut *self.tx)
        .await?;
        membership.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_user(user)), err)]
    async fn delete_membership(&mut self, user: &UserId, group: GroupId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM memberships WHERE user_id = $1 AND group_id = $2")
            .bind(user)
            .bind(group)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_group_memberships(&mut self, group: GroupId) -> Result<Vec<MembershipDBResponse>> {
        let memberships = sqlx::query_as::<_, MembershipDBResponse>(
            "SELECT user_id, group_id, role, joined_at FROM memberships WHERE group_id = $1 ORDER BY user_id",
        )
        .bind(group)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(memberships)
    }

    async fn list_user_memberships(&mut self, user: &UserId) -> Result<Vec<MembershipDBResponse>> {
        let memberships = sqlx::query_as::<_, MembershipDBResponse>(
            "SELECT user_id, group_id, role, joined_at FROM memberships WHERE user_id = $1 ORDER BY group_id",
        )
        .bind(user)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(memberships)
    }

    async fn delete_group_memberships(&mut self, group: GroupId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM memberships WHERE group_id = $1")
            .bind(group)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_invitation(&mut self, user: &UserId, group: GroupId) -> Result<Option<InvitationDBResponse>> {
        let invitation = sqlx::query_as::<_, InvitationDBResponse>(
            "SELECT invited_user, group_id, inviter, created_at FROM invitations WHERE invited_user = $1 AND group_id = $2",
        )
        .bind(user)
        .bind(group)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(invitation)
    }

    #[instrument(skip(self, request), fields(group_id = request.group_id, invited_user = %abbrev_user(&request.invited_user)), err)]
    async fn create_invitation(&mut self, request: &InvitationCreateDBRequest) -> Result<InvitationDBResponse> {
        let invitation = sqlx::query_as::<_, InvitationDBResponse>(
            r#"
            INSERT INTO invitations (invited_user, group_id, inviter)
            VALUES ($1, $2, $3)
            RETURNING invited_user, group_id, inviter, created_at
            "#,
        )
        .bind(&request.invited_user)
        .bind(request.group_id)
        .bind(&request.inviter)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(invitation)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_user(user)), err)]
    async fn delete_invitation(&mut self, user: &UserId, group: GroupId) -> Result<Option<InvitationDBResponse>> {
        let invitation = sqlx::query_as::<_, InvitationDBResponse>(
            r#"
            DELETE FROM invitations
            WHERE invited_user = $1 AND group_id = $2
            RETURNING invited_user, group_id, inviter, created_at
            "#,
        )
        .bind(user)
        .bind(group)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(invitation)
    }

    async fn list_user_invitations(&mut self, user: &UserId) -> Result<Vec<InvitationDBResponse>> {
        let invitations = sqlx::query_as::<_, InvitationDBResponse>(
            "SELECT invited_user, group_id, inviter, created_at FROM invitations WHERE invited_user = $1 ORDER BY group_id",
        )
        .bind(user)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(invitations)
    }

    async fn delete_group_invitations(&mut self, group: GroupId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM invitations WHERE group_id = $1")
            .bind(group)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn lock_pair(&mut self, user: &UserId, group: GroupId) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1 || '/' || $2::text))")
            .bind(user)
            .bind(group)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(group_id = request.group_id), err)]
    async fn create_expense(&mut self, request: &ExpenseCreateDBRequest) -> Result<ExpenseDBResponse> {
        let expense = sqlx::query_as::<_, ExpenseDBResponse>(
            r#"
            INSERT INTO expenses (group_id, name, description, category, amount, spent_at, creator)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.group_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.category)
        .bind(request.amount)
        .bind(request.spent_at)
        .bind(&request.creator)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(expense)
    }

    async fn get_expense(&mut self, id: ExpenseId) -> Result<Option<ExpenseDBResponse>> {
        let expense = sqlx::query_as::<_, ExpenseDBResponse>("SELECT * FROM expenses WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(expense)
    }

    async fn lock_expense(&mut self, id: ExpenseId) -> Result<Option<ExpenseDBResponse>> {
        let expense = sqlx::query_as::<_, ExpenseDBResponse>("SELECT * FROM expenses WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(expense)
    }

    #[instrument(skip(self, request), err)]
    async fn update_expense(&mut self, id: ExpenseId, request: &ExpenseUpdateDBRequest) -> Result<ExpenseDBResponse> {
        let expense = sqlx::query_as::<_, ExpenseDBResponse>(
            r#"
            UPDATE expenses SET
                name = $2,
                description = $3,
                category = $4,
                amount = $5,
                spent_at = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.category)
        .bind(request.amount)
        .bind(request.spent_at)
        .fetch_optional(&mut *self.tx)
        .await?;
        expense.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), err)]
    async fn delete_expense(&mut self, id: ExpenseId) -> Result<Option<ExpenseDBResponse>> {
        let expense = sqlx::query_as::<_, ExpenseDBResponse>("DELETE FROM expenses WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(expense)
    }

    async fn list_group_expenses(&mut self, group: GroupId) -> Result<Vec<ExpenseDBResponse>> {
        let expenses = sqlx::query_as::<_, ExpenseDBResponse>("SELECT * FROM expenses WHERE group_id = $1 ORDER BY id")
            .bind(group)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(expenses)
    }

    async fn delete_group_expenses(&mut self, group: GroupId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM expenses WHERE group_id = $1")
            .bind(group)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn add_participant(&mut self, expense: ExpenseId, user: &UserId, role: ParticipantRole) -> Result<ParticipantDBResponse> {
        let participant = sqlx::query_as::<_, ParticipantDBResponse>(
            r#"
            INSERT INTO expense_participants (expense_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING expense_id, user_id, role
            "#,
        )
        .bind(expense)
        .bind(user)
        .bind(role)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(participant)
    }

    async fn list_participants(&mut self, expense: ExpenseId) -> Result<Vec<ParticipantDBResponse>> {
        let participants = sqlx::query_as::<_, ParticipantDBResponse>(
            r#"
            SELECT expense_id, user_id, role FROM expense_participants
            WHERE expense_id = $1
            ORDER BY role <> 'CREATOR', user_id
            "#,
        )
        .bind(expense)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(participants)
    }

    async fn delete_participants(&mut self, expense: ExpenseId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM expense_participants WHERE expense_id = $1")
            .bind(expense)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_group_participants(&mut self, group: GroupId) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM expense_participants WHERE expense_id IN (SELECT id FROM expenses WHERE group_id = $1)",
        )
        .bind(group)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, request), fields(group_id = request.group_id, kind = ?request.kind), err)]
    async fn create_resource(&mut self, request: &ResourceCreateDBRequest) -> Result<ResourceDBResponse> {
        let resource = sqlx::query_as::<_, ResourceDBResponse>(
            r#"
            INSERT INTO group_resources (group_id, kind, name, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, group_id, kind, name, created_by, created_at
            "#,
        )
        .bind(request.group_id)
        .bind(request.kind)
        .bind(&request.name)
        .bind(&request.created_by)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(resource)
    }

    async fn get_resource(&mut self, kind: ResourceKind, id: ResourceId) -> Result<Option<ResourceDBResponse>> {
        let resource = sqlx::query_as::<_, ResourceDBResponse>(
            "SELECT id, group_id, kind, name, created_by, created_at FROM group_resources WHERE id = $1 AND kind = $2",
        )
        .bind(id)
        .bind(kind)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(resource)
    }

    async fn list_group_resources(&mut self, group: GroupId, kind: ResourceKind) -> Result<Vec<ResourceDBResponse>> {
        let resources = sqlx::query_as::<_, ResourceDBResponse>(
            r#"
            SELECT id, group_id, kind, name, created_by, created_at FROM group_resources
            WHERE group_id = $1 AND kind = $2
            ORDER BY id
            "#,
        )
        .bind(group)
        .bind(kind)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(resources)
    }

    async fn rename_resource(&mut self, kind: ResourceKind, id: ResourceId, name: &str) -> Result<ResourceDBResponse> {
        let resource = sqlx::query_as::<_, ResourceDBResponse>(
            r#"
            UPDATE group_resources SET name = $3
            WHERE id = $1 AND kind = $2
            RETURNING id, group_id, kind, name, created_by, created_at
            "#,
        )
        .bind(id)
        .bind(kind)
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?;
        resource.ok_or(DbError::NotFound)
    }

    async fn delete_resource(&mut self, kind: ResourceKind, id: ResourceId) -> Result<Option<ResourceDBResponse>> {
        let resource = sqlx::query_as::<_, ResourceDBResponse>(
            r#"
            DELETE FROM group_resources
            WHERE id = $1 AND kind = $2
            RETURNING id, group_id, kind, name, created_by, created_at
            "#,
        )
        .bind(id)
        .bind(kind)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(resource)
    }

    async fn delete_group_resources(&mut self, group: GroupId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM group_resources WHERE group_id = $1")
            .bind(group)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
