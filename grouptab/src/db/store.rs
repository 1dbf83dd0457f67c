//! Storage traits shared by the in-memory and Postgres backends.
//!
//! A [`Store`] hands out units of work. Every read and write an operation performs, including
//! the reads made by authorization predicates, goes through the same [`StoreTx`], so the checks
//! and the mutation they guard observe one consistent snapshot.

use async_trait::async_trait;

use crate::db::errors::Result;
use crate::db::models::{
    expenses::{ExpenseCreateDBRequest, ExpenseDBResponse, ExpenseUpdateDBRequest, ParticipantDBResponse, ParticipantRole},
    groups::{GroupCreateDBRequest, GroupDBResponse, GroupUpdateDBRequest},
    invitations::{InvitationCreateDBRequest, InvitationDBResponse},
    memberships::{GroupRole, MembershipDBResponse},
    resources::{ResourceCreateDBRequest, ResourceDBResponse, ResourceKind},
    users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
};
use crate::types::{ExpenseId, GroupId, ResourceId, UserId};

/// Source of units of work.
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a new unit of work.
    ///
    /// Writes become visible to other units of work only after [`StoreTx::commit`]. Dropping the
    /// returned value without committing discards them.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
}

/// A single unit of work against the store.
///
/// Methods returning `Option` report absence as `None`; methods returning a row for an
/// identifier that does not exist fail with [`DbError::NotFound`](crate::db::errors::DbError).
/// Uniqueness and reference violations surface as the matching `DbError` variants on both
/// backends.
#[async_trait]
pub trait StoreTx: Send {
    // Users

    async fn get_user(&mut self, id: &UserId) -> Result<Option<UserDBResponse>>;

    /// Look up a user by contact email. Emails are stored lowercased.
    async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>>;

    async fn create_user(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    async fn update_user(&mut self, id: &UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse>;

    // Groups

    async fn create_group(&mut self, request: &GroupCreateDBRequest) -> Result<GroupDBResponse>;

    async fn get_group(&mut self, id: GroupId) -> Result<Option<GroupDBResponse>>;

    async fn update_group(&mut self, id: GroupId, request: &GroupUpdateDBRequest) -> Result<GroupDBResponse>;

    /// Delete the group row. Fails with a foreign key violation while dependent rows remain.
    async fn delete_group(&mut self, id: GroupId) -> Result<bool>;

    // Memberships

    async fn get_membership(&mut self, user: &UserId, group: GroupId) -> Result<Option<MembershipDBResponse>>;

    async fn create_membership(&mut self, user: &UserId, group: GroupId, role: GroupRole) -> Result<MembershipDBResponse>;

    async fn update_membership_role(&mut self, user: &UserId, group: GroupId, role: GroupRole) -> Result<MembershipDBResponse>;

    async fn delete_membership(&mut self, user: &UserId, group: GroupId) -> Result<bool>;

    /// Members of a group ordered by user id.
    async fn list_group_memberships(&mut self, group: GroupId) -> Result<Vec<MembershipDBResponse>>;

    /// Memberships of a user ordered by group id.
    async fn list_user_memberships(&mut self, user: &UserId) -> Result<Vec<MembershipDBResponse>>;

    async fn delete_group_memberships(&mut self, group: GroupId) -> Result<u64>;

    // Invitations

    async fn get_invitation(&mut self, user: &UserId, group: GroupId) -> Result<Option<InvitationDBResponse>>;

    async fn create_invitation(&mut self, request: &InvitationCreateDBRequest) -> Result<InvitationDBResponse>;

    /// Remove and return the pending invitation. Of two units of work racing to delete the same
    /// invitation, exactly one receives `Some`.
    async fn delete_invitation(&mut self, user: &UserId, group: GroupId) -> Result<Option<InvitationDBResponse>>;

    /// Pending invitations naming the user, ordered by group id.
    async fn list_user_invitations(&mut self, user: &UserId) -> Result<Vec<InvitationDBResponse>>;

    async fn delete_group_invitations(&mut self, group: GroupId) -> Result<u64>;

    /// Take exclusive ownership of the (user, group) pair until the unit of work ends.
    ///
    /// Invitation and membership transitions for the same pair are serialized through this lock.
    async fn lock_pair(&mut self, user: &UserId, group: GroupId) -> Result<()>;

    /// Take the (user, group) lock of every listed user, in user id order.
    ///
    /// A membership check that guards a write must hold the pair lock of the user it checks, so a
    /// concurrent removal cannot commit between the check and the write. Units of work locking
    /// overlapping sets of users acquire them in the same order and never deadlock.
    async fn lock_members(&mut self, users: &[&UserId], group: GroupId) -> Result<()> {
        let mut users = users.to_vec();
        users.sort();
        users.dedup();
        for user in users {
            self.lock_pair(user, group).await?;
        }
        Ok(())
    }

    // Expenses

    async fn create_expense(&mut self, request: &ExpenseCreateDBRequest) -> Result<ExpenseDBResponse>;

    async fn get_expense(&mut self, id: ExpenseId) -> Result<Option<ExpenseDBResponse>>;

    /// Read the expense and hold a row lock on it until the unit of work ends.
    async fn lock_expense(&mut self, id: ExpenseId) -> Result<Option<ExpenseDBResponse>>;

    async fn update_expense(&mut self, id: ExpenseId, request: &ExpenseUpdateDBRequest) -> Result<ExpenseDBResponse>;

    async fn delete_expense(&mut self, id: ExpenseId) -> Result<Option<ExpenseDBResponse>>;

    /// Expenses of a group in ascending id order.
    async fn list_group_expenses(&mut self, group: GroupId) -> Result<Vec<ExpenseDBResponse>>;

    async fn delete_group_expenses(&mut self, group: GroupId) -> Result<u64>;

    // Participants

    async fn add_participant(&mut self, expense: ExpenseId, user: &UserId, role: ParticipantRole) -> Result<ParticipantDBResponse>;

    /// Participants of an expense, the CREATOR first, then PAYERs by user id.
    async fn list_participants(&mut self, expense: ExpenseId) -> Result<Vec<ParticipantDBResponse>>;

    async fn delete_participants(&mut self, expense: ExpenseId) -> Result<u64>;

    /// Delete the participant rows of every expense in the group.
    async fn delete_group_participants(&mut self, group: GroupId) -> Result<u64>;

    // Group resources

    async fn create_resource(&mut self, request: &ResourceCreateDBRequest) -> Result<ResourceDBResponse>;

    /// Look up a resource of the given kind. A resource of another kind is reported as absent.
    async fn get_resource(&mut self, kind: ResourceKind, id: ResourceId) -> Result<Option<ResourceDBResponse>>;

    /// Resources of one kind in a group, ascending id order.
    async fn list_group_resources(&mut self, group: GroupId, kind: ResourceKind) -> Result<Vec<ResourceDBResponse>>;

    async fn rename_resource(&mut self, kind: ResourceKind, id: ResourceId, name: &str) -> Result<ResourceDBResponse>;

    async fn delete_resource(&mut self, kind: ResourceKind, id: ResourceId) -> Result<Option<ResourceDBResponse>>;

    async fn delete_group_resources(&mut self, group: GroupId) -> Result<u64>;

    /// Make every write of this unit of work durable and release its locks.
    async fn commit(self: Box<Self>) -> Result<()>;
}
