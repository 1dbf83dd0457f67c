//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Identifier types for the entities of the ledger (users, groups, expenses, group resources)
//! - The [`Permission`] vocabulary used when an authorization predicate denies an operation
//! - Resource and operation enums that make denial messages readable
//!
//! # ID Types
//!
//! - [`UserId`]: opaque, externally issued identity string. The core never parses it.
//! - [`GroupId`], [`ExpenseId`], [`ResourceId`]: integer keys allocated by the store.
//!
//! # Permission System
//!
//! Each variant of [`Permission`] names the predicate of
//! [`AccessPolicy`](crate::auth::policy::AccessPolicy) that had to hold for an operation to
//! proceed. It is carried inside [`Error::InsufficientPermissions`](crate::errors::Error) so logs
//! show which check failed, while the user-facing message stays generic.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type GroupId = i64;
pub type ExpenseId = i64;
/// Identifier of an event, document or photo attached to a group.
pub type ResourceId = i64;

/// Authenticated identity of a user, as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Abbreviate an identity to its first 8 characters for more readable logs and traces
pub fn abbrev_user(user: &UserId) -> String {
    user.as_str().chars().take(8).collect()
}

// Operations that can be performed on resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Invite,
    Accept,
    Revoke,
    Promote,
    Remove,
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Groups,
    Memberships,
    Invitations,
    Expenses,
    Events,
    Documents,
    Photos,
}

/// The authorization predicate an operation required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    GroupMember(GroupId),
    GroupAdministrator(GroupId),
    EventGroupMember(ResourceId),
    EventGroupAdministrator(ResourceId),
    DocumentGroupMember(ResourceId),
    PhotoGroupMember(ResourceId),
    ExpenseCreator(ExpenseId),
    AccountOwner(UserId),
    /// Any one of the listed predicates would have sufficed
    Any(Vec<Permission>),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Invite => "invite to",
            Operation::Accept => "accept",
            Operation::Revoke => "revoke",
            Operation::Promote => "promote in",
            Operation::Remove => "remove from",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resource::Users => "user",
            Resource::Groups => "group",
            Resource::Memberships => "membership",
            Resource::Invitations => "invitation",
            Resource::Expenses => "expense",
            Resource::Events => "event",
            Resource::Documents => "document",
            Resource::Photos => "photo",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_user_truncates_long_identities() {
        assert_eq!(abbrev_user(&UserId::new("firebase-uid-0123456789")), "firebase");
        assert_eq!(abbrev_user(&UserId::new("u1")), "u1");
    }

    #[test]
    fn test_user_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
