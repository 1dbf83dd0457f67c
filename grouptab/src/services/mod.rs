//! Core operations.
//!
//! Each service method is one unit of work: it opens a [`StoreTx`](crate::db::StoreTx), evaluates
//! the authorization predicate its operation requires, validates its input, and only then
//! writes. Any failure drops the transaction, so a rejected operation never leaves a partial
//! write behind. Before a membership check that guards a write, the service locks the pairs of
//! every user it checks, so the membership cannot be removed until the write commits.
//!
//! The caller identity is always an explicit argument. Services never look it up themselves.
//!
//! # Services
//!
//! - [`users::UserService`]: registration and profiles
//! - [`groups::GroupService`]: group lifecycle and the ordered deletion cascade
//! - [`invitations::InvitationService`]: invite, accept, revoke, list pending
//! - [`memberships::MembershipService`]: promotion and removal
//! - [`expenses::ExpenseService`]: the expense ledger and its participants
//! - [`resources::ResourceService`]: event, document and photo metadata

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;

use crate::auth::policy::AccessPolicy;
use crate::config::PolicyConfig;
use crate::db::Store;
use crate::errors::Error;
use crate::types::{Operation, Permission, Resource};

pub mod expenses;
pub mod groups;
pub mod invitations;
pub mod memberships;
pub mod resources;
pub mod users;

use expenses::ExpenseService;
use groups::GroupService;
use invitations::InvitationService;
use memberships::MembershipService;
use resources::ResourceService;
use users::UserService;

/// All services, sharing one store and one policy.
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub groups: GroupService,
    pub invitations: InvitationService,
    pub memberships: MembershipService,
    pub expenses: ExpenseService,
    pub resources: ResourceService,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, policy: Arc<dyn AccessPolicy>, settings: PolicyConfig) -> Self {
        Self {
            users: UserService::new(store.clone(), policy.clone()),
            groups: GroupService::new(store.clone(), policy.clone()),
            invitations: InvitationService::new(store.clone(), policy.clone(), settings.invitations),
            memberships: MembershipService::new(store.clone(), policy.clone(), settings.member_removal),
            expenses: ExpenseService::new(store.clone(), policy.clone()),
            resources: ResourceService::new(store, policy),
        }
    }
}

/// Build the error for a predicate that evaluated to false.
pub(crate) fn denied(required: Permission, action: Operation, resource: Resource) -> Error {
    debug!(?required, %action, %resource, "Authorization predicate denied");
    Error::forbidden(required, action, resource)
}

/// Money columns hold at most 12 integer digits and 2 decimal places.
fn money_limit() -> Decimal {
    Decimal::new(1_000_000_000_000, 0)
}

/// Reject a monetary value the ledger cannot store exactly. Amounts are non-negative, below
/// 10^12, with at most two decimal places once trailing zeros are dropped. Accepted values come
/// back at scale 2, the form every store returns them in.
pub(crate) fn validate_money(field: &str, value: Decimal) -> Result<Decimal, Error> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::bad_request(format!("{field} must not be negative")));
    }
    if value.normalize().scale() > 2 {
        return Err(Error::bad_request(format!("{field} must not have more than two decimal places")));
    }
    if value >= money_limit() {
        return Err(Error::bad_request(format!("{field} must be less than {}", money_limit())));
    }
    let mut money = value;
    money.rescale(2);
    Ok(money)
}

/// Trim a required text field, rejecting blank input.
pub(crate) fn required_text(field: &str, value: &str) -> Result<String, Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::bad_request(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
