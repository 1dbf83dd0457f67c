//! User registration and profiles.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::api::models::users::{UserCreate, UserUpdate};
use crate::auth::policy::AccessPolicy;
use crate::db::Store;
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::services::{denied, required_text};
use crate::types::{Operation, Permission, Resource, UserId, abbrev_user};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    policy: Arc<dyn AccessPolicy>,
}

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => Ok(()),
        _ => Err(Error::bad_request(format!("'{email}' is not a valid email address"))),
    }
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self { store, policy }
    }

    /// Register the authenticated identity as a user.
    ///
    /// The identity is issued by the identity provider; this only records the profile for it.
    #[instrument(skip(self, create), fields(user_id = %abbrev_user(&id)), err)]
    pub async fn register(&self, id: UserId, mut create: UserCreate) -> Result<UserDBResponse> {
        create.display_name = required_text("display_name", &create.display_name)?;
        validate_email(&create.email)?;

        let mut tx = self.store.begin().await?;
        if tx.get_user(&id).await?.is_some() {
            return Err(Error::conflict("This identity is already registered"));
        }
        let user = tx.create_user(&UserCreateDBRequest::new(id, create)).await?;
        tx.commit().await?;

        info!(user_id = %abbrev_user(&user.id), "User registered");
        Ok(user)
    }

    pub async fn get_user(&self, id: &UserId) -> Result<UserDBResponse> {
        let mut tx = self.store.begin().await?;
        tx.get_user(id).await?.ok_or_else(|| Error::not_found("User", id))
    }

    /// Update a profile. Only the account itself may do this; there is no administrator override.
    #[instrument(skip(self, update), fields(actor = %abbrev_user(actor), target = %abbrev_user(target)), err)]
    pub async fn update_profile(&self, actor: &UserId, target: &UserId, update: UserUpdate) -> Result<UserDBResponse> {
        if !self.policy.is_authorized_for_account(actor, target) {
            return Err(denied(Permission::AccountOwner(target.clone()), Operation::Update, Resource::Users));
        }
        let request = UserUpdateDBRequest {
            display_name: update
                .display_name
                .map(|name| required_text("display_name", &name))
                .transpose()?,
        };

        let mut tx = self.store.begin().await?;
        if tx.get_user(target).await?.is_none() {
            return Err(Error::not_found("User", target));
        }
        let user = tx.update_user(target, &request).await?;
        tx.commit().await?;
        Ok(user)
    }
}
