use crate::{
    AppState,
    api::models::users::CurrentUser,
    errors::{Error, Result},
    types::{UserId, abbrev_user},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

/// The identity asserted by the trusted header, whether or not it is registered yet.
///
/// Only registration uses this directly. Everything else goes through [`CurrentUser`].
#[derive(Debug, Clone, PartialEq)]
pub struct Identity(pub UserId);

/// Read the identity header.
/// Returns:
/// - Ok(id): header present with a non-blank, valid UTF-8 value
/// - Err(Unauthenticated): header missing or unusable
fn identity_from_header(parts: &Parts, header_name: &str) -> Result<UserId> {
    let value = match parts.headers.get(header_name) {
        Some(value) => value,
        None => {
            trace!(header_name, "No identity header present");
            return Err(Error::Unauthenticated { message: None });
        }
    };
    let id = value.to_str().map(str::trim).unwrap_or_default();
    if id.is_empty() {
        return Err(Error::Unauthenticated {
            message: Some("Invalid identity header".to_string()),
        });
    }
    Ok(UserId::new(id))
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        identity_from_header(parts, &state.config.auth.identity_header).map(Identity)
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let id = identity_from_header(parts, &state.config.auth.identity_header)?;

        match state.services.users.get_user(&id).await {
            Ok(user) => {
                debug!(user_id = %abbrev_user(&user.id), "Found authenticated user");
                Ok(user.into())
            }
            Err(Error::NotFound { .. }) => {
                trace!(user_id = %abbrev_user(&id), "Identity is not registered");
                Err(Error::Unauthenticated {
                    message: Some("Identity is not registered".to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }
}
