use crate::api::models::{
    groups::GroupResponse,
    invitations::InvitationResponse,
    users::{CurrentUser, UserCreate, UserResponse, UserUpdate},
};
use crate::auth::current_user::Identity;
use crate::errors::Result;
use crate::types::UserId;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

/// Register the identity from the trusted header as a user.
#[tracing::instrument(skip_all)]
pub async fn register_user(
    State(state): State<AppState>,
    Identity(id): Identity,
    Json(create): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = state.services.users.register(id, create).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[tracing::instrument(skip_all)]
pub async fn get_current_user(current_user: CurrentUser) -> Result<Json<CurrentUser>> {
    Ok(Json(current_user))
}

#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    _current_user: CurrentUser,
) -> Result<Json<UserResponse>> {
    let user = state.services.users.get_user(&user_id).await?;
    Ok(Json(UserResponse::from(user)))
}

#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    let user = state.services.users.update_profile(&current_user.id, &user_id, update).await?;
    Ok(Json(UserResponse::from(user)))
}

#[tracing::instrument(skip_all)]
pub async fn get_user_groups(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<GroupResponse>>> {
    let groups = state.services.groups.list_user_groups(&current_user.id, &user_id).await?;
    Ok(Json(groups.into_iter().map(GroupResponse::from).collect()))
}

#[tracing::instrument(skip_all)]
pub async fn get_user_invitations(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<InvitationResponse>>> {
    let invitations = state.services.invitations.list_pending(&current_user.id, &user_id).await?;
    Ok(Json(invitations.into_iter().map(InvitationResponse::from).collect()))
}
