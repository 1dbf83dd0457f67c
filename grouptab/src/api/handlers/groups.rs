use crate::api::models::groups::{GroupCreate, GroupResponse, GroupUpdate, MembershipResponse};
use crate::api::models::users::CurrentUser;
use crate::errors::Result;
use crate::types::GroupId;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

#[tracing::instrument(skip_all)]
pub async fn create_group(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<GroupCreate>,
) -> Result<(StatusCode, Json<GroupResponse>)> {
    let group = state.services.groups.create_group(&current_user.id, create).await?;
    Ok((StatusCode::CREATED, Json(GroupResponse::from(group))))
}

#[tracing::instrument(skip_all)]
pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    current_user: CurrentUser,
) -> Result<Json<GroupResponse>> {
    let group = state.services.groups.get_group(&current_user.id, group_id).await?;
    Ok(Json(GroupResponse::from(group)))
}

#[tracing::instrument(skip_all)]
pub async fn update_group(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    current_user: CurrentUser,
    Json(update): Json<GroupUpdate>,
) -> Result<Json<GroupResponse>> {
    let group = state.services.groups.update_group(&current_user.id, group_id, update).await?;
    Ok(Json(GroupResponse::from(group)))
}

#[tracing::instrument(skip_all)]
pub async fn delete_group(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    state.services.groups.delete_group(&current_user.id, group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all)]
pub async fn get_group_members(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<MembershipResponse>>> {
    let members = state.services.groups.list_members(&current_user.id, group_id).await?;
    Ok(Json(members.into_iter().map(MembershipResponse::from).collect()))
}
