use crate::api::models::groups::MembershipResponse;
use crate::api::models::users::CurrentUser;
use crate::errors::Result;
use crate::types::{GroupId, UserId};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

#[tracing::instrument(skip_all)]
pub async fn promote_member(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(GroupId, UserId)>,
    current_user: CurrentUser,
) -> Result<Json<MembershipResponse>> {
    let membership = state
        .services
        .memberships
        .promote_to_administrator(&current_user.id, &user_id, group_id)
        .await?;
    Ok(Json(MembershipResponse::from(membership)))
}

#[tracing::instrument(skip_all)]
pub async fn remove_member(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(GroupId, UserId)>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    state.services.memberships.remove_member(&current_user.id, &user_id, group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
