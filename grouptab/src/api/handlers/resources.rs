//! Event, document and photo metadata. The collection path segment selects the kind.

use crate::api::models::resources::{ResourceCollection, ResourceCreate, ResourceResponse};
use crate::api::models::users::CurrentUser;
use crate::errors::Result;
use crate::types::{GroupId, ResourceId};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

#[tracing::instrument(skip_all)]
pub async fn list_resources(
    State(state): State<AppState>,
    Path((group_id, collection)): Path<(GroupId, ResourceCollection)>,
    current_user: CurrentUser,
) -> Result<Json<Vec<ResourceResponse>>> {
    let resources = state
        .services
        .resources
        .list_resources(&current_user.id, group_id, collection.into())
        .await?;
    Ok(Json(resources.into_iter().map(ResourceResponse::from).collect()))
}

#[tracing::instrument(skip_all)]
pub async fn create_resource(
    State(state): State<AppState>,
    Path((group_id, collection)): Path<(GroupId, ResourceCollection)>,
    current_user: CurrentUser,
    Json(create): Json<ResourceCreate>,
) -> Result<(StatusCode, Json<ResourceResponse>)> {
    let resource = state
        .services
        .resources
        .create_resource(&current_user.id, group_id, collection.into(), create.name)
        .await?;
    Ok((StatusCode::CREATED, Json(ResourceResponse::from(resource))))
}

#[tracing::instrument(skip_all)]
pub async fn rename_resource(
    State(state): State<AppState>,
    Path((collection, id)): Path<(ResourceCollection, ResourceId)>,
    current_user: CurrentUser,
    Json(rename): Json<ResourceCreate>,
) -> Result<Json<ResourceResponse>> {
    let resource = state
        .services
        .resources
        .rename_resource(&current_user.id, collection.into(), id, rename.name)
        .await?;
    Ok(Json(ResourceResponse::from(resource)))
}

#[tracing::instrument(skip_all)]
pub async fn delete_resource(
    State(state): State<AppState>,
    Path((collection, id)): Path<(ResourceCollection, ResourceId)>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    state
        .services
        .resources
        .delete_resource(&current_user.id, collection.into(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
