use crate::api::models::groups::MembershipResponse;
use crate::api::models::invitations::{InvitationCreate, InvitationResponse};
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
pub async fn create_invitation(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    current_user: CurrentUser,
    Json(create): Json<InvitationCreate>,
) -> Result<(StatusCode, Json<InvitationResponse>)> {
    let invitation = state.services.invitations.invite(&current_user.id, group_id, create).await?;
    Ok((StatusCode::CREATED, Json(InvitationResponse::from(invitation))))
}

#[tracing::instrument(skip_all)]
pub async fn accept_invitation(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(GroupId, UserId)>,
    current_user: CurrentUser,
) -> Result<Json<MembershipResponse>> {
    let membership = state.services.invitations.accept(&current_user.id, &user_id, group_id).await?;
    Ok(Json(MembershipResponse::from(membership)))
}

/// Revoke (inviter, administrator) or decline (invitee) a pending invitation. Responds with the
/// invitation that was removed.
#[tracing::instrument(skip_all)]
pub async fn delete_invitation(
    State(state): State<AppState>,
    Path((group_id, user_id)): Path<(GroupId, UserId)>,
    current_user: CurrentUser,
) -> Result<Json<InvitationResponse>> {
    let revoked = state.services.invitations.revoke(&current_user.id, &user_id, group_id).await?;
    Ok(Json(InvitationResponse::from(revoked)))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{
            groups::MembershipResponse,
            invitations::InvitationResponse,
        },
        db::models::memberships::GroupRole,
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;

    #[test_log::test(tokio::test)]
    async fn test_invite_accept_flow() {
        let (app, services) = create_test_app();
        let admin = register_user(&services, "admin").await;
        let guest = register_user(&services, "guest").await;
        let group = create_test_group(&services, &admin).await;
        let (admin_name, admin_value) = identity_header(&admin);
        let (guest_name, guest_value) = identity_header(&guest);

        let response = app
            .post(&format!("/api/v1/groups/{group}/invitations"))
            .add_header(admin_name.clone(), admin_value.clone())
            .json(&json!({ "email": "GUEST@example.com" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let invitation: InvitationResponse = response.json();
        assert_eq!(invitation.invited_user, guest);
        assert_eq!(invitation.inviter, admin);

        let response = app
            .get("/api/v1/users/guest/invitations")
            .add_header(guest_name.clone(), guest_value.clone())
            .await;
        response.assert_status_ok();
        let pending: Vec<InvitationResponse> = response.json();
        assert_eq!(pending, vec![invitation]);

        // nobody accepts on someone else's behalf
        app.post(&format!("/api/v1/groups/{group}/invitations/guest/accept"))
            .add_header(admin_name.clone(), admin_value.clone())
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = app
            .post(&format!("/api/v1/groups/{group}/invitations/guest/accept"))
            .add_header(guest_name.clone(), guest_value.clone())
            .await;
        response.assert_status_ok();
        let membership: MembershipResponse = response.json();
        assert_eq!(membership.role, GroupRole::Member);

        // a second accept finds nothing to accept
        app.post(&format!("/api/v1/groups/{group}/invitations/guest/accept"))
            .add_header(guest_name, guest_value)
            .await
            .assert_status(StatusCode::NOT_FOUND);

        // inviting an existing member conflicts
        app.post(&format!("/api/v1/groups/{group}/invitations"))
            .add_header(admin_name, admin_value)
            .json(&json!({ "email": "guest@example.com" }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_invitee_declines_and_outsider_cannot_revoke() {
        let (app, services) = create_test_app();
        let admin = register_user(&services, "admin").await;
        let guest = register_user(&services, "guest").await;
        let outsider = register_user(&services, "outsider").await;
        let group = create_test_group(&services, &admin).await;
        let (admin_name, admin_value) = identity_header(&admin);

        app.post(&format!("/api/v1/groups/{group}/invitations"))
            .add_header(admin_name, admin_value)
            .json(&json!({ "email": "guest@example.com" }))
            .await
            .assert_status(StatusCode::CREATED);

        let (name, value) = identity_header(&outsider);
        app.delete(&format!("/api/v1/groups/{group}/invitations/guest"))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = identity_header(&guest);
        let response = app
            .delete(&format!("/api/v1/groups/{group}/invitations/guest"))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let declined: InvitationResponse = response.json();
        assert_eq!(declined.invited_user, guest);
        assert_eq!(declined.group_id, group);
        assert_eq!(declined.inviter, admin);
        app.delete(&format!("/api/v1/groups/{group}/invitations/guest"))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_inviting_unknown_email_is_not_found() {
        let (app, services) = create_test_app();
        let admin = register_user(&services, "admin").await;
        let group = create_test_group(&services, &admin).await;
        let (name, value) = identity_header(&admin);

        app.post(&format!("/api/v1/groups/{group}/invitations"))
            .add_header(name, value)
            .json(&json!({ "email": "ghost@example.com" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
