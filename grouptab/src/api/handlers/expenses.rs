use crate::api::models::expenses::{ExpenseCreate, ExpenseResponse, ExpenseSummary, ExpenseUpdate};
use crate::api::models::users::CurrentUser;
use crate::errors::Result;
use crate::types::{ExpenseId, GroupId};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

#[tracing::instrument(skip_all)]
pub async fn list_expenses(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<ExpenseSummary>>> {
    let expenses = state.services.expenses.list_expenses_by_group(&current_user.id, group_id).await?;
    Ok(Json(expenses.into_iter().map(ExpenseSummary::from).collect()))
}

#[tracing::instrument(skip_all)]
pub async fn create_expense(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    current_user: CurrentUser,
    Json(create): Json<ExpenseCreate>,
) -> Result<(StatusCode, Json<ExpenseResponse>)> {
    let detail = state.services.expenses.create_expense(&current_user.id, group_id, create).await?;
    Ok((StatusCode::CREATED, Json(ExpenseResponse::new(detail.expense, detail.participants))))
}

#[tracing::instrument(skip_all)]
pub async fn get_expense(
    State(state): State<AppState>,
    Path((group_id, expense_id)): Path<(GroupId, ExpenseId)>,
    current_user: CurrentUser,
) -> Result<Json<ExpenseResponse>> {
    let detail = state
        .services
        .expenses
        .get_expense_detail(&current_user.id, expense_id, group_id)
        .await?;
    Ok(Json(ExpenseResponse::new(detail.expense, detail.participants)))
}

#[tracing::instrument(skip_all)]
pub async fn update_expense(
    State(state): State<AppState>,
    Path(expense_id): Path<ExpenseId>,
    current_user: CurrentUser,
    Json(update): Json<ExpenseUpdate>,
) -> Result<Json<ExpenseResponse>> {
    let detail = state.services.expenses.update_expense(&current_user.id, expense_id, update).await?;
    Ok(Json(ExpenseResponse::new(detail.expense, detail.participants)))
}

/// Delete an expense and its participants, returning the removed expense.
#[tracing::instrument(skip_all)]
pub async fn delete_expense(
    State(state): State<AppState>,
    Path(expense_id): Path<ExpenseId>,
    current_user: CurrentUser,
) -> Result<Json<ExpenseSummary>> {
    let deleted = state.services.expenses.delete_expense(&current_user.id, expense_id).await?;
    Ok(Json(ExpenseSummary::from(deleted)))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::expenses::{ExpenseResponse, ExpenseSummary},
        db::models::expenses::ParticipantRole,
        test_utils::*,
    };
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test_log::test(tokio::test)]
    async fn test_expense_lifecycle() {
        let (app, services) = create_test_app();
        let u1 = register_user(&services, "u1").await;
        let a = register_user(&services, "a").await;
        let group = create_test_group(&services, &u1).await;
        add_member(&services, &u1, group, &a).await;
        let (name, value) = identity_header(&u1);

        let response = app
            .post(&format!("/api/v1/groups/{group}/expenses"))
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "name": "Dinner",
                "category": "food",
                "amount": "250.50",
                "participants": ["u1", "a"]
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: ExpenseResponse = response.json();
        assert_eq!(created.amount, Decimal::new(25050, 2));
        assert_eq!(created.creator, u1);
        assert_eq!(created.participants.len(), 2);
        assert_eq!(created.participants[0].user_id, u1);
        assert_eq!(created.participants[0].role, ParticipantRole::Creator);
        assert_eq!(created.participants[1].role, ParticipantRole::Payer);

        let response = app
            .get(&format!("/api/v1/groups/{group}/expenses"))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let listed: Vec<ExpenseSummary> = response.json();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);

        let response = app
            .put(&format!("/api/v1/expenses/{}", created.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "name": "Dinner",
                "amount": "180",
                "creator": "u1",
                "participants": ["u1"]
            }))
            .await;
        response.assert_status_ok();
        let updated: ExpenseResponse = response.json();
        assert_eq!(updated.amount, Decimal::new(180, 0));
        assert_eq!(updated.participants.len(), 1);

        let response = app
            .delete(&format!("/api/v1/expenses/{}", created.id))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let deleted: ExpenseSummary = response.json();
        assert_eq!(deleted.id, created.id);
        assert_eq!(deleted.group_id, group);
        assert_eq!(deleted.amount, Decimal::new(180, 0));
        assert_eq!(deleted.creator, u1);
        app.get(&format!("/api/v1/groups/{group}/expenses/{}", created.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ledger_rules_over_http() {
        let (app, services) = create_test_app();
        let u1 = register_user(&services, "u1").await;
        let a = register_user(&services, "a").await;
        let u2 = register_user(&services, "u2").await;
        let group = create_test_group(&services, &u1).await;
        add_member(&services, &u1, group, &a).await;
        let (u1_name, u1_value) = identity_header(&u1);

        app.post(&format!("/api/v1/groups/{group}/expenses"))
            .add_header(u1_name.clone(), u1_value.clone())
            .json(&json!({ "name": "Refund", "amount": "-5" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .post(&format!("/api/v1/groups/{group}/expenses"))
            .add_header(u1_name.clone(), u1_value.clone())
            .json(&json!({ "name": "Fuel", "amount": "60", "participants": ["a"] }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: ExpenseResponse = response.json();

        // a non-member cannot delete it
        let (u2_name, u2_value) = identity_header(&u2);
        app.delete(&format!("/api/v1/expenses/{}", created.id))
            .add_header(u2_name, u2_value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        // dropping the creator from the participants is rejected
        app.put(&format!("/api/v1/expenses/{}", created.id))
            .add_header(u1_name.clone(), u1_value.clone())
            .json(&json!({ "name": "Fuel", "amount": "60", "participants": ["a"] }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = app
            .get(&format!("/api/v1/groups/{group}/expenses/{}", created.id))
            .add_header(u1_name, u1_value)
            .await;
        response.assert_status_ok();
        let unchanged: ExpenseResponse = response.json();
        assert_eq!(unchanged, created);
    }
}
