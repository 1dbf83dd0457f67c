//! Database models for expenses and their participants.

use crate::types::{ExpenseId, GroupId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Role of a participant attached to an expense, stored as TEXT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ParticipantRole {
    Creator,
    Payer,
}

/// Database request for creating an expense
#[derive(Debug, Clone)]
pub struct ExpenseCreateDBRequest {
    pub group_id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: Decimal,
    pub spent_at: DateTime<Utc>,
    pub creator: UserId,
}

/// Database request replacing the scalar fields of an expense.
/// The creator and group are immutable and therefore absent.
#[derive(Debug, Clone)]
pub struct ExpenseUpdateDBRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: Decimal,
    pub spent_at: DateTime<Utc>,
}

/// Database response for an expense row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExpenseDBResponse {
    pub id: ExpenseId,
    pub group_id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub amount: Decimal,
    pub spent_at: DateTime<Utc>,
    pub creator: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database response for an expense participant row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParticipantDBResponse {
    pub expense_id: ExpenseId,
    pub user_id: UserId,
    pub role: ParticipantRole,
}
