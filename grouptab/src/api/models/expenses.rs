//! API request/response models for the expense ledger.

use crate::db::models::expenses::{ExpenseDBResponse, ParticipantDBResponse, ParticipantRole};
use crate::types::{ExpenseId, GroupId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request body for recording an expense. The caller becomes its creator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Non-negative amount in the group's currency
    pub amount: Decimal,
    /// When the money was spent. Defaults to the time of recording.
    #[serde(default)]
    pub spent_at: Option<DateTime<Utc>>,
    /// Users sharing the expense. The creator is added if missing; duplicates are ignored.
    #[serde(default)]
    pub participants: Vec<UserId>,
}

/// Request body replacing an expense. Scalar fields and the participant set are replaced as a
/// whole; the participant set must include the creator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseUpdate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub amount: Decimal,
    /// Defaults to the stored value when omitted
    #[serde(default)]
    pub spent_at: Option<DateTime<Utc>>,
    /// May echo the stored creator. Any other value is rejected; the creator never changes.
    #[serde(default)]
    pub creator: Option<UserId>,
    pub participants: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub user_id: UserId,
    pub role: ParticipantRole,
}

/// An expense together with its participants. The CREATOR participant is listed first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseResponse {
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
    pub participants: Vec<ParticipantResponse>,
}

/// Summary returned by listings and deletion, without participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseSummary {
    pub id: ExpenseId,
    pub group_id: GroupId,
    pub name: String,
    pub category: Option<String>,
    pub amount: Decimal,
    pub spent_at: DateTime<Utc>,
    pub creator: UserId,
}

impl From<ParticipantDBResponse> for ParticipantResponse {
    fn from(db: ParticipantDBResponse) -> Self {
        Self {
            user_id: db.user_id,
            role: db.role,
        }
    }
}

impl ExpenseResponse {
    pub fn new(expense: ExpenseDBResponse, participants: Vec<ParticipantDBResponse>) -> Self {
        Self {
            id: expense.id,
            group_id: expense.group_id,
            name: expense.name,
            description: expense.description,
            category: expense.category,
            amount: expense.amount,
            spent_at: expense.spent_at,
            creator: expense.creator,
            created_at: expense.created_at,
            updated_at: expense.updated_at,
            participants: participants.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<ExpenseDBResponse> for ExpenseSummary {
    fn from(db: ExpenseDBResponse) -> Self {
        Self {
            id: db.id,
            group_id: db.group_id,
            name: db.name,
            category: db.category,
            amount: db.amount,
            spent_at: db.spent_at,
            creator: db.creator,
        }
    }
}
