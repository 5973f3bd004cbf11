use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: String,
    pub partner_id: String,
    pub amount: f64,
    pub status: WithdrawalStatus,
    pub requested_at: NaiveDateTime,
    pub processed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "PENDING",
            WithdrawalStatus::Approved => "APPROVED",
            WithdrawalStatus::Rejected => "REJECTED",
            WithdrawalStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(WithdrawalStatus::Pending),
            "APPROVED" => Some(WithdrawalStatus::Approved),
            "REJECTED" => Some(WithdrawalStatus::Rejected),
            "COMPLETED" => Some(WithdrawalStatus::Completed),
            _ => None,
        }
    }
}
