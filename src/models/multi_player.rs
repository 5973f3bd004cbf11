use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Container for several partner bookings sharing one window and one payer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiPlayerBooking {
    pub id: String,
    pub customer_id: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: MultiPlayerStatus,
    pub total_amount: f64,
    pub last_adjustment_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl MultiPlayerBooking {
    pub fn duration_hours(&self) -> f64 {
        (self.end_time - self.start_time).num_minutes() as f64 / 60.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MultiPlayerStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl MultiPlayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MultiPlayerStatus::Pending => "PENDING",
            MultiPlayerStatus::Active => "ACTIVE",
            MultiPlayerStatus::Completed => "COMPLETED",
            MultiPlayerStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(MultiPlayerStatus::Pending),
            "ACTIVE" => Some(MultiPlayerStatus::Active),
            "COMPLETED" => Some(MultiPlayerStatus::Completed),
            "CANCELLED" => Some(MultiPlayerStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, MultiPlayerStatus::Completed | MultiPlayerStatus::Cancelled)
    }
}
