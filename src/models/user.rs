use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_suspended: bool,
    /// `None` while suspended means the suspension never ends.
    pub suspension_ends_at: Option<NaiveDateTime>,
    pub suspension_reason: Option<String>,
}

impl User {
    pub fn is_suspended_at(&self, now: &NaiveDateTime) -> bool {
        self.is_suspended && self.suspension_ends_at.map_or(true, |ends| ends > *now)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Partner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Partner => "PARTNER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CUSTOMER" => Some(Role::Customer),
            "PARTNER" => Some(Role::Partner),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub user_id: String,
    pub violation_count: i64,
    pub violations: Vec<Violation>,
}

/// Append-only record of a customer dropping a partner who already agreed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub time: NaiveDateTime,
    pub reason: String,
    pub booking_id: String,
    pub partner_name: String,
    pub multi_player_booking_id: Option<String>,
}
