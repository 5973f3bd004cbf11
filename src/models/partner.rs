use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub status: PartnerStatus,
    pub half_hourly_rate: f64,
    /// Per-partner platform fee override, as a fraction.
    pub referral_platform_fee: Option<f64>,
    /// The partner who referred this one, if any.
    pub invited_by: Option<String>,
    pub referral_earnings: f64,
}

impl Partner {
    /// Half-hourly rate doubled to its hourly equivalent.
    pub fn hourly_equivalent(&self) -> f64 {
        self.half_hourly_rate * 2.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerStatus {
    Pending,
    Approved,
    Rejected,
}

impl PartnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerStatus::Pending => "PENDING",
            PartnerStatus::Approved => "APPROVED",
            PartnerStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PartnerStatus::Pending),
            "APPROVED" => Some(PartnerStatus::Approved),
            "REJECTED" => Some(PartnerStatus::Rejected),
            _ => None,
        }
    }
}
