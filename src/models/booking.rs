use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Schedule;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub schedule_id: String,
    pub status: BookingStatus,
    pub original_amount: f64,
    pub final_amount: f64,
    pub payment_info: PaymentInfo,
    pub reject_reason: Option<String>,
    pub multi_player_booking_id: Option<String>,
    pub group_booking_id: Option<String>,
    pub service_type: ServiceType,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A booking joined with the schedule it occupies.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledBooking {
    pub booking: Booking,
    pub schedule: Schedule,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    PendingPayment,
    PaidWaitingPartnerConfirmation,
    PartnerAccepted,
    PartnerRejected,
    Rejected,
    Confirmed,
    Completed,
    CompletedWithAmountMismatch,
    Cancelled,
}

/// Everything that can happen to a booking. Whether it is allowed depends
/// only on the current status, see [`BookingStatus::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    RequestPayment,
    PaymentReceived,
    /// Partner accepts a seat inside a multi-player group.
    Accept,
    /// Partner (or the group) confirms the booking for good.
    Confirm,
    PartnerReject,
    /// Administrative rejection before the partner confirmed.
    Reject,
    Complete,
    CompleteWithMismatch,
    Cancel,
    /// A rejected booking replaced by another partner is kept as CANCELLED.
    Supersede,
}

impl BookingStatus {
    pub const TERMINAL: [BookingStatus; 5] = [
        BookingStatus::Cancelled,
        BookingStatus::Completed,
        BookingStatus::Rejected,
        BookingStatus::PartnerRejected,
        BookingStatus::CompletedWithAmountMismatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::PendingPayment => "PENDING_PAYMENT",
            BookingStatus::PaidWaitingPartnerConfirmation => "PAID_WAITING_PARTNER_CONFIRMATION",
            BookingStatus::PartnerAccepted => "PARTNER_ACCEPTED",
            BookingStatus::PartnerRejected => "PARTNER_REJECTED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::CompletedWithAmountMismatch => "COMPLETED_WITH_AMOUNT_MISMATCH",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let status = match s {
            "PENDING" => BookingStatus::Pending,
            "PENDING_PAYMENT" => BookingStatus::PendingPayment,
            "PAID_WAITING_PARTNER_CONFIRMATION" => BookingStatus::PaidWaitingPartnerConfirmation,
            "PARTNER_ACCEPTED" => BookingStatus::PartnerAccepted,
            "PARTNER_REJECTED" => BookingStatus::PartnerRejected,
            "REJECTED" => BookingStatus::Rejected,
            "CONFIRMED" => BookingStatus::Confirmed,
            "COMPLETED" => BookingStatus::Completed,
            "COMPLETED_WITH_AMOUNT_MISMATCH" => BookingStatus::CompletedWithAmountMismatch,
            "CANCELLED" => BookingStatus::Cancelled,
            _ => return None,
        };
        Some(status)
    }

    /// Terminal bookings never occupy a schedule.
    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// The partner has agreed to the session.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::PartnerAccepted)
    }

    /// Whether a group member still contributes to the group total.
    pub fn counts_toward_total(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled | BookingStatus::Rejected)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, BookingStatus::Rejected | BookingStatus::PartnerRejected)
    }

    /// Next status for `action`, or `None` when the transition is illegal.
    pub fn apply(self, action: BookingAction) -> Option<BookingStatus> {
        use BookingAction as A;
        use BookingStatus as S;

        match (self, action) {
            (S::Rejected | S::PartnerRejected, A::Supersede) => Some(S::Cancelled),
            (s, _) if s.is_terminal() => None,
            (S::Pending, A::RequestPayment) => Some(S::PendingPayment),
            (S::Pending | S::PendingPayment, A::PaymentReceived) => {
                Some(S::PaidWaitingPartnerConfirmation)
            }
            (S::PaidWaitingPartnerConfirmation, A::Accept) => Some(S::PartnerAccepted),
            (S::PaidWaitingPartnerConfirmation | S::PartnerAccepted, A::Confirm) => {
                Some(S::Confirmed)
            }
            (S::PaidWaitingPartnerConfirmation, A::PartnerReject) => Some(S::PartnerRejected),
            (S::Pending | S::PendingPayment | S::PaidWaitingPartnerConfirmation, A::Reject) => {
                Some(S::Rejected)
            }
            (S::PartnerAccepted | S::Confirmed, A::Complete) => Some(S::Completed),
            (S::PartnerAccepted | S::Confirmed, A::CompleteWithMismatch) => {
                Some(S::CompletedWithAmountMismatch)
            }
            (_, A::Cancel) => Some(S::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Standard,
    MultiPlayer,
    Group,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Standard => "STANDARD",
            ServiceType::MultiPlayer => "MULTI_PLAYER",
            ServiceType::Group => "GROUP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STANDARD" => Some(ServiceType::Standard),
            "MULTI_PLAYER" => Some(ServiceType::MultiPlayer),
            "GROUP" => Some(ServiceType::Group),
            _ => None,
        }
    }
}

/// Structured payment metadata stored as JSON on the booking row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    #[serde(default)]
    pub is_instant_booking: bool,
    #[serde(default)]
    pub is_multi_player_booking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub refunds: Vec<RefundRecord>,
}

/// Audit entry appended whenever a booking is refunded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefundRecord {
    pub booking_id: String,
    pub amount: f64,
    pub refund_amount: f64,
    pub partner_amount: f64,
    pub platform_amount: f64,
    pub reason: String,
    pub refunded_at: NaiveDateTime,
    pub is_confirmed_partner_removal: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BookingStatus; 10] = [
        BookingStatus::Pending,
        BookingStatus::PendingPayment,
        BookingStatus::PaidWaitingPartnerConfirmation,
        BookingStatus::PartnerAccepted,
        BookingStatus::PartnerRejected,
        BookingStatus::Rejected,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::CompletedWithAmountMismatch,
        BookingStatus::Cancelled,
    ];

    #[test]
    fn test_status_string_round_trip() {
        for status in ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("bogus"), None);
    }

    #[test]
    fn test_happy_path_transitions() {
        let s = BookingStatus::Pending;
        let s = s.apply(BookingAction::RequestPayment).unwrap();
        assert_eq!(s, BookingStatus::PendingPayment);
        let s = s.apply(BookingAction::PaymentReceived).unwrap();
        assert_eq!(s, BookingStatus::PaidWaitingPartnerConfirmation);
        let s = s.apply(BookingAction::Confirm).unwrap();
        assert_eq!(s, BookingStatus::Confirmed);
        let s = s.apply(BookingAction::Complete).unwrap();
        assert_eq!(s, BookingStatus::Completed);
    }

    #[test]
    fn test_terminal_states_reject_everything_but_supersede() {
        for status in BookingStatus::TERMINAL {
            assert_eq!(status.apply(BookingAction::Cancel), None);
            assert_eq!(status.apply(BookingAction::Confirm), None);
        }
        assert_eq!(
            BookingStatus::PartnerRejected.apply(BookingAction::Supersede),
            Some(BookingStatus::Cancelled)
        );
        assert_eq!(BookingStatus::Completed.apply(BookingAction::Supersede), None);
    }

    #[test]
    fn test_every_live_state_can_be_cancelled() {
        for status in ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert_eq!(status.apply(BookingAction::Cancel), Some(BookingStatus::Cancelled));
        }
    }

    #[test]
    fn test_partner_cannot_reject_after_accepting() {
        assert_eq!(BookingStatus::PartnerAccepted.apply(BookingAction::PartnerReject), None);
        assert_eq!(BookingStatus::PendingPayment.apply(BookingAction::Accept), None);
    }

    #[test]
    fn test_payment_info_defaults_from_empty_json() {
        let info: PaymentInfo = serde_json::from_str("{}").unwrap();
        assert_eq!(info, PaymentInfo::default());
    }
}
