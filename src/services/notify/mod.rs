pub mod email;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::models::{Booking, Schedule};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeKind {
    /// Paid booking waiting for the partner's answer.
    NewBooking,
    Accepted,
    Rejected,
    Cancelled,
    AddedToGroup,
    RemovedFromGroup,
}

impl NoticeKind {
    pub fn subject(&self) -> &'static str {
        match self {
            NoticeKind::NewBooking => "New booking waiting for your confirmation",
            NoticeKind::Accepted => "Your booking was accepted",
            NoticeKind::Rejected => "Your booking was declined",
            NoticeKind::Cancelled => "A booking was cancelled",
            NoticeKind::AddedToGroup => "You were invited to a multi-player session",
            NoticeKind::RemovedFromGroup => "You were removed from a multi-player session",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingNotice {
    pub booking_id: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub total_cost: Option<f64>,
    pub kind: NoticeKind,
}

/// One email to send once the owning transaction has committed.
#[derive(Debug, Clone)]
pub struct Notification {
    pub to_email: String,
    pub to_name: String,
    pub from_name: String,
    pub notice: BookingNotice,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_booking_notification(
        &self,
        to_email: &str,
        to_name: &str,
        from_name: &str,
        notice: &BookingNotice,
    ) -> anyhow::Result<()>;
}

/// Logs instead of sending. Used when no relay is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_booking_notification(
        &self,
        to_email: &str,
        _to_name: &str,
        from_name: &str,
        notice: &BookingNotice,
    ) -> anyhow::Result<()> {
        tracing::info!(
            to = to_email,
            from = from_name,
            booking_id = %notice.booking_id,
            kind = ?notice.kind,
            "notification (not delivered, no relay configured)"
        );
        Ok(())
    }
}

/// Fire-and-forget delivery. Failures are logged and never surface to the caller.
pub fn dispatch(notifier: Arc<dyn Notifier>, notifications: Vec<Notification>) {
    if notifications.is_empty() {
        return;
    }

    tokio::spawn(async move {
        for n in notifications {
            if let Err(e) = notifier
                .send_booking_notification(&n.to_email, &n.to_name, &n.from_name, &n.notice)
                .await
            {
                tracing::error!(
                    error = ?e,
                    to = %n.to_email,
                    booking_id = %n.notice.booking_id,
                    "failed to send booking notification"
                );
            }
        }
    });
}

/// Builds a notice for the partner who owns `schedule`, from the booking's customer.
pub fn to_partner(
    conn: &Connection,
    booking: &Booking,
    schedule: &Schedule,
    kind: NoticeKind,
) -> anyhow::Result<Option<Notification>> {
    let Some(partner) = queries::get_partner(conn, &schedule.partner_id)? else {
        return Ok(None);
    };
    let Some(partner_user) = queries::get_user(conn, &partner.user_id)? else {
        return Ok(None);
    };
    let from_name = customer_name(conn, &booking.customer_id)?;

    Ok(Some(Notification {
        to_email: partner_user.email,
        to_name: partner.name,
        from_name,
        notice: notice(booking, schedule, kind),
    }))
}

/// Builds a notice for the booking's customer, from the partner.
pub fn to_customer(
    conn: &Connection,
    booking: &Booking,
    schedule: &Schedule,
    kind: NoticeKind,
) -> anyhow::Result<Option<Notification>> {
    let Some(customer) = queries::get_customer(conn, &booking.customer_id)? else {
        return Ok(None);
    };
    let Some(user) = queries::get_user(conn, &customer.user_id)? else {
        return Ok(None);
    };
    let from_name = queries::get_partner(conn, &schedule.partner_id)?
        .map(|p| p.name)
        .unwrap_or_default();

    Ok(Some(Notification {
        to_email: user.email,
        to_name: user.name,
        from_name,
        notice: notice(booking, schedule, kind),
    }))
}

fn customer_name(conn: &Connection, customer_id: &str) -> anyhow::Result<String> {
    let Some(customer) = queries::get_customer(conn, customer_id)? else {
        return Ok(String::new());
    };
    Ok(queries::get_user(conn, &customer.user_id)?
        .map(|u| u.name)
        .unwrap_or_default())
}

fn notice(booking: &Booking, schedule: &Schedule, kind: NoticeKind) -> BookingNotice {
    BookingNotice {
        booking_id: booking.id.clone(),
        start_time: schedule.start_time,
        end_time: schedule.end_time,
        total_cost: Some(booking.final_amount),
        kind,
    }
}
