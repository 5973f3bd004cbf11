use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::models::{BookingStatus, ScheduledBooking};
use crate::services::overlap::overlaps;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingBooking {
    pub booking_id: String,
    pub schedule_id: String,
    pub status: BookingStatus,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub conflicts: Vec<ConflictingBooking>,
}

impl ConflictReport {
    pub fn conflicting_booking_id(&self) -> Option<&str> {
        self.conflicts.first().map(|c| c.booking_id.as_str())
    }
}

/// Tests `[start, end)` against every live booking of the partner.
///
/// Must run on the same connection (or transaction) as the write it guards.
pub fn check_time_conflict(
    conn: &Connection,
    partner_id: &str,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    exclude_booking_id: Option<&str>,
) -> anyhow::Result<ConflictReport> {
    let active = queries::get_active_bookings_for_partner(conn, partner_id, exclude_booking_id)?;

    let conflicts: Vec<ConflictingBooking> = active
        .into_iter()
        .filter(|sb| overlaps(start, end, &sb.schedule.start_time, &sb.schedule.end_time))
        .map(|sb| ConflictingBooking {
            booking_id: sb.booking.id,
            schedule_id: sb.schedule.id,
            status: sb.booking.status,
            start_time: sb.schedule.start_time,
            end_time: sb.schedule.end_time,
        })
        .collect();

    if !conflicts.is_empty() {
        tracing::debug!(
            partner_id,
            %start,
            %end,
            count = conflicts.len(),
            "time conflict detected"
        );
    }

    Ok(ConflictReport {
        has_conflict: !conflicts.is_empty(),
        conflicts,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyStatus {
    pub is_busy: bool,
    pub booking_id: Option<String>,
    pub ends_at: Option<NaiveDateTime>,
    pub remaining_minutes: Option<i64>,
}

/// Whether the partner is in the middle of a confirmed session at `now`.
pub fn is_partner_busy(
    conn: &Connection,
    partner_id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<BusyStatus> {
    let current: Option<ScheduledBooking> = queries::get_in_progress_booking(conn, partner_id, now)?;

    Ok(match current {
        Some(sb) => BusyStatus {
            is_busy: true,
            remaining_minutes: Some((sb.schedule.end_time - *now).num_minutes().max(0)),
            ends_at: Some(sb.schedule.end_time),
            booking_id: Some(sb.booking.id),
        },
        None => BusyStatus {
            is_busy: false,
            booking_id: None,
            ends_at: None,
            remaining_minutes: None,
        },
    })
}
