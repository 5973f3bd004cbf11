use std::collections::HashSet;

use chrono::{Duration, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingAction, BookingStatus, MultiPlayerBooking, MultiPlayerStatus, Partner,
    PaymentInfo, RefundRecord, Schedule, ScheduledBooking, ServiceType, Violation,
};
use crate::services::booking::{load, transition};
use crate::services::conflict::check_time_conflict;
use crate::services::notify::{self, Notification, NoticeKind};
use crate::services::settlement::{self, round2};

/// Membership is frozen this long before the session starts.
pub const ADJUSTMENT_CUTOFF_MINUTES: i64 = 30;
/// A new group must start at least this far in the future.
pub const MIN_LEAD_TIME_HOURS: i64 = 2;
pub const VIOLATION_SUSPENSION_THRESHOLD: i64 = 3;

const SUSPENSION_REASON: &str = "removed confirmed partners from multi-player bookings too often";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCreated {
    pub multi_player_booking: MultiPlayerBooking,
    pub bookings: Vec<Booking>,
    #[serde(skip)]
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnersAdded {
    pub new_bookings: Vec<Booking>,
    pub additional_amount: f64,
    pub multi_player_booking: MultiPlayerBooking,
    #[serde(skip)]
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRemoved {
    pub refund_amount: f64,
    pub partner_amount: f64,
    pub platform_amount: f64,
    pub is_violation: bool,
    pub violation_count: i64,
    pub is_suspended: bool,
    pub multi_player_booking: MultiPlayerBooking,
    #[serde(skip)]
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerReplaced {
    pub booking: Booking,
    pub multi_player_booking: MultiPlayerBooking,
    #[serde(skip)]
    pub notifications: Vec<Notification>,
}

fn load_owned_group(
    conn: &Connection,
    group_id: &str,
    customer_id: &str,
) -> Result<MultiPlayerBooking, AppError> {
    let group = queries::get_multi_player_booking(conn, group_id)?
        .ok_or_else(|| AppError::not_found("multi-player booking"))?;
    if group.customer_id != customer_id {
        return Err(AppError::Forbidden(
            "multi-player booking belongs to another customer".into(),
        ));
    }
    Ok(group)
}

fn ensure_adjustable(group: &MultiPlayerBooking, now: NaiveDateTime) -> Result<(), AppError> {
    if now >= group.start_time - Duration::minutes(ADJUSTMENT_CUTOFF_MINUTES) {
        tracing::info!(group_id = %group.id, %now, "adjustment window closed");
        return Err(AppError::AdjustmentClosed);
    }
    if group.status.is_closed() {
        return Err(AppError::invalid_status(format!(
            "multi-player booking is {}",
            group.status.as_str()
        )));
    }
    Ok(())
}

fn load_member(
    conn: &Connection,
    group: &MultiPlayerBooking,
    booking_id: &str,
) -> Result<ScheduledBooking, AppError> {
    let member = load(conn, booking_id)?;
    if member.booking.multi_player_booking_id.as_deref() != Some(group.id.as_str()) {
        return Err(AppError::not_found("booking in this multi-player booking"));
    }
    Ok(member)
}

/// Every check a schedule must pass before it can join a group. Performs no writes.
fn validate_candidate(
    conn: &Connection,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    schedule_id: &str,
    members: &[ScheduledBooking],
    exclude_booking_id: Option<&str>,
) -> Result<(Schedule, Partner), AppError> {
    if members
        .iter()
        .any(|m| m.schedule.id == schedule_id && !m.booking.status.is_terminal())
    {
        return Err(AppError::Conflict {
            message: "schedule is already part of this multi-player booking".into(),
            conflicting_id: Some(schedule_id.to_string()),
        });
    }

    let schedule = queries::get_schedule(conn, schedule_id)?
        .ok_or_else(|| AppError::not_found(format!("schedule {schedule_id}")))?;
    if !schedule.is_available {
        return Err(AppError::Conflict {
            message: "schedule is not available".into(),
            conflicting_id: Some(schedule.id),
        });
    }
    if queries::get_bookings_for_schedule(conn, schedule_id)?
        .iter()
        .any(|b| !b.status.is_terminal())
    {
        return Err(AppError::ScheduleAlreadyBooked);
    }
    if !schedule.same_window(start, end) {
        return Err(AppError::Validation(
            "schedule time must match the multi-player booking exactly".into(),
        ));
    }

    let partner = queries::get_partner(conn, &schedule.partner_id)?
        .ok_or_else(|| AppError::not_found("partner"))?;

    let report = check_time_conflict(conn, &partner.id, start, end, exclude_booking_id)?;
    if report.has_conflict {
        tracing::info!(
            partner_id = %partner.id,
            conflicting = ?report.conflicting_booking_id(),
            "partner busy during multi-player window"
        );
        return Err(AppError::TimeConflict(format!(
            "{} already has a booking at this time",
            partner.name
        )));
    }

    Ok((schedule, partner))
}

fn validate_candidates(
    conn: &Connection,
    group_start: &NaiveDateTime,
    group_end: &NaiveDateTime,
    schedule_ids: &[String],
    members: &[ScheduledBooking],
) -> Result<Vec<(Schedule, Partner)>, AppError> {
    if schedule_ids.is_empty() {
        return Err(AppError::Validation("partnerScheduleIds must not be empty".into()));
    }
    let unique: HashSet<&String> = schedule_ids.iter().collect();
    if unique.len() != schedule_ids.len() {
        return Err(AppError::Validation("partnerScheduleIds contains duplicates".into()));
    }

    let mut accepted: Vec<(Schedule, Partner)> = Vec::with_capacity(schedule_ids.len());
    for id in schedule_ids {
        let (schedule, partner) = validate_candidate(conn, group_start, group_end, id, members, None)?;
        if accepted.iter().any(|(_, p)| p.id == partner.id) {
            return Err(AppError::Validation(format!(
                "{} appears more than once",
                partner.name
            )));
        }
        accepted.push((schedule, partner));
    }
    Ok(accepted)
}

fn insert_member(
    conn: &Connection,
    group: &MultiPlayerBooking,
    schedule: &Schedule,
    partner: &Partner,
    now: NaiveDateTime,
) -> anyhow::Result<Booking> {
    let amount = settlement::booking_amount(group.duration_hours(), partner);
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        customer_id: group.customer_id.clone(),
        schedule_id: schedule.id.clone(),
        status: BookingStatus::PaidWaitingPartnerConfirmation,
        original_amount: amount,
        final_amount: amount,
        payment_info: PaymentInfo {
            is_multi_player_booking: true,
            ..Default::default()
        },
        reject_reason: None,
        multi_player_booking_id: Some(group.id.clone()),
        group_booking_id: None,
        service_type: ServiceType::MultiPlayer,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(conn, &booking)?;
    Ok(booking)
}

fn member_notifications(
    conn: &Connection,
    bookings: &[Booking],
    schedules: &[Schedule],
    kind: NoticeKind,
) -> anyhow::Result<Vec<Notification>> {
    let mut out = vec![];
    for (booking, schedule) in bookings.iter().zip(schedules) {
        out.extend(notify::to_partner(conn, booking, schedule, kind)?);
    }
    Ok(out)
}

/// Sets the group total to the sum of its counting members and persists the group.
fn recompute_total(
    conn: &Connection,
    group: &mut MultiPlayerBooking,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    group.total_amount = round2(queries::sum_group_amount(conn, &group.id)?);
    group.updated_at = now;
    queries::update_multi_player_booking(conn, group)?;
    Ok(())
}

/// A group becomes active once any partner accepts.
pub fn activate_on_accept(
    conn: &Connection,
    group_id: &str,
    member_status: BookingStatus,
    now: NaiveDateTime,
) -> anyhow::Result<()> {
    if !member_status.is_confirmed() {
        return Ok(());
    }
    if let Some(mut group) = queries::get_multi_player_booking(conn, group_id)? {
        if group.status == MultiPlayerStatus::Pending {
            group.status = MultiPlayerStatus::Active;
            group.updated_at = now;
            queries::update_multi_player_booking(conn, &group)?;
        }
    }
    Ok(())
}

pub fn complete_ended_groups(conn: &Connection, now: NaiveDateTime) -> anyhow::Result<usize> {
    let groups = queries::get_groups_due_for_completion(conn, &now)?;
    for mut group in groups.iter().cloned() {
        group.status = MultiPlayerStatus::Completed;
        group.updated_at = now;
        queries::update_multi_player_booking(conn, &group)?;
    }
    Ok(groups.len())
}

pub fn create_multi_player_booking(
    conn: &mut Connection,
    customer_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    schedule_ids: &[String],
    now: NaiveDateTime,
) -> Result<GroupCreated, AppError> {
    if end <= start {
        return Err(AppError::Validation("end time must be after start time".into()));
    }
    if start <= now + Duration::hours(MIN_LEAD_TIME_HOURS) {
        return Err(AppError::Validation(format!(
            "multi-player bookings must start more than {MIN_LEAD_TIME_HOURS} hours from now"
        )));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let customer = queries::get_customer(&tx, customer_id)?
        .ok_or_else(|| AppError::not_found("customer"))?;
    let suspended = queries::get_user(&tx, &customer.user_id)?
        .is_some_and(|u| u.is_suspended_at(&now));
    if suspended || customer.violation_count >= VIOLATION_SUSPENSION_THRESHOLD {
        return Err(AppError::Suspended);
    }

    let candidates = validate_candidates(&tx, &start, &end, schedule_ids, &[])?;

    let mut group = MultiPlayerBooking {
        id: uuid::Uuid::new_v4().to_string(),
        customer_id: customer.id.clone(),
        start_time: start,
        end_time: end,
        status: MultiPlayerStatus::Pending,
        total_amount: 0.0,
        last_adjustment_at: None,
        created_at: now,
        updated_at: now,
    };
    queries::insert_multi_player_booking(&tx, &group)?;

    let mut bookings = Vec::with_capacity(candidates.len());
    for (schedule, partner) in &candidates {
        bookings.push(insert_member(&tx, &group, schedule, partner, now)?);
    }
    recompute_total(&tx, &mut group, now)?;

    let schedules: Vec<Schedule> = candidates.into_iter().map(|(s, _)| s).collect();
    let notifications = member_notifications(&tx, &bookings, &schedules, NoticeKind::AddedToGroup)?;

    tx.commit()?;

    tracing::info!(
        group_id = %group.id,
        customer_id,
        partners = bookings.len(),
        total = group.total_amount,
        "multi-player booking created"
    );
    Ok(GroupCreated {
        multi_player_booking: group,
        bookings,
        notifications,
    })
}

/// Adds partners to a group. Every candidate is validated before anything is written.
pub fn add_partners(
    conn: &mut Connection,
    group_id: &str,
    customer_id: &str,
    schedule_ids: &[String],
    now: NaiveDateTime,
) -> Result<PartnersAdded, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut group = load_owned_group(&tx, group_id, customer_id)?;
    ensure_adjustable(&group, now)?;

    let members = queries::get_bookings_for_group(&tx, group_id)?;
    let candidates =
        validate_candidates(&tx, &group.start_time, &group.end_time, schedule_ids, &members)?;

    let mut new_bookings = Vec::with_capacity(candidates.len());
    for (schedule, partner) in &candidates {
        new_bookings.push(insert_member(&tx, &group, schedule, partner, now)?);
    }
    group.last_adjustment_at = Some(now);
    recompute_total(&tx, &mut group, now)?;

    let schedules: Vec<Schedule> = candidates.into_iter().map(|(s, _)| s).collect();
    let notifications =
        member_notifications(&tx, &new_bookings, &schedules, NoticeKind::AddedToGroup)?;

    tx.commit()?;

    let additional_amount = round2(new_bookings.iter().map(|b| b.final_amount).sum());
    tracing::info!(group_id, added = new_bookings.len(), additional_amount, "partners added");
    Ok(PartnersAdded {
        new_bookings,
        additional_amount,
        multi_player_booking: group,
        notifications,
    })
}

/// Drops one partner from a group with a 70/15/15 refund split.
///
/// Dropping a partner who already accepted is a violation; the third one
/// suspends the customer's account indefinitely.
pub fn remove_partner(
    conn: &mut Connection,
    group_id: &str,
    customer_id: &str,
    booking_id: &str,
    reason: &str,
    now: NaiveDateTime,
) -> Result<PartnerRemoved, AppError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation("a removal reason is required".into()));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut group = load_owned_group(&tx, group_id, customer_id)?;
    ensure_adjustable(&group, now)?;

    let ScheduledBooking {
        mut booking,
        schedule,
    } = load_member(&tx, &group, booking_id)?;
    if booking.status.is_terminal() {
        return Err(AppError::AlreadyRemoved);
    }
    let is_violation = booking.status.is_confirmed();

    let split = settlement::refund_split(booking.original_amount);
    booking.payment_info.refunds.push(RefundRecord {
        booking_id: booking.id.clone(),
        amount: booking.original_amount,
        refund_amount: split.refund_amount,
        partner_amount: split.partner_amount,
        platform_amount: split.platform_amount,
        reason: reason.to_string(),
        refunded_at: now,
        is_confirmed_partner_removal: is_violation,
    });
    booking.status = transition(booking.status, BookingAction::Cancel)?;
    booking.updated_at = now;
    queries::update_booking(&tx, &booking)?;

    group.last_adjustment_at = Some(now);
    recompute_total(&tx, &mut group, now)?;

    let mut customer = queries::get_customer(&tx, customer_id)?
        .ok_or_else(|| AppError::not_found("customer"))?;
    let user = queries::get_user(&tx, &customer.user_id)?
        .ok_or_else(|| AppError::not_found("user"))?;
    let mut is_suspended = user.is_suspended_at(&now);

    if is_violation {
        let partner_name = queries::get_partner(&tx, &schedule.partner_id)?
            .map(|p| p.name)
            .unwrap_or_default();
        customer.violation_count += 1;
        customer.violations.push(Violation {
            time: now,
            reason: reason.to_string(),
            booking_id: booking.id.clone(),
            partner_name,
            multi_player_booking_id: Some(group.id.clone()),
        });
        queries::update_customer_violations(&tx, &customer)?;

        tracing::warn!(
            customer_id,
            booking_id,
            violation_count = customer.violation_count,
            "confirmed partner removed, violation recorded"
        );

        // any existing time-limited suspension becomes permanent
        if customer.violation_count >= VIOLATION_SUSPENSION_THRESHOLD {
            queries::set_user_suspension(&tx, &user.id, None, SUSPENSION_REASON)?;
            is_suspended = true;
            tracing::warn!(customer_id, user_id = %user.id, "customer suspended");
        }
    }

    let notifications = notify::to_partner(&tx, &booking, &schedule, NoticeKind::RemovedFromGroup)?
        .into_iter()
        .collect();

    tx.commit()?;

    Ok(PartnerRemoved {
        refund_amount: split.refund_amount,
        partner_amount: split.partner_amount,
        platform_amount: split.platform_amount,
        is_violation,
        violation_count: customer.violation_count,
        is_suspended,
        multi_player_booking: group,
        notifications,
    })
}

/// Swaps a partner who declined for another schedule in the same window.
/// The declined booking is kept as CANCELLED.
pub fn replace_partner(
    conn: &mut Connection,
    group_id: &str,
    customer_id: &str,
    rejected_booking_id: &str,
    new_schedule_id: &str,
    now: NaiveDateTime,
) -> Result<PartnerReplaced, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut group = load_owned_group(&tx, group_id, customer_id)?;
    ensure_adjustable(&group, now)?;

    let mut rejected = load_member(&tx, &group, rejected_booking_id)?.booking;
    if !rejected.status.is_rejected() {
        return Err(AppError::invalid_status(format!(
            "only rejected partners can be replaced, booking is {}",
            rejected.status
        )));
    }

    let members = queries::get_bookings_for_group(&tx, group_id)?;
    let (schedule, partner) = validate_candidate(
        &tx,
        &group.start_time,
        &group.end_time,
        new_schedule_id,
        &members,
        Some(rejected_booking_id),
    )?;

    rejected.status = transition(rejected.status, BookingAction::Supersede)?;
    rejected.updated_at = now;
    queries::update_booking(&tx, &rejected)?;

    let booking = insert_member(&tx, &group, &schedule, &partner, now)?;
    group.last_adjustment_at = Some(now);
    recompute_total(&tx, &mut group, now)?;

    let notifications = notify::to_partner(&tx, &booking, &schedule, NoticeKind::AddedToGroup)?
        .into_iter()
        .collect();

    tx.commit()?;

    tracing::info!(group_id, rejected_booking_id, new_booking_id = %booking.id, "partner replaced");
    Ok(PartnerReplaced {
        booking,
        multi_player_booking: group,
        notifications,
    })
}
