use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingAction, BookingStatus, PartnerStatus, PaymentInfo, Schedule,
    ScheduledBooking, ServiceType,
};
use crate::services::conflict::check_time_conflict;
use crate::services::notify::{self, Notification, NoticeKind};
use crate::services::overlap::overlaps;
use crate::services::{multi_player, settlement};

/// Customers may cancel only while the session is further away than this.
pub const CANCELLATION_CUTOFF_HOURS: i64 = 2;

/// Difference below which a paid amount counts as matching the final amount.
const AMOUNT_TOLERANCE: f64 = 0.005;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupancy {
    pub booking_id: String,
    pub status: BookingStatus,
}

/// An offered schedule plus the (terminal) bookings that once occupied it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    #[serde(flatten)]
    pub schedule: Schedule,
    pub bookings: Vec<Occupancy>,
}

#[derive(Debug)]
pub enum PartnerDecision {
    Accept,
    Reject { reason: String },
}

/// A changed booking and the emails to send once it is committed.
#[derive(Debug)]
pub struct BookingChange {
    pub booking: Booking,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub completed: usize,
    pub amount_mismatches: usize,
    pub failed: usize,
    pub groups_completed: usize,
}

/// Schedules a customer can still book with the partner.
///
/// Past slots are returned too; hiding them is left to the client.
pub fn available_schedules(
    conn: &Connection,
    partner_id: &str,
    from: NaiveDate,
    to: Option<NaiveDate>,
    now: NaiveDateTime,
) -> Result<Vec<ScheduleView>, AppError> {
    let partner = queries::get_partner(conn, partner_id)?
        .ok_or_else(|| AppError::not_found("partner"))?;

    let suspended = queries::get_user(conn, &partner.user_id)?
        .is_some_and(|u| u.is_suspended_at(&now));
    if suspended || partner.status != PartnerStatus::Approved {
        return Ok(vec![]);
    }

    let schedules = queries::get_available_schedules(conn, partner_id, &from, to.as_ref())?;
    let active = queries::get_active_bookings_for_partner(conn, partner_id, None)?;

    let mut views = vec![];
    for schedule in schedules {
        let blocked = active.iter().any(|sb| {
            sb.schedule.id == schedule.id
                || overlaps(
                    &schedule.start_time,
                    &schedule.end_time,
                    &sb.schedule.start_time,
                    &sb.schedule.end_time,
                )
        });
        if blocked {
            continue;
        }

        let bookings = queries::get_bookings_for_schedule(conn, &schedule.id)?
            .into_iter()
            .map(|b| Occupancy {
                booking_id: b.id,
                status: b.status,
            })
            .collect();
        views.push(ScheduleView { schedule, bookings });
    }

    Ok(views)
}

/// Books every schedule in `schedule_ids` for the customer, or none of them.
pub fn create_booking(
    conn: &mut Connection,
    customer_id: &str,
    schedule_ids: &[String],
    now: NaiveDateTime,
) -> Result<Vec<Booking>, AppError> {
    if schedule_ids.is_empty() {
        return Err(AppError::Validation("scheduleIds must not be empty".into()));
    }
    let unique: HashSet<&String> = schedule_ids.iter().collect();
    if unique.len() != schedule_ids.len() {
        return Err(AppError::Validation("scheduleIds contains duplicates".into()));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let customer = queries::get_customer(&tx, customer_id)?
        .ok_or_else(|| AppError::not_found("customer"))?;
    let suspended = queries::get_user(&tx, &customer.user_id)?
        .is_some_and(|u| u.is_suspended_at(&now));
    if suspended {
        return Err(AppError::Suspended);
    }

    let mut created = Vec::with_capacity(schedule_ids.len());
    for schedule_id in schedule_ids {
        let schedule = queries::get_schedule(&tx, schedule_id)?
            .ok_or_else(|| AppError::not_found(format!("schedule {schedule_id}")))?;

        if !schedule.is_available
            || queries::get_bookings_for_schedule(&tx, schedule_id)?
                .iter()
                .any(|b| !b.status.is_terminal())
        {
            return Err(AppError::Conflict {
                message: "schedule is no longer available".into(),
                conflicting_id: Some(schedule.id),
            });
        }
        if schedule.start_time <= now {
            return Err(AppError::Validation("schedule has already started".into()));
        }

        let partner = queries::get_partner(&tx, &schedule.partner_id)?
            .ok_or_else(|| AppError::not_found("partner"))?;

        let report = check_time_conflict(
            &tx,
            &partner.id,
            &schedule.start_time,
            &schedule.end_time,
            None,
        )?;
        if report.has_conflict {
            tracing::info!(
                schedule_id = %schedule.id,
                conflicting = ?report.conflicting_booking_id(),
                "booking rejected, partner busy"
            );
            return Err(AppError::TimeConflict(
                "partner already has a booking at this time".into(),
            ));
        }

        let amount = settlement::booking_amount(schedule.duration_hours(), &partner);
        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id: customer.id.clone(),
            schedule_id: schedule.id.clone(),
            status: BookingStatus::PendingPayment,
            original_amount: amount,
            final_amount: amount,
            payment_info: PaymentInfo::default(),
            reject_reason: None,
            multi_player_booking_id: None,
            group_booking_id: None,
            service_type: ServiceType::Standard,
            created_at: now,
            updated_at: now,
        };
        queries::insert_booking(&tx, &booking)?;
        created.push(booking);
    }

    tx.commit()?;

    tracing::info!(customer_id, count = created.len(), "bookings created");
    Ok(created)
}

/// Payment confirmed by the gateway; the partner is asked to respond.
pub fn record_payment(
    conn: &mut Connection,
    booking_id: &str,
    paid_amount: Option<f64>,
    now: NaiveDateTime,
) -> Result<BookingChange, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let ScheduledBooking {
        mut booking,
        schedule,
    } = load(&tx, booking_id)?;

    booking.status = transition(booking.status, BookingAction::PaymentReceived)?;
    booking.payment_info.paid_amount = paid_amount.or(Some(booking.final_amount));
    booking.payment_info.paid_at = Some(now);
    booking.updated_at = now;
    queries::update_booking(&tx, &booking)?;

    let notifications = notify::to_partner(&tx, &booking, &schedule, NoticeKind::NewBooking)?
        .into_iter()
        .collect();

    tx.commit()?;

    tracing::info!(booking_id, "payment recorded");
    Ok(BookingChange {
        booking,
        notifications,
    })
}

pub fn respond_to_booking(
    conn: &mut Connection,
    booking_id: &str,
    partner_id: &str,
    decision: PartnerDecision,
    now: NaiveDateTime,
) -> Result<BookingChange, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let ScheduledBooking {
        mut booking,
        schedule,
    } = load(&tx, booking_id)?;
    if schedule.partner_id != partner_id {
        return Err(AppError::Forbidden("booking belongs to another partner".into()));
    }

    let kind = match decision {
        PartnerDecision::Accept => {
            // inside a group the partner only accepts their seat
            let action = if booking.multi_player_booking_id.is_some() {
                BookingAction::Accept
            } else {
                BookingAction::Confirm
            };
            booking.status = transition(booking.status, action)?;
            NoticeKind::Accepted
        }
        PartnerDecision::Reject { reason } => {
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(AppError::Validation("a reject reason is required".into()));
            }
            booking.status = transition(booking.status, BookingAction::PartnerReject)?;
            booking.reject_reason = Some(reason.to_string());
            NoticeKind::Rejected
        }
    };
    booking.updated_at = now;
    queries::update_booking(&tx, &booking)?;

    if let Some(group_id) = &booking.multi_player_booking_id {
        multi_player::activate_on_accept(&tx, group_id, booking.status, now)?;
    }

    let notifications = notify::to_customer(&tx, &booking, &schedule, kind)?
        .into_iter()
        .collect();

    tx.commit()?;

    tracing::info!(booking_id, partner_id, status = %booking.status, "partner responded");
    Ok(BookingChange {
        booking,
        notifications,
    })
}

pub fn cancel_booking(
    conn: &mut Connection,
    booking_id: &str,
    customer_id: &str,
    reason: &str,
    now: NaiveDateTime,
) -> Result<BookingChange, AppError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::Validation("a cancellation reason is required".into()));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let ScheduledBooking {
        mut booking,
        schedule,
    } = load(&tx, booking_id)?;
    if booking.customer_id != customer_id {
        return Err(AppError::Forbidden("booking belongs to another customer".into()));
    }
    if booking.multi_player_booking_id.is_some() {
        return Err(AppError::invalid_status(
            "booking is part of a multi-player group, use remove-partner instead",
        ));
    }
    if booking.status.is_terminal() {
        return Err(AppError::invalid_status(format!(
            "booking is already {}",
            booking.status
        )));
    }
    if now >= schedule.start_time - Duration::hours(CANCELLATION_CUTOFF_HOURS) {
        tracing::info!(booking_id, %now, start = %schedule.start_time, "cancellation too late");
        return Err(AppError::TooLate);
    }

    booking.status = transition(booking.status, BookingAction::Cancel)?;
    booking.updated_at = now;
    queries::update_booking(&tx, &booking)?;
    queries::insert_cancellation(&tx, &booking.id, customer_id, reason, &now)?;

    let notifications = notify::to_partner(&tx, &booking, &schedule, NoticeKind::Cancelled)?
        .into_iter()
        .collect();

    tx.commit()?;

    tracing::info!(booking_id, customer_id, "booking cancelled");
    Ok(BookingChange {
        booking,
        notifications,
    })
}

/// Closes every confirmed booking whose session has ended, then ended groups.
///
/// Each booking is its own savepoint: one bad row is logged and skipped.
pub fn complete_finished_bookings(
    conn: &mut Connection,
    now: NaiveDateTime,
) -> Result<CompletionSummary, AppError> {
    let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let due = queries::get_bookings_due_for_completion(&tx, &now)?;

    let mut summary = CompletionSummary::default();
    for ScheduledBooking { booking, .. } in due {
        let sp = tx.savepoint()?;
        match complete_one(&sp, booking, now) {
            Ok(status) => {
                sp.commit()?;
                if status == BookingStatus::CompletedWithAmountMismatch {
                    summary.amount_mismatches += 1;
                } else {
                    summary.completed += 1;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to complete booking, skipping");
                summary.failed += 1;
            }
        }
    }

    summary.groups_completed = multi_player::complete_ended_groups(&tx, now)?;
    tx.commit()?;

    tracing::info!(
        completed = summary.completed,
        mismatches = summary.amount_mismatches,
        failed = summary.failed,
        groups = summary.groups_completed,
        "completion sweep finished"
    );
    Ok(summary)
}

fn complete_one(
    conn: &Connection,
    mut booking: Booking,
    now: NaiveDateTime,
) -> Result<BookingStatus, AppError> {
    let mismatch = booking
        .payment_info
        .paid_amount
        .is_some_and(|paid| (paid - booking.final_amount).abs() > AMOUNT_TOLERANCE);
    let action = if mismatch {
        tracing::warn!(booking_id = %booking.id, "paid amount differs from final amount");
        BookingAction::CompleteWithMismatch
    } else {
        BookingAction::Complete
    };

    booking.status = transition(booking.status, action)?;
    booking.updated_at = now;
    queries::update_booking(conn, &booking)?;
    Ok(booking.status)
}

pub(crate) fn load(conn: &Connection, booking_id: &str) -> Result<ScheduledBooking, AppError> {
    queries::get_booking(conn, booking_id)?.ok_or_else(|| AppError::not_found("booking"))
}

pub(crate) fn transition(
    status: BookingStatus,
    action: BookingAction,
) -> Result<BookingStatus, AppError> {
    status
        .apply(action)
        .ok_or_else(|| AppError::invalid_status(format!("cannot {action:?} a {status} booking")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::*;

    #[test]
    fn test_double_booking_rejected() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let bob = seed_customer(&conn, "Bob");
        let dave = seed_customer(&conn, "Dave");
        let schedule = seed_schedule(&conn, &partner.id, "2030-06-16 10:00", "2030-06-16 11:00");
        let now = dt("2030-06-01 09:00");

        let created = create_booking(&mut conn, &bob.id, &[schedule.id.clone()], now).unwrap();
        assert_eq!(created[0].status, BookingStatus::PendingPayment);
        assert!((created[0].final_amount - 400.0).abs() < 1e-9);

        match create_booking(&mut conn, &dave.id, &[schedule.id.clone()], now) {
            Err(AppError::Conflict { conflicting_id, .. }) => {
                assert_eq!(conflicting_id, Some(schedule.id.clone()))
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_overlapping_schedule_of_same_partner_conflicts() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let bob = seed_customer(&conn, "Bob");
        let booked = seed_schedule(&conn, &partner.id, "2030-06-16 10:00", "2030-06-16 11:00");
        let overlapping = seed_schedule(&conn, &partner.id, "2030-06-16 10:30", "2030-06-16 11:30");
        seed_booking(&conn, &bob.id, &booked, BookingStatus::Confirmed);

        let result = create_booking(&mut conn, &bob.id, &[overlapping.id], dt("2030-06-01 09:00"));
        assert!(matches!(result, Err(AppError::TimeConflict(_))));
    }

    #[test]
    fn test_multi_schedule_booking_is_atomic() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let bob = seed_customer(&conn, "Bob");
        let free = seed_schedule(&conn, &partner.id, "2030-06-16 08:00", "2030-06-16 09:00");

        let result = create_booking(
            &mut conn,
            &bob.id,
            &[free.id.clone(), "missing".to_string()],
            dt("2030-06-01 09:00"),
        );
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(queries::get_bookings_for_schedule(&conn, &free.id).unwrap().is_empty());
    }

    #[test]
    fn test_suspended_customer_cannot_book() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let bob = seed_customer(&conn, "Bob");
        let schedule = seed_schedule(&conn, &partner.id, "2030-06-16 10:00", "2030-06-16 11:00");
        queries::set_user_suspension(&conn, &bob.user_id, None, "test").unwrap();

        let result = create_booking(&mut conn, &bob.id, &[schedule.id], dt("2030-06-01 09:00"));
        assert!(matches!(result, Err(AppError::Suspended)));
    }

    #[test]
    fn test_available_schedules_hide_occupied_and_overlapping() {
        let conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let bob = seed_customer(&conn, "Bob");
        let booked = seed_schedule(&conn, &partner.id, "2030-06-16 10:00", "2030-06-16 11:00");
        let overlapping = seed_schedule(&conn, &partner.id, "2030-06-16 10:30", "2030-06-16 11:30");
        let free = seed_schedule(&conn, &partner.id, "2030-06-16 11:30", "2030-06-16 12:30");
        let recycled = seed_schedule(&conn, &partner.id, "2030-06-16 14:00", "2030-06-16 15:00");
        seed_booking(&conn, &bob.id, &booked, BookingStatus::PaidWaitingPartnerConfirmation);
        seed_booking(&conn, &bob.id, &recycled, BookingStatus::Cancelled);

        let from = NaiveDate::from_ymd_opt(2030, 6, 16).unwrap();
        let views = available_schedules(&conn, &partner.id, from, None, dt("2030-06-01 09:00")).unwrap();
        let ids: Vec<&str> = views.iter().map(|v| v.schedule.id.as_str()).collect();

        assert!(!ids.contains(&booked.id.as_str()));
        assert!(!ids.contains(&overlapping.id.as_str()));
        assert!(ids.contains(&free.id.as_str()));
        assert!(ids.contains(&recycled.id.as_str()));

        let recycled_view = views.iter().find(|v| v.schedule.id == recycled.id).unwrap();
        assert_eq!(recycled_view.bookings[0].status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_suspended_partner_offers_nothing() {
        let conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        seed_schedule(&conn, &partner.id, "2030-06-16 10:00", "2030-06-16 11:00");
        let from = NaiveDate::from_ymd_opt(2030, 6, 1).unwrap();
        let now = dt("2030-06-01 09:00");

        queries::set_user_suspension(&conn, &partner.user_id, Some(&dt("2030-07-01 00:00")), "test")
            .unwrap();
        assert!(available_schedules(&conn, &partner.id, from, None, now).unwrap().is_empty());

        // expired suspension no longer hides the partner
        let later = dt("2030-07-02 00:00");
        assert_eq!(available_schedules(&conn, &partner.id, from, None, later).unwrap().len(), 1);

        assert!(matches!(
            available_schedules(&conn, "ghost", from, None, now),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_payment_accept_complete_flow() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let bob = seed_customer(&conn, "Bob");
        let schedule = seed_schedule(&conn, &partner.id, "2030-06-16 10:00", "2030-06-16 11:00");
        let now = dt("2030-06-01 09:00");

        let booking = create_booking(&mut conn, &bob.id, &[schedule.id], now).unwrap().remove(0);
        let paid = record_payment(&mut conn, &booking.id, None, now).unwrap();
        assert_eq!(paid.booking.status, BookingStatus::PaidWaitingPartnerConfirmation);
        assert_eq!(paid.notifications.len(), 1);
        assert_eq!(paid.notifications[0].to_email, "alice@example.com");

        let other = seed_partner(&conn, "Carol", 100.0);
        assert!(matches!(
            respond_to_booking(&mut conn, &booking.id, &other.id, PartnerDecision::Accept, now),
            Err(AppError::Forbidden(_))
        ));

        let accepted =
            respond_to_booking(&mut conn, &booking.id, &partner.id, PartnerDecision::Accept, now).unwrap();
        assert_eq!(accepted.booking.status, BookingStatus::Confirmed);
        assert_eq!(accepted.notifications[0].to_email, "bob@example.com");

        let summary = complete_finished_bookings(&mut conn, dt("2030-06-16 11:00")).unwrap();
        assert_eq!(summary.completed, 1);
        let done = queries::get_booking(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(done.booking.status, BookingStatus::Completed);
    }

    #[test]
    fn test_reject_requires_reason() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let bob = seed_customer(&conn, "Bob");
        let schedule = seed_schedule(&conn, &partner.id, "2030-06-16 10:00", "2030-06-16 11:00");
        let booking = seed_booking(&conn, &bob.id, &schedule, BookingStatus::PaidWaitingPartnerConfirmation);
        let now = dt("2030-06-01 09:00");

        let blank = PartnerDecision::Reject { reason: "  ".into() };
        assert!(matches!(
            respond_to_booking(&mut conn, &booking.id, &partner.id, blank, now),
            Err(AppError::Validation(_))
        ));

        let busy = PartnerDecision::Reject { reason: "busy that day".into() };
        let rejected = respond_to_booking(&mut conn, &booking.id, &partner.id, busy, now).unwrap();
        assert_eq!(rejected.booking.status, BookingStatus::PartnerRejected);
        assert_eq!(rejected.booking.reject_reason.as_deref(), Some("busy that day"));

        // a rejected schedule is bookable again
        assert!(check_time_conflict(&conn, &partner.id, &schedule.start_time, &schedule.end_time, None)
            .unwrap()
            .conflicts
            .is_empty());
    }

    #[test]
    fn test_cancel_window_and_ownership() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let bob = seed_customer(&conn, "Bob");
        let dave = seed_customer(&conn, "Dave");
        let schedule = seed_schedule(&conn, &partner.id, "2030-06-16 10:00", "2030-06-16 11:00");
        let booking = seed_booking(&conn, &bob.id, &schedule, BookingStatus::Confirmed);

        assert!(matches!(
            cancel_booking(&mut conn, &booking.id, &dave.id, "changed plans", dt("2030-06-16 07:00")),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            cancel_booking(&mut conn, &booking.id, &bob.id, "changed plans", dt("2030-06-16 09:30")),
            Err(AppError::TooLate)
        ));
        assert!(matches!(
            cancel_booking(&mut conn, &booking.id, &bob.id, "changed plans", dt("2030-06-16 08:00")),
            Err(AppError::TooLate)
        ));

        let cancelled =
            cancel_booking(&mut conn, &booking.id, &bob.id, "changed plans", dt("2030-06-16 07:59")).unwrap();
        assert_eq!(cancelled.booking.status, BookingStatus::Cancelled);
        let audit: i64 = conn
            .query_row("SELECT COUNT(*) FROM booking_cancellations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(audit, 1);

        assert!(matches!(
            cancel_booking(&mut conn, &booking.id, &bob.id, "again", dt("2030-06-16 07:00")),
            Err(AppError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_cancel_refuses_group_members() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let bob = seed_customer(&conn, "Bob");
        let schedule = seed_schedule(&conn, &partner.id, "2030-06-16 14:00", "2030-06-16 15:00");
        let morning = dt("2030-06-02 09:00");

        let created = multi_player::create_multi_player_booking(
            &mut conn,
            &bob.id,
            dt("2030-06-16 14:00"),
            dt("2030-06-16 15:00"),
            &[schedule.id.clone()],
            morning,
        )
        .unwrap();
        let booking_id = created.bookings[0].id.clone();
        respond_to_booking(&mut conn, &booking_id, &partner.id, PartnerDecision::Accept, morning).unwrap();

        assert!(matches!(
            cancel_booking(&mut conn, &booking_id, &bob.id, "changed plans", morning),
            Err(AppError::InvalidStatus(_))
        ));

        let stored = queries::get_booking(&conn, &booking_id).unwrap().unwrap().booking;
        assert_eq!(stored.status, BookingStatus::PartnerAccepted);
        let customer = queries::get_customer(&conn, &bob.id).unwrap().unwrap();
        assert_eq!(customer.violation_count, 0);
        let audit: i64 = conn
            .query_row("SELECT COUNT(*) FROM booking_cancellations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(audit, 0);
    }

    #[test]
    fn test_completion_flags_amount_mismatch() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let bob = seed_customer(&conn, "Bob");
        let schedule = seed_schedule(&conn, &partner.id, "2030-06-16 10:00", "2030-06-16 11:00");
        let pending = seed_schedule(&conn, &partner.id, "2030-06-16 12:00", "2030-06-16 13:00");
        let mut booking = seed_booking(&conn, &bob.id, &schedule, BookingStatus::Confirmed);
        booking.payment_info.paid_amount = Some(80.0);
        queries::update_booking(&conn, &booking).unwrap();
        seed_booking(&conn, &bob.id, &pending, BookingStatus::PendingPayment);

        let summary = complete_finished_bookings(&mut conn, dt("2030-06-16 14:00")).unwrap();
        assert_eq!(summary.amount_mismatches, 1);
        assert_eq!(summary.completed, 0);

        let done = queries::get_booking(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(done.booking.status, BookingStatus::CompletedWithAmountMismatch);
    }
}
