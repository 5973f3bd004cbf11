use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::{AppError, ScheduleCollision};
use crate::models::schedule::{parse_date, parse_datetime};
use crate::models::{Schedule, ScheduleInput};
use crate::services::overlap::overlaps;

/// Upper bound on weekly repetitions of a single schedule.
pub const MAX_RECURRING_WEEKS: u32 = 52;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCreated {
    pub schedule: Schedule,
    /// Weekly siblings actually written (colliding weeks are skipped).
    pub recurring_created: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreated {
    pub schedules: Vec<Schedule>,
    pub skipped_duplicates: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePatch {
    pub is_available: Option<bool>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleRemoval {
    Deleted,
    /// Booking history references the schedule, so it is only hidden.
    Archived,
}

fn parse_input(input: &ScheduleInput) -> Result<(NaiveDate, NaiveDateTime, NaiveDateTime), AppError> {
    let (date, start, end) = input
        .parse()
        .ok_or_else(|| AppError::Validation("invalid date or time".into()))?;
    if end <= start {
        return Err(AppError::Validation("end time must be after start time".into()));
    }
    Ok((date, start, end))
}

fn new_schedule(
    partner_id: &str,
    date: NaiveDate,
    start: NaiveDateTime,
    end: NaiveDateTime,
    now: NaiveDateTime,
) -> Schedule {
    Schedule {
        id: uuid::Uuid::new_v4().to_string(),
        partner_id: partner_id.to_string(),
        date,
        start_time: start,
        end_time: end,
        is_available: true,
        created_at: now,
        updated_at: now,
    }
}

/// First schedule of the partner on `date` that overlaps `[start, end)`.
fn find_overlap(
    conn: &Connection,
    partner_id: &str,
    date: &NaiveDate,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    exclude_id: Option<&str>,
) -> anyhow::Result<Option<Schedule>> {
    let same_day = queries::get_schedules_for_partner_between(conn, partner_id, date, date)?;
    Ok(same_day
        .into_iter()
        .filter(|s| Some(s.id.as_str()) != exclude_id)
        .find(|s| overlaps(start, end, &s.start_time, &s.end_time)))
}

fn ensure_partner(conn: &Connection, partner_id: &str) -> Result<(), AppError> {
    queries::get_partner(conn, partner_id)?
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("partner"))
}

pub fn create_schedule(
    conn: &mut Connection,
    partner_id: &str,
    input: &ScheduleInput,
    recurring_weeks: Option<u32>,
    now: NaiveDateTime,
) -> Result<ScheduleCreated, AppError> {
    let weeks = recurring_weeks.unwrap_or(1);
    if weeks == 0 || weeks > MAX_RECURRING_WEEKS {
        return Err(AppError::Validation(format!(
            "recurringWeeks must be between 1 and {MAX_RECURRING_WEEKS}"
        )));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    ensure_partner(&tx, partner_id)?;
    let (date, start, end) = parse_input(input)?;

    if let Some(existing) = find_overlap(&tx, partner_id, &date, &start, &end, None)? {
        tracing::info!(partner_id, existing_id = %existing.id, "schedule overlaps existing schedule");
        return Err(AppError::Conflict {
            message: "schedule overlaps an existing schedule".into(),
            conflicting_id: Some(existing.id),
        });
    }

    let schedule = new_schedule(partner_id, date, start, end, now);
    queries::insert_schedule(&tx, &schedule)?;

    let mut recurring_created = 0;
    for week in 1..weeks {
        let shift = Duration::weeks(week as i64);
        let (d, s, e) = (date + shift, start + shift, end + shift);

        if let Some(existing) = find_overlap(&tx, partner_id, &d, &s, &e, None)? {
            tracing::debug!(partner_id, week, existing_id = %existing.id, "skipping recurring week");
            continue;
        }
        if queries::insert_schedule(&tx, &new_schedule(partner_id, d, s, e, now))? {
            recurring_created += 1;
        }
    }

    tx.commit()?;

    tracing::info!(partner_id, schedule_id = %schedule.id, recurring_created, "schedule created");
    Ok(ScheduleCreated {
        schedule,
        recurring_created,
    })
}

/// All-or-nothing: any collision with an existing schedule aborts the whole batch.
pub fn create_schedules_batch(
    conn: &mut Connection,
    partner_id: &str,
    inputs: &[ScheduleInput],
    now: NaiveDateTime,
) -> Result<BatchCreated, AppError> {
    let mut candidates = inputs
        .iter()
        .filter(|i| i.is_complete())
        .map(parse_input)
        .collect::<Result<Vec<_>, _>>()?;

    if candidates.is_empty() {
        return Err(AppError::Validation("no complete schedules in request".into()));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    ensure_partner(&tx, partner_id)?;

    let (mut min_date, mut max_date) = (candidates[0].0, candidates[0].0);
    for (date, _, _) in &candidates {
        min_date = min_date.min(*date);
        max_date = max_date.max(*date);
    }
    let existing = queries::get_schedules_for_partner_between(&tx, partner_id, &min_date, &max_date)?;

    let mut collisions = vec![];
    for (date, start, end) in &candidates {
        for s in existing.iter().filter(|s| s.date == *date) {
            if overlaps(start, end, &s.start_time, &s.end_time) {
                collisions.push(ScheduleCollision {
                    existing_schedule_id: s.id.clone(),
                    existing_start: s.start_time,
                    existing_end: s.end_time,
                    candidate_start: *start,
                    candidate_end: *end,
                });
            }
        }
    }
    if !collisions.is_empty() {
        tracing::info!(partner_id, count = collisions.len(), "batch rejected, duplicates found");
        return Err(AppError::Duplicated(collisions));
    }

    candidates.sort_by_key(|c| (c.1, c.2));
    let before = candidates.len();
    candidates.dedup();
    let skipped_duplicates = before - candidates.len();

    for pair in candidates.windows(2) {
        let (_, a_start, a_end) = pair[0];
        let (_, b_start, b_end) = pair[1];
        if overlaps(&a_start, &a_end, &b_start, &b_end) {
            return Err(AppError::Validation(format!(
                "schedules in request overlap: {a_start} and {b_start}"
            )));
        }
    }

    let mut schedules = Vec::with_capacity(candidates.len());
    for (date, start, end) in candidates {
        let schedule = new_schedule(partner_id, date, start, end, now);
        if queries::insert_schedule(&tx, &schedule)? {
            schedules.push(schedule);
        }
    }

    tx.commit()?;

    tracing::info!(partner_id, created = schedules.len(), "schedule batch created");
    Ok(BatchCreated {
        schedules,
        skipped_duplicates,
    })
}

pub fn update_schedule(
    conn: &mut Connection,
    partner_id: &str,
    schedule_id: &str,
    patch: &SchedulePatch,
    now: NaiveDateTime,
) -> Result<Schedule, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut schedule = queries::get_schedule(&tx, schedule_id)?
        .ok_or_else(|| AppError::not_found("schedule"))?;
    if schedule.partner_id != partner_id {
        return Err(AppError::Forbidden("schedule belongs to another partner".into()));
    }

    let parse_err = || AppError::Validation("invalid date or time".into());
    let date = match &patch.date {
        Some(d) => parse_date(d).ok_or_else(parse_err)?,
        None => schedule.date,
    };
    let start = match &patch.start_time {
        Some(s) => parse_datetime(s).ok_or_else(parse_err)?,
        None => schedule.start_time,
    };
    let end = match &patch.end_time {
        Some(e) => parse_datetime(e).ok_or_else(parse_err)?,
        None => schedule.end_time,
    };

    if date != schedule.date || !schedule.same_window(&start, &end) {
        if end <= start {
            return Err(AppError::Validation("end time must be after start time".into()));
        }
        if has_live_booking(&tx, schedule_id)? {
            return Err(AppError::ScheduleAlreadyBooked);
        }
        if let Some(existing) = find_overlap(&tx, partner_id, &date, &start, &end, Some(schedule_id))? {
            return Err(AppError::Conflict {
                message: "schedule overlaps an existing schedule".into(),
                conflicting_id: Some(existing.id),
            });
        }
        schedule.date = date;
        schedule.start_time = start;
        schedule.end_time = end;
    }

    if let Some(available) = patch.is_available {
        schedule.is_available = available;
    }
    schedule.updated_at = now;

    queries::update_schedule(&tx, &schedule)?;
    tx.commit()?;

    Ok(schedule)
}

pub fn delete_schedule(
    conn: &mut Connection,
    partner_id: &str,
    schedule_id: &str,
    now: NaiveDateTime,
) -> Result<ScheduleRemoval, AppError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut schedule = queries::get_schedule(&tx, schedule_id)?
        .ok_or_else(|| AppError::not_found("schedule"))?;
    if schedule.partner_id != partner_id {
        return Err(AppError::Forbidden("schedule belongs to another partner".into()));
    }

    let bookings = queries::get_bookings_for_schedule(&tx, schedule_id)?;
    if bookings.iter().any(|b| !b.status.is_terminal()) {
        return Err(AppError::ScheduleAlreadyBooked);
    }

    let removal = if bookings.is_empty() {
        queries::delete_schedule(&tx, schedule_id)?;
        ScheduleRemoval::Deleted
    } else {
        schedule.is_available = false;
        schedule.updated_at = now;
        queries::update_schedule(&tx, &schedule)?;
        ScheduleRemoval::Archived
    };

    tx.commit()?;
    tracing::info!(partner_id, schedule_id, ?removal, "schedule removed");
    Ok(removal)
}

fn has_live_booking(conn: &Connection, schedule_id: &str) -> anyhow::Result<bool> {
    Ok(queries::get_bookings_for_schedule(conn, schedule_id)?
        .iter()
        .any(|b| !b.status.is_terminal()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use crate::services::test_support::*;

    fn input(date: &str, start: &str, end: &str) -> ScheduleInput {
        ScheduleInput::new(date, &format!("{date} {start}"), &format!("{date} {end}"))
    }

    fn count_schedules(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM schedules", [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_create_single_schedule() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let created = create_schedule(
            &mut conn,
            &partner.id,
            &input("2030-06-16", "10:00", "11:00"),
            None,
            dt("2030-06-01 09:00"),
        )
        .unwrap();
        assert_eq!(created.schedule.start_time, dt("2030-06-16 10:00"));
        assert_eq!(created.recurring_created, 0);
    }

    #[test]
    fn test_create_rejects_unknown_partner_and_bad_dates() {
        let mut conn = setup_db();
        let now = dt("2030-06-01 09:00");
        let result = create_schedule(&mut conn, "ghost", &input("2030-06-16", "10:00", "11:00"), None, now);
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let partner = seed_partner(&conn, "Alice", 200.0);
        let bad = ScheduleInput::new("2030-06-16", "not a time", "2030-06-16 11:00");
        assert!(matches!(
            create_schedule(&mut conn, &partner.id, &bad, None, now),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            create_schedule(&mut conn, &partner.id, &input("2030-06-16", "11:00", "10:00"), None, now),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_create_reports_conflicting_schedule() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let existing = seed_schedule(&conn, &partner.id, "2030-06-16 10:00", "2030-06-16 11:00");

        let result = create_schedule(
            &mut conn,
            &partner.id,
            &input("2030-06-16", "10:30", "11:30"),
            None,
            dt("2030-06-01 09:00"),
        );
        match result {
            Err(AppError::Conflict { conflicting_id, .. }) => {
                assert_eq!(conflicting_id, Some(existing.id))
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        // touching is fine
        create_schedule(
            &mut conn,
            &partner.id,
            &input("2030-06-16", "11:00", "12:00"),
            None,
            dt("2030-06-01 09:00"),
        )
        .unwrap();
    }

    #[test]
    fn test_recurring_skips_colliding_weeks() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        // occupies the third week
        seed_schedule(&conn, &partner.id, "2030-06-30 10:30", "2030-06-30 11:30");

        let created = create_schedule(
            &mut conn,
            &partner.id,
            &input("2030-06-16", "10:00", "11:00"),
            Some(4),
            dt("2030-06-01 09:00"),
        )
        .unwrap();
        assert_eq!(created.recurring_created, 2);
        assert_eq!(count_schedules(&conn), 4);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let existing = seed_schedule(&conn, &partner.id, "2030-06-17 10:00", "2030-06-17 11:00");

        let result = create_schedules_batch(
            &mut conn,
            &partner.id,
            &[
                input("2030-06-16", "10:00", "11:00"),
                input("2030-06-17", "10:30", "11:30"),
            ],
            dt("2030-06-01 09:00"),
        );
        match result {
            Err(AppError::Duplicated(collisions)) => {
                assert_eq!(collisions.len(), 1);
                assert_eq!(collisions[0].existing_schedule_id, existing.id);
            }
            other => panic!("expected duplicated, got {other:?}"),
        }
        assert_eq!(count_schedules(&conn), 1);
    }

    #[test]
    fn test_batch_filters_incomplete_and_dedups() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let created = create_schedules_batch(
            &mut conn,
            &partner.id,
            &[
                input("2030-06-16", "10:00", "11:00"),
                input("2030-06-16", "10:00", "11:00"),
                ScheduleInput {
                    date: Some("2030-06-16".into()),
                    ..Default::default()
                },
                input("2030-06-18", "14:00", "15:00"),
            ],
            dt("2030-06-01 09:00"),
        )
        .unwrap();
        assert_eq!(created.schedules.len(), 2);
        assert_eq!(created.skipped_duplicates, 1);

        let empty = create_schedules_batch(&mut conn, &partner.id, &[ScheduleInput::default()], dt("2030-06-01 09:00"));
        assert!(matches!(empty, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_batch_rejects_self_overlap() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let result = create_schedules_batch(
            &mut conn,
            &partner.id,
            &[
                input("2030-06-16", "10:00", "11:00"),
                input("2030-06-16", "10:30", "11:30"),
            ],
            dt("2030-06-01 09:00"),
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(count_schedules(&conn), 0);
    }

    #[test]
    fn test_update_checks_owner_bookings_and_overlap() {
        let mut conn = setup_db();
        let alice = seed_partner(&conn, "Alice", 200.0);
        let carol = seed_partner(&conn, "Carol", 200.0);
        let customer = seed_customer(&conn, "Bob");
        let s1 = seed_schedule(&conn, &alice.id, "2030-06-16 10:00", "2030-06-16 11:00");
        let s2 = seed_schedule(&conn, &alice.id, "2030-06-16 12:00", "2030-06-16 13:00");
        let now = dt("2030-06-01 09:00");

        let toggle = SchedulePatch {
            is_available: Some(false),
            ..Default::default()
        };
        assert!(matches!(
            update_schedule(&mut conn, &carol.id, &s1.id, &toggle, now),
            Err(AppError::Forbidden(_))
        ));
        let updated = update_schedule(&mut conn, &alice.id, &s1.id, &toggle, now).unwrap();
        assert!(!updated.is_available);

        // moving onto its own window is not a conflict with itself
        let shift = SchedulePatch {
            start_time: Some("2030-06-16 10:30".into()),
            end_time: Some("2030-06-16 11:30".into()),
            ..Default::default()
        };
        update_schedule(&mut conn, &alice.id, &s1.id, &shift, now).unwrap();

        let onto_s1 = SchedulePatch {
            start_time: Some("2030-06-16 11:00".into()),
            end_time: Some("2030-06-16 12:30".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_schedule(&mut conn, &alice.id, &s2.id, &onto_s1, now),
            Err(AppError::Conflict { .. })
        ));

        seed_booking(&conn, &customer.id, &s2, BookingStatus::PendingPayment);
        let later = SchedulePatch {
            start_time: Some("2030-06-16 15:00".into()),
            end_time: Some("2030-06-16 16:00".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_schedule(&mut conn, &alice.id, &s2.id, &later, now),
            Err(AppError::ScheduleAlreadyBooked)
        ));
    }

    #[test]
    fn test_delete_archives_booked_history() {
        let mut conn = setup_db();
        let partner = seed_partner(&conn, "Alice", 200.0);
        let customer = seed_customer(&conn, "Bob");
        let free = seed_schedule(&conn, &partner.id, "2030-06-16 10:00", "2030-06-16 11:00");
        let live = seed_schedule(&conn, &partner.id, "2030-06-16 12:00", "2030-06-16 13:00");
        let history = seed_schedule(&conn, &partner.id, "2030-06-16 14:00", "2030-06-16 15:00");
        seed_booking(&conn, &customer.id, &live, BookingStatus::Confirmed);
        seed_booking(&conn, &customer.id, &history, BookingStatus::Cancelled);
        let now = dt("2030-06-01 09:00");

        assert_eq!(
            delete_schedule(&mut conn, &partner.id, &free.id, now).unwrap(),
            ScheduleRemoval::Deleted
        );
        assert!(matches!(
            delete_schedule(&mut conn, &partner.id, &live.id, now),
            Err(AppError::ScheduleAlreadyBooked)
        ));
        assert_eq!(
            delete_schedule(&mut conn, &partner.id, &history.id, now).unwrap(),
            ScheduleRemoval::Archived
        );
        assert!(!queries::get_schedule(&conn, &history.id).unwrap().unwrap().is_available);
    }
}
