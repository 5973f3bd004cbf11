use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{
    Booking, BookingStatus, Customer, MultiPlayerBooking, MultiPlayerStatus, Partner,
    PartnerStatus, PaymentInfo, Role, Schedule, ScheduledBooking, ServiceType, User,
    Violation, WithdrawalRequest, WithdrawalStatus, DATE_FORMAT, TIMESTAMP_FORMAT,
};

const SCHEDULE_COLUMNS: &str =
    "s.id, s.partner_id, s.date, s.start_time, s.end_time, s.is_available, s.created_at, s.updated_at";

const BOOKING_COLUMNS: &str = "b.id, b.customer_id, b.schedule_id, b.status, b.original_amount, \
     b.final_amount, b.payment_info, b.reject_reason, b.multi_player_booking_id, \
     b.group_booking_id, b.service_type, b.created_at, b.updated_at";
const BOOKING_COLUMN_COUNT: usize = 13;

const MULTI_PLAYER_COLUMNS: &str = "id, customer_id, start_time, end_time, status, total_amount, \
     last_adjustment_at, created_at, updated_at";

fn ts(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid timestamp in database: {s}"))
}

fn parse_opt_ts(s: Option<String>) -> anyhow::Result<Option<NaiveDateTime>> {
    s.as_deref().map(parse_ts).transpose()
}

/// SQL list literal of terminal statuses, e.g. `('CANCELLED', ...)`.
fn terminal_status_list() -> String {
    let quoted: Vec<String> = BookingStatus::TERMINAL
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect();
    format!("({})", quoted.join(", "))
}

fn collect<T>(
    rows: impl Iterator<Item = rusqlite::Result<anyhow::Result<T>>>,
) -> anyhow::Result<Vec<T>> {
    let mut out = vec![];
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

// ── Users & Customers ──

pub fn insert_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, role, is_suspended, suspension_ends_at, suspension_reason)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id,
            user.name,
            user.email,
            user.role.as_str(),
            user.is_suspended,
            user.suspension_ends_at.as_ref().map(ts),
            user.suspension_reason,
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let row = conn
        .query_row(
            "SELECT id, name, email, role, is_suspended, suspension_ends_at, suspension_reason
             FROM users WHERE id = ?1",
            params![id],
            |row| Ok(parse_user_row(row)),
        )
        .optional()?;
    row.transpose()
}

pub fn set_user_suspension(
    conn: &Connection,
    user_id: &str,
    ends_at: Option<&NaiveDateTime>,
    reason: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE users SET is_suspended = 1, suspension_ends_at = ?1, suspension_reason = ?2 WHERE id = ?3",
        params![ends_at.map(ts), reason, user_id],
    )?;
    Ok(())
}

fn parse_user_row(row: &Row) -> anyhow::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: Role::parse(&role).with_context(|| format!("unknown role: {role}"))?,
        is_suspended: row.get(4)?,
        suspension_ends_at: parse_opt_ts(row.get(5)?)?,
        suspension_reason: row.get(6)?,
    })
}

pub fn insert_customer(conn: &Connection, customer: &Customer) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO customers (id, user_id, violation_count, violations) VALUES (?1, ?2, ?3, ?4)",
        params![
            customer.id,
            customer.user_id,
            customer.violation_count,
            serde_json::to_string(&customer.violations)?,
        ],
    )?;
    Ok(())
}

pub fn get_customer(conn: &Connection, id: &str) -> anyhow::Result<Option<Customer>> {
    get_customer_where(conn, "id", id)
}

pub fn get_customer_by_user(conn: &Connection, user_id: &str) -> anyhow::Result<Option<Customer>> {
    get_customer_where(conn, "user_id", user_id)
}

fn get_customer_where(conn: &Connection, column: &str, value: &str) -> anyhow::Result<Option<Customer>> {
    let sql = format!(
        "SELECT id, user_id, violation_count, violations FROM customers WHERE {column} = ?1"
    );
    let row = conn
        .query_row(&sql, params![value], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .optional()?;

    match row {
        Some((id, user_id, violation_count, violations_json)) => {
            let violations: Vec<Violation> = serde_json::from_str(&violations_json)
                .context("invalid violations log")?;
            Ok(Some(Customer {
                id,
                user_id,
                violation_count,
                violations,
            }))
        }
        None => Ok(None),
    }
}

pub fn update_customer_violations(conn: &Connection, customer: &Customer) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE customers SET violation_count = ?1, violations = ?2 WHERE id = ?3",
        params![
            customer.violation_count,
            serde_json::to_string(&customer.violations)?,
            customer.id,
        ],
    )?;
    Ok(())
}

// ── Partners ──

const PARTNER_SELECT: &str = "SELECT id, user_id, name, status, half_hourly_rate, referral_platform_fee, \
     invited_by, referral_earnings FROM partners";

pub fn insert_partner(conn: &Connection, partner: &Partner) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO partners (id, user_id, name, status, half_hourly_rate, referral_platform_fee, invited_by, referral_earnings)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            partner.id,
            partner.user_id,
            partner.name,
            partner.status.as_str(),
            partner.half_hourly_rate,
            partner.referral_platform_fee,
            partner.invited_by,
            partner.referral_earnings,
        ],
    )?;
    Ok(())
}

pub fn get_partner(conn: &Connection, id: &str) -> anyhow::Result<Option<Partner>> {
    let sql = format!("{PARTNER_SELECT} WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id], |row| Ok(parse_partner_row(row)))
        .optional()?;
    row.transpose()
}

pub fn get_partner_by_user(conn: &Connection, user_id: &str) -> anyhow::Result<Option<Partner>> {
    let sql = format!("{PARTNER_SELECT} WHERE user_id = ?1");
    let row = conn
        .query_row(&sql, params![user_id], |row| Ok(parse_partner_row(row)))
        .optional()?;
    row.transpose()
}

fn parse_partner_row(row: &Row) -> anyhow::Result<Partner> {
    let status: String = row.get(3)?;
    Ok(Partner {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        status: PartnerStatus::parse(&status)
            .with_context(|| format!("unknown partner status: {status}"))?,
        half_hourly_rate: row.get(4)?,
        referral_platform_fee: row.get(5)?,
        invited_by: row.get(6)?,
        referral_earnings: row.get(7)?,
    })
}

// ── Schedules ──

/// Inserts unless an identical (partner, start, end) row exists.
/// Returns whether a row was written.
pub fn insert_schedule(conn: &Connection, schedule: &Schedule) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT OR IGNORE INTO schedules (id, partner_id, date, start_time, end_time, is_available, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            schedule.id,
            schedule.partner_id,
            schedule.date.format(DATE_FORMAT).to_string(),
            ts(&schedule.start_time),
            ts(&schedule.end_time),
            schedule.is_available,
            ts(&schedule.created_at),
            ts(&schedule.updated_at),
        ],
    )?;
    Ok(count > 0)
}

pub fn get_schedule(conn: &Connection, id: &str) -> anyhow::Result<Option<Schedule>> {
    let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules s WHERE s.id = ?1");
    let row = conn
        .query_row(&sql, params![id], |row| Ok(parse_schedule_row(row, 0)))
        .optional()?;
    row.transpose()
}

/// All of a partner's schedules whose calendar date falls in `[from, to]`.
pub fn get_schedules_for_partner_between(
    conn: &Connection,
    partner_id: &str,
    from: &NaiveDate,
    to: &NaiveDate,
) -> anyhow::Result<Vec<Schedule>> {
    let sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules s
         WHERE s.partner_id = ?1 AND s.date >= ?2 AND s.date <= ?3
         ORDER BY s.start_time ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            partner_id,
            from.format(DATE_FORMAT).to_string(),
            to.format(DATE_FORMAT).to_string()
        ],
        |row| Ok(parse_schedule_row(row, 0)),
    )?;
    collect(rows)
}

/// Schedules flagged available, optionally bounded by calendar date.
pub fn get_available_schedules(
    conn: &Connection,
    partner_id: &str,
    from: &NaiveDate,
    to: Option<&NaiveDate>,
) -> anyhow::Result<Vec<Schedule>> {
    let upper = to
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "9999-12-31".to_string());
    let sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules s
         WHERE s.partner_id = ?1 AND s.is_available = 1 AND s.date >= ?2 AND s.date <= ?3
         ORDER BY s.date ASC, s.start_time ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![partner_id, from.format(DATE_FORMAT).to_string(), upper],
        |row| Ok(parse_schedule_row(row, 0)),
    )?;
    collect(rows)
}

pub fn update_schedule(conn: &Connection, schedule: &Schedule) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE schedules SET date = ?1, start_time = ?2, end_time = ?3, is_available = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            schedule.date.format(DATE_FORMAT).to_string(),
            ts(&schedule.start_time),
            ts(&schedule.end_time),
            schedule.is_available,
            ts(&schedule.updated_at),
            schedule.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_schedule(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM schedules WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

fn parse_schedule_row(row: &Row, base: usize) -> anyhow::Result<Schedule> {
    let date_str: String = row.get(base + 2)?;
    let start_str: String = row.get(base + 3)?;
    let end_str: String = row.get(base + 4)?;
    let created_str: String = row.get(base + 6)?;
    let updated_str: String = row.get(base + 7)?;

    Ok(Schedule {
        id: row.get(base)?,
        partner_id: row.get(base + 1)?,
        date: NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
            .with_context(|| format!("invalid schedule date: {date_str}"))?,
        start_time: parse_ts(&start_str)?,
        end_time: parse_ts(&end_str)?,
        is_available: row.get(base + 5)?,
        created_at: parse_ts(&created_str)?,
        updated_at: parse_ts(&updated_str)?,
    })
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, customer_id, schedule_id, status, original_amount, final_amount, payment_info,
                               reject_reason, multi_player_booking_id, group_booking_id, service_type, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            booking.id,
            booking.customer_id,
            booking.schedule_id,
            booking.status.as_str(),
            booking.original_amount,
            booking.final_amount,
            serde_json::to_string(&booking.payment_info)?,
            booking.reject_reason,
            booking.multi_player_booking_id,
            booking.group_booking_id,
            booking.service_type.as_str(),
            ts(&booking.created_at),
            ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

/// Persists the mutable part of a booking.
pub fn update_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, original_amount = ?2, final_amount = ?3, payment_info = ?4,
                             reject_reason = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            booking.status.as_str(),
            booking.original_amount,
            booking.final_amount,
            serde_json::to_string(&booking.payment_info)?,
            booking.reject_reason,
            ts(&booking.updated_at),
            booking.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<ScheduledBooking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, {SCHEDULE_COLUMNS}
         FROM bookings b JOIN schedules s ON s.id = b.schedule_id
         WHERE b.id = ?1"
    );
    let row = conn
        .query_row(&sql, params![id], |row| Ok(parse_scheduled_booking_row(row)))
        .optional()?;
    row.transpose()
}

/// Every booking on the partner's schedules that still occupies its slot.
pub fn get_active_bookings_for_partner(
    conn: &Connection,
    partner_id: &str,
    exclude_booking_id: Option<&str>,
) -> anyhow::Result<Vec<ScheduledBooking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, {SCHEDULE_COLUMNS}
         FROM bookings b JOIN schedules s ON s.id = b.schedule_id
         WHERE s.partner_id = ?1 AND b.status NOT IN {} AND (?2 IS NULL OR b.id != ?2)
         ORDER BY s.start_time ASC",
        terminal_status_list()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![partner_id, exclude_booking_id], |row| {
        Ok(parse_scheduled_booking_row(row))
    })?;
    collect(rows)
}

pub fn get_bookings_for_schedule(conn: &Connection, schedule_id: &str) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.schedule_id = ?1 ORDER BY b.created_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![schedule_id], |row| Ok(parse_booking_row(row, 0)))?;
    collect(rows)
}

pub fn get_bookings_for_group(conn: &Connection, group_id: &str) -> anyhow::Result<Vec<ScheduledBooking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, {SCHEDULE_COLUMNS}
         FROM bookings b JOIN schedules s ON s.id = b.schedule_id
         WHERE b.multi_player_booking_id = ?1
         ORDER BY b.created_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![group_id], |row| Ok(parse_scheduled_booking_row(row)))?;
    collect(rows)
}

/// Confirmed bookings whose session has ended by `now`.
pub fn get_bookings_due_for_completion(
    conn: &Connection,
    now: &NaiveDateTime,
) -> anyhow::Result<Vec<ScheduledBooking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, {SCHEDULE_COLUMNS}
         FROM bookings b JOIN schedules s ON s.id = b.schedule_id
         WHERE b.status IN ('{}', '{}') AND s.end_time <= ?1
         ORDER BY s.end_time ASC",
        BookingStatus::Confirmed.as_str(),
        BookingStatus::PartnerAccepted.as_str(),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![ts(now)], |row| Ok(parse_scheduled_booking_row(row)))?;
    collect(rows)
}

/// A confirmed booking of the partner whose window contains `now`.
pub fn get_in_progress_booking(
    conn: &Connection,
    partner_id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<Option<ScheduledBooking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, {SCHEDULE_COLUMNS}
         FROM bookings b JOIN schedules s ON s.id = b.schedule_id
         WHERE s.partner_id = ?1 AND s.start_time <= ?2 AND s.end_time >= ?2
           AND b.status IN ('{}', '{}')
         LIMIT 1",
        BookingStatus::Confirmed.as_str(),
        BookingStatus::PartnerAccepted.as_str(),
    );
    let row = conn
        .query_row(&sql, params![partner_id, ts(now)], |row| {
            Ok(parse_scheduled_booking_row(row))
        })
        .optional()?;
    row.transpose()
}

/// Sum of final amounts the partner has earned (completed or confirmed work).
pub fn sum_partner_earnings(conn: &Connection, partner_id: &str) -> anyhow::Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(b.final_amount), 0.0)
         FROM bookings b JOIN schedules s ON s.id = b.schedule_id
         WHERE s.partner_id = ?1 AND b.status IN ('COMPLETED', 'CONFIRMED')",
        params![partner_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn insert_cancellation(
    conn: &Connection,
    booking_id: &str,
    customer_id: &str,
    reason: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_cancellations (id, booking_id, customer_id, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            uuid::Uuid::new_v4().to_string(),
            booking_id,
            customer_id,
            reason,
            ts(now)
        ],
    )?;
    Ok(())
}

fn parse_booking_row(row: &Row, base: usize) -> anyhow::Result<Booking> {
    let status_str: String = row.get(base + 3)?;
    let payment_json: String = row.get(base + 6)?;
    let service_str: String = row.get(base + 10)?;
    let created_str: String = row.get(base + 11)?;
    let updated_str: String = row.get(base + 12)?;

    let payment_info: PaymentInfo = serde_json::from_str(&payment_json)
        .with_context(|| format!("invalid payment info: {payment_json}"))?;

    Ok(Booking {
        id: row.get(base)?,
        customer_id: row.get(base + 1)?,
        schedule_id: row.get(base + 2)?,
        status: BookingStatus::parse(&status_str)
            .with_context(|| format!("unknown booking status: {status_str}"))?,
        original_amount: row.get(base + 4)?,
        final_amount: row.get(base + 5)?,
        payment_info,
        reject_reason: row.get(base + 7)?,
        multi_player_booking_id: row.get(base + 8)?,
        group_booking_id: row.get(base + 9)?,
        service_type: ServiceType::parse(&service_str)
            .with_context(|| format!("unknown service type: {service_str}"))?,
        created_at: parse_ts(&created_str)?,
        updated_at: parse_ts(&updated_str)?,
    })
}

fn parse_scheduled_booking_row(row: &Row) -> anyhow::Result<ScheduledBooking> {
    let booking = parse_booking_row(row, 0)?;
    let schedule = parse_schedule_row(row, BOOKING_COLUMN_COUNT)?;
    debug_assert_eq!(booking.schedule_id, schedule.id);
    Ok(ScheduledBooking { booking, schedule })
}

// ── Multi-player bookings ──

pub fn insert_multi_player_booking(conn: &Connection, group: &MultiPlayerBooking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO multi_player_bookings (id, customer_id, start_time, end_time, status, total_amount,
                                           last_adjustment_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            group.id,
            group.customer_id,
            ts(&group.start_time),
            ts(&group.end_time),
            group.status.as_str(),
            group.total_amount,
            group.last_adjustment_at.as_ref().map(ts),
            ts(&group.created_at),
            ts(&group.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_multi_player_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<MultiPlayerBooking>> {
    let sql = format!("SELECT {MULTI_PLAYER_COLUMNS} FROM multi_player_bookings WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id], |row| Ok(parse_multi_player_row(row)))
        .optional()?;
    row.transpose()
}

pub fn update_multi_player_booking(conn: &Connection, group: &MultiPlayerBooking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE multi_player_bookings SET status = ?1, total_amount = ?2, last_adjustment_at = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            group.status.as_str(),
            group.total_amount,
            group.last_adjustment_at.as_ref().map(ts),
            ts(&group.updated_at),
            group.id,
        ],
    )?;
    Ok(count > 0)
}

/// Authoritative group total: members that are neither cancelled nor rejected.
pub fn sum_group_amount(conn: &Connection, group_id: &str) -> anyhow::Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(final_amount), 0.0) FROM bookings
         WHERE multi_player_booking_id = ?1 AND status NOT IN ('CANCELLED', 'REJECTED')",
        params![group_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn get_groups_due_for_completion(
    conn: &Connection,
    now: &NaiveDateTime,
) -> anyhow::Result<Vec<MultiPlayerBooking>> {
    let sql = format!(
        "SELECT {MULTI_PLAYER_COLUMNS} FROM multi_player_bookings
         WHERE status IN ('PENDING', 'ACTIVE') AND end_time <= ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![ts(now)], |row| Ok(parse_multi_player_row(row)))?;
    collect(rows)
}

fn parse_multi_player_row(row: &Row) -> anyhow::Result<MultiPlayerBooking> {
    let start_str: String = row.get(2)?;
    let end_str: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let created_str: String = row.get(7)?;
    let updated_str: String = row.get(8)?;

    Ok(MultiPlayerBooking {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        start_time: parse_ts(&start_str)?,
        end_time: parse_ts(&end_str)?,
        status: MultiPlayerStatus::parse(&status_str)
            .with_context(|| format!("unknown group status: {status_str}"))?,
        total_amount: row.get(5)?,
        last_adjustment_at: parse_opt_ts(row.get(6)?)?,
        created_at: parse_ts(&created_str)?,
        updated_at: parse_ts(&updated_str)?,
    })
}

// ── Withdrawals & Ranking ──

pub fn insert_withdrawal(conn: &Connection, request: &WithdrawalRequest) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO withdrawal_requests (id, partner_id, amount, status, requested_at, processed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            request.id,
            request.partner_id,
            request.amount,
            request.status.as_str(),
            ts(&request.requested_at),
            request.processed_at.as_ref().map(ts),
        ],
    )?;
    Ok(())
}

pub fn count_withdrawals(
    conn: &Connection,
    partner_id: &str,
    status: WithdrawalStatus,
) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM withdrawal_requests WHERE partner_id = ?1 AND status = ?2",
        params![partner_id, status.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Amount already paid out or approved for payout.
pub fn sum_withdrawn(conn: &Connection, partner_id: &str) -> anyhow::Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0) FROM withdrawal_requests
         WHERE partner_id = ?1 AND status IN ('APPROVED', 'COMPLETED')",
        params![partner_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

pub fn get_rank_for_week(
    conn: &Connection,
    week_start: &NaiveDate,
    partner_id: &str,
) -> anyhow::Result<Option<i64>> {
    let rank = conn
        .query_row(
            "SELECT rank FROM ranking_history WHERE week_start_date = ?1 AND partner_id = ?2",
            params![week_start.format(DATE_FORMAT).to_string(), partner_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(rank)
}

pub fn upsert_rank(
    conn: &Connection,
    week_start: &NaiveDate,
    partner_id: &str,
    rank: i64,
    total_minutes: i64,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO ranking_history (week_start_date, partner_id, rank, total_minutes)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(week_start_date, partner_id) DO UPDATE SET rank = excluded.rank, total_minutes = excluded.total_minutes",
        params![week_start.format(DATE_FORMAT).to_string(), partner_id, rank, total_minutes],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_terminal_status_list_matches_enum() {
        let list = terminal_status_list();
        for status in BookingStatus::TERMINAL {
            assert!(list.contains(status.as_str()));
        }
        assert!(!list.contains("'CONFIRMED'"));
    }

    #[test]
    fn test_missing_rows_are_none() {
        let conn = db::init_db(":memory:").unwrap();
        assert!(get_user(&conn, "nope").unwrap().is_none());
        assert!(get_partner(&conn, "nope").unwrap().is_none());
        assert!(get_schedule(&conn, "nope").unwrap().is_none());
        assert!(get_booking(&conn, "nope").unwrap().is_none());
        assert!(get_multi_player_booking(&conn, "nope").unwrap().is_none());
    }
}
