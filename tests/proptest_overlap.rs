//! Property-based tests for interval overlap and refund splitting.
//!
//! # Properties Tested
//!
//! 1. **Overlap**: matches the half-open interval definition, is symmetric,
//!    and never reports touching intervals
//! 2. **Refund split**: the three parts always add back up to the amount
//! 3. **Conflict checker**: against a seeded database, agrees with a linear
//!    scan over the partner's live bookings

use chrono::{Duration, NaiveDate, NaiveDateTime};
use companion_booking::db::{self, queries};
use companion_booking::models::{
    Booking, BookingStatus, Customer, Partner, PartnerStatus, PaymentInfo, Role, Schedule,
    ServiceType, User,
};
use companion_booking::services::conflict::check_time_conflict;
use companion_booking::services::overlap::overlaps;
use companion_booking::services::settlement::{refund_split, round2};
use proptest::prelude::*;
use rusqlite::Connection;

fn interval() -> impl Strategy<Value = (i64, i64)> {
    (-10_000i64..10_000, 1i64..5_000).prop_map(|(start, len)| (start, start + len))
}

/// Brute force: some integer instant lies in both half-open intervals.
fn shares_an_instant(a: (i64, i64), b: (i64, i64)) -> bool {
    (a.0..a.1).any(|t| (b.0..b.1).contains(&t))
}

const STATUSES: [BookingStatus; 10] = [
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

/// (start, length) in quarter hours from midnight, plus a status index.
fn seeded_slot() -> impl Strategy<Value = (i64, i64, usize)> {
    (0i64..88, 1i64..9, 0usize..STATUSES.len())
}

fn quarter_hours(q: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 6, 16)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap()
        + Duration::minutes(15 * q)
}

fn seed_user(conn: &Connection, name: &str, role: Role) -> User {
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: format!("{name}@example.com"),
        role,
        is_suspended: false,
        suspension_ends_at: None,
        suspension_reason: None,
    };
    queries::insert_user(conn, &user).unwrap();
    user
}

fn seed_partner(conn: &Connection, name: &str) -> Partner {
    let partner = Partner {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: seed_user(conn, name, Role::Partner).id,
        name: name.to_string(),
        status: PartnerStatus::Approved,
        half_hourly_rate: 100.0,
        referral_platform_fee: None,
        invited_by: None,
        referral_earnings: 0.0,
    };
    queries::insert_partner(conn, &partner).unwrap();
    partner
}

struct Seeded {
    booking_id: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    status: BookingStatus,
}

/// Inserts one schedule and booking per slot; exact duplicate slots are skipped.
fn seed_bookings(
    conn: &Connection,
    partner_id: &str,
    customer_id: &str,
    slots: &[(i64, i64, usize)],
) -> Vec<Seeded> {
    let mut seeded = Vec::new();
    for &(offset, len, status) in slots {
        let start = quarter_hours(offset);
        let end = quarter_hours(offset + len);
        let schedule = Schedule {
            id: uuid::Uuid::new_v4().to_string(),
            partner_id: partner_id.to_string(),
            date: start.date(),
            start_time: start,
            end_time: end,
            is_available: true,
            created_at: start,
            updated_at: start,
        };
        if !queries::insert_schedule(conn, &schedule).unwrap() {
            continue;
        }
        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id: customer_id.to_string(),
            schedule_id: schedule.id.clone(),
            status: STATUSES[status],
            original_amount: 100.0,
            final_amount: 100.0,
            payment_info: PaymentInfo::default(),
            reject_reason: None,
            multi_player_booking_id: None,
            group_booking_id: None,
            service_type: ServiceType::Standard,
            created_at: start,
            updated_at: start,
        };
        queries::insert_booking(conn, &booking).unwrap();
        seeded.push(Seeded {
            booking_id: booking.id,
            start,
            end,
            status: booking.status,
        });
    }
    seeded
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_conflict_check_matches_linear_scan(
        mine in prop::collection::vec(seeded_slot(), 0..12),
        theirs in prop::collection::vec(seeded_slot(), 0..6),
        candidate in (0i64..88, 1i64..9),
        exclude_first in any::<bool>(),
    ) {
        let conn = db::init_db(":memory:").unwrap();
        let alice = seed_partner(&conn, "alice");
        let bob = seed_partner(&conn, "bob");
        let customer = Customer {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: seed_user(&conn, "carl", Role::Customer).id,
            violation_count: 0,
            violations: vec![],
        };
        queries::insert_customer(&conn, &customer).unwrap();

        let seeded = seed_bookings(&conn, &alice.id, &customer.id, &mine);
        seed_bookings(&conn, &bob.id, &customer.id, &theirs);

        let start = quarter_hours(candidate.0);
        let end = quarter_hours(candidate.0 + candidate.1);
        let exclude = seeded.first().filter(|_| exclude_first).map(|s| s.booking_id.as_str());

        let mut expected: Vec<&str> = seeded
            .iter()
            .filter(|s| Some(s.booking_id.as_str()) != exclude)
            .filter(|s| !s.status.is_terminal())
            .filter(|s| overlaps(&start, &end, &s.start, &s.end))
            .map(|s| s.booking_id.as_str())
            .collect();
        expected.sort_unstable();

        let report = check_time_conflict(&conn, &alice.id, &start, &end, exclude).unwrap();
        let mut found: Vec<&str> = report.conflicts.iter().map(|c| c.booking_id.as_str()).collect();
        found.sort_unstable();

        prop_assert_eq!(report.has_conflict, !expected.is_empty());
        prop_assert_eq!(found, expected);
    }
}

proptest! {
    #[test]
    fn prop_overlap_matches_brute_force(a in interval(), b in interval()) {
        prop_assert_eq!(overlaps(&a.0, &a.1, &b.0, &b.1), shares_an_instant(a, b));
    }

    #[test]
    fn prop_overlap_is_symmetric(a in interval(), b in interval()) {
        prop_assert_eq!(
            overlaps(&a.0, &a.1, &b.0, &b.1),
            overlaps(&b.0, &b.1, &a.0, &a.1)
        );
    }

    #[test]
    fn prop_touching_never_overlaps(a in interval(), len in 1i64..5_000) {
        let after = (a.1, a.1 + len);
        prop_assert!(!overlaps(&a.0, &a.1, &after.0, &after.1));
        prop_assert!(!overlaps(&after.0, &after.1, &a.0, &a.1));
    }

    #[test]
    fn prop_refund_split_adds_up(cents in 0i64..10_000_000) {
        let amount = cents as f64 / 100.0;
        let split = refund_split(amount);

        let sum = split.refund_amount + split.partner_amount + split.platform_amount;
        prop_assert!((sum - round2(amount)).abs() < 1e-6, "{:?} from {}", split, amount);
        prop_assert!(split.refund_amount >= 0.0);
        prop_assert!(split.partner_amount >= 0.0);
        prop_assert!(split.platform_amount >= 0.0);
        prop_assert!(split.refund_amount >= split.partner_amount);
    }
}
