//! Fixtures shared by the service unit tests.

use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::models::{
    Booking, BookingStatus, Customer, Partner, PartnerStatus, PaymentInfo, Role, Schedule,
    ServiceType, User,
};

pub fn setup_db() -> Connection {
    db::init_db(":memory:").unwrap()
}

pub fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
}

fn seed_user(conn: &Connection, name: &str, role: Role) -> User {
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        role,
        is_suspended: false,
        suspension_ends_at: None,
        suspension_reason: None,
    };
    queries::insert_user(conn, &user).unwrap();
    user
}

pub fn seed_partner(conn: &Connection, name: &str, half_hourly_rate: f64) -> Partner {
    let user = seed_user(conn, name, Role::Partner);
    let partner = Partner {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id,
        name: name.to_string(),
        status: PartnerStatus::Approved,
        half_hourly_rate,
        referral_platform_fee: None,
        invited_by: None,
        referral_earnings: 0.0,
    };
    queries::insert_partner(conn, &partner).unwrap();
    partner
}

pub fn seed_customer(conn: &Connection, name: &str) -> Customer {
    let user = seed_user(conn, name, Role::Customer);
    let customer = Customer {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id,
        violation_count: 0,
        violations: vec![],
    };
    queries::insert_customer(conn, &customer).unwrap();
    customer
}

pub fn seed_schedule(conn: &Connection, partner_id: &str, start: &str, end: &str) -> Schedule {
    let start = dt(start);
    let schedule = Schedule {
        id: uuid::Uuid::new_v4().to_string(),
        partner_id: partner_id.to_string(),
        date: start.date(),
        start_time: start,
        end_time: dt(end),
        is_available: true,
        created_at: start,
        updated_at: start,
    };
    assert!(queries::insert_schedule(conn, &schedule).unwrap());
    schedule
}

/// Booking worth 100 directly attached to `schedule`.
pub fn seed_booking(
    conn: &Connection,
    customer_id: &str,
    schedule: &Schedule,
    status: BookingStatus,
) -> Booking {
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        customer_id: customer_id.to_string(),
        schedule_id: schedule.id.clone(),
        status,
        original_amount: 100.0,
        final_amount: 100.0,
        payment_info: PaymentInfo::default(),
        reject_reason: None,
        multi_player_booking_id: None,
        group_booking_id: None,
        service_type: ServiceType::Standard,
        created_at: schedule.created_at,
        updated_at: schedule.created_at,
    };
    queries::insert_booking(conn, &booking).unwrap();
    booking
}
