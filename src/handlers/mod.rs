pub mod auth;
pub mod bookings;
pub mod health;
pub mod multi_player;
pub mod schedules;
pub mod withdrawal;

use std::sync::Arc;

use axum::extract::FromRequest;
use axum::routing::{get, patch, post};
use axum::Router;
use chrono::NaiveDateTime;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::state::AppState;

/// JSON body extractor whose rejections come back as `VALIDATION` errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Wall-clock time every request is evaluated against (UTC, naive).
pub(crate) fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/partners/:id/schedules", get(schedules::get_partner_schedules))
        .route("/partners/:id/busy", get(schedules::get_partner_busy))
        .route("/partner/schedules", post(schedules::create_schedule))
        .route("/partner/schedules/batch", post(schedules::create_schedules_batch))
        .route(
            "/partner/schedules/:id",
            patch(schedules::update_schedule).delete(schedules::delete_schedule),
        )
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/:id/payment", post(bookings::record_payment))
        .route("/bookings/:id/accept", post(bookings::accept_booking))
        .route("/bookings/:id/reject", post(bookings::reject_booking))
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/admin/bookings/complete", post(bookings::complete_bookings))
        .route("/multi-player-booking", post(multi_player::create_group))
        .route("/multi-player-booking/:id/partners", post(multi_player::add_partners))
        .route(
            "/multi-player-booking/:id/remove-partner",
            post(multi_player::remove_partner),
        )
        .route(
            "/multi-player-booking/:id/replace-partner",
            post(multi_player::replace_partner),
        )
        .route("/partners/withdrawal/request", post(withdrawal::request_withdrawal))
        .route("/partners/withdrawal/balance", get(withdrawal::get_balance))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
