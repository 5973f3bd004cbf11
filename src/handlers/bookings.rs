use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth::require_session;
use super::{now, AppJson};
use crate::errors::AppError;
use crate::models::Booking;
use crate::services::booking::{self, BookingChange, CompletionSummary, PartnerDecision};
use crate::services::notify;
use crate::services::settlement::round2;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingResponse {
    booking: Booking,
}

fn deliver(state: &AppState, change: BookingChange) -> Json<BookingResponse> {
    notify::dispatch(state.notifier.clone(), change.notifications);
    Json(BookingResponse {
        booking: change.booking,
    })
}

// POST /bookings
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub schedule_ids: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingResponse {
    bookings: Vec<Booking>,
    total_amount: f64,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(req): AppJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;

    let bookings = {
        let mut db = state.lock_db()?;
        let customer_id = session.customer_id(&db)?;
        booking::create_booking(&mut db, &customer_id, &req.schedule_ids, now())?
    };
    let total_amount = round2(bookings.iter().map(|b| b.final_amount).sum());

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            bookings,
            total_amount,
        }),
    ))
}

// POST /bookings/:id/payment
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub paid_amount: Option<f64>,
}

pub async fn record_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    AppJson(req): AppJson<PaymentRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;
    session.require_admin()?;

    let change = {
        let mut db = state.lock_db()?;
        booking::record_payment(&mut db, &id, req.paid_amount, now())?
    };

    Ok(deliver(&state, change))
}

// POST /bookings/:id/accept
pub async fn accept_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    respond(state, headers, id, PartnerDecision::Accept).await
}

// POST /bookings/:id/reject
#[derive(Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    AppJson(req): AppJson<RejectRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    respond(state, headers, id, PartnerDecision::Reject { reason: req.reason }).await
}

async fn respond(
    state: Arc<AppState>,
    headers: HeaderMap,
    id: String,
    decision: PartnerDecision,
) -> Result<Json<BookingResponse>, AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;

    let change = {
        let mut db = state.lock_db()?;
        let partner = session.partner(&db)?;
        booking::respond_to_booking(&mut db, &id, &partner.id, decision, now())?
    };

    Ok(deliver(&state, change))
}

// POST /bookings/:id/cancel
#[derive(Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    AppJson(req): AppJson<CancelRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;

    let change = {
        let mut db = state.lock_db()?;
        let customer_id = session.customer_id(&db)?;
        booking::cancel_booking(&mut db, &id, &customer_id, &req.reason, now())?
    };

    Ok(deliver(&state, change))
}

// POST /admin/bookings/complete
pub async fn complete_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CompletionSummary>, AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;
    session.require_admin()?;

    let summary = {
        let mut db = state.lock_db()?;
        booking::complete_finished_bookings(&mut db, now())?
    };

    Ok(Json(summary))
}
