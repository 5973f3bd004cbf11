use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth::require_session;
use super::{now, AppJson};
use crate::errors::AppError;
use crate::models::schedule::parse_date;
use crate::models::ScheduleInput;
use crate::services::booking::{self, ScheduleView};
use crate::services::conflict::{self, BusyStatus};
use crate::services::schedule::{self, BatchCreated, ScheduleCreated, SchedulePatch, ScheduleRemoval};
use crate::state::AppState;

// GET /partners/:id/schedules
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulesQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Serialize)]
pub struct SchedulesResponse {
    schedules: Vec<ScheduleView>,
}

pub async fn get_partner_schedules(
    State(state): State<Arc<AppState>>,
    Path(partner_id): Path<String>,
    Query(query): Query<SchedulesQuery>,
) -> Result<Json<SchedulesResponse>, AppError> {
    let now = now();
    let parse = |s: &Option<String>| -> Result<Option<chrono::NaiveDate>, AppError> {
        s.as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_date(s).ok_or_else(|| AppError::Validation(format!("invalid date: {s}"))))
            .transpose()
    };
    let from = parse(&query.start_date)?.unwrap_or(now.date());
    let to = parse(&query.end_date)?;

    let schedules = {
        let db = state.lock_db()?;
        booking::available_schedules(&db, &partner_id, from, to, now)?
    };

    Ok(Json(SchedulesResponse { schedules }))
}

// GET /partners/:id/busy
pub async fn get_partner_busy(
    State(state): State<Arc<AppState>>,
    Path(partner_id): Path<String>,
) -> Result<Json<BusyStatus>, AppError> {
    let db = state.lock_db()?;
    if crate::db::queries::get_partner(&db, &partner_id)?.is_none() {
        return Err(AppError::not_found("partner"));
    }
    Ok(Json(conflict::is_partner_busy(&db, &partner_id, &now())?))
}

// POST /partner/schedules
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    #[serde(flatten)]
    pub schedule: ScheduleInput,
    pub recurring_weeks: Option<u32>,
}

pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(req): AppJson<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleCreated>), AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;

    let created = {
        let mut db = state.lock_db()?;
        let partner = session.partner(&db)?;
        schedule::create_schedule(&mut db, &partner.id, &req.schedule, req.recurring_weeks, now())?
    };

    Ok((StatusCode::CREATED, Json(created)))
}

// POST /partner/schedules/batch
#[derive(Deserialize)]
pub struct BatchRequest {
    pub schedules: Vec<ScheduleInput>,
}

pub async fn create_schedules_batch(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(req): AppJson<BatchRequest>,
) -> Result<(StatusCode, Json<BatchCreated>), AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;

    let created = {
        let mut db = state.lock_db()?;
        let partner = session.partner(&db)?;
        schedule::create_schedules_batch(&mut db, &partner.id, &req.schedules, now())?
    };

    Ok((StatusCode::CREATED, Json(created)))
}

// PATCH /partner/schedules/:id
pub async fn update_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    AppJson(patch): AppJson<SchedulePatch>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;

    let updated = {
        let mut db = state.lock_db()?;
        let partner = session.partner(&db)?;
        schedule::update_schedule(&mut db, &partner.id, &id, &patch, now())?
    };

    Ok(Json(serde_json::json!({ "schedule": updated })))
}

// DELETE /partner/schedules/:id
pub async fn delete_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;

    let removal: ScheduleRemoval = {
        let mut db = state.lock_db()?;
        let partner = session.partner(&db)?;
        schedule::delete_schedule(&mut db, &partner.id, &id, now())?
    };

    Ok(Json(serde_json::json!({ "id": id, "result": removal })))
}
