use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::auth::require_session;
use super::{now, AppJson};
use crate::errors::AppError;
use crate::models::schedule::parse_datetime;
use crate::services::multi_player::{
    self, GroupCreated, PartnerRemoved, PartnerReplaced, PartnersAdded,
};
use crate::services::notify;
use crate::state::AppState;

// POST /multi-player-booking
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub start_time: String,
    pub end_time: String,
    pub partner_schedule_ids: Vec<String>,
}

pub async fn create_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(req): AppJson<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupCreated>), AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;
    let invalid = || AppError::Validation("invalid startTime or endTime".into());
    let start = parse_datetime(&req.start_time).ok_or_else(invalid)?;
    let end = parse_datetime(&req.end_time).ok_or_else(invalid)?;

    let mut created = {
        let mut db = state.lock_db()?;
        let customer_id = session.customer_id(&db)?;
        multi_player::create_multi_player_booking(
            &mut db,
            &customer_id,
            start,
            end,
            &req.partner_schedule_ids,
            now(),
        )?
    };

    notify::dispatch(state.notifier.clone(), std::mem::take(&mut created.notifications));
    Ok((StatusCode::CREATED, Json(created)))
}

// POST /multi-player-booking/:id/partners
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPartnersRequest {
    pub partner_schedule_ids: Vec<String>,
}

pub async fn add_partners(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
    AppJson(req): AppJson<AddPartnersRequest>,
) -> Result<Json<PartnersAdded>, AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;

    let mut added = {
        let mut db = state.lock_db()?;
        let customer_id = session.customer_id(&db)?;
        multi_player::add_partners(&mut db, &group_id, &customer_id, &req.partner_schedule_ids, now())?
    };

    notify::dispatch(state.notifier.clone(), std::mem::take(&mut added.notifications));
    Ok(Json(added))
}

// POST /multi-player-booking/:id/remove-partner
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovePartnerRequest {
    pub booking_id: String,
    #[serde(default)]
    pub reason: String,
}

pub async fn remove_partner(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
    AppJson(req): AppJson<RemovePartnerRequest>,
) -> Result<Json<PartnerRemoved>, AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;

    let mut removed = {
        let mut db = state.lock_db()?;
        let customer_id = session.customer_id(&db)?;
        multi_player::remove_partner(&mut db, &group_id, &customer_id, &req.booking_id, &req.reason, now())?
    };

    notify::dispatch(state.notifier.clone(), std::mem::take(&mut removed.notifications));
    Ok(Json(removed))
}

// POST /multi-player-booking/:id/replace-partner
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacePartnerRequest {
    pub rejected_booking_id: String,
    pub new_schedule_id: String,
}

pub async fn replace_partner(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
    AppJson(req): AppJson<ReplacePartnerRequest>,
) -> Result<Json<PartnerReplaced>, AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;

    let mut replaced = {
        let mut db = state.lock_db()?;
        let customer_id = session.customer_id(&db)?;
        multi_player::replace_partner(
            &mut db,
            &group_id,
            &customer_id,
            &req.rejected_booking_id,
            &req.new_schedule_id,
            now(),
        )?
    };

    notify::dispatch(state.notifier.clone(), std::mem::take(&mut replaced.notifications));
    Ok(Json(replaced))
}
