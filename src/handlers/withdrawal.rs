use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth::require_session;
use super::{now, AppJson};
use crate::errors::AppError;
use crate::models::WithdrawalRequest;
use crate::services::settlement::{self, BalanceBreakdown};
use crate::state::AppState;

// POST /partners/withdrawal/request
#[derive(Deserialize)]
pub struct WithdrawalBody {
    pub amount: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalResponse {
    withdrawal_request: WithdrawalRequest,
}

pub async fn request_withdrawal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<WithdrawalBody>,
) -> Result<(StatusCode, Json<WithdrawalResponse>), AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;

    let withdrawal_request = {
        let mut db = state.lock_db()?;
        let partner = session.partner(&db)?;
        settlement::request_withdrawal(&mut db, &partner.id, body.amount, now())?
    };

    Ok((StatusCode::CREATED, Json(WithdrawalResponse { withdrawal_request })))
}

// GET /partners/withdrawal/balance
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<BalanceBreakdown>, AppError> {
    let session = require_session(&headers, &state.config.gateway_token)?;

    let db = state.lock_db()?;
    let partner = session.partner(&db)?;
    Ok(Json(settlement::available_balance(&db, &partner, now().date())?))
}
