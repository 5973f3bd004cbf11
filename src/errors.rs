use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDateTime;
use serde::Serialize;

/// An existing schedule that a batch candidate collided with.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleCollision {
    pub existing_schedule_id: String,
    pub existing_start: NaiveDateTime,
    pub existing_end: NaiveDateTime,
    pub candidate_start: NaiveDateTime,
    pub candidate_end: NaiveDateTime,
}

/// Outcome of every business operation that can be rejected.
///
/// Expected rejections are ordinary variants so callers match on them
/// instead of treating them as crashes. `Database` and `Internal` are the
/// only variants that represent unexpected failures.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Conflict {
        message: String,
        conflicting_id: Option<String>,
    },

    #[error("{0}")]
    TimeConflict(String),

    #[error("schedule is already booked")]
    ScheduleAlreadyBooked,

    #[error("schedules overlap existing schedules")]
    Duplicated(Vec<ScheduleCollision>),

    #[error("adjustments close 30 minutes before the session starts")]
    AdjustmentClosed,

    #[error("too late to cancel: bookings can only be cancelled more than 2 hours before start")]
    TooLate,

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("partner has already been removed")]
    AlreadyRemoved,

    #[error("account is suspended")]
    Suspended,

    #[error("requested amount {requested:.2} exceeds available balance {available_balance:.2}")]
    ExceedsBalance {
        requested: f64,
        available_balance: f64,
    },

    #[error("a pending withdrawal request already exists")]
    PendingExists,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Validation(_) => "VALIDATION",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::TimeConflict(_) => "TIME_CONFLICT",
            AppError::ScheduleAlreadyBooked => "SCHEDULE_ALREADY_BOOKED",
            AppError::Duplicated(_) => "DUPLICATED",
            AppError::AdjustmentClosed => "ADJUSTMENT_CLOSED",
            AppError::TooLate => "TOO_LATE",
            AppError::InvalidStatus(_) => "INVALID_STATUS",
            AppError::AlreadyRemoved => "ALREADY_REMOVED",
            AppError::Suspended => "SUSPENDED",
            AppError::ExceedsBalance { .. } => "EXCEEDS_BALANCE",
            AppError::PendingExists => "PENDING_EXISTS",
            AppError::Database(_) | AppError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) | AppError::Suspended => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Conflict { .. }
            | AppError::TimeConflict(_)
            | AppError::ScheduleAlreadyBooked
            | AppError::Duplicated(_) => StatusCode::CONFLICT,
            AppError::Validation(_)
            | AppError::AdjustmentClosed
            | AppError::TooLate
            | AppError::InvalidStatus(_)
            | AppError::AlreadyRemoved
            | AppError::ExceedsBalance { .. }
            | AppError::PendingExists => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn invalid_status(detail: impl Into<String>) -> Self {
        AppError::InvalidStatus(detail.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database failure");
                serde_json::json!({ "error": "internal server error", "code": code })
            }
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "unhandled failure");
                serde_json::json!({ "error": "internal server error", "code": code })
            }
            AppError::Conflict {
                conflicting_id: Some(id),
                ..
            } => serde_json::json!({
                "error": self.to_string(),
                "code": code,
                "conflictingScheduleId": id,
            }),
            AppError::Duplicated(collisions) => serde_json::json!({
                "error": self.to_string(),
                "code": code,
                "conflicts": collisions,
            }),
            AppError::ExceedsBalance {
                requested,
                available_balance,
            } => serde_json::json!({
                "error": self.to_string(),
                "code": code,
                "requestedAmount": requested,
                "availableBalance": available_balance,
            }),
            _ => serde_json::json!({ "error": self.to_string(), "code": code }),
        };

        (status, axum::Json(body)).into_response()
    }
}
