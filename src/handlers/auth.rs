use axum::http::HeaderMap;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Partner, Role};

/// Caller identity as forwarded by the auth gateway.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or("")
}

pub fn require_session(headers: &HeaderMap, gateway_token: &str) -> Result<Session, AppError> {
    let token = header(headers, "authorization")
        .strip_prefix("Bearer ")
        .unwrap_or("");
    if token.is_empty() || token != gateway_token {
        return Err(AppError::Unauthorized);
    }

    let user_id = header(headers, "x-user-id");
    let role = Role::parse(header(headers, "x-user-role"));
    match (user_id, role) {
        ("", _) | (_, None) => Err(AppError::Unauthorized),
        (user_id, Some(role)) => Ok(Session {
            user_id: user_id.to_string(),
            role,
        }),
    }
}

impl Session {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role != Role::Admin {
            return Err(AppError::Forbidden("admin only".into()));
        }
        Ok(())
    }

    /// Customer record of the caller.
    pub fn customer_id(&self, conn: &Connection) -> Result<String, AppError> {
        if self.role != Role::Customer {
            return Err(AppError::Forbidden("customers only".into()));
        }
        queries::get_customer_by_user(conn, &self.user_id)?
            .map(|c| c.id)
            .ok_or_else(|| AppError::not_found("customer"))
    }

    /// Partner record of the caller.
    pub fn partner(&self, conn: &Connection) -> Result<Partner, AppError> {
        if self.role != Role::Partner {
            return Err(AppError::Forbidden("partners only".into()));
        }
        queries::get_partner_by_user(conn, &self.user_id)?
            .ok_or_else(|| AppError::not_found("partner"))
    }
}
