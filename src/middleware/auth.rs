//! Admin API-key authentication.
//!
//! Admin routes expect `Authorization: Bearer <api key>`. The key is
//! hashed and looked up against the admins table; on success an
//! `AdminContext` is inserted into request extensions for handlers.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::AdminRole;

#[derive(Debug, Clone)]
pub struct AdminContext {
    pub admin_id: String,
    pub username: String,
    pub role: AdminRole,
}

impl AdminContext {
    pub fn is_super(&self) -> bool {
        self.role == AdminRole::SuperAdmin
    }

    /// Guard for routes restricted to super admins.
    pub fn require_super(&self) -> Result<()> {
        if self.is_super() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Super admin access required".to_string(),
            ))
        }
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = extract_bearer_token(req.headers()).ok_or(AppError::Unauthorized)?;
    let admin = {
        let conn = state.db.get()?;
        queries::get_admin_by_api_key(&conn, token)?.ok_or(AppError::Unauthorized)?
    };
    req.extensions_mut().insert(AdminContext {
        admin_id: admin.id,
        username: admin.username,
        role: admin.role,
    });
    Ok(next.run(req).await)
}
