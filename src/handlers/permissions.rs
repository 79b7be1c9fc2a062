//! Admin account and scope management. All routes here are super
//! admin only.

use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::audit;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::AdminContext;
use crate::models::*;

/// POST /api/admin/admins
///
/// The response carries the new admin's API key; it is shown exactly
/// once and cannot be recovered later.
pub async fn create_admin(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(req): Json<CreateAdminRequest>,
) -> Result<impl IntoResponse> {
    admin.require_super()?;
    let conn = state.db.get()?;
    let (created, api_key) = queries::create_admin(&conn, &req.username, req.role)?;

    audit::log_admin_activity(
        &conn,
        &admin.admin_id,
        &admin.username,
        AdminAction::CreateAdmin,
        &format!("created {} {}", created.role, created.username),
    );
    Ok((
        StatusCode::CREATED,
        axum::Json(CreatedAdmin {
            admin: created,
            api_key,
        }),
    ))
}

/// GET /api/admin/admins
pub async fn list_admins(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
) -> Result<impl IntoResponse> {
    admin.require_super()?;
    let conn = state.db.get()?;
    Ok(axum::Json(queries::list_admins(&conn)?))
}

/// DELETE /api/admin/admins/{id}
///
/// Self-deletion is refused, and the last super admin can never be
/// removed.
pub async fn delete_admin(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(admin_id): Path<String>,
) -> Result<impl IntoResponse> {
    admin.require_super()?;
    if admin_id == admin.admin_id {
        return Err(AppError::Conflict(
            "Cannot delete your own account".to_string(),
        ));
    }
    let mut conn = state.db.get()?;
    let deleted = queries::delete_admin(&mut conn, &admin_id)?;

    audit::log_admin_activity(
        &conn,
        &admin.admin_id,
        &admin.username,
        AdminAction::DeleteAdmin,
        &format!("deleted {} {}", deleted.role, deleted.username),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// GET /api/admin/logs
pub async fn admin_activity(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Query(q): Query<ActivityQuery>,
) -> Result<impl IntoResponse> {
    admin.require_super()?;
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    let conn = state.db.get()?;
    Ok(axum::Json(queries::list_admin_activity(&conn, limit)?))
}

/// GET /api/admin/admins/{id}/permissions
pub async fn get_admin_permissions(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(admin_id): Path<String>,
) -> Result<impl IntoResponse> {
    admin.require_super()?;
    let conn = state.db.get()?;
    queries::get_admin(&conn, &admin_id)?
        .ok_or_else(|| AppError::NotFound("Admin not found".to_string()))?;
    Ok(axum::Json(queries::get_admin_permissions(&conn, &admin_id)?))
}

/// PUT /api/admin/admins/{id}/permissions
///
/// Replaces the target's full scope configuration in one transaction.
/// Super admins cannot be scoped; their role already grants `all`.
pub async fn set_admin_permissions(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(admin_id): Path<String>,
    Json(payload): Json<PermissionsPayload>,
) -> Result<impl IntoResponse> {
    admin.require_super()?;
    let mut conn = state.db.get()?;
    let target = queries::get_admin(&conn, &admin_id)?
        .ok_or_else(|| AppError::NotFound("Admin not found".to_string()))?;
    if target.role == AdminRole::SuperAdmin {
        return Err(AppError::BadRequest(
            "Super admin access cannot be scoped".to_string(),
        ));
    }

    let perms = payload.normalize();
    queries::replace_admin_permissions(&mut conn, &admin_id, &perms)?;

    audit::log_admin_activity(
        &conn,
        &admin.admin_id,
        &admin.username,
        AdminAction::UpdatePermissions,
        &format!("replaced resource scopes for {}", target.username),
    );
    Ok(axum::Json(perms))
}
