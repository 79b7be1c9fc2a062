//! Admin device management: reactivate, deactivate, delete, retention
//! cleanup and activity history. Access is governed by the caller's
//! scope on the owning license.

use axum::Extension;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rusqlite::Connection;
use serde_json::json;

use crate::audit;
use crate::clock;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::AdminContext;
use crate::models::*;

fn load_scoped_device(
    conn: &Connection,
    admin: &AdminContext,
    device_id: &str,
) -> Result<(DeviceActivation, License)> {
    let device = queries::get_device(conn, device_id)?
        .ok_or_else(|| AppError::NotFound("Device not found".to_string()))?;
    let license = queries::get_license(conn, &device.license_id)?
        .ok_or_else(|| AppError::NotFound("License not found".to_string()))?;
    let scope = queries::resolve_scope(conn, admin.role, &admin.admin_id, ResourceType::Licenses)?;
    let owner = license.created_by.as_deref().unwrap_or("");
    if !scope.can_access(&license.id, owner, &admin.admin_id) {
        return Err(AppError::Forbidden(
            "Access to this device is denied".to_string(),
        ));
    }
    Ok((device, license))
}

/// POST /api/admin/devices/{id}/reactivate
///
/// Succeeds only while the license has a free slot; the check and the
/// flip run atomically.
pub async fn reactivate_device(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse> {
    let mut conn = state.db.get()?;
    let (_, license) = load_scoped_device(&conn, &admin, &device_id)?;

    let device = queries::reactivate_device_atomic(&mut conn, &device_id)?;

    audit::log_admin_activity(
        &conn,
        &admin.admin_id,
        &admin.username,
        AdminAction::ReactivateDevice,
        &format!("reactivated device {} on license {}", device.id, license.id),
    );
    audit::log_device_activity(
        &conn,
        &device.id,
        &license.id,
        DeviceAction::Reactivated,
        &format!("reactivated by {}", admin.username),
    );
    Ok(axum::Json(device))
}

/// POST /api/admin/devices/{id}/deactivate
///
/// Unconditional; frees the slot immediately.
pub async fn deactivate_device(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;
    let (_, license) = load_scoped_device(&conn, &admin, &device_id)?;

    let device = queries::deactivate_device(&conn, &device_id)?
        .ok_or_else(|| AppError::NotFound("Device not found".to_string()))?;

    audit::log_admin_activity(
        &conn,
        &admin.admin_id,
        &admin.username,
        AdminAction::DeactivateDevice,
        &format!("deactivated device {} on license {}", device.id, license.id),
    );
    audit::log_device_activity(
        &conn,
        &device.id,
        &license.id,
        DeviceAction::Deactivated,
        &format!("deactivated by {}", admin.username),
    );
    Ok(axum::Json(device))
}

/// DELETE /api/admin/devices/{id}
pub async fn delete_device(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;
    let (_, license) = load_scoped_device(&conn, &admin, &device_id)?;

    let device = queries::delete_device(&conn, &device_id)?
        .ok_or_else(|| AppError::NotFound("Device not found".to_string()))?;

    audit::log_admin_activity(
        &conn,
        &admin.admin_id,
        &admin.username,
        AdminAction::DeleteDevice,
        &format!("deleted device {} from license {}", device.id, license.id),
    );
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/devices/cleanup
///
/// Purges deactivated rows past the retention window. Global, so
/// super admin only.
pub async fn cleanup_devices(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(req): Json<CleanupDevicesRequest>,
) -> Result<impl IntoResponse> {
    admin.require_super()?;
    if req.days < 1 {
        return Err(AppError::BadRequest("days must be at least 1".to_string()));
    }

    let conn = state.db.get()?;
    let removed = queries::cleanup_inactive_devices(&conn, clock::cutoff_ts(req.days))?;

    audit::log_admin_activity(
        &conn,
        &admin.admin_id,
        &admin.username,
        AdminAction::CleanupDevices,
        &format!("removed {} device(s) deactivated over {} days ago", removed, req.days),
    );
    Ok(axum::Json(json!({ "removed": removed })))
}

/// GET /api/admin/devices/{id}/logs
pub async fn device_activity(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;
    let (device, _) = load_scoped_device(&conn, &admin, &device_id)?;
    let logs = queries::list_device_activity(&conn, &device.id, 50)?;
    Ok(axum::Json(logs))
}
