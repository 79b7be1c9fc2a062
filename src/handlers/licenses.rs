//! Admin license CRUD.

use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use rusqlite::Connection;

use crate::audit;
use crate::clock;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::AdminContext;
use crate::models::*;

/// Fetch a license and enforce the caller's scope on it. Absence is
/// NotFound; a real row outside the caller's scope is Forbidden.
fn load_scoped_license(
    conn: &Connection,
    admin: &AdminContext,
    license_id: &str,
) -> Result<License> {
    let license = queries::get_license(conn, license_id)?
        .ok_or_else(|| AppError::NotFound("License not found".to_string()))?;
    let scope = queries::resolve_scope(conn, admin.role, &admin.admin_id, ResourceType::Licenses)?;
    let owner = license.created_by.as_deref().unwrap_or("");
    if !scope.can_access(&license.id, owner, &admin.admin_id) {
        return Err(AppError::Forbidden(
            "Access to this license is denied".to_string(),
        ));
    }
    Ok(license)
}

/// POST /api/admin/licenses
pub async fn create_license(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(req): Json<CreateLicenseRequest>,
) -> Result<impl IntoResponse> {
    let customer_name = req.customer_name.trim();
    if customer_name.is_empty() {
        return Err(AppError::BadRequest("customer_name is required".to_string()));
    }
    let customer_email = req.customer_email.trim();
    if customer_email.is_empty() || !customer_email.contains('@') {
        return Err(AppError::BadRequest(
            "customer_email must be a valid email address".to_string(),
        ));
    }
    if req.max_devices < 1 {
        return Err(AppError::BadRequest(
            "max_devices must be at least 1".to_string(),
        ));
    }
    let expires_at = clock::parse_expiry_date(&req.expires_at)?;
    if expires_at < clock::today() {
        return Err(AppError::BadRequest(
            "expires_at must not be in the past".to_string(),
        ));
    }

    let conn = state.db.get()?;
    let product = queries::get_product(&conn, &req.product_id)?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;
    if product.status != ProductStatus::Active {
        return Err(AppError::Conflict("Product is not active".to_string()));
    }
    if let Some(policy_id) = req.policy_id.as_deref() {
        queries::get_policy(&conn, policy_id)?
            .ok_or_else(|| AppError::NotFound("Policy not found".to_string()))?;
    }

    let license = queries::create_license(
        &conn,
        &queries::NewLicense {
            product_id: &req.product_id,
            policy_id: req.policy_id.as_deref(),
            customer_name,
            customer_email,
            max_devices: req.max_devices,
            expires_at,
            notes: req.notes.as_deref(),
            created_by: &admin.admin_id,
        },
    )?;

    audit::log_admin_activity(
        &conn,
        &admin.admin_id,
        &admin.username,
        AdminAction::CreateLicense,
        &format!("created license {} for {}", license.id, customer_email),
    );
    Ok((StatusCode::CREATED, axum::Json(license)))
}

/// GET /api/admin/licenses
pub async fn list_licenses(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Query(q): Query<ListLicensesQuery>,
) -> Result<impl IntoResponse> {
    let page = q.page.unwrap_or(1).max(1);
    let page_size = q.page_size.unwrap_or(20).clamp(1, 100);
    let status = q
        .status
        .as_deref()
        .map(str::parse::<LicenseStatus>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let conn = state.db.get()?;
    let scope =
        queries::resolve_scope(&conn, admin.role, &admin.admin_id, ResourceType::Licenses)?;
    let (items, total) = queries::list_licenses(
        &conn,
        &queries::LicenseListFilter {
            page,
            page_size,
            status,
            search: q.search,
        },
        &scope,
        &admin.admin_id,
    )?;
    Ok(axum::Json(Paginated {
        items,
        page,
        page_size,
        total,
    }))
}

/// GET /api/admin/licenses/{id}
pub async fn get_license(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(license_id): Path<String>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;
    let license = load_scoped_license(&conn, &admin, &license_id)?;
    let active_devices = queries::count_active_devices(&conn, &license.id)?;
    Ok(axum::Json(LicenseWithUsage {
        license,
        active_devices,
    }))
}

/// PUT /api/admin/licenses/{id}
///
/// Partial update. Changing `expires_at` reconciles the status with
/// the new date: an expired license extended into the future comes
/// back to `active`, an active one dated into the past expires.
/// Revoked licenses keep their fields editable but never change
/// status.
pub async fn update_license(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(license_id): Path<String>,
    Json(req): Json<UpdateLicenseRequest>,
) -> Result<impl IntoResponse> {
    let mut conn = state.db.get()?;
    let license = load_scoped_license(&conn, &admin, &license_id)?;

    let expires_at = req
        .expires_at
        .as_deref()
        .map(clock::parse_expiry_date)
        .transpose()?;

    if let Some(max_devices) = req.max_devices {
        if max_devices < 1 {
            return Err(AppError::BadRequest(
                "max_devices must be at least 1".to_string(),
            ));
        }
    }
    if let Some(policy_id) = req.policy_id.as_deref() {
        queries::get_policy(&conn, policy_id)?
            .ok_or_else(|| AppError::NotFound("Policy not found".to_string()))?;
    }

    // the count guard on max_devices lives inside update_license, in
    // the same transaction as the write
    let updated = queries::update_license(
        &mut conn,
        &license.id,
        &queries::LicenseUpdate {
            customer_name: req.customer_name.as_deref(),
            customer_email: req.customer_email.as_deref(),
            max_devices: req.max_devices,
            expires_at,
            policy_id: req.policy_id.as_deref(),
            notes: req.notes.as_deref(),
        },
    )?
    .ok_or_else(|| AppError::NotFound("License not found".to_string()))?;

    if let Some(new_status) = queries::apply_expiry_transition(&conn, &updated, clock::today())? {
        tracing::info!(license_id = %updated.id, status = %new_status, "License status reconciled after expiry change");
    }
    let fresh = queries::get_license(&conn, &license.id)?
        .ok_or_else(|| AppError::NotFound("License not found".to_string()))?;

    audit::log_admin_activity(
        &conn,
        &admin.admin_id,
        &admin.username,
        AdminAction::UpdateLicense,
        &format!("updated license {}", fresh.id),
    );
    Ok(axum::Json(fresh))
}

/// POST /api/admin/licenses/{id}/revoke
pub async fn revoke_license(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(license_id): Path<String>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;
    let license = load_scoped_license(&conn, &admin, &license_id)?;
    queries::revoke_license(&conn, &license.id)?;
    let fresh = queries::get_license(&conn, &license.id)?
        .ok_or_else(|| AppError::NotFound("License not found".to_string()))?;

    audit::log_admin_activity(
        &conn,
        &admin.admin_id,
        &admin.username,
        AdminAction::RevokeLicense,
        &format!("revoked license {}", fresh.id),
    );
    Ok(axum::Json(fresh))
}

/// DELETE /api/admin/licenses/{id}
pub async fn delete_license(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(license_id): Path<String>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;
    let license = load_scoped_license(&conn, &admin, &license_id)?;
    queries::delete_license(&conn, &license.id)?;

    audit::log_admin_activity(
        &conn,
        &admin.admin_id,
        &admin.username,
        AdminAction::DeleteLicense,
        &format!("deleted license {}", license.id),
    );
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/licenses/{id}/devices
pub async fn list_license_devices(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(license_id): Path<String>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;
    let license = load_scoped_license(&conn, &admin, &license_id)?;
    let devices = queries::list_devices_for_license(&conn, &license.id)?;
    Ok(axum::Json(devices))
}
