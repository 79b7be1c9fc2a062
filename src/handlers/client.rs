//! Client-facing endpoints: license activation, validation and signed
//! file downloads. These routes are unauthenticated; possession of a
//! usable license key is the credential.

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::audit;
use crate::clock;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::fingerprint;
use crate::models::*;
use crate::signing::DEFAULT_DOWNLOAD_TTL;

#[derive(Debug, Serialize)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct PolicyPayload {
    pub id: String,
    pub policy_name: String,
    pub policy_data: serde_json::Value,
}

/// Everything a client needs after a successful activate or validate:
/// its binding, the attached policy documents, and presigned download
/// URLs for the product's active files.
#[derive(Debug, Serialize)]
pub struct LicensePayload {
    pub license_key: String,
    pub device_id: String,
    pub expires_at: NaiveDate,
    pub max_devices: i64,
    pub product: Option<ProductSummary>,
    pub policies: Vec<PolicyPayload>,
    pub files: Vec<FileDownload>,
}

fn license_denied(denied: LicenseDenied) -> AppError {
    match denied {
        LicenseDenied::NotActive(status) => {
            AppError::Forbidden(format!("License is {}", status))
        }
        LicenseDenied::Expired => AppError::Expired("License has expired".to_string()),
    }
}

fn build_license_payload(
    state: &AppState,
    conn: &Connection,
    license: &License,
    device: &DeviceActivation,
) -> Result<LicensePayload> {
    let product = match license.product_id.as_deref() {
        Some(product_id) => queries::get_product(conn, product_id)?,
        None => None,
    };

    let policies = match license.policy_id.as_deref() {
        Some(policy_id) => queries::get_policy(conn, policy_id)?
            .map(|p| PolicyPayload {
                id: p.id,
                policy_name: p.policy_name,
                policy_data: p.policy_data,
            })
            .into_iter()
            .collect(),
        None => Vec::new(),
    };

    // files only flow for products still marked active
    let files = match &product {
        Some(p) if p.status == ProductStatus::Active => {
            queries::list_active_product_files(conn, &p.id)?
                .into_iter()
                .map(|detail| {
                    let token = state.signer.issue(&detail.file_id, DEFAULT_DOWNLOAD_TTL);
                    FileDownload {
                        url: format!(
                            "/api/client/files/{}?{}",
                            detail.file_id,
                            token.query_string()
                        ),
                        url_expires_at: token.exp,
                        file_id: detail.file_id,
                        label: detail.label,
                        description: detail.description,
                        file_name: detail.file_name,
                        mime_type: detail.mime_type,
                        file_size: detail.file_size,
                        checksum: detail.checksum,
                    }
                })
                .collect()
        }
        _ => Vec::new(),
    };

    Ok(LicensePayload {
        license_key: license.license_key.clone(),
        device_id: device.id.clone(),
        expires_at: license.expires_at,
        max_devices: license.max_devices,
        product: product.map(|p| ProductSummary {
            id: p.id,
            name: p.name,
        }),
        policies,
        files,
    })
}

/// POST /api/client/activate
///
/// Binds the calling device to the license. Idempotent for an already
/// active fingerprint (200); a fresh or reused slot answers 201.
pub async fn activate_license(
    State(state): State<AppState>,
    Json(req): Json<ActivateRequest>,
) -> Result<impl IntoResponse> {
    let mut conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, &req.license_key)?
        .ok_or_else(|| AppError::NotFound("License not found".to_string()))?;
    license.check_usable(clock::today()).map_err(license_denied)?;

    let fp = fingerprint::device_fingerprint(&req.device_info);
    let device_info_json = serde_json::to_string(&req.device_info)?;
    let device_name = req.device_info.hostname.as_deref();

    let outcome =
        queries::activate_device_atomic(&mut conn, &license, &fp, &device_info_json, device_name)?;

    let (status, action) = match &outcome {
        queries::ActivationOutcome::Existing(_) => (StatusCode::OK, None),
        queries::ActivationOutcome::Created(_) => {
            (StatusCode::CREATED, Some(DeviceAction::Activated))
        }
        queries::ActivationOutcome::Reactivated(_) => {
            (StatusCode::CREATED, Some(DeviceAction::Reactivated))
        }
    };
    let device = outcome.device();
    if let Some(action) = action {
        audit::log_device_activity(
            &conn,
            &device.id,
            &license.id,
            action,
            &format!("client activation for {}", license.license_key),
        );
    }

    let payload = build_license_payload(&state, &conn, &license, device)?;
    Ok((status, axum::Json(payload)))
}

/// POST /api/client/validate
///
/// Periodic heartbeat. Requires an existing active binding; never
/// consumes a slot or creates rows, only touches `last_validated_at`.
pub async fn validate_license(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, &req.license_key)?
        .ok_or_else(|| AppError::NotFound("License not found".to_string()))?;
    license.check_usable(clock::today()).map_err(license_denied)?;

    let fp = fingerprint::device_fingerprint(&req.device_info);
    let device = queries::touch_device_validation(&conn, &license.id, &fp)?.ok_or_else(|| {
        AppError::NotFound("Device not activated for this license".to_string())
    })?;

    let payload = build_license_payload(&state, &conn, &license, &device)?;
    Ok(axum::Json(payload))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub exp: i64,
    pub nonce: String,
    pub sig: String,
}

/// GET /api/client/files/{file_id}?exp=..&nonce=..&sig=..
///
/// Serves a stored file when the presented token verifies. Failures
/// are deliberately indistinguishable to the caller.
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(q): Query<DownloadQuery>,
) -> Result<impl IntoResponse> {
    if let Err(e) = state.signer.verify(&file_id, q.exp, &q.nonce, &q.sig) {
        tracing::debug!(%file_id, "Rejected download token: {}", e);
        return Err(AppError::Forbidden(
            "Download link is invalid or expired".to_string(),
        ));
    }

    let file = {
        let conn = state.db.get()?;
        queries::get_file(&conn, &file_id)?
    }
    .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let path = std::path::Path::new(&state.files_dir).join(&file.storage_path);
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        tracing::error!(%file_id, path = %path.display(), "Failed to read stored file: {}", e);
        AppError::Internal("File unavailable".to_string())
    })?;

    let headers = [
        (header::CONTENT_TYPE, file.mime_type.clone()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.file_name),
        ),
    ];
    Ok((headers, bytes))
}
