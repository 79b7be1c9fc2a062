//! Minimal product, policy and file administration. Enough surface to
//! give licenses real referents and scope filtering real targets; no
//! upload handling, files are registered by metadata.

use axum::Extension;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::middleware::AdminContext;
use crate::models::*;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
}

/// POST /api/admin/products
pub async fn create_product(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(req): Json<CreateProductRequest>,
) -> Result<impl IntoResponse> {
    admin.require_super()?;
    let conn = state.db.get()?;
    let product = queries::create_product(&conn, &req.name, Some(&admin.admin_id))?;
    Ok((StatusCode::CREATED, axum::Json(product)))
}

/// GET /api/admin/products
pub async fn list_products(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;
    let scope =
        queries::resolve_scope(&conn, admin.role, &admin.admin_id, ResourceType::Products)?;
    Ok(axum::Json(queries::list_products(
        &conn,
        &scope,
        &admin.admin_id,
    )?))
}

/// DELETE /api/admin/products/{id}
///
/// Licenses keep working: their product reference goes NULL and they
/// simply stop listing downloadable files.
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse> {
    admin.require_super()?;
    let conn = state.db.get()?;
    if !queries::delete_product(&conn, &product_id)? {
        return Err(AppError::NotFound("Product not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RegisterFileRequest {
    pub file_name: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub checksum: Option<String>,
    pub storage_path: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

fn default_mime_type() -> String {
    "application/octet-stream".to_string()
}

/// POST /api/admin/products/{id}/files
///
/// Registers an already stored file and attaches it to the product.
pub async fn register_product_file(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(product_id): Path<String>,
    Json(req): Json<RegisterFileRequest>,
) -> Result<impl IntoResponse> {
    admin.require_super()?;
    if req.storage_path.contains("..") {
        return Err(AppError::BadRequest(
            "storage_path must stay inside the files directory".to_string(),
        ));
    }
    let conn = state.db.get()?;
    queries::get_product(&conn, &product_id)?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let file = queries::create_file(
        &conn,
        &queries::NewFile {
            file_name: &req.file_name,
            mime_type: &req.mime_type,
            file_size: req.file_size,
            checksum: req.checksum.as_deref(),
            storage_path: &req.storage_path,
        },
    )?;
    queries::attach_product_file(
        &conn,
        &product_id,
        &file.id,
        &req.label,
        req.description.as_deref(),
        req.sort_order,
    )?;
    Ok((StatusCode::CREATED, axum::Json(file)))
}

#[derive(Debug, Deserialize)]
pub struct CreatePolicyRequest {
    pub policy_name: String,
    #[serde(default = "default_policy_data")]
    pub policy_data: serde_json::Value,
}

fn default_policy_data() -> serde_json::Value {
    json!({})
}

/// POST /api/admin/policies
pub async fn create_policy(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Json(req): Json<CreatePolicyRequest>,
) -> Result<impl IntoResponse> {
    admin.require_super()?;
    let conn = state.db.get()?;
    let policy = queries::create_policy(
        &conn,
        &req.policy_name,
        &req.policy_data,
        Some(&admin.admin_id),
    )?;
    Ok((StatusCode::CREATED, axum::Json(policy)))
}

/// GET /api/admin/policies
pub async fn list_policies(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;
    let scope =
        queries::resolve_scope(&conn, admin.role, &admin.admin_id, ResourceType::Policies)?;
    Ok(axum::Json(queries::list_policies(
        &conn,
        &scope,
        &admin.admin_id,
    )?))
}

/// DELETE /api/admin/policies/{id}
pub async fn delete_policy(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(policy_id): Path<String>,
) -> Result<impl IntoResponse> {
    admin.require_super()?;
    let conn = state.db.get()?;
    if !queries::delete_policy(&conn, &policy_id)? {
        return Err(AppError::NotFound("Policy not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
