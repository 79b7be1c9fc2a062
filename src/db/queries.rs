//! All SQL lives here. Handlers never touch raw SQL directly.
//!
//! Slot-sensitive mutations (`activate_device_atomic`,
//! `reactivate_device_atomic`, `delete_admin`) run inside IMMEDIATE
//! transactions so the count they read and the write they make share
//! one write lock.

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use super::from_row::{
    ADMIN_ACTIVITY_COLS, ADMIN_COLS, DEVICE_ACTIVITY_COLS, DEVICE_COLS, FILE_COLS, FromRow,
    LICENSE_COLS, POLICY_COLS, PRODUCT_COLS, PRODUCT_FILE_DETAIL_COLS, query_all, query_one,
};
use crate::clock;
use crate::crypto;
use crate::error::{AppError, Result};
use crate::id;
use crate::models::*;

fn now() -> i64 {
    clock::now_ts()
}

/// Prefix every column in a COLS constant with a table alias.
fn prefix_cols(alias: &str, cols: &str) -> String {
    cols.split(", ")
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============ Partial update builder ============

struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    /// Set only when a value is present; `None` leaves the column alone.
    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Execute the update and return the updated entity via RETURNING.
    /// `None` when no rows matched or there was nothing to set.
    fn execute_returning<T: FromRow>(
        mut self,
        conn: &Connection,
        returning_cols: &str,
    ) -> Result<Option<T>> {
        if self.fields.is_empty() {
            return Ok(None);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? RETURNING {}",
            self.table,
            sets.join(", "),
            returning_cols
        );
        conn.query_row(&sql, rusqlite::params_from_iter(values), T::from_row)
            .optional()
            .map_err(Into::into)
    }
}

// ============ Scope filtering ============

/// SQL projection of a resource scope, ANDed into listing queries.
/// Must stay in agreement with `ResourceScope::can_access`.
pub fn scope_filter(
    scope: &ResourceScope,
    id_column: &str,
    owner_column: &str,
    admin_id: &str,
) -> (String, Vec<Value>) {
    match scope.mode {
        ScopeMode::All => (String::new(), Vec::new()),
        ScopeMode::None => (" AND 1=0".to_string(), Vec::new()),
        ScopeMode::Own => {
            let admin = admin_id.trim();
            if admin.is_empty() {
                (" AND 1=0".to_string(), Vec::new())
            } else {
                (
                    format!(" AND {} = ?", owner_column),
                    vec![admin.to_string().into()],
                )
            }
        }
        ScopeMode::Custom => {
            if scope.selected_ids.is_empty() {
                (" AND 1=0".to_string(), Vec::new())
            } else {
                let placeholders = vec!["?"; scope.selected_ids.len()].join(", ");
                let values = scope
                    .selected_ids
                    .iter()
                    .map(|id| id.clone().into())
                    .collect();
                (
                    format!(" AND {} IN ({})", id_column, placeholders),
                    values,
                )
            }
        }
    }
}

/// Effective scope for one admin and resource type. Super admins
/// short-circuit to `all` without touching the scope tables; a missing
/// row also means `all`.
pub fn resolve_scope(
    conn: &Connection,
    role: AdminRole,
    admin_id: &str,
    resource_type: ResourceType,
) -> Result<ResourceScope> {
    if role == AdminRole::SuperAdmin {
        return Ok(ResourceScope::all());
    }
    get_admin_scope(conn, admin_id, resource_type)
}

pub fn get_admin_scope(
    conn: &Connection,
    admin_id: &str,
    resource_type: ResourceType,
) -> Result<ResourceScope> {
    let mode: Option<String> = conn
        .query_row(
            "SELECT mode FROM admin_resource_scopes
             WHERE admin_id = ?1 AND resource_type = ?2",
            params![admin_id, resource_type.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    let mode = match mode {
        Some(raw) => ScopeMode::parse_lenient(&raw),
        None => return Ok(ResourceScope::all()),
    };
    let selected_ids = if mode == ScopeMode::Custom {
        let mut stmt = conn.prepare(
            "SELECT resource_id FROM admin_resource_selections
             WHERE admin_id = ?1 AND resource_type = ?2
             ORDER BY resource_id",
        )?;
        let ids = stmt
            .query_map(params![admin_id, resource_type.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        ids
    } else {
        Vec::new()
    };
    Ok(ResourceScope { mode, selected_ids }.normalized())
}

pub fn get_admin_permissions(
    conn: &Connection,
    admin_id: &str,
) -> Result<AdminResourcePermissions> {
    let mut perms = AdminResourcePermissions::default();
    for resource_type in ResourceType::ALL {
        *perms.get_mut(resource_type) = get_admin_scope(conn, admin_id, resource_type)?;
    }
    Ok(perms)
}

/// Replace the full scope configuration for one admin in a single
/// transaction. Readers never observe a half-replaced config.
pub fn replace_admin_permissions(
    conn: &mut Connection,
    admin_id: &str,
    perms: &AdminResourcePermissions,
) -> Result<()> {
    let ts = now();
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for resource_type in ResourceType::ALL {
        let scope = perms.get(resource_type);
        tx.execute(
            "INSERT INTO admin_resource_scopes (admin_id, resource_type, mode, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (admin_id, resource_type)
             DO UPDATE SET mode = excluded.mode, updated_at = excluded.updated_at",
            params![admin_id, resource_type.as_str(), scope.mode.as_str(), ts],
        )?;
        tx.execute(
            "DELETE FROM admin_resource_selections
             WHERE admin_id = ?1 AND resource_type = ?2",
            params![admin_id, resource_type.as_str()],
        )?;
        for resource_id in &scope.selected_ids {
            tx.execute(
                "INSERT INTO admin_resource_selections (admin_id, resource_type, resource_id)
                 VALUES (?1, ?2, ?3)",
                params![admin_id, resource_type.as_str(), resource_id],
            )?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ============ Admins ============

/// Create an admin. The returned API key is shown once and never
/// stored in the clear.
pub fn create_admin(conn: &Connection, username: &str, role: AdminRole) -> Result<(Admin, String)> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".to_string()));
    }
    if get_admin_by_username(conn, username)?.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    let id = id::generate(id::ADMIN_PREFIX);
    let api_key = crypto::generate_api_key();
    let ts = now();
    conn.execute(
        "INSERT INTO admins (id, username, role, api_key_hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, username, role.as_str(), crypto::hash_secret(&api_key), ts],
    )?;
    Ok((
        Admin {
            id,
            username: username.to_string(),
            role,
            created_at: ts,
        },
        api_key,
    ))
}

pub fn get_admin_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<Admin>> {
    query_one(
        conn,
        &format!("SELECT {} FROM admins WHERE api_key_hash = ?", ADMIN_COLS),
        &[&crypto::hash_secret(api_key)],
    )
}

pub fn get_admin(conn: &Connection, admin_id: &str) -> Result<Option<Admin>> {
    query_one(
        conn,
        &format!("SELECT {} FROM admins WHERE id = ?", ADMIN_COLS),
        &[&admin_id],
    )
}

pub fn get_admin_by_username(conn: &Connection, username: &str) -> Result<Option<Admin>> {
    query_one(
        conn,
        &format!("SELECT {} FROM admins WHERE username = ?", ADMIN_COLS),
        &[&username],
    )
}

pub fn list_admins(conn: &Connection) -> Result<Vec<Admin>> {
    query_all(
        conn,
        &format!("SELECT {} FROM admins ORDER BY created_at", ADMIN_COLS),
        &[],
    )
}

pub fn count_admins(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))
        .map_err(Into::into)
}

/// Delete an admin. The count check and the delete share one write
/// lock so two concurrent deletes cannot remove the last super admin.
pub fn delete_admin(conn: &mut Connection, admin_id: &str) -> Result<Admin> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let admin: Admin = query_one(
        &tx,
        &format!("SELECT {} FROM admins WHERE id = ?", ADMIN_COLS),
        &[&admin_id],
    )?
    .ok_or_else(|| AppError::NotFound("Admin not found".to_string()))?;

    if admin.role == AdminRole::SuperAdmin {
        let supers: i64 = tx.query_row(
            "SELECT COUNT(*) FROM admins WHERE role = 'super_admin'",
            [],
            |row| row.get(0),
        )?;
        if supers <= 1 {
            return Err(AppError::Conflict(
                "At least one super admin must remain".to_string(),
            ));
        }
    }
    tx.execute("DELETE FROM admins WHERE id = ?", params![admin_id])?;
    tx.commit()?;
    Ok(admin)
}

// ============ Products ============

pub fn create_product(
    conn: &Connection,
    name: &str,
    created_by: Option<&str>,
) -> Result<Product> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Product name is required".to_string()));
    }
    let id = id::generate(id::PRODUCT_PREFIX);
    let ts = now();
    conn.execute(
        "INSERT INTO products (id, name, status, created_by, created_at)
         VALUES (?1, ?2, 'active', ?3, ?4)",
        params![id, name, created_by, ts],
    )?;
    Ok(Product {
        id,
        name: name.to_string(),
        status: ProductStatus::Active,
        created_by: created_by.map(|s| s.to_string()),
        created_at: ts,
    })
}

pub fn get_product(conn: &Connection, product_id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLS),
        &[&product_id],
    )
}

pub fn list_products(
    conn: &Connection,
    scope: &ResourceScope,
    admin_id: &str,
) -> Result<Vec<Product>> {
    let (frag, values) = scope_filter(scope, "id", "created_by", admin_id);
    let sql = format!(
        "SELECT {} FROM products WHERE 1=1{} ORDER BY created_at DESC",
        PRODUCT_COLS, frag
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(values), Product::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Hard delete. Licenses pointing at the product keep working with a
/// NULL product reference (ON DELETE SET NULL).
pub fn delete_product(conn: &Connection, product_id: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM products WHERE id = ?", params![product_id])?;
    Ok(affected > 0)
}

// ============ Policies ============

pub fn create_policy(
    conn: &Connection,
    name: &str,
    data: &serde_json::Value,
    created_by: Option<&str>,
) -> Result<Policy> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Policy name is required".to_string()));
    }
    let id = id::generate(id::POLICY_PREFIX);
    let ts = now();
    conn.execute(
        "INSERT INTO policies (id, policy_name, policy_data, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, name, serde_json::to_string(data)?, created_by, ts],
    )?;
    Ok(Policy {
        id,
        policy_name: name.to_string(),
        policy_data: data.clone(),
        created_by: created_by.map(|s| s.to_string()),
        created_at: ts,
    })
}

pub fn get_policy(conn: &Connection, policy_id: &str) -> Result<Option<Policy>> {
    query_one(
        conn,
        &format!("SELECT {} FROM policies WHERE id = ?", POLICY_COLS),
        &[&policy_id],
    )
}

pub fn list_policies(
    conn: &Connection,
    scope: &ResourceScope,
    admin_id: &str,
) -> Result<Vec<Policy>> {
    let (frag, values) = scope_filter(scope, "id", "created_by", admin_id);
    let sql = format!(
        "SELECT {} FROM policies WHERE 1=1{} ORDER BY created_at DESC",
        POLICY_COLS, frag
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(values), Policy::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_policy(conn: &Connection, policy_id: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM policies WHERE id = ?", params![policy_id])?;
    Ok(affected > 0)
}

// ============ Files ============

pub struct NewFile<'a> {
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub file_size: i64,
    pub checksum: Option<&'a str>,
    pub storage_path: &'a str,
}

pub fn create_file(conn: &Connection, input: &NewFile) -> Result<StoredFile> {
    let id = id::generate(id::FILE_PREFIX);
    let ts = now();
    conn.execute(
        "INSERT INTO files (id, file_name, mime_type, file_size, checksum, storage_path, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            input.file_name,
            input.mime_type,
            input.file_size,
            input.checksum,
            input.storage_path,
            ts
        ],
    )?;
    Ok(StoredFile {
        id,
        file_name: input.file_name.to_string(),
        mime_type: input.mime_type.to_string(),
        file_size: input.file_size,
        checksum: input.checksum.map(|s| s.to_string()),
        storage_path: input.storage_path.to_string(),
        created_at: ts,
    })
}

pub fn get_file(conn: &Connection, file_id: &str) -> Result<Option<StoredFile>> {
    query_one(
        conn,
        &format!("SELECT {} FROM files WHERE id = ?", FILE_COLS),
        &[&file_id],
    )
}

pub fn attach_product_file(
    conn: &Connection,
    product_id: &str,
    file_id: &str,
    label: &str,
    description: Option<&str>,
    sort_order: i64,
) -> Result<String> {
    let id = id::generate(id::FILE_PREFIX);
    conn.execute(
        "INSERT INTO product_files
             (id, product_id, file_id, label, description, sort_order, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
        params![id, product_id, file_id, label, description, sort_order, now()],
    )?;
    Ok(id)
}

/// Active attachments for a product, in display order, joined with
/// file metadata. Feeds the client activation payload.
pub fn list_active_product_files(
    conn: &Connection,
    product_id: &str,
) -> Result<Vec<ProductFileDetail>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM product_files pf
             JOIN files f ON f.id = pf.file_id
             WHERE pf.product_id = ? AND pf.is_active = 1
             ORDER BY pf.sort_order, pf.label",
            PRODUCT_FILE_DETAIL_COLS
        ),
        &[&product_id],
    )
}

// ============ Licenses ============

pub struct NewLicense<'a> {
    pub product_id: &'a str,
    pub policy_id: Option<&'a str>,
    pub customer_name: &'a str,
    pub customer_email: &'a str,
    pub max_devices: i64,
    pub expires_at: NaiveDate,
    pub notes: Option<&'a str>,
    pub created_by: &'a str,
}

pub fn create_license(conn: &Connection, input: &NewLicense) -> Result<License> {
    let id = id::generate(id::LICENSE_PREFIX);
    let ts = now();

    // 64 bits of entropy makes collisions unlikely; retry a few times
    // anyway rather than surfacing a constraint error.
    let mut license_key = crypto::generate_license_key();
    for _ in 0..4 {
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM licenses WHERE license_key = ?",
            params![license_key],
            |row| row.get(0),
        )?;
        if exists == 0 {
            break;
        }
        license_key = crypto::generate_license_key();
    }

    conn.execute(
        "INSERT INTO licenses
             (id, license_key, product_id, policy_id, customer_name, customer_email,
              max_devices, expires_at, status, created_by, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', ?9, ?10, ?11, ?11)",
        params![
            id,
            license_key,
            input.product_id,
            input.policy_id,
            input.customer_name,
            input.customer_email,
            input.max_devices,
            input.expires_at.to_string(),
            input.created_by,
            input.notes,
            ts
        ],
    )?;
    Ok(License {
        id,
        license_key,
        product_id: Some(input.product_id.to_string()),
        policy_id: input.policy_id.map(|s| s.to_string()),
        customer_name: input.customer_name.to_string(),
        customer_email: input.customer_email.to_string(),
        max_devices: input.max_devices,
        expires_at: input.expires_at,
        status: LicenseStatus::Active,
        created_by: Some(input.created_by.to_string()),
        notes: input.notes.map(|s| s.to_string()),
        created_at: ts,
        updated_at: ts,
    })
}

pub fn get_license(conn: &Connection, license_id: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE id = ?", LICENSE_COLS),
        &[&license_id],
    )
}

pub fn get_license_by_key(conn: &Connection, license_key: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE license_key = ?", LICENSE_COLS),
        &[&license_key.trim()],
    )
}

pub struct LicenseListFilter {
    pub page: i64,
    pub page_size: i64,
    pub status: Option<LicenseStatus>,
    pub search: Option<String>,
}

pub fn list_licenses(
    conn: &Connection,
    filter: &LicenseListFilter,
    scope: &ResourceScope,
    admin_id: &str,
) -> Result<(Vec<LicenseWithUsage>, i64)> {
    let mut where_sql = String::from("WHERE 1=1");
    let mut values: Vec<Value> = Vec::new();

    if let Some(status) = filter.status {
        where_sql.push_str(" AND l.status = ?");
        values.push(status.as_str().to_string().into());
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        where_sql.push_str(
            " AND (l.license_key LIKE ? OR l.customer_name LIKE ? OR l.customer_email LIKE ?)",
        );
        let pattern = format!("%{}%", search);
        for _ in 0..3 {
            values.push(pattern.clone().into());
        }
    }
    let (frag, mut scope_values) = scope_filter(scope, "l.id", "l.created_by", admin_id);
    where_sql.push_str(&frag);
    values.append(&mut scope_values);

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM licenses l {}", where_sql),
        rusqlite::params_from_iter(values.clone()),
        |row| row.get(0),
    )?;

    values.push(filter.page_size.into());
    values.push(((filter.page - 1) * filter.page_size).into());
    let sql = format!(
        "SELECT {},
                (SELECT COUNT(*) FROM device_activations d
                 WHERE d.license_id = l.id AND d.status = 'active') AS active_devices
         FROM licenses l {}
         ORDER BY l.created_at DESC
         LIMIT ? OFFSET ?",
        prefix_cols("l", LICENSE_COLS),
        where_sql
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(values),
            LicenseWithUsage::from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((rows, total))
}

pub struct LicenseUpdate<'a> {
    pub customer_name: Option<&'a str>,
    pub customer_email: Option<&'a str>,
    pub max_devices: Option<i64>,
    pub expires_at: Option<NaiveDate>,
    pub policy_id: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Apply a partial update. Absent fields are left untouched. Returns
/// the row as stored afterwards, `None` when the license is gone.
///
/// Lowering `max_devices` below the live active-device count is a
/// Conflict; the count read and the write share one IMMEDIATE
/// transaction so a concurrent activation cannot slip between them.
pub fn update_license(
    conn: &mut Connection,
    license_id: &str,
    update: &LicenseUpdate,
) -> Result<Option<License>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if let Some(max_devices) = update.max_devices {
        let active = count_active_devices(&tx, license_id)?;
        if max_devices < active {
            return Err(AppError::Conflict(format!(
                "max_devices cannot be below the current active device count ({})",
                active
            )));
        }
    }
    let updated = UpdateBuilder::new("licenses", license_id)
        .with_updated_at()
        .set_opt("customer_name", update.customer_name.map(str::to_string))
        .set_opt("customer_email", update.customer_email.map(str::to_string))
        .set_opt("max_devices", update.max_devices)
        .set_opt("expires_at", update.expires_at.map(|d| d.to_string()))
        .set_opt("policy_id", update.policy_id.map(str::to_string))
        .set_opt("notes", update.notes.map(str::to_string))
        .execute_returning::<License>(&tx, LICENSE_COLS)?;
    let result = match updated {
        Some(license) => Some(license),
        // nothing to set: report current state instead of None
        None => get_license(&tx, license_id)?,
    };
    tx.commit()?;
    Ok(result)
}

/// Reconcile status with the expiry date after an edit: an expired
/// license whose date moved into the future comes back to life, an
/// active one whose date moved into the past expires immediately.
/// Revoked licenses never transition. Returns the new status when a
/// transition happened.
pub fn apply_expiry_transition(
    conn: &Connection,
    license: &License,
    today: NaiveDate,
) -> Result<Option<LicenseStatus>> {
    let target = match (license.status, license.is_expired(today)) {
        (LicenseStatus::Expired, false) => LicenseStatus::Active,
        (LicenseStatus::Active, true) => LicenseStatus::Expired,
        _ => return Ok(None),
    };
    conn.execute(
        "UPDATE licenses SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![target.as_str(), now(), license.id],
    )?;
    Ok(Some(target))
}

/// Revoke is terminal: no transition ever leaves `revoked`.
pub fn revoke_license(conn: &Connection, license_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE licenses SET status = 'revoked', updated_at = ?1 WHERE id = ?2",
        params![now(), license_id],
    )?;
    Ok(affected > 0)
}

/// Hard delete; activations go with it (ON DELETE CASCADE).
pub fn delete_license(conn: &Connection, license_id: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM licenses WHERE id = ?", params![license_id])?;
    Ok(affected > 0)
}

pub fn count_active_devices(conn: &Connection, license_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM device_activations WHERE license_id = ?1 AND status = 'active'",
        params![license_id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Bulk-expire every active license whose date has passed. One UPDATE,
/// idempotent; returns the number of rows transitioned.
pub fn expire_overdue_licenses(conn: &Connection, today: NaiveDate) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE licenses SET status = 'expired', updated_at = ?1
         WHERE status = 'active' AND expires_at < ?2",
        params![now(), today.to_string()],
    )?;
    Ok(affected)
}

// ============ Devices ============

#[derive(Debug)]
pub enum ActivationOutcome {
    /// Same fingerprint already active: nothing consumed.
    Existing(DeviceActivation),
    /// New fingerprint took a free slot.
    Created(DeviceActivation),
    /// A previously deactivated row for this fingerprint was reused.
    Reactivated(DeviceActivation),
}

impl ActivationOutcome {
    pub fn device(&self) -> &DeviceActivation {
        match self {
            ActivationOutcome::Existing(d)
            | ActivationOutcome::Created(d)
            | ActivationOutcome::Reactivated(d) => d,
        }
    }
}

/// Bind a device to a license. The slot count and the row write happen
/// under one IMMEDIATE transaction, so concurrent activations for the
/// same license serialize and the limit can never be oversubscribed.
/// The UNIQUE(license_id, device_fingerprint) constraint backstops
/// duplicate rows; a deactivated row for the same fingerprint is
/// reused in place, never duplicated.
pub fn activate_device_atomic(
    conn: &mut Connection,
    license: &License,
    fingerprint: &str,
    device_info_json: &str,
    device_name: Option<&str>,
) -> Result<ActivationOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let ts = now();

    let existing: Option<DeviceActivation> = query_one(
        &tx,
        &format!(
            "SELECT {} FROM device_activations
             WHERE license_id = ? AND device_fingerprint = ?",
            DEVICE_COLS
        ),
        &[&license.id, &fingerprint],
    )?;

    match existing {
        // already active: idempotent, the row comes back unchanged and
        // only validation touches last_validated_at
        Some(device) if device.status == DeviceStatus::Active => {
            tx.commit()?;
            Ok(ActivationOutcome::Existing(device))
        }
        reusable => {
            // the caller's License row may predate a concurrent limit
            // change; the stored value decides
            let max_devices: i64 = tx.query_row(
                "SELECT max_devices FROM licenses WHERE id = ?",
                params![license.id],
                |row| row.get(0),
            )?;
            let active: i64 = tx.query_row(
                "SELECT COUNT(*) FROM device_activations
                 WHERE license_id = ?1 AND status = 'active'",
                params![license.id],
                |row| row.get(0),
            )?;
            if active >= max_devices {
                return Err(AppError::Conflict(
                    "Maximum device limit reached".to_string(),
                ));
            }
            match reusable {
                Some(device) => {
                    tx.execute(
                        "UPDATE device_activations
                         SET status = 'active', device_info = ?1, device_name = ?2,
                             last_validated_at = ?3, deactivated_at = NULL
                         WHERE id = ?4",
                        params![device_info_json, device_name, ts, device.id],
                    )?;
                    tx.commit()?;
                    Ok(ActivationOutcome::Reactivated(DeviceActivation {
                        device_info: device_info_json.to_string(),
                        device_name: device_name.map(|s| s.to_string()),
                        status: DeviceStatus::Active,
                        last_validated_at: ts,
                        deactivated_at: None,
                        ..device
                    }))
                }
                None => {
                    let device = DeviceActivation {
                        id: id::generate(id::DEVICE_PREFIX),
                        license_id: license.id.clone(),
                        device_fingerprint: fingerprint.to_string(),
                        device_info: device_info_json.to_string(),
                        device_name: device_name.map(|s| s.to_string()),
                        status: DeviceStatus::Active,
                        activated_at: ts,
                        last_validated_at: ts,
                        deactivated_at: None,
                    };
                    tx.execute(
                        "INSERT INTO device_activations
                             (id, license_id, device_fingerprint, device_info, device_name,
                              status, activated_at, last_validated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?6)",
                        params![
                            device.id,
                            device.license_id,
                            device.device_fingerprint,
                            device.device_info,
                            device.device_name,
                            ts
                        ],
                    )?;
                    tx.commit()?;
                    Ok(ActivationOutcome::Created(device))
                }
            }
        }
    }
}

/// Touch the validation timestamp of an active binding. `None` means
/// no active activation exists; validation never creates rows.
pub fn touch_device_validation(
    conn: &Connection,
    license_id: &str,
    fingerprint: &str,
) -> Result<Option<DeviceActivation>> {
    conn.query_row(
        &format!(
            "UPDATE device_activations SET last_validated_at = ?1
             WHERE license_id = ?2 AND device_fingerprint = ?3 AND status = 'active'
             RETURNING {}",
            DEVICE_COLS
        ),
        params![now(), license_id, fingerprint],
        DeviceActivation::from_row,
    )
    .optional()
    .map_err(Into::into)
}

pub fn get_device(conn: &Connection, device_id: &str) -> Result<Option<DeviceActivation>> {
    query_one(
        conn,
        &format!("SELECT {} FROM device_activations WHERE id = ?", DEVICE_COLS),
        &[&device_id],
    )
}

pub fn list_devices_for_license(
    conn: &Connection,
    license_id: &str,
) -> Result<Vec<DeviceActivation>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM device_activations WHERE license_id = ? ORDER BY activated_at",
            DEVICE_COLS
        ),
        &[&license_id],
    )
}

/// Unconditional deactivation; frees a slot immediately.
pub fn deactivate_device(conn: &Connection, device_id: &str) -> Result<Option<DeviceActivation>> {
    conn.query_row(
        &format!(
            "UPDATE device_activations
             SET status = 'deactivated', deactivated_at = ?1
             WHERE id = ?2
             RETURNING {}",
            DEVICE_COLS
        ),
        params![now(), device_id],
        DeviceActivation::from_row,
    )
    .optional()
    .map_err(Into::into)
}

/// Bring a deactivated device back, but only while the license still
/// has a free slot. Count and update run under one write lock.
pub fn reactivate_device_atomic(
    conn: &mut Connection,
    device_id: &str,
) -> Result<DeviceActivation> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let device: DeviceActivation = query_one(
        &tx,
        &format!("SELECT {} FROM device_activations WHERE id = ?", DEVICE_COLS),
        &[&device_id],
    )?
    .ok_or_else(|| AppError::NotFound("Device not found".to_string()))?;

    if device.status == DeviceStatus::Active {
        return Err(AppError::Conflict("Device is already active".to_string()));
    }
    let max_devices: i64 = tx.query_row(
        "SELECT max_devices FROM licenses WHERE id = ?",
        params![device.license_id],
        |row| row.get(0),
    )?;
    let active: i64 = tx.query_row(
        "SELECT COUNT(*) FROM device_activations
         WHERE license_id = ?1 AND status = 'active'",
        params![device.license_id],
        |row| row.get(0),
    )?;
    if active >= max_devices {
        return Err(AppError::Conflict(
            "Maximum device limit reached".to_string(),
        ));
    }
    let ts = now();
    tx.execute(
        "UPDATE device_activations
         SET status = 'active', deactivated_at = NULL, last_validated_at = ?1
         WHERE id = ?2",
        params![ts, device_id],
    )?;
    tx.commit()?;
    Ok(DeviceActivation {
        status: DeviceStatus::Active,
        deactivated_at: None,
        last_validated_at: ts,
        ..device
    })
}

pub fn delete_device(conn: &Connection, device_id: &str) -> Result<Option<DeviceActivation>> {
    conn.query_row(
        &format!(
            "DELETE FROM device_activations WHERE id = ? RETURNING {}",
            DEVICE_COLS
        ),
        params![device_id],
        DeviceActivation::from_row,
    )
    .optional()
    .map_err(Into::into)
}

/// Purge deactivated rows whose `deactivated_at` is older than the
/// cutoff. Active rows are never touched.
pub fn cleanup_inactive_devices(conn: &Connection, cutoff: i64) -> Result<usize> {
    let affected = conn.execute(
        "DELETE FROM device_activations
         WHERE status = 'deactivated' AND deactivated_at IS NOT NULL AND deactivated_at <= ?1",
        params![cutoff],
    )?;
    Ok(affected)
}

// ============ Activity logs ============

pub fn insert_admin_activity(
    conn: &Connection,
    admin_id: &str,
    username: &str,
    action: AdminAction,
    details: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO admin_activity_logs (id, admin_id, username, action, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id::generate(id::LOG_PREFIX),
            admin_id,
            username,
            action.as_str(),
            details,
            now()
        ],
    )?;
    Ok(())
}

pub fn insert_device_activity(
    conn: &Connection,
    device_id: &str,
    license_id: &str,
    action: DeviceAction,
    details: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO device_activity_logs (id, device_id, license_id, action, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id::generate(id::LOG_PREFIX),
            device_id,
            license_id,
            action.as_str(),
            details,
            now()
        ],
    )?;
    Ok(())
}

pub fn list_admin_activity(conn: &Connection, limit: i64) -> Result<Vec<AdminActivity>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM admin_activity_logs ORDER BY created_at DESC, id LIMIT ?",
            ADMIN_ACTIVITY_COLS
        ),
        &[&limit],
    )
}

pub fn list_device_activity(
    conn: &Connection,
    device_id: &str,
    limit: i64,
) -> Result<Vec<DeviceActivity>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM device_activity_logs
             WHERE device_id = ? ORDER BY created_at DESC, id LIMIT ?",
            DEVICE_ACTIVITY_COLS
        ),
        &[&device_id, &limit],
    )
}
