//! Row mapping trait and helpers for reducing boilerplate in queries.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
pub(crate) fn parse_enum<T: std::str::FromStr>(
    row: &Row,
    col: usize,
    col_name: &str,
) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Parse a `YYYY-MM-DD` text column.
pub(crate) fn parse_date(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<NaiveDate> {
    let raw = row.get::<_, String>(col)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const ADMIN_COLS: &str = "id, username, role, created_at";

pub const PRODUCT_COLS: &str = "id, name, status, created_by, created_at";

pub const POLICY_COLS: &str = "id, policy_name, policy_data, created_by, created_at";

pub const LICENSE_COLS: &str = "id, license_key, product_id, policy_id, customer_name, \
     customer_email, max_devices, expires_at, status, created_by, notes, created_at, updated_at";

pub const DEVICE_COLS: &str = "id, license_id, device_fingerprint, device_info, device_name, \
     status, activated_at, last_validated_at, deactivated_at";

pub const FILE_COLS: &str =
    "id, file_name, mime_type, file_size, checksum, storage_path, created_at";

pub const PRODUCT_FILE_DETAIL_COLS: &str = "pf.id, pf.file_id, pf.label, pf.description, \
     pf.sort_order, f.file_name, f.mime_type, f.file_size, f.checksum";

pub const ADMIN_ACTIVITY_COLS: &str = "id, admin_id, username, action, details, created_at";

pub const DEVICE_ACTIVITY_COLS: &str = "id, device_id, license_id, action, details, created_at";

// ============ FromRow Implementations ============

impl FromRow for Admin {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Admin {
            id: row.get(0)?,
            username: row.get(1)?,
            role: parse_enum(row, 2, "role")?,
            created_at: row.get(3)?,
        })
    }
}

impl FromRow for Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            status: parse_enum(row, 2, "status")?,
            created_by: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for Policy {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let raw: String = row.get(2)?;
        let policy_data = serde_json::from_str(&raw).map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                2,
                "policy_data".to_string(),
                rusqlite::types::Type::Text,
            )
        })?;
        Ok(Policy {
            id: row.get(0)?,
            policy_name: row.get(1)?,
            policy_data,
            created_by: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for License {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(License {
            id: row.get(0)?,
            license_key: row.get(1)?,
            product_id: row.get(2)?,
            policy_id: row.get(3)?,
            customer_name: row.get(4)?,
            customer_email: row.get(5)?,
            max_devices: row.get(6)?,
            expires_at: parse_date(row, 7, "expires_at")?,
            status: parse_enum(row, 8, "status")?,
            created_by: row.get(9)?,
            notes: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

/// Expects `LICENSE_COLS` followed by an `active_devices` count column.
impl FromRow for LicenseWithUsage {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LicenseWithUsage {
            license: License::from_row(row)?,
            active_devices: row.get(13)?,
        })
    }
}

impl FromRow for DeviceActivation {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DeviceActivation {
            id: row.get(0)?,
            license_id: row.get(1)?,
            device_fingerprint: row.get(2)?,
            device_info: row.get(3)?,
            device_name: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            activated_at: row.get(6)?,
            last_validated_at: row.get(7)?,
            deactivated_at: row.get(8)?,
        })
    }
}

impl FromRow for StoredFile {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(StoredFile {
            id: row.get(0)?,
            file_name: row.get(1)?,
            mime_type: row.get(2)?,
            file_size: row.get(3)?,
            checksum: row.get(4)?,
            storage_path: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for ProductFileDetail {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ProductFileDetail {
            id: row.get(0)?,
            file_id: row.get(1)?,
            label: row.get(2)?,
            description: row.get(3)?,
            sort_order: row.get(4)?,
            file_name: row.get(5)?,
            mime_type: row.get(6)?,
            file_size: row.get(7)?,
            checksum: row.get(8)?,
        })
    }
}

impl FromRow for AdminActivity {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AdminActivity {
            id: row.get(0)?,
            admin_id: row.get(1)?,
            username: row.get(2)?,
            action: row.get(3)?,
            details: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for DeviceActivity {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DeviceActivity {
            id: row.get(0)?,
            device_id: row.get(1)?,
            license_id: row.get(2)?,
            action: row.get(3)?,
            details: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
