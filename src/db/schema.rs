//! Database schema initialization

use rusqlite::Connection;

use crate::error::Result;

/// Creates all tables and indexes if they do not exist. Idempotent;
/// runs at every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS admins (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL CHECK (role IN ('super_admin', 'admin')),
            api_key_hash TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'inactive')),
            created_by TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS policies (
            id TEXT PRIMARY KEY,
            policy_name TEXT NOT NULL UNIQUE,
            policy_data TEXT NOT NULL DEFAULT '{}',
            created_by TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            license_key TEXT NOT NULL UNIQUE,
            product_id TEXT REFERENCES products(id) ON DELETE SET NULL,
            policy_id TEXT REFERENCES policies(id) ON DELETE SET NULL,
            customer_name TEXT NOT NULL,
            customer_email TEXT NOT NULL,
            max_devices INTEGER NOT NULL CHECK (max_devices >= 1),
            expires_at TEXT NOT NULL,          -- YYYY-MM-DD, date-only
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'expired', 'revoked')),
            created_by TEXT,
            notes TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_licenses_key ON licenses(license_key);
        CREATE INDEX IF NOT EXISTS idx_licenses_status_expiry
            ON licenses(status, expires_at);
        CREATE INDEX IF NOT EXISTS idx_licenses_created_by ON licenses(created_by);

        CREATE TABLE IF NOT EXISTS device_activations (
            id TEXT PRIMARY KEY,
            license_id TEXT NOT NULL REFERENCES licenses(id) ON DELETE CASCADE,
            device_fingerprint TEXT NOT NULL,
            device_info TEXT NOT NULL,
            device_name TEXT,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'deactivated')),
            activated_at INTEGER NOT NULL,
            last_validated_at INTEGER NOT NULL,
            deactivated_at INTEGER,
            UNIQUE (license_id, device_fingerprint)
        );
        CREATE INDEX IF NOT EXISTS idx_devices_license_status
            ON device_activations(license_id, status);

        CREATE TABLE IF NOT EXISTS files (
            id TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            mime_type TEXT NOT NULL DEFAULT 'application/octet-stream',
            file_size INTEGER NOT NULL DEFAULT 0,
            checksum TEXT,
            storage_path TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS product_files (
            id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            file_id TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            label TEXT NOT NULL,
            description TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            UNIQUE (product_id, file_id)
        );

        CREATE TABLE IF NOT EXISTS admin_resource_scopes (
            admin_id TEXT NOT NULL REFERENCES admins(id) ON DELETE CASCADE,
            resource_type TEXT NOT NULL
                CHECK (resource_type IN ('licenses', 'policies', 'products')),
            mode TEXT NOT NULL DEFAULT 'all'
                CHECK (mode IN ('all', 'none', 'own', 'custom')),
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (admin_id, resource_type)
        );

        CREATE TABLE IF NOT EXISTS admin_resource_selections (
            admin_id TEXT NOT NULL REFERENCES admins(id) ON DELETE CASCADE,
            resource_type TEXT NOT NULL,
            resource_id TEXT NOT NULL,
            PRIMARY KEY (admin_id, resource_type, resource_id)
        );

        CREATE TABLE IF NOT EXISTS admin_activity_logs (
            id TEXT PRIMARY KEY,
            admin_id TEXT NOT NULL,
            username TEXT NOT NULL,
            action TEXT NOT NULL,
            details TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_admin_logs_created
            ON admin_activity_logs(created_at);

        CREATE TABLE IF NOT EXISTS device_activity_logs (
            id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL,
            license_id TEXT NOT NULL,
            action TEXT NOT NULL,
            details TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_device_logs_device
            ON device_activity_logs(device_id, created_at);
        "#,
    )?;
    Ok(())
}
