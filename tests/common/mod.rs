//! Test utilities and fixtures for Keygate integration tests

#![allow(dead_code)]

use axum::Router;
use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use keygate::clock;
pub use keygate::db::{AppState, init_db, queries};
pub use keygate::fingerprint;
pub use keygate::handlers;
pub use keygate::models::*;
pub use keygate::signing::DownloadSigner;

pub const TEST_DOWNLOAD_SECRET: &[u8] = b"test-download-secret";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a test admin with an API key
pub fn create_test_admin(conn: &Connection, username: &str, role: AdminRole) -> (Admin, String) {
    queries::create_admin(conn, username, role).expect("Failed to create test admin")
}

pub fn create_test_product(conn: &Connection, name: &str) -> Product {
    queries::create_product(conn, name, Some("adm_seed")).expect("Failed to create test product")
}

pub fn create_test_policy(conn: &Connection, name: &str) -> Policy {
    queries::create_policy(
        conn,
        name,
        &serde_json::json!({ "features": ["export"] }),
        Some("adm_seed"),
    )
    .expect("Failed to create test policy")
}

/// Create a test license owned by `adm_seed`
pub fn create_test_license(
    conn: &Connection,
    product_id: &str,
    max_devices: i64,
    expires_at: NaiveDate,
) -> License {
    create_test_license_owned(conn, product_id, max_devices, expires_at, "adm_seed")
}

pub fn create_test_license_owned(
    conn: &Connection,
    product_id: &str,
    max_devices: i64,
    expires_at: NaiveDate,
    created_by: &str,
) -> License {
    queries::create_license(
        conn,
        &queries::NewLicense {
            product_id,
            policy_id: None,
            customer_name: "Test Customer",
            customer_email: "customer@example.com",
            max_devices,
            expires_at,
            notes: None,
            created_by,
        },
    )
    .expect("Failed to create test license")
}

/// Deterministic device info; vary `seed` to get distinct fingerprints
pub fn test_device_info(seed: &str) -> DeviceInfo {
    DeviceInfo {
        client_id: format!("client-{}", seed),
        cpu_id: format!("cpu-{}", seed),
        motherboard_sn: format!("mb-{}", seed),
        mac_address: format!("mac-{}", seed),
        disk_serial: format!("disk-{}", seed),
        machine_id: format!("machine-{}", seed),
        os: Some("linux".to_string()),
        os_version: Some("6.1".to_string()),
        hostname: Some(format!("host-{}", seed)),
    }
}

pub fn test_fingerprint(seed: &str) -> String {
    fingerprint::device_fingerprint(&test_device_info(seed))
}

/// Activate a device through the slot manager, panicking on denial
pub fn activate_test_device(
    conn: &mut Connection,
    license: &License,
    seed: &str,
) -> DeviceActivation {
    let info = test_device_info(seed);
    let outcome = queries::activate_device_atomic(
        conn,
        license,
        &fingerprint::device_fingerprint(&info),
        &serde_json::to_string(&info).unwrap(),
        info.hostname.as_deref(),
    )
    .expect("Failed to activate test device");
    outcome.device().clone()
}

pub fn today() -> NaiveDate {
    clock::today()
}

/// A date `days` from today (negative for the past)
pub fn days_from_today(days: i64) -> NaiveDate {
    clock::today() + chrono::Duration::days(days)
}

/// Create an AppState backed by a single-connection in-memory pool
pub fn create_test_app_state() -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }
    AppState {
        db: pool,
        signer: DownloadSigner::new(TEST_DOWNLOAD_SECRET.to_vec()),
        files_dir: std::env::temp_dir().display().to_string(),
    }
}

/// Full application router (client + admin endpoints)
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::client_router())
        .merge(handlers::admin_router(state.clone()))
        .with_state(state)
}
