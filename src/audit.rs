//! Best-effort activity logging.
//!
//! Audit rows describe mutations that already happened; a failed log
//! write is reported through tracing and never propagated, so it can
//! never roll back or fail the operation it describes.

use rusqlite::Connection;

use crate::db::queries;
use crate::models::{AdminAction, DeviceAction};

/// Actor recorded for mutations performed by the service itself.
pub const SYSTEM_ACTOR_ID: &str = "system";
pub const SYSTEM_ACTOR_NAME: &str = "System";

pub fn log_admin_activity(
    conn: &Connection,
    admin_id: &str,
    username: &str,
    action: AdminAction,
    details: &str,
) {
    if let Err(e) = queries::insert_admin_activity(conn, admin_id, username, action, details) {
        tracing::warn!(action = %action, "Failed to write admin activity log: {}", e);
    }
}

pub fn log_device_activity(
    conn: &Connection,
    device_id: &str,
    license_id: &str,
    action: DeviceAction,
    details: &str,
) {
    if let Err(e) =
        queries::insert_device_activity(conn, device_id, license_id, action, details)
    {
        tracing::warn!(action = %action, "Failed to write device activity log: {}", e);
    }
}
