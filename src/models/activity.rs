//! Append-only activity log records.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    CreateLicense,
    UpdateLicense,
    RevokeLicense,
    DeleteLicense,
    ReactivateDevice,
    DeactivateDevice,
    DeleteDevice,
    CleanupDevices,
    CreateAdmin,
    DeleteAdmin,
    UpdatePermissions,
    ExpireLicenses,
}

impl AdminAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAction::CreateLicense => "create_license",
            AdminAction::UpdateLicense => "update_license",
            AdminAction::RevokeLicense => "revoke_license",
            AdminAction::DeleteLicense => "delete_license",
            AdminAction::ReactivateDevice => "reactivate_device",
            AdminAction::DeactivateDevice => "deactivate_device",
            AdminAction::DeleteDevice => "delete_device",
            AdminAction::CleanupDevices => "cleanup_devices",
            AdminAction::CreateAdmin => "create_admin",
            AdminAction::DeleteAdmin => "delete_admin",
            AdminAction::UpdatePermissions => "update_permissions",
            AdminAction::ExpireLicenses => "expire_licenses",
        }
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAction {
    Activated,
    Reactivated,
    Deactivated,
}

impl DeviceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceAction::Activated => "activated",
            DeviceAction::Reactivated => "reactivated",
            DeviceAction::Deactivated => "deactivated",
        }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminActivity {
    pub id: String,
    pub admin_id: String,
    pub username: String,
    pub action: String,
    pub details: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceActivity {
    pub id: String,
    pub device_id: String,
    pub license_id: String,
    pub action: String,
    pub details: String,
    pub created_at: i64,
}
