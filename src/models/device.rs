//! Device activation model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Deactivated,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Deactivated => "deactivated",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(DeviceStatus::Active),
            "deactivated" => Ok(DeviceStatus::Deactivated),
            other => Err(format!("Invalid device status: {}", other)),
        }
    }
}

/// Hardware identifiers reported by the client. The first six feed the
/// fingerprint; the rest are display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub client_id: String,
    pub cpu_id: String,
    pub motherboard_sn: String,
    pub mac_address: String,
    pub disk_serial: String,
    pub machine_id: String,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceActivation {
    pub id: String,
    pub license_id: String,
    pub device_fingerprint: String,
    /// Raw reported `DeviceInfo`, stored as JSON for inspection.
    pub device_info: String,
    pub device_name: Option<String>,
    pub status: DeviceStatus,
    pub activated_at: i64,
    pub last_validated_at: i64,
    pub deactivated_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub license_key: String,
    pub device_info: DeviceInfo,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub license_key: String,
    pub device_info: DeviceInfo,
}

#[derive(Debug, Deserialize)]
pub struct CleanupDevicesRequest {
    /// Deactivated rows older than this many days are purged.
    pub days: i64,
}
