//! Deterministic device fingerprinting.
//!
//! The fingerprint is a pure function of six client-reported hardware
//! identifiers, SHA-256 over the `|`-joined values. It is not keyed and
//! not secret; it only needs to be stable and collision-resistant so
//! the same machine maps to the same activation row. Volatile fields
//! (hostname, OS version) are deliberately excluded.

use sha2::{Digest, Sha256};

use crate::models::DeviceInfo;

pub fn device_fingerprint(info: &DeviceInfo) -> String {
    let data = [
        info.client_id.as_str(),
        info.cpu_id.as_str(),
        info.motherboard_sn.as_str(),
        info.mac_address.as_str(),
        info.disk_serial.as_str(),
        info.machine_id.as_str(),
    ]
    .join("|");
    hex::encode(Sha256::digest(data.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> DeviceInfo {
        DeviceInfo {
            client_id: "client-1".to_string(),
            cpu_id: "cpu-1".to_string(),
            motherboard_sn: "mb-1".to_string(),
            mac_address: "00:11:22:33:44:55".to_string(),
            disk_serial: "disk-1".to_string(),
            machine_id: "machine-1".to_string(),
            os: Some("linux".to_string()),
            os_version: Some("6.1".to_string()),
            hostname: Some("workstation".to_string()),
        }
    }

    #[test]
    fn test_fingerprint_deterministic() {
        assert_eq!(device_fingerprint(&info()), device_fingerprint(&info()));
        assert_eq!(device_fingerprint(&info()).len(), 64);
    }

    #[test]
    fn test_fingerprint_sensitive_to_identifiers() {
        let mut other = info();
        other.mac_address = "aa:bb:cc:dd:ee:ff".to_string();
        assert_ne!(device_fingerprint(&info()), device_fingerprint(&other));
    }

    #[test]
    fn test_fingerprint_ignores_volatile_fields() {
        let mut other = info();
        other.hostname = Some("renamed".to_string());
        other.os_version = Some("6.2".to_string());
        assert_eq!(device_fingerprint(&info()), device_fingerprint(&other));
    }

    #[test]
    fn test_fingerprint_field_order_matters() {
        let mut swapped = info();
        swapped.cpu_id = "mb-1".to_string();
        swapped.motherboard_sn = "cpu-1".to_string();
        assert_ne!(device_fingerprint(&info()), device_fingerprint(&swapped));
    }
}
