//! Prefixed entity id generation.
//!
//! Every row id carries a short type prefix so ids are self-describing
//! in logs and API payloads (`lic_...`, `dev_...`).

use uuid::Uuid;

pub const LICENSE_PREFIX: &str = "lic";
pub const DEVICE_PREFIX: &str = "dev";
pub const ADMIN_PREFIX: &str = "adm";
pub const POLICY_PREFIX: &str = "pol";
pub const PRODUCT_PREFIX: &str = "prd";
pub const FILE_PREFIX: &str = "fil";
pub const LOG_PREFIX: &str = "log";

pub fn generate(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_format() {
        let id = generate(LICENSE_PREFIX);
        assert!(id.starts_with("lic_"));
        assert_eq!(id.len(), 4 + 32);
    }

    #[test]
    fn test_generate_unique() {
        assert_ne!(generate(DEVICE_PREFIX), generate(DEVICE_PREFIX));
    }
}
