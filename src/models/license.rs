//! License model and lifecycle rules.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Expired,
    Revoked,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Active => "active",
            LicenseStatus::Expired => "expired",
            LicenseStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(LicenseStatus::Active),
            "expired" => Ok(LicenseStatus::Expired),
            "revoked" => Ok(LicenseStatus::Revoked),
            other => Err(format!("Invalid license status: {}", other)),
        }
    }
}

/// Why a license cannot be used right now. `Revoked`/`NotActive` and
/// `Expired` map to different API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseDenied {
    NotActive(LicenseStatus),
    Expired,
}

#[derive(Debug, Clone, Serialize)]
pub struct License {
    pub id: String,
    pub license_key: String,
    pub product_id: Option<String>,
    pub policy_id: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub max_devices: i64,
    pub expires_at: NaiveDate,
    pub status: LicenseStatus,
    pub created_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl License {
    /// Date-only expiry check: a license expiring today is still good
    /// for the rest of the day.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expires_at < today
    }

    /// A license is usable iff it is `active` and not past its expiry
    /// date, regardless of whether the sweeper has caught up.
    pub fn check_usable(&self, today: NaiveDate) -> Result<(), LicenseDenied> {
        if self.status != LicenseStatus::Active {
            return Err(LicenseDenied::NotActive(self.status));
        }
        if self.is_expired(today) {
            return Err(LicenseDenied::Expired);
        }
        Ok(())
    }
}

/// License row plus its live activation count, for admin listings.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseWithUsage {
    #[serde(flatten)]
    pub license: License,
    pub active_devices: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateLicenseRequest {
    pub product_id: String,
    #[serde(default)]
    pub policy_id: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub max_devices: i64,
    pub expires_at: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update. Absent fields (`None`) are left unchanged; an empty
/// string is a real value, never a sentinel.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateLicenseRequest {
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub max_devices: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub policy_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListLicensesQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn license(status: LicenseStatus, expires_at: NaiveDate) -> License {
        License {
            id: "lic_1".to_string(),
            license_key: "AAAA-BBBB-CCCC-DDDD".to_string(),
            product_id: Some("prd_1".to_string()),
            policy_id: None,
            customer_name: "Test".to_string(),
            customer_email: "test@example.com".to_string(),
            max_devices: 3,
            expires_at,
            status,
            created_by: None,
            notes: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_expiring_today_is_usable() {
        let today = date("2026-03-10");
        let lic = license(LicenseStatus::Active, today);
        assert!(!lic.is_expired(today));
        assert!(lic.check_usable(today).is_ok());
    }

    #[test]
    fn test_expired_yesterday() {
        let today = date("2026-03-10");
        let lic = license(LicenseStatus::Active, date("2026-03-09"));
        assert!(lic.is_expired(today));
        assert_eq!(lic.check_usable(today), Err(LicenseDenied::Expired));
    }

    #[test]
    fn test_revoked_is_not_active_even_when_in_date() {
        let today = date("2026-03-10");
        let lic = license(LicenseStatus::Revoked, date("2027-01-01"));
        assert_eq!(
            lic.check_usable(today),
            Err(LicenseDenied::NotActive(LicenseStatus::Revoked))
        );
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            LicenseStatus::Active,
            LicenseStatus::Expired,
            LicenseStatus::Revoked,
        ] {
            assert_eq!(s.as_str().parse::<LicenseStatus>().unwrap(), s);
        }
        assert!("banana".parse::<LicenseStatus>().is_err());
        assert_eq!(" Active ".parse::<LicenseStatus>().unwrap(), LicenseStatus::Active);
    }
}
