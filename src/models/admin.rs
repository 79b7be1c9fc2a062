//! Admin accounts and roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    SuperAdmin,
    Admin,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::SuperAdmin => "super_admin",
            AdminRole::Admin => "admin",
        }
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "super_admin" => Ok(AdminRole::SuperAdmin),
            "admin" => Ok(AdminRole::Admin),
            other => Err(format!("Invalid admin role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Admin {
    pub id: String,
    pub username: String,
    pub role: AdminRole,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub username: String,
    #[serde(default = "default_admin_role")]
    pub role: AdminRole,
}

fn default_admin_role() -> AdminRole {
    AdminRole::Admin
}

/// Returned exactly once at creation; the key itself is never stored.
#[derive(Debug, Serialize)]
pub struct CreatedAdmin {
    #[serde(flatten)]
    pub admin: Admin,
    pub api_key: String,
}
