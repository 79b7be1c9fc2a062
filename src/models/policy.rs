//! Policy model. Policies are opaque JSON documents attached to a
//! license and delivered verbatim in activation payloads.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Policy {
    pub id: String,
    pub policy_name: String,
    pub policy_data: serde_json::Value,
    pub created_by: Option<String>,
    pub created_at: i64,
}
