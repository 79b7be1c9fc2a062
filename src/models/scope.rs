//! Resource access scopes.
//!
//! Every non-super admin carries one scope per resource type. A scope
//! has two consistent projections: an SQL filter fragment for listings
//! (built in `db::queries::scope_filter`) and the `can_access`
//! predicate here for single fetched rows. The two must always agree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Closed set of scopable resource types. Unknown types are rejected
/// at the API boundary, not defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Licenses,
    Policies,
    Products,
}

impl ResourceType {
    pub const ALL: [ResourceType; 3] = [
        ResourceType::Licenses,
        ResourceType::Policies,
        ResourceType::Products,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Licenses => "licenses",
            ResourceType::Policies => "policies",
            ResourceType::Products => "products",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "licenses" => Ok(ResourceType::Licenses),
            "policies" => Ok(ResourceType::Policies),
            "products" => Ok(ResourceType::Products),
            other => Err(format!("Invalid resource type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    #[default]
    All,
    None,
    Own,
    Custom,
}

impl ScopeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeMode::All => "all",
            ScopeMode::None => "none",
            ScopeMode::Own => "own",
            ScopeMode::Custom => "custom",
        }
    }

    /// Lenient parse used when normalizing stored or submitted config:
    /// anything unrecognized falls back to `all`.
    pub fn parse_lenient(s: &str) -> ScopeMode {
        s.parse().unwrap_or(ScopeMode::All)
    }
}

impl fmt::Display for ScopeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(ScopeMode::All),
            "none" => Ok(ScopeMode::None),
            "own" => Ok(ScopeMode::Own),
            "custom" => Ok(ScopeMode::Custom),
            other => Err(format!("Invalid scope mode: {}", other)),
        }
    }
}

/// An admin's access to one resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceScope {
    pub mode: ScopeMode,
    #[serde(default)]
    pub selected_ids: Vec<String>,
}

impl ResourceScope {
    pub fn all() -> Self {
        ResourceScope {
            mode: ScopeMode::All,
            selected_ids: Vec::new(),
        }
    }

    /// Canonical form: ids trimmed, de-duplicated and sorted; id lists
    /// only make sense for `custom`, any other mode drops them.
    pub fn normalized(self) -> Self {
        let selected_ids = if self.mode == ScopeMode::Custom {
            self.selected_ids
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        } else {
            Vec::new()
        };
        ResourceScope {
            mode: self.mode,
            selected_ids,
        }
    }

    /// Row-level twin of the SQL listing filter. `owner_id` is the
    /// resource's owner column value ("" when unowned), `admin_id` the
    /// caller.
    pub fn can_access(&self, resource_id: &str, owner_id: &str, admin_id: &str) -> bool {
        match self.mode {
            ScopeMode::All => true,
            ScopeMode::None => false,
            ScopeMode::Own => {
                let admin = admin_id.trim();
                !admin.is_empty() && owner_id.trim() == admin
            }
            ScopeMode::Custom => {
                let id = resource_id.trim();
                self.selected_ids.iter().any(|s| s == id)
            }
        }
    }
}

/// Full per-admin scope configuration, one entry per resource type.
/// Missing entries mean `all`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminResourcePermissions {
    #[serde(default)]
    pub licenses: ResourceScope,
    #[serde(default)]
    pub policies: ResourceScope,
    #[serde(default)]
    pub products: ResourceScope,
}

impl AdminResourcePermissions {
    pub fn get(&self, resource_type: ResourceType) -> &ResourceScope {
        match resource_type {
            ResourceType::Licenses => &self.licenses,
            ResourceType::Policies => &self.policies,
            ResourceType::Products => &self.products,
        }
    }

    pub fn get_mut(&mut self, resource_type: ResourceType) -> &mut ResourceScope {
        match resource_type {
            ResourceType::Licenses => &mut self.licenses,
            ResourceType::Policies => &mut self.policies,
            ResourceType::Products => &mut self.products,
        }
    }

    pub fn normalized(self) -> Self {
        AdminResourcePermissions {
            licenses: self.licenses.normalized(),
            policies: self.policies.normalized(),
            products: self.products.normalized(),
        }
    }
}

/// Wire form of a scope as submitted by admins. Mode arrives as a raw
/// string so sloppy input ("ALL", "everything") degrades to `all`
/// instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopePayload {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub selected_ids: Vec<String>,
}

impl ScopePayload {
    pub fn normalize(self) -> ResourceScope {
        ResourceScope {
            mode: ScopeMode::parse_lenient(&self.mode),
            selected_ids: self.selected_ids,
        }
        .normalized()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionsPayload {
    #[serde(default)]
    pub licenses: Option<ScopePayload>,
    #[serde(default)]
    pub policies: Option<ScopePayload>,
    #[serde(default)]
    pub products: Option<ScopePayload>,
}

impl PermissionsPayload {
    /// Missing sections default to `all`, matching the resolver's
    /// default for admins with no stored scope.
    pub fn normalize(self) -> AdminResourcePermissions {
        let scope = |p: Option<ScopePayload>| {
            p.map(ScopePayload::normalize).unwrap_or_default()
        };
        AdminResourcePermissions {
            licenses: scope(self.licenses),
            policies: scope(self.policies),
            products: scope(self.products),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_mode_parse() {
        assert_eq!(ScopeMode::parse_lenient(" OWN "), ScopeMode::Own);
        assert_eq!(ScopeMode::parse_lenient("Custom"), ScopeMode::Custom);
        assert_eq!(ScopeMode::parse_lenient("everything"), ScopeMode::All);
        assert_eq!(ScopeMode::parse_lenient(""), ScopeMode::All);
    }

    #[test]
    fn test_normalized_dedups_and_sorts() {
        let scope = ResourceScope {
            mode: ScopeMode::Custom,
            selected_ids: vec![
                "lic_b".to_string(),
                " lic_a ".to_string(),
                "lic_b".to_string(),
                "".to_string(),
            ],
        }
        .normalized();
        assert_eq!(scope.selected_ids, vec!["lic_a", "lic_b"]);
    }

    #[test]
    fn test_normalized_clears_ids_for_non_custom() {
        let scope = ResourceScope {
            mode: ScopeMode::Own,
            selected_ids: vec!["lic_a".to_string()],
        }
        .normalized();
        assert!(scope.selected_ids.is_empty());
    }

    #[test]
    fn test_can_access_all_and_none() {
        assert!(ResourceScope::all().can_access("lic_1", "adm_1", "adm_2"));
        let none = ResourceScope {
            mode: ScopeMode::None,
            selected_ids: Vec::new(),
        };
        assert!(!none.can_access("lic_1", "adm_1", "adm_1"));
    }

    #[test]
    fn test_can_access_own() {
        let own = ResourceScope {
            mode: ScopeMode::Own,
            selected_ids: Vec::new(),
        };
        assert!(own.can_access("lic_1", "adm_1", "adm_1"));
        assert!(!own.can_access("lic_1", "adm_2", "adm_1"));
        // unowned rows never match, and a blank caller matches nothing
        assert!(!own.can_access("lic_1", "", "adm_1"));
        assert!(!own.can_access("lic_1", "", ""));
    }

    #[test]
    fn test_can_access_custom() {
        let custom = ResourceScope {
            mode: ScopeMode::Custom,
            selected_ids: vec!["lic_1".to_string(), "lic_2".to_string()],
        };
        assert!(custom.can_access("lic_1", "", "adm_1"));
        assert!(!custom.can_access("lic_3", "", "adm_1"));
    }

    #[test]
    fn test_payload_defaults_to_all() {
        let perms = PermissionsPayload::default().normalize();
        assert_eq!(perms.licenses.mode, ScopeMode::All);
        assert_eq!(perms.policies.mode, ScopeMode::All);
        assert_eq!(perms.products.mode, ScopeMode::All);
    }

    #[test]
    fn test_payload_normalizes_sections() {
        let payload = PermissionsPayload {
            licenses: Some(ScopePayload {
                mode: "CUSTOM".to_string(),
                selected_ids: vec!["b".to_string(), "a".to_string(), "b".to_string()],
            }),
            policies: Some(ScopePayload {
                mode: "sideways".to_string(),
                selected_ids: vec!["x".to_string()],
            }),
            products: None,
        };
        let perms = payload.normalize();
        assert_eq!(perms.licenses.mode, ScopeMode::Custom);
        assert_eq!(perms.licenses.selected_ids, vec!["a", "b"]);
        assert_eq!(perms.policies.mode, ScopeMode::All);
        assert!(perms.policies.selected_ids.is_empty());
    }
}
