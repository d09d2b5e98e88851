//! Caller roles.
//!
//! The identity layer hands us loose strings ("ward_admin", "official",
//! "superadmin", ...). They are normalised exactly once, in
//! `RoleProfile::from_raw`; everything downstream matches on `Role`.

use crate::{
    error::{CoreError, CoreResult},
    types::UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminLevel {
    Ward,
    City,
    Department,
    Super,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    Citizen,
    Admin {
        level: AdminLevel,
        assigned_ward: Option<String>,
        assigned_city: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleProfile {
    pub user_id: UserId,
    #[serde(flatten)]
    pub role: Role,
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

impl RoleProfile {
    pub fn citizen(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Citizen,
        }
    }

    pub fn admin(user_id: impl Into<UserId>, level: AdminLevel) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin {
                level,
                assigned_ward: None,
                assigned_city: None,
            },
        }
    }

    pub fn ward_admin(user_id: impl Into<UserId>, ward: &str) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin {
                level: AdminLevel::Ward,
                assigned_ward: Some(ward.to_string()),
                assigned_city: None,
            },
        }
    }

    pub fn city_admin(user_id: impl Into<UserId>, city: &str) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin {
                level: AdminLevel::City,
                assigned_ward: None,
                assigned_city: Some(city.to_string()),
            },
        }
    }

    /// Normalise the identity layer's raw strings.
    ///
    /// An explicit `admin_level` wins over the level implied by the role
    /// string. Unknown role strings are rejected rather than guessed.
    pub fn from_raw(
        user_id: &str,
        role: &str,
        admin_level: Option<&str>,
        assigned_ward: Option<&str>,
        assigned_city: Option<&str>,
    ) -> CoreResult<Self> {
        let implied = match role.trim().to_ascii_lowercase().as_str() {
            "citizen" | "user" => return Ok(Self::citizen(user_id)),
            "ward_admin" => AdminLevel::Ward,
            "city_admin" => AdminLevel::City,
            "dept_admin" | "department_admin" => AdminLevel::Department,
            "superadmin" | "super_admin" => AdminLevel::Super,
            "admin" | "official" => AdminLevel::Department,
            other => {
                return Err(CoreError::unauthorized(format!("unknown role '{other}'")));
            }
        };

        let level = match admin_level.map(|l| l.trim().to_ascii_lowercase()) {
            Some(l) if l == "ward" => AdminLevel::Ward,
            Some(l) if l == "city" => AdminLevel::City,
            _ => implied,
        };

        Ok(Self {
            user_id: user_id.to_string(),
            role: Role::Admin {
                level,
                assigned_ward: non_blank(assigned_ward),
                assigned_city: non_blank(assigned_city),
            },
        })
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin { .. })
    }

    /// Name written into activity entries.
    pub fn role_label(&self) -> &'static str {
        match &self.role {
            Role::Citizen => "citizen",
            Role::Admin { level, .. } => match level {
                AdminLevel::Ward => "ward_admin",
                AdminLevel::City => "city_admin",
                AdminLevel::Department => "dept_admin",
                AdminLevel::Super => "superadmin",
            },
        }
    }
}

/// Identity/role lookup consumed from the auth layer.
pub trait RoleDirectory: Send + Sync {
    fn role_profile(&self, user_id: &str) -> CoreResult<RoleProfile>;
}

/// Map-backed directory for tools and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRoleDirectory {
    profiles: HashMap<UserId, RoleProfile>,
}

impl InMemoryRoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, profile: RoleProfile) {
        self.profiles.insert(profile.user_id.clone(), profile);
    }
}

impl RoleDirectory for InMemoryRoleDirectory {
    /// Unknown users are treated as citizens; they can only see their own data.
    fn role_profile(&self, user_id: &str) -> CoreResult<RoleProfile> {
        Ok(self
            .profiles
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| RoleProfile::citizen(user_id)))
    }
}
