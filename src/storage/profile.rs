//! Last-known user profile snapshot.
//!
//! Written by the login flow, consumed for display.

use serde::{Deserialize, Serialize};

use super::{ClientStorage, keys};
use crate::Result;

/// Dashboard role of the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(alias = "admin", alias = "ADMIN")]
    Admin,
    #[serde(alias = "manager", alias = "MANAGER")]
    Manager,
    #[serde(alias = "employee", alias = "EMPLOYEE")]
    Employee,
    #[serde(
        alias = "department_head",
        alias = "departmentHead",
        alias = "DEPARTMENT_HEAD"
    )]
    DepartmentHead,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Employee => "Employee",
            Role::DepartmentHead => "Department Head",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: serde_json::Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl UserProfile {
    /// Load the profile snapshot.
    ///
    /// A missing or unparseable snapshot yields `Ok(None)`; display code
    /// treats both as "not signed in".
    pub fn load(storage: &dyn ClientStorage) -> Result<Option<Self>> {
        let Some(raw) = storage.get_item(keys::USER)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unparseable profile snapshot");
                Ok(None)
            }
        }
    }

    /// Replace the stored snapshot.
    pub fn save(&self, storage: &dyn ClientStorage) -> Result<()> {
        storage.set_item(keys::USER, &serde_json::to_string(self)?)
    }
}
