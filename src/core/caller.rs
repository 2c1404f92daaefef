//! Caller identity supplied by the (external) authentication layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::PortalError;

/// Portal roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Institution,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Student => "student",
            Role::Institution => "institution",
            Role::Admin => "admin",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "institution" => Ok(Role::Institution),
            "admin" => Ok(Role::Admin),
            other => Err(PortalError::Validation(format!("Unknown role: {}", other))),
        }
    }
}

/// An authenticated caller. For students the identity is their NIN, for
/// institutions it is the issuer name they publish certificates under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub identity: String,
    pub role: Role,
}

impl Caller {
    pub fn new(identity: impl Into<String>, role: Role) -> Self {
        Self {
            identity: identity.into(),
            role,
        }
    }

    pub fn student(nin: impl Into<String>) -> Self {
        Self::new(nin, Role::Student)
    }

    pub fn institution(name: impl Into<String>) -> Self {
        Self::new(name, Role::Institution)
    }

    pub fn admin(name: impl Into<String>) -> Self {
        Self::new(name, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Institution identities are matched case-insensitively against issuers.
    pub fn is_issuer_of(&self, issuer: &str) -> bool {
        self.role == Role::Institution && self.identity.trim().eq_ignore_ascii_case(issuer.trim())
    }

    pub fn require_admin(&self) -> Result<(), PortalError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(PortalError::Forbidden("Admin role required".to_string()))
        }
    }
}
