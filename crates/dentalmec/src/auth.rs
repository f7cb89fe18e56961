//! Roles and the acting identity passed into every mutating operation.
//!
//! Authentication itself happens outside this crate; callers hand in an
//! already-authenticated [`Actor`].

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::{PortalError, ValidationError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Technician,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Technician => "technician",
            Role::Admin => "admin",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Technician | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "technician" => Ok(Role::Technician),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError::InvalidIdentifier(other.to_string())),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// The authenticated user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Owners and staff may view and comment on an order.
    pub fn can_access(&self, owner_id: i64) -> bool {
        self.is_staff() || self.user_id == owner_id
    }

    pub fn ensure_access(&self, owner_id: i64) -> Result<(), PortalError> {
        if self.can_access(owner_id) {
            Ok(())
        } else {
            Err(PortalError::Unauthorized(format!(
                "user {} may not access orders of user {}",
                self.user_id, owner_id
            )))
        }
    }

    pub fn ensure_staff(&self) -> Result<(), PortalError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(PortalError::Unauthorized(format!(
                "user {} is not a technician or admin",
                self.user_id
            )))
        }
    }
}
