//! Order status and process type enums.
//!
//! Both are stored as lowercase TEXT columns.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Status of an order.
///
/// The usual flow is `new → pending → processing → completed | rejected`,
/// but staff may set any status; no transition table is enforced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Draft created by the order wizard, not yet confirmed by the client.
    New,
    Pending,
    Processing,
    Completed,
    Rejected,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::New,
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Rejected => "rejected",
        }
    }

    /// Human-readable label used in notifications.
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::New => "New",
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "In process",
            OrderStatus::Completed => "Completed",
            OrderStatus::Rejected => "Rejected",
        }
    }

    /// Orders still in the workshop pipeline.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrderStatus::New | OrderStatus::Pending | OrderStatus::Processing
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| ValidationError::InvalidStatus(s.to_string()))
    }
}

/// Manufacturing process requested for an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ProcessType {
    Milling,
    Sintering,
    /// 3D printing.
    Printing,
}

impl ProcessType {
    pub const ALL: [ProcessType; 3] = [
        ProcessType::Milling,
        ProcessType::Sintering,
        ProcessType::Printing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessType::Milling => "milling",
            ProcessType::Sintering => "sintering",
            ProcessType::Printing => "printing",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProcessType::Milling => "Milling",
            ProcessType::Sintering => "Sintering",
            ProcessType::Printing => "3D printing",
        }
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessType::ALL
            .into_iter()
            .find(|process| process.as_str() == s.trim())
            .ok_or_else(|| ValidationError::InvalidProcessType(s.to_string()))
    }
}

macro_rules! text_column {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_column!(OrderStatus);
text_column!(ProcessType);
