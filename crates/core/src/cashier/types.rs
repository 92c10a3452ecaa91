use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::{ConflictReason, NotOperationalReason};

/// A cashier station ("window").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cashier {
    pub id: i64,
    pub name: String,
    /// Service whose queue this cashier works. `None` until assigned.
    pub service_id: Option<i64>,
    pub active: bool,
    pub paused: bool,
    pub out_of_service: bool,
    pub last_state_comment: Option<String>,
    pub last_state_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Cashier {
    /// Operational state derived from the flags. Out of service wins over paused.
    pub fn operational_state(&self) -> OperationalState {
        if self.out_of_service {
            OperationalState::OutOfService
        } else if self.paused {
            OperationalState::Paused
        } else {
            OperationalState::Active
        }
    }

    /// Check the cashier can take a ticket, returning its service.
    pub fn ensure_operational(&self) -> Result<i64, ConflictReason> {
        let reason = if !self.active {
            NotOperationalReason::Inactive
        } else {
            match self.operational_state() {
                OperationalState::OutOfService => NotOperationalReason::OutOfService,
                OperationalState::Paused => NotOperationalReason::Paused,
                OperationalState::Active => match self.service_id {
                    Some(service_id) => return Ok(service_id),
                    None => NotOperationalReason::NoService,
                },
            }
        };
        Err(ConflictReason::CashierNotOperational {
            cashier_id: self.id,
            reason,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationalState {
    Active,
    Paused,
    OutOfService,
}

/// Kind of interval recorded in the cashier status log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalType {
    Pause,
    OutOfService,
}

impl IntervalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalType::Pause => "pause",
            IntervalType::OutOfService => "out_of_service",
        }
    }
}

impl fmt::Display for IntervalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for IntervalType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for IntervalType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "pause" => Ok(IntervalType::Pause),
            "out_of_service" => Ok(IntervalType::OutOfService),
            other => Err(FromSqlError::Other(
                format!("unknown interval type: {}", other).into(),
            )),
        }
    }
}

/// One pause / out-of-service interval. `ended_at == None` means still open.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashierStatusLog {
    pub id: i64,
    pub cashier_id: i64,
    pub interval_type: IntervalType,
    pub comment: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub performed_by: String,
    pub closed_by: Option<String>,
}

impl CashierStatusLog {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// What a pause / out-of-service / resume call did to the interval log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalChange {
    pub cashier: Cashier,
    /// Interval opened by the call, if any.
    pub opened: Option<CashierStatusLog>,
    /// Intervals the call closed.
    pub closed: Vec<CashierStatusLog>,
}
