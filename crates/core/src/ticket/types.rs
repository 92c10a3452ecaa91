//! Ticket domain types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Queued, waiting to be dispatched.
    Pending,
    /// Being worked at a cashier.
    InAttention,
    Completed,
    Cancelled,
    /// Recorded in history between leaving one cashier and re-entering the queue.
    /// Never left as a ticket's status after commit.
    TransferPending,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::InAttention => "in_attention",
            TicketStatus::Completed => "completed",
            TicketStatus::Cancelled => "cancelled",
            TicketStatus::TransferPending => "transfer_pending",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Completed | TicketStatus::Cancelled)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TicketStatus::Pending),
            "in_attention" => Ok(TicketStatus::InAttention),
            "completed" => Ok(TicketStatus::Completed),
            "cancelled" => Ok(TicketStatus::Cancelled),
            "transfer_pending" => Ok(TicketStatus::TransferPending),
            other => Err(format!("unknown ticket status: {}", other)),
        }
    }
}

impl ToSql for TicketStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TicketStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// A numbered service request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
    pub id: i64,
    pub service_id: i64,
    pub client_id: String,
    /// Calendar day the sequence number belongs to.
    pub service_day: NaiveDate,
    pub sequence_number: i64,
    /// `PREFIX-NNN`, fixed at creation and kept across transfers.
    pub display_label: String,
    pub status: TicketStatus,
    pub assigned_cashier_id: Option<i64>,
    /// Reservation pin: only this cashier may dispatch the ticket.
    pub reserved_for_cashier_id: Option<i64>,
    /// User who first dispatched the ticket.
    pub dispatching_user_id: Option<String>,
    pub observations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attended_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One row of the append-only status audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketHistoryEntry {
    pub id: i64,
    pub ticket_id: i64,
    /// `None` for the creation entry.
    pub from_status: Option<TicketStatus>,
    pub to_status: TicketStatus,
    pub changed_by: String,
    pub cashier_id: Option<i64>,
    pub comment: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Immutable record of a ticket moving between cashiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketTransfer {
    pub id: i64,
    pub ticket_id: i64,
    pub from_cashier_id: i64,
    pub to_cashier_id: i64,
    pub from_service_id: i64,
    pub to_service_id: i64,
    pub performed_by: String,
    pub comment: Option<String>,
    pub transferred_at: DateTime<Utc>,
}

/// Request to issue a new ticket.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTicketRequest {
    pub service_id: i64,
    pub client_id: String,
    /// Recorded as the author of the creation history entry.
    /// Defaults to the client.
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub reserved_for_cashier_id: Option<i64>,
}

impl CreateTicketRequest {
    pub fn new(service_id: i64, client_id: impl Into<String>) -> Self {
        Self {
            service_id,
            client_id: client_id.into(),
            created_by: None,
            reserved_for_cashier_id: None,
        }
    }

    pub fn with_reservation(mut self, cashier_id: i64) -> Self {
        self.reserved_for_cashier_id = Some(cashier_id);
        self
    }

    pub fn with_created_by(mut self, user: impl Into<String>) -> Self {
        self.created_by = Some(user.into());
        self
    }

    pub(crate) fn author(&self) -> &str {
        self.created_by.as_deref().unwrap_or(&self.client_id)
    }
}
