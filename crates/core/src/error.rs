//! Error taxonomy for queue operations.
//!
//! Every rejected operation carries a specific reason so callers can explain
//! the conflict precisely instead of showing a generic failure.

use std::fmt;

use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

use crate::cashier::IntervalType;
use crate::ticket::TicketStatus;

/// Kind of entity referenced by a `NotFound` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Ticket,
    Cashier,
    Service,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Ticket => write!(f, "ticket"),
            EntityKind::Cashier => write!(f, "cashier"),
            EntityKind::Service => write!(f, "service"),
        }
    }
}

/// Why a cashier cannot take a ticket right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotOperationalReason {
    Inactive,
    Paused,
    OutOfService,
    NoService,
}

impl fmt::Display for NotOperationalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotOperationalReason::Inactive => write!(f, "inactive"),
            NotOperationalReason::Paused => write!(f, "paused"),
            NotOperationalReason::OutOfService => write!(f, "out of service"),
            NotOperationalReason::NoService => write!(f, "no service assigned"),
        }
    }
}

/// A guard violation, carrying the identity of the conflicting entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ConflictReason {
    #[error("ticket {ticket_id} is reserved for cashier {reserved_for}")]
    ReservedForOtherCashier { ticket_id: i64, reserved_for: i64 },

    #[error("cashier {cashier_id} is not operational: {reason}")]
    CashierNotOperational {
        cashier_id: i64,
        reason: NotOperationalReason,
    },

    #[error("cashier {cashier_id} is already attending ticket {busy_with}")]
    CashierAlreadyBusy { cashier_id: i64, busy_with: i64 },

    #[error("ticket {ticket_id} cannot move from {from} to {to}")]
    InvalidTransition {
        ticket_id: i64,
        from: TicketStatus,
        to: TicketStatus,
    },

    #[error("ticket {ticket_id} is in attention at cashier {cashier_id}")]
    TicketAlreadyInAttentionElsewhere { ticket_id: i64, cashier_id: i64 },

    #[error("ticket {ticket_id} is {status}, only pending tickets can be reserved")]
    TicketNotPending { ticket_id: i64, status: TicketStatus },

    #[error("cashier {cashier_id} already has an open {interval} interval")]
    IntervalAlreadyOpen {
        cashier_id: i64,
        interval: IntervalType,
    },

    #[error("cashier {cashier_id} has no open interval to resume from")]
    NoOpenInterval { cashier_id: i64 },

    #[error("prefix {prefix} is already used by service {service_id}")]
    PrefixInUse { prefix: String, service_id: i64 },
}

impl ConflictReason {
    /// Stable machine-readable code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ConflictReason::ReservedForOtherCashier { .. } => "reserved_for_other_cashier",
            ConflictReason::CashierNotOperational { .. } => "cashier_not_operational",
            ConflictReason::CashierAlreadyBusy { .. } => "cashier_already_busy",
            ConflictReason::InvalidTransition { .. } => "invalid_transition",
            ConflictReason::TicketAlreadyInAttentionElsewhere { .. } => {
                "ticket_already_in_attention_elsewhere"
            }
            ConflictReason::TicketNotPending { .. } => "ticket_not_pending",
            ConflictReason::IntervalAlreadyOpen { .. } => "interval_already_open",
            ConflictReason::NoOpenInterval { .. } => "no_open_interval",
            ConflictReason::PrefixInUse { .. } => "prefix_in_use",
        }
    }
}

/// Errors returned by queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Malformed input, rejected before touching the store.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: i64 },

    /// A guard rejected the operation; nothing was changed.
    #[error("conflict: {0}")]
    Conflict(#[from] ConflictReason),

    /// Lock wait expired or the store was busy. Safe to retry.
    #[error("transient store error: {0}")]
    TransientStore(String),

    /// Ticket number allocation gave up after its retry budget.
    #[error("could not allocate a ticket number for service {service_id} after {attempts} attempts")]
    FatalAllocation { service_id: i64, attempts: u32 },

    #[error("database error: {0}")]
    Database(String),
}

impl QueueError {
    pub fn not_found(entity: EntityKind, id: i64) -> Self {
        QueueError::NotFound { entity, id }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::TransientStore(_))
    }

    /// Stable machine-readable code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            QueueError::Validation(_) => "validation_error",
            QueueError::NotFound { entity, .. } => match entity {
                EntityKind::Ticket => "ticket_not_found",
                EntityKind::Cashier => "cashier_not_found",
                EntityKind::Service => "service_not_found",
            },
            QueueError::Conflict(reason) => reason.reason_code(),
            QueueError::TransientStore(_) => "transient_store_error",
            QueueError::FatalAllocation { .. } => "fatal_allocation_error",
            QueueError::Database(_) => "database_error",
        }
    }

    /// The conflict reason, when this is a guard violation.
    pub fn conflict(&self) -> Option<&ConflictReason> {
        match self {
            QueueError::Conflict(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for QueueError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                QueueError::TransientStore(err.to_string())
            }
            _ => QueueError::Database(err.to_string()),
        }
    }
}

/// Longest free-text comment accepted on state changes.
pub const MAX_COMMENT_LEN: usize = 500;

/// Reject an empty acting user id.
pub(crate) fn require_actor(user: &str) -> Result<(), QueueError> {
    if user.trim().is_empty() {
        return Err(QueueError::Validation(
            "acting user id cannot be empty".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn check_comment(comment: Option<&str>) -> Result<(), QueueError> {
    match comment {
        Some(text) if text.chars().count() > MAX_COMMENT_LEN => Err(QueueError::Validation(
            format!("comment cannot exceed {} characters", MAX_COMMENT_LEN),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueueError::not_found(EntityKind::Ticket, 42);
        assert_eq!(err.to_string(), "ticket not found: 42");
        assert_eq!(err.reason_code(), "ticket_not_found");

        let err = QueueError::from(ConflictReason::CashierAlreadyBusy {
            cashier_id: 7,
            busy_with: 1,
        });
        assert_eq!(
            err.to_string(),
            "conflict: cashier 7 is already attending ticket 1"
        );
        assert_eq!(err.reason_code(), "cashier_already_busy");
    }

    #[test]
    fn test_conflict_serializes_with_code_tag() {
        let reason = ConflictReason::CashierNotOperational {
            cashier_id: 3,
            reason: NotOperationalReason::OutOfService,
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["code"], "cashier_not_operational");
        assert_eq!(json["code"], reason.reason_code());
        assert_eq!(json["cashier_id"], 3);
        assert_eq!(json["reason"], "out_of_service");
    }

    #[test]
    fn test_invalid_transition_message() {
        let reason = ConflictReason::InvalidTransition {
            ticket_id: 5,
            from: TicketStatus::Completed,
            to: TicketStatus::InAttention,
        };
        assert_eq!(
            reason.to_string(),
            "ticket 5 cannot move from completed to in_attention"
        );
    }

    #[test]
    fn test_input_checks() {
        assert!(require_actor("operator-1").is_ok());
        assert!(matches!(require_actor("  "), Err(QueueError::Validation(_))));

        assert!(check_comment(None).is_ok());
        assert!(check_comment(Some("lunch")).is_ok());
        let long = "x".repeat(MAX_COMMENT_LEN + 1);
        assert!(check_comment(Some(&long)).is_err());
    }

    #[test]
    fn test_busy_sqlite_error_is_transient() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        let err = QueueError::from(busy);
        assert!(err.is_retryable());

        let other = QueueError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(!other.is_retryable());
        assert!(matches!(other, QueueError::Database(_)));
    }
}
