use serde::{Deserialize, Serialize};

use crate::attendance::AttendanceSpan;
use crate::ticket::{Ticket, TicketStatus, TicketTransfer};

/// Generic status change request.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub ticket_id: i64,
    pub to_status: TicketStatus,
    /// Target cashier for dispatch and transfer; attending cashier for completion.
    #[serde(default)]
    pub cashier_id: Option<i64>,
    pub acting_user_id: String,
    /// Free text stored on completion / cancellation, or the transfer comment.
    #[serde(default)]
    pub observations: Option<String>,
}

impl TransitionRequest {
    pub fn new(ticket_id: i64, to_status: TicketStatus, acting_user_id: impl Into<String>) -> Self {
        Self {
            ticket_id,
            to_status,
            cashier_id: None,
            acting_user_id: acting_user_id.into(),
            observations: None,
        }
    }

    pub fn with_cashier(mut self, cashier_id: i64) -> Self {
        self.cashier_id = Some(cashier_id);
        self
    }

    pub fn with_observations(mut self, observations: impl Into<String>) -> Self {
        self.observations = Some(observations.into());
        self
    }
}

/// Everything a committed transfer produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferResult {
    pub ticket: Ticket,
    pub transfer: TicketTransfer,
    pub closed_span: Option<AttendanceSpan>,
    pub origin_cashier_id: i64,
    /// The origin cashier's next visible ticket, when auto-advance found one.
    pub origin_next: Option<Ticket>,
}
