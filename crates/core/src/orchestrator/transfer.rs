//! Moving an in-attention ticket to another cashier's queue.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::json;
use tracing::{info, warn};

use super::engine::{ticket_payload, track};
use super::types::TransferResult;
use super::QueueOrchestrator;
use crate::attendance::{self, AttendanceSpan};
use crate::cashier::repo as cashier_repo;
use crate::error::{check_comment, require_actor, QueueError};
use crate::events;
use crate::metrics::{TRANSFERS, TRANSITIONS};
use crate::ticket::lifecycle::{self, StatusChange};
use crate::ticket::{repo, Ticket, TicketStatus, TicketTransfer, Transition};
use crate::visibility::QueueViewOptions;

struct CommittedTransfer {
    ticket: Ticket,
    transfer: TicketTransfer,
    closed_span: Option<AttendanceSpan>,
}

/// Transfer inside one write transaction.
///
/// Reads the ticket, then both cashier rows in ascending id order, so two
/// opposite transfers between the same pair of cashiers take their locks in
/// the same order.
fn transfer_in_tx(
    conn: &Connection,
    ticket_id: i64,
    to_cashier_id: i64,
    user: &str,
    comment: Option<&str>,
    now: DateTime<Utc>,
) -> Result<CommittedTransfer, QueueError> {
    let mut ticket = repo::get_ticket(conn, ticket_id)?;
    lifecycle::require_transition(&ticket, TicketStatus::Pending, false)?;

    let origin_id = ticket.assigned_cashier_id.ok_or_else(|| {
        QueueError::Database(format!(
            "ticket {} is in attention without a cashier",
            ticket_id
        ))
    })?;
    if origin_id == to_cashier_id {
        return Err(QueueError::Validation(
            "destination cashier must differ from the attending cashier".to_string(),
        ));
    }

    let (low, high) = if origin_id < to_cashier_id {
        (origin_id, to_cashier_id)
    } else {
        (to_cashier_id, origin_id)
    };
    let first = cashier_repo::get_cashier(conn, low)?;
    let second = cashier_repo::get_cashier(conn, high)?;
    let destination = if first.id == to_cashier_id { first } else { second };

    let to_service_id = destination.ensure_operational().map_err(|reason| {
        warn!(ticket_id, to_cashier_id, "Transfer rejected: {}", reason);
        QueueError::Conflict(reason)
    })?;

    let closed_span = attendance::close_open_span(conn, ticket.id, now)?;

    let from_service_id = ticket.service_id;
    ticket.status = TicketStatus::Pending;
    ticket.assigned_cashier_id = None;
    ticket.reserved_for_cashier_id = None;
    ticket.service_id = to_service_id;
    ticket.updated_at = now;
    repo::save_ticket(conn, &ticket)?;

    let transfer = repo::insert_transfer(
        conn,
        &TicketTransfer {
            id: 0,
            ticket_id,
            from_cashier_id: origin_id,
            to_cashier_id,
            from_service_id,
            to_service_id,
            performed_by: user.to_string(),
            comment: comment.map(str::to_string),
            transferred_at: now,
        },
    )?;

    lifecycle::record(
        conn,
        ticket_id,
        StatusChange {
            from: Some(TicketStatus::InAttention),
            to: TicketStatus::TransferPending,
            user,
            cashier_id: Some(origin_id),
            comment,
        },
        now,
    )?;
    lifecycle::record(
        conn,
        ticket_id,
        StatusChange {
            from: Some(TicketStatus::TransferPending),
            to: TicketStatus::Pending,
            user,
            cashier_id: Some(to_cashier_id),
            comment,
        },
        now,
    )?;

    Ok(CommittedTransfer {
        ticket,
        transfer,
        closed_span,
    })
}

impl QueueOrchestrator {
    /// Send an in-attention ticket back to the queue of `to_cashier_id`'s service.
    ///
    /// The ticket keeps its label and sequence number. After the commit the
    /// origin cashier is told about its next visible ticket when
    /// `auto_advance_on_transfer` is set; that step never fails the transfer.
    pub async fn transfer_ticket(
        &self,
        ticket_id: i64,
        to_cashier_id: i64,
        user: &str,
        comment: Option<&str>,
    ) -> Result<TransferResult, QueueError> {
        require_actor(user)?;
        check_comment(comment)?;

        let now = self.clock.now();
        let result = self
            .store
            .write(|tx| transfer_in_tx(tx, ticket_id, to_cashier_id, user, comment, now));
        let result_label = match &result {
            Ok(_) => "applied",
            Err(QueueError::Conflict(_)) => "rejected",
            Err(_) => "error",
        };
        TRANSITIONS
            .with_label_values(&[Transition::Transfer.as_str(), result_label])
            .inc();
        let committed = track(result)?;

        TRANSFERS.inc();
        let origin_cashier_id = committed.transfer.from_cashier_id;
        info!(
            ticket_id,
            from_cashier_id = origin_cashier_id,
            to_cashier_id,
            from_service_id = committed.transfer.from_service_id,
            to_service_id = committed.transfer.to_service_id,
            label = %committed.ticket.display_label,
            "Transferred ticket"
        );

        let payload = json!({
            "ticket": ticket_payload(&committed.ticket),
            "from_cashier_id": origin_cashier_id,
            "to_cashier_id": to_cashier_id,
            "from_service_id": committed.transfer.from_service_id,
            "to_service_id": committed.transfer.to_service_id,
        });
        let mut topics = vec![
            events::service_topic(committed.transfer.to_service_id),
            events::cashier_topic(origin_cashier_id),
            events::cashier_topic(to_cashier_id),
        ];
        if committed.transfer.from_service_id != committed.transfer.to_service_id {
            topics.push(events::service_topic(committed.transfer.from_service_id));
        }
        for topic in &topics {
            self.publish(topic, events::TICKET_TRANSFERRED, &payload);
        }

        let origin_next = if self.config.auto_advance_on_transfer {
            self.advance_origin(origin_cashier_id)
        } else {
            None
        };

        Ok(TransferResult {
            ticket: committed.ticket,
            transfer: committed.transfer,
            closed_span: committed.closed_span,
            origin_cashier_id,
            origin_next,
        })
    }

    /// Best effort: publish the origin cashier's next visible ticket.
    fn advance_origin(&self, cashier_id: i64) -> Option<Ticket> {
        let options = QueueViewOptions::default().with_limit(1);
        match self.list_visible_queue(cashier_id, &options) {
            Ok(queue) => {
                let next = queue.into_iter().next();
                let payload = json!({
                    "cashier_id": cashier_id,
                    "next": next.as_ref().map(ticket_payload),
                });
                self.publish(
                    &events::cashier_topic(cashier_id),
                    events::QUEUE_ADVANCE,
                    &payload,
                );
                next
            }
            Err(e) => {
                warn!(cashier_id, "Auto-advance after transfer failed: {}", e);
                None
            }
        }
    }
}
