//! Ticket state machine.
//!
//! [`Transition::resolve`] is the single source of truth for which status
//! changes exist. The functions below apply one transition each inside the
//! caller's write transaction, reading the ticket first and the cashier
//! second. A guard failure returns before anything is written; any later
//! error rolls the whole transaction back.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use super::repo::{self, HistoryRecord, NewTicket};
use super::{CreateTicketRequest, Ticket, TicketStatus};
use crate::attendance::{self, AttendanceSpan};
use crate::cashier::repo as cashier_repo;
use crate::directory;
use crate::error::{ConflictReason, QueueError};
use crate::sequence;

/// A named edge of the ticket state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Pending to InAttention.
    Dispatch,
    /// InAttention at the same cashier again. No effect.
    Reaffirm,
    /// InAttention moved to a different cashier.
    Handoff,
    Complete,
    /// InAttention to Cancelled.
    Cancel,
    /// Pending to Cancelled (no-show, end-of-day sweep).
    Abandon,
    /// InAttention back to Pending at another cashier's service.
    Transfer,
}

impl Transition {
    /// Look up the edge from `from` to `to`. `None` means the change is not allowed.
    pub fn resolve(from: TicketStatus, to: TicketStatus, same_cashier: bool) -> Option<Self> {
        use TicketStatus::*;

        match (from, to) {
            (Pending, InAttention) => Some(Transition::Dispatch),
            (InAttention, InAttention) if same_cashier => Some(Transition::Reaffirm),
            (InAttention, InAttention) => Some(Transition::Handoff),
            (InAttention, Completed) => Some(Transition::Complete),
            (InAttention, Cancelled) => Some(Transition::Cancel),
            (Pending, Cancelled) => Some(Transition::Abandon),
            (InAttention, Pending) => Some(Transition::Transfer),
            (Pending, Pending) | (Pending, Completed) | (Pending, TransferPending) => None,
            (InAttention, TransferPending) => None,
            // Terminal and audit-only states have no outgoing edges.
            (Completed, _) | (Cancelled, _) | (TransferPending, _) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Dispatch => "dispatch",
            Transition::Reaffirm => "reaffirm",
            Transition::Handoff => "handoff",
            Transition::Complete => "complete",
            Transition::Cancel => "cancel",
            Transition::Abandon => "abandon",
            Transition::Transfer => "transfer",
        }
    }
}

/// Resolve or fail with `InvalidTransition` for this ticket.
pub(crate) fn require_transition(
    ticket: &Ticket,
    to: TicketStatus,
    same_cashier: bool,
) -> Result<Transition, QueueError> {
    Transition::resolve(ticket.status, to, same_cashier)
        .ok_or_else(|| {
            conflict(ConflictReason::InvalidTransition {
                ticket_id: ticket.id,
                from: ticket.status,
                to,
            })
        })
}

/// Result of applying a transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionOutcome {
    pub ticket: Ticket,
    pub transition: Transition,
    /// False when the call was an idempotent no-op.
    pub changed: bool,
    /// Cashier the ticket was assigned to before the call.
    pub previous_cashier_id: Option<i64>,
    /// Span opened by the call.
    pub opened_span: Option<AttendanceSpan>,
    /// Span closed by the call.
    pub closed_span: Option<AttendanceSpan>,
}

impl TransitionOutcome {
    fn unchanged(ticket: Ticket, transition: Transition) -> Self {
        Self {
            previous_cashier_id: ticket.assigned_cashier_id,
            ticket,
            transition,
            changed: false,
            opened_span: None,
            closed_span: None,
        }
    }
}

fn conflict(reason: ConflictReason) -> QueueError {
    warn!(reason = reason.reason_code(), "Ticket guard rejected: {}", reason);
    QueueError::Conflict(reason)
}

pub(crate) struct StatusChange<'a> {
    pub from: Option<TicketStatus>,
    pub to: TicketStatus,
    pub user: &'a str,
    pub cashier_id: Option<i64>,
    pub comment: Option<&'a str>,
}

pub(crate) fn record(
    conn: &Connection,
    ticket_id: i64,
    change: StatusChange<'_>,
    now: DateTime<Utc>,
) -> Result<(), QueueError> {
    repo::append_history(
        conn,
        &HistoryRecord {
            ticket_id,
            from_status: change.from,
            to_status: change.to,
            changed_by: change.user,
            cashier_id: change.cashier_id,
            comment: change.comment,
            changed_at: now,
        },
    )
}

/// Outcome of one ticket creation attempt.
#[derive(Debug)]
pub(crate) enum CreateAttempt {
    Created(Ticket),
    /// The label was already in use on that day. The sequence number stays
    /// consumed; commit and try again.
    LabelTaken { label: String },
}

/// One creation attempt: validate, allocate, label, insert.
pub(crate) fn create(
    conn: &Connection,
    request: &CreateTicketRequest,
    day: NaiveDate,
    label_width: usize,
    now: DateTime<Utc>,
) -> Result<CreateAttempt, QueueError> {
    let service = directory::get_service(conn, request.service_id)?;
    if !service.active {
        return Err(QueueError::Validation(format!(
            "service {} is not active",
            service.id
        )));
    }
    if let Some(cashier_id) = request.reserved_for_cashier_id {
        cashier_repo::get_cashier(conn, cashier_id)?;
    }

    let sequence_number = sequence::next_sequence(conn, service.id, day)?;
    let label = sequence::format_label(&service.prefix, sequence_number, label_width);
    if repo::label_taken(conn, day, &label)? {
        return Ok(CreateAttempt::LabelTaken { label });
    }

    let ticket = repo::insert_ticket(
        conn,
        &NewTicket {
            service_id: service.id,
            client_id: &request.client_id,
            service_day: day,
            sequence_number,
            display_label: &label,
            reserved_for_cashier_id: request.reserved_for_cashier_id,
            created_at: now,
        },
    )?;
    record(
        conn,
        ticket.id,
        StatusChange {
            from: None,
            to: TicketStatus::Pending,
            user: request.author(),
            cashier_id: None,
            comment: None,
        },
        now,
    )?;

    info!(
        ticket_id = ticket.id,
        label = %ticket.display_label,
        service_id = service.id,
        "Created ticket"
    );
    Ok(CreateAttempt::Created(ticket))
}

/// Check the cashier can take `ticket`: operational, `pin` respected, not busy.
///
/// Pins bind pending tickets only, so handoffs pass `None`.
fn ensure_can_take(
    conn: &Connection,
    ticket: &Ticket,
    cashier_id: i64,
    pin: Option<i64>,
) -> Result<(), QueueError> {
    let cashier = cashier_repo::get_cashier(conn, cashier_id)?;
    cashier.ensure_operational().map_err(conflict)?;

    if let Some(reserved_for) = pin {
        if reserved_for != cashier_id {
            return Err(conflict(ConflictReason::ReservedForOtherCashier {
                ticket_id: ticket.id,
                reserved_for,
            }));
        }
    }

    if let Some(busy_with) = repo::in_attention_at(conn, cashier_id)? {
        if busy_with != ticket.id {
            return Err(conflict(ConflictReason::CashierAlreadyBusy {
                cashier_id,
                busy_with,
            }));
        }
    }
    Ok(())
}

/// Pending to InAttention at `cashier_id`.
///
/// Dispatching a ticket already in attention at the same cashier is a no-op.
pub(crate) fn dispatch(
    conn: &Connection,
    ticket_id: i64,
    cashier_id: i64,
    user: &str,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, QueueError> {
    let mut ticket = repo::get_ticket(conn, ticket_id)?;
    let same_cashier = ticket.assigned_cashier_id == Some(cashier_id);

    match require_transition(&ticket, TicketStatus::InAttention, same_cashier)? {
        Transition::Dispatch => {}
        Transition::Reaffirm => {
            return Ok(TransitionOutcome::unchanged(ticket, Transition::Reaffirm));
        }
        other => {
            let reason = match ticket.assigned_cashier_id {
                Some(holder) if other == Transition::Handoff => {
                    ConflictReason::TicketAlreadyInAttentionElsewhere {
                        ticket_id,
                        cashier_id: holder,
                    }
                }
                _ => ConflictReason::InvalidTransition {
                    ticket_id,
                    from: ticket.status,
                    to: TicketStatus::InAttention,
                },
            };
            return Err(conflict(reason));
        }
    }

    ensure_can_take(conn, &ticket, cashier_id, ticket.reserved_for_cashier_id)?;

    let previous_cashier_id = ticket.assigned_cashier_id;
    ticket.status = TicketStatus::InAttention;
    ticket.assigned_cashier_id = Some(cashier_id);
    if ticket.dispatching_user_id.is_none() {
        ticket.dispatching_user_id = Some(user.to_string());
    }
    if ticket.attended_at.is_none() {
        ticket.attended_at = Some(now);
    }
    ticket.updated_at = now;
    repo::save_ticket(conn, &ticket)?;

    let span = attendance::open_span(conn, ticket.id, cashier_id, ticket.service_id, now)?;
    record(
        conn,
        ticket.id,
        StatusChange {
            from: Some(TicketStatus::Pending),
            to: TicketStatus::InAttention,
            user,
            cashier_id: Some(cashier_id),
            comment: None,
        },
        now,
    )?;

    info!(ticket_id, cashier_id, label = %ticket.display_label, "Dispatched ticket");
    Ok(TransitionOutcome {
        ticket,
        transition: Transition::Dispatch,
        changed: true,
        previous_cashier_id,
        opened_span: Some(span),
        closed_span: None,
    })
}

/// Move an in-attention ticket to another cashier, rotating its span.
pub(crate) fn handoff(
    conn: &Connection,
    ticket_id: i64,
    to_cashier_id: i64,
    user: &str,
    comment: Option<&str>,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, QueueError> {
    let mut ticket = repo::get_ticket(conn, ticket_id)?;
    let same_cashier = ticket.assigned_cashier_id == Some(to_cashier_id);

    match require_transition(&ticket, TicketStatus::InAttention, same_cashier)? {
        Transition::Handoff => {}
        Transition::Reaffirm => {
            return Ok(TransitionOutcome::unchanged(ticket, Transition::Reaffirm));
        }
        // Only in-attention tickets can be handed off; pending ones are dispatched.
        _ => {
            return Err(conflict(ConflictReason::InvalidTransition {
                ticket_id,
                from: ticket.status,
                to: TicketStatus::InAttention,
            }));
        }
    }

    ensure_can_take(conn, &ticket, to_cashier_id, None)?;

    let previous_cashier_id = ticket.assigned_cashier_id;
    ticket.assigned_cashier_id = Some(to_cashier_id);
    ticket.updated_at = now;
    repo::save_ticket(conn, &ticket)?;

    let rotation =
        attendance::rotate_span(conn, ticket.id, to_cashier_id, ticket.service_id, now)?;
    record(
        conn,
        ticket.id,
        StatusChange {
            from: Some(TicketStatus::InAttention),
            to: TicketStatus::InAttention,
            user,
            cashier_id: Some(to_cashier_id),
            comment,
        },
        now,
    )?;

    info!(
        ticket_id,
        from_cashier_id = ?previous_cashier_id,
        to_cashier_id,
        "Handed off ticket"
    );
    Ok(TransitionOutcome {
        ticket,
        transition: Transition::Handoff,
        changed: true,
        previous_cashier_id,
        opened_span: Some(rotation.span),
        closed_span: rotation.closed,
    })
}

/// Complete, cancel or abandon a ticket.
///
/// A supplied `cashier_id` must be the cashier attending the ticket.
pub(crate) fn finish(
    conn: &Connection,
    ticket_id: i64,
    to: TicketStatus,
    cashier_id: Option<i64>,
    user: &str,
    observations: Option<&str>,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, QueueError> {
    let mut ticket = repo::get_ticket(conn, ticket_id)?;
    let transition = require_transition(&ticket, to, true)?;
    if !matches!(
        transition,
        Transition::Complete | Transition::Cancel | Transition::Abandon
    ) {
        return Err(conflict(ConflictReason::InvalidTransition {
            ticket_id,
            from: ticket.status,
            to,
        }));
    }

    if let Some(cashier_id) = cashier_id {
        cashier_repo::get_cashier(conn, cashier_id)?;
        if let Some(assigned) = ticket.assigned_cashier_id {
            if ticket.status == TicketStatus::InAttention && assigned != cashier_id {
                return Err(conflict(ConflictReason::TicketAlreadyInAttentionElsewhere {
                    ticket_id,
                    cashier_id: assigned,
                }));
            }
        }
    }

    let from = ticket.status;
    let closed_span = match transition {
        Transition::Abandon => None,
        _ => attendance::close_open_span(conn, ticket.id, now)?,
    };

    ticket.status = to;
    ticket.finished_at = Some(now);
    ticket.updated_at = now;
    if let Some(text) = observations {
        ticket.observations = Some(text.to_string());
    }
    repo::save_ticket(conn, &ticket)?;
    record(
        conn,
        ticket.id,
        StatusChange {
            from: Some(from),
            to,
            user,
            cashier_id: ticket.assigned_cashier_id,
            comment: observations,
        },
        now,
    )?;

    info!(ticket_id, status = %to, transition = transition.as_str(), "Finished ticket");
    Ok(TransitionOutcome {
        previous_cashier_id: ticket.assigned_cashier_id,
        ticket,
        transition,
        changed: true,
        opened_span: None,
        closed_span,
    })
}

/// Set or clear the reservation pin of a pending ticket.
pub(crate) fn reserve(
    conn: &Connection,
    ticket_id: i64,
    cashier_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Ticket, QueueError> {
    let mut ticket = repo::get_ticket(conn, ticket_id)?;
    if ticket.status != TicketStatus::Pending {
        return Err(conflict(ConflictReason::TicketNotPending {
            ticket_id,
            status: ticket.status,
        }));
    }
    if let Some(cashier_id) = cashier_id {
        cashier_repo::get_cashier(conn, cashier_id)?;
    }

    ticket.reserved_for_cashier_id = cashier_id;
    ticket.updated_at = now;
    repo::save_ticket(conn, &ticket)?;
    info!(ticket_id, reserved_for = ?cashier_id, "Updated ticket reservation");
    Ok(ticket)
}

/// Abandon every pending ticket issued before `before_day`.
pub(crate) fn abandon_stale(
    conn: &Connection,
    before_day: NaiveDate,
    user: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Ticket>, QueueError> {
    let stale = repo::stale_pending(conn, before_day)?;
    let mut abandoned = Vec::with_capacity(stale.len());
    for ticket in stale {
        let outcome = finish(
            conn,
            ticket.id,
            TicketStatus::Cancelled,
            None,
            user,
            Some("end of day"),
            now,
        )?;
        abandoned.push(outcome.ticket);
    }
    if !abandoned.is_empty() {
        info!(count = abandoned.len(), before_day = %before_day, "Abandoned stale tickets");
    }
    Ok(abandoned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotOperationalReason;
    use crate::testing::QueueFixture;
    use TicketStatus::*;

    #[test]
    fn test_transition_table() {
        let allowed = [
            (Pending, InAttention, Transition::Dispatch),
            (InAttention, Completed, Transition::Complete),
            (InAttention, Cancelled, Transition::Cancel),
            (Pending, Cancelled, Transition::Abandon),
            (InAttention, Pending, Transition::Transfer),
        ];
        for (from, to, expected) in allowed {
            assert_eq!(Transition::resolve(from, to, false), Some(expected));
        }
        assert_eq!(
            Transition::resolve(InAttention, InAttention, true),
            Some(Transition::Reaffirm)
        );
        assert_eq!(
            Transition::resolve(InAttention, InAttention, false),
            Some(Transition::Handoff)
        );

        let all = [Pending, InAttention, Completed, Cancelled, TransferPending];
        for to in all {
            assert_eq!(Transition::resolve(Completed, to, false), None);
            assert_eq!(Transition::resolve(Cancelled, to, false), None);
            assert_eq!(Transition::resolve(TransferPending, to, false), None);
        }
        assert_eq!(Transition::resolve(Pending, Completed, false), None);
        assert_eq!(Transition::resolve(Pending, Pending, false), None);
        assert_eq!(Transition::resolve(InAttention, TransferPending, false), None);
    }

    #[test]
    fn test_dispatch_sets_assignment_and_opens_span() {
        let f = QueueFixture::in_memory();
        let service = f.service("Atención", "ATC");
        let cashier = f.cashier("Window 7", Some(service.id));
        let ticket = f.pending_ticket(service.id);
        let now = f.now();

        let outcome = f
            .store
            .write(|tx| dispatch(tx, ticket.id, cashier.id, "operator", now))
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.ticket.status, InAttention);
        assert_eq!(outcome.ticket.assigned_cashier_id, Some(cashier.id));
        assert_eq!(outcome.ticket.dispatching_user_id.as_deref(), Some("operator"));
        assert_eq!(outcome.ticket.attended_at, Some(now));
        assert_eq!(outcome.opened_span.unwrap().cashier_id, cashier.id);

        let history = f.store.read(|conn| repo::list_history(conn, ticket.id)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].from_status, None);
        assert_eq!(history[1].from_status, Some(Pending));
        assert_eq!(history[1].to_status, InAttention);
    }

    #[test]
    fn test_dispatch_same_cashier_is_noop() {
        let f = QueueFixture::in_memory();
        let service = f.service("Atención", "ATC");
        let cashier = f.cashier("Window 7", Some(service.id));
        let ticket = f.pending_ticket(service.id);
        let now = f.now();

        f.store
            .write(|tx| dispatch(tx, ticket.id, cashier.id, "op", now))
            .unwrap();
        let again = f
            .store
            .write(|tx| dispatch(tx, ticket.id, cashier.id, "op", now))
            .unwrap();
        assert!(!again.changed);
        assert_eq!(again.transition, Transition::Reaffirm);

        let spans = f
            .store
            .read(|conn| attendance::list_spans(conn, ticket.id))
            .unwrap();
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn test_dispatch_guards() {
        let f = QueueFixture::in_memory();
        let service = f.service("Atención", "ATC");
        let seven = f.cashier("Window 7", Some(service.id));
        let eight = f.cashier("Window 8", Some(service.id));
        let first = f.pending_ticket(service.id);
        let second = f.pending_ticket(service.id);
        let now = f.now();

        f.store
            .write(|tx| dispatch(tx, first.id, seven.id, "op", now))
            .unwrap();

        let err = f
            .store
            .write(|tx| dispatch(tx, second.id, seven.id, "op", now))
            .unwrap_err();
        assert_eq!(
            err.conflict(),
            Some(&ConflictReason::CashierAlreadyBusy {
                cashier_id: seven.id,
                busy_with: first.id,
            })
        );

        let err = f
            .store
            .write(|tx| dispatch(tx, first.id, eight.id, "op", now))
            .unwrap_err();
        assert_eq!(
            err.conflict(),
            Some(&ConflictReason::TicketAlreadyInAttentionElsewhere {
                ticket_id: first.id,
                cashier_id: seven.id,
            })
        );

        let pinned = f.pinned_ticket(service.id, seven.id);
        let err = f
            .store
            .write(|tx| dispatch(tx, pinned.id, eight.id, "op", now))
            .unwrap_err();
        assert_eq!(
            err.conflict(),
            Some(&ConflictReason::ReservedForOtherCashier {
                ticket_id: pinned.id,
                reserved_for: seven.id,
            })
        );
    }

    #[test]
    fn test_dispatch_to_paused_cashier_rejected() {
        let f = QueueFixture::in_memory();
        let service = f.service("Atención", "ATC");
        let cashier = f.cashier("Window 7", Some(service.id));
        let ticket = f.pending_ticket(service.id);
        let now = f.now();

        f.store
            .write(|tx| crate::cashier::state::pause(tx, cashier.id, None, "op", now))
            .unwrap();
        let err = f
            .store
            .write(|tx| dispatch(tx, ticket.id, cashier.id, "op", now))
            .unwrap_err();
        assert_eq!(
            err.conflict(),
            Some(&ConflictReason::CashierNotOperational {
                cashier_id: cashier.id,
                reason: NotOperationalReason::Paused,
            })
        );

        let unchanged = f.store.read(|conn| repo::get_ticket(conn, ticket.id)).unwrap();
        assert_eq!(unchanged.status, Pending);
    }

    #[test]
    fn test_complete_closes_span_and_frees_cashier() {
        let f = QueueFixture::in_memory();
        let service = f.service("Atención", "ATC");
        let cashier = f.cashier("Window 7", Some(service.id));
        let ticket = f.pending_ticket(service.id);
        let now = f.now();

        f.store
            .write(|tx| dispatch(tx, ticket.id, cashier.id, "op", now))
            .unwrap();
        let outcome = f
            .store
            .write(|tx| {
                finish(
                    tx,
                    ticket.id,
                    Completed,
                    Some(cashier.id),
                    "op",
                    Some("resolved"),
                    now,
                )
            })
            .unwrap();
        assert_eq!(outcome.transition, Transition::Complete);
        assert_eq!(outcome.ticket.observations.as_deref(), Some("resolved"));
        assert_eq!(outcome.ticket.finished_at, Some(now));
        assert!(outcome.closed_span.is_some());

        let busy = f
            .store
            .read(|conn| repo::in_attention_at(conn, cashier.id))
            .unwrap();
        assert_eq!(busy, None);

        let err = f
            .store
            .write(|tx| finish(tx, ticket.id, Cancelled, None, "op", None, now))
            .unwrap_err();
        assert_eq!(err.reason_code(), "invalid_transition");
    }

    #[test]
    fn test_finish_by_wrong_cashier_rejected() {
        let f = QueueFixture::in_memory();
        let service = f.service("Atención", "ATC");
        let seven = f.cashier("Window 7", Some(service.id));
        let eight = f.cashier("Window 8", Some(service.id));
        let ticket = f.pending_ticket(service.id);
        let now = f.now();

        f.store
            .write(|tx| dispatch(tx, ticket.id, seven.id, "op", now))
            .unwrap();
        let err = f
            .store
            .write(|tx| finish(tx, ticket.id, Completed, Some(eight.id), "op", None, now))
            .unwrap_err();
        assert_eq!(err.reason_code(), "ticket_already_in_attention_elsewhere");
    }

    #[test]
    fn test_handoff_rotates_span() {
        let f = QueueFixture::in_memory();
        let service = f.service("Atención", "ATC");
        let seven = f.cashier("Window 7", Some(service.id));
        let eight = f.cashier("Window 8", Some(service.id));
        let ticket = f.pending_ticket(service.id);
        let now = f.now();

        f.store
            .write(|tx| dispatch(tx, ticket.id, seven.id, "op", now))
            .unwrap();
        let outcome = f
            .store
            .write(|tx| handoff(tx, ticket.id, eight.id, "op", Some("needs manager"), now))
            .unwrap();
        assert_eq!(outcome.transition, Transition::Handoff);
        assert_eq!(outcome.previous_cashier_id, Some(seven.id));
        assert_eq!(outcome.ticket.assigned_cashier_id, Some(eight.id));
        assert_eq!(outcome.closed_span.unwrap().cashier_id, seven.id);

        let spans = f
            .store
            .read(|conn| attendance::list_spans(conn, ticket.id))
            .unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans.iter().filter(|s| s.is_open()).count(), 1);
    }

    #[test]
    fn test_abandon_pending_and_reserve_rules() {
        let f = QueueFixture::in_memory();
        let service = f.service("Atención", "ATC");
        let cashier = f.cashier("Window 7", Some(service.id));
        let ticket = f.pending_ticket(service.id);
        let now = f.now();

        let reserved = f
            .store
            .write(|tx| reserve(tx, ticket.id, Some(cashier.id), now))
            .unwrap();
        assert_eq!(reserved.reserved_for_cashier_id, Some(cashier.id));

        let outcome = f
            .store
            .write(|tx| finish(tx, ticket.id, Cancelled, None, "op", None, now))
            .unwrap();
        assert_eq!(outcome.transition, Transition::Abandon);
        assert!(outcome.closed_span.is_none());

        let err = f
            .store
            .write(|tx| reserve(tx, ticket.id, None, now))
            .unwrap_err();
        assert_eq!(
            err.conflict(),
            Some(&ConflictReason::TicketNotPending {
                ticket_id: ticket.id,
                status: Cancelled,
            })
        );
    }
}
