use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::types::TransitionRequest;
use crate::attendance::{self, AttendanceSpan};
use crate::cashier::{repo as cashier_repo, state, Cashier, CashierStatusLog, IntervalChange};
use crate::clock::{service_day, Clock, SystemClock};
use crate::config::QueueConfig;
use crate::directory::{self, CreateCashierRequest, CreateServiceRequest, Service};
use crate::error::{check_comment, require_actor, ConflictReason, QueueError};
use crate::events::{self, EventPublisher};
use crate::metrics::{
    ALLOCATION_ATTEMPTS, ALLOCATION_FAILURES, ALLOCATION_RETRIES, ATTENTION_DURATION,
    CASHIER_STATE_CHANGES, CONFLICTS, TICKETS_CREATED, TRANSITIONS,
};
use crate::sequence::RetryBackoff;
use crate::store::SqliteQueueStore;
use crate::ticket::lifecycle::{self, CreateAttempt};
use crate::ticket::{
    repo, CreateTicketRequest, Ticket, TicketHistoryEntry, TicketStatus, TicketTransfer,
    Transition, TransitionOutcome,
};
use crate::visibility::{self, QueueViewOptions, MAX_QUEUE_LIMIT};

/// Largest page accepted by [`QueueOrchestrator::get_status_history`].
pub const MAX_HISTORY_LIMIT: usize = 1000;

/// Count guard rejections before handing the result back.
pub(super) fn track<T>(result: Result<T, QueueError>) -> Result<T, QueueError> {
    if let Err(QueueError::Conflict(reason)) = &result {
        CONFLICTS.with_label_values(&[reason.reason_code()]).inc();
    }
    result
}

fn record_transition(operation: &str, result: &Result<TransitionOutcome, QueueError>) {
    match result {
        Ok(outcome) => {
            let label = if outcome.changed { "applied" } else { "noop" };
            TRANSITIONS
                .with_label_values(&[outcome.transition.as_str(), label])
                .inc();
        }
        Err(QueueError::Conflict(_)) => {
            TRANSITIONS.with_label_values(&[operation, "rejected"]).inc();
        }
        Err(_) => {
            TRANSITIONS.with_label_values(&[operation, "error"]).inc();
        }
    }
}

pub(super) fn ticket_payload(ticket: &Ticket) -> Value {
    json!({
        "ticket_id": ticket.id,
        "display_label": ticket.display_label,
        "status": ticket.status,
        "service_id": ticket.service_id,
        "assigned_cashier_id": ticket.assigned_cashier_id,
        "reserved_for_cashier_id": ticket.reserved_for_cashier_id,
    })
}

fn observe_attention(span: Option<&AttendanceSpan>, status: TicketStatus) {
    if let Some(duration) = span.and_then(AttendanceSpan::duration) {
        let seconds = duration.num_milliseconds() as f64 / 1000.0;
        ATTENTION_DURATION
            .with_label_values(&[status.as_str()])
            .observe(seconds);
    }
}

/// Entry point for every queue operation.
pub struct QueueOrchestrator {
    pub(super) store: Arc<SqliteQueueStore>,
    pub(super) publisher: Arc<dyn EventPublisher>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) config: QueueConfig,
}

impl QueueOrchestrator {
    pub fn new(
        store: Arc<SqliteQueueStore>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
            config,
        }
    }

    /// Orchestrator on the wall clock.
    pub fn with_system_clock(
        store: Arc<SqliteQueueStore>,
        publisher: Arc<dyn EventPublisher>,
        config: QueueConfig,
    ) -> Self {
        Self::new(store, publisher, Arc::new(SystemClock), config)
    }

    pub fn store(&self) -> &Arc<SqliteQueueStore> {
        &self.store
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Calendar day of `at` in the configured offset.
    pub fn service_day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        service_day(at, self.config.utc_offset())
    }

    pub(super) fn publish(&self, topic: &str, event: &str, payload: &Value) {
        self.publisher.publish(topic, event, payload.clone());
    }

    fn publish_ticket(&self, event: &str, ticket: &Ticket, cashier_ids: &[Option<i64>]) {
        let payload = ticket_payload(ticket);
        self.publish(&events::service_topic(ticket.service_id), event, &payload);
        for cashier_id in cashier_ids.iter().flatten() {
            self.publish(&events::cashier_topic(*cashier_id), event, &payload);
        }
    }

    fn publish_cashier(&self, event: &str, change: &IntervalChange) {
        let payload = json!({
            "cashier_id": change.cashier.id,
            "state": change.cashier.operational_state(),
            "comment": change.cashier.last_state_comment,
            "opened": change.opened.as_ref().map(|log| log.id),
            "closed": change.closed.iter().map(|log| log.id).collect::<Vec<_>>(),
        });
        self.publish(&events::cashier_topic(change.cashier.id), event, &payload);
        if let Some(service_id) = change.cashier.service_id {
            self.publish(&events::service_topic(service_id), event, &payload);
        }
    }

    // =========================================================================
    // Directory
    // =========================================================================

    pub fn create_service(&self, request: &CreateServiceRequest) -> Result<Service, QueueError> {
        let now = self.clock.now();
        self.store
            .write(|tx| directory::create_service(tx, request, now))
    }

    pub fn set_service_active(&self, service_id: i64, active: bool) -> Result<Service, QueueError> {
        self.store
            .write(|tx| directory::set_service_active(tx, service_id, active))
    }

    pub fn get_service(&self, service_id: i64) -> Result<Service, QueueError> {
        self.store
            .read(|conn| directory::get_service(conn, service_id))
    }

    pub fn list_services(&self) -> Result<Vec<Service>, QueueError> {
        self.store.read(directory::list_services)
    }

    pub fn create_cashier(&self, request: &CreateCashierRequest) -> Result<Cashier, QueueError> {
        let now = self.clock.now();
        self.store
            .write(|tx| directory::create_cashier(tx, request, now))
    }

    pub fn assign_cashier_service(
        &self,
        cashier_id: i64,
        service_id: Option<i64>,
    ) -> Result<Cashier, QueueError> {
        self.store
            .write(|tx| directory::assign_cashier_service(tx, cashier_id, service_id))
    }

    pub fn set_cashier_active(&self, cashier_id: i64, active: bool) -> Result<Cashier, QueueError> {
        self.store
            .write(|tx| directory::set_cashier_active(tx, cashier_id, active))
    }

    pub fn get_cashier(&self, cashier_id: i64) -> Result<Cashier, QueueError> {
        self.store
            .read(|conn| cashier_repo::get_cashier(conn, cashier_id))
    }

    pub fn list_cashiers(&self, service_id: Option<i64>) -> Result<Vec<Cashier>, QueueError> {
        self.store
            .read(|conn| cashier_repo::list_cashiers(conn, service_id))
    }

    // =========================================================================
    // Tickets
    // =========================================================================

    /// Issue a ticket with the next label of its service for today.
    ///
    /// Label collisions and transient store errors are retried with jittered
    /// backoff up to `allocation.max_attempts`, then reported as
    /// [`QueueError::FatalAllocation`].
    pub async fn create_ticket(&self, request: CreateTicketRequest) -> Result<Ticket, QueueError> {
        if request.client_id.trim().is_empty() {
            return Err(QueueError::Validation(
                "client_id cannot be empty".to_string(),
            ));
        }

        let allocation = &self.config.allocation;
        let backoff = RetryBackoff::from_config(allocation);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let now = self.clock.now();
            let day = self.service_day_of(now);
            let result = self.store.write(|tx| {
                lifecycle::create(tx, &request, day, self.config.label_width, now)
            });

            let cause = match result {
                Ok(CreateAttempt::Created(ticket)) => {
                    TICKETS_CREATED
                        .with_label_values(&[&ticket.service_id.to_string()])
                        .inc();
                    ALLOCATION_ATTEMPTS
                        .with_label_values(&[])
                        .observe(f64::from(attempt));
                    self.publish_ticket(
                        events::TICKET_CREATED,
                        &ticket,
                        &[ticket.reserved_for_cashier_id],
                    );
                    return Ok(ticket);
                }
                Ok(CreateAttempt::LabelTaken { label }) => {
                    debug!(service_id = request.service_id, label = %label, attempt, "Label taken, retrying");
                    "label_taken"
                }
                Err(e) if e.is_retryable() => {
                    warn!(service_id = request.service_id, attempt, "Transient error allocating ticket: {}", e);
                    "transient"
                }
                Err(e) => return track(Err(e)),
            };

            if attempt >= allocation.max_attempts {
                ALLOCATION_FAILURES.inc();
                error!(
                    service_id = request.service_id,
                    attempts = attempt,
                    "Gave up allocating a ticket number"
                );
                return Err(QueueError::FatalAllocation {
                    service_id: request.service_id,
                    attempts: attempt,
                });
            }

            ALLOCATION_RETRIES.with_label_values(&[cause]).inc();
            tokio::time::sleep(backoff.delay_for_attempt(attempt - 1)).await;
        }
    }

    /// Ordered queue as seen by `cashier_id`. Advisory: dispatch re-checks guards.
    pub fn list_visible_queue(
        &self,
        cashier_id: i64,
        options: &QueueViewOptions,
    ) -> Result<Vec<Ticket>, QueueError> {
        if options.limit == 0 || options.limit > MAX_QUEUE_LIMIT {
            return Err(QueueError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_QUEUE_LIMIT
            )));
        }

        let queue = self.store.read(|conn| {
            let cashier = cashier_repo::get_cashier(conn, cashier_id)?;
            let candidates = repo::queue_candidates(
                conn,
                cashier.service_id,
                cashier.id,
                options.include_in_attention,
            )?;
            Ok(visibility::visible_queue(
                candidates,
                cashier.id,
                cashier.service_id,
                options,
            ))
        })?;
        debug!(cashier_id, visible = queue.len(), "Computed visible queue");
        Ok(queue)
    }

    /// Apply a status change.
    ///
    /// `Pending` with a cashier is a transfer to that cashier; `InAttention`
    /// dispatches; `Completed` / `Cancelled` finish the ticket.
    pub async fn transition(&self, request: TransitionRequest) -> Result<Ticket, QueueError> {
        require_actor(&request.acting_user_id)?;
        check_comment(request.observations.as_deref())?;
        let user = request.acting_user_id.as_str();
        let observations = request.observations.as_deref();

        match request.to_status {
            TicketStatus::Pending => {
                let destination = request.cashier_id.ok_or_else(|| {
                    QueueError::Validation("cashier_id is required to transfer".to_string())
                })?;
                self.transfer_ticket(request.ticket_id, destination, user, observations)
                    .await
                    .map(|result| result.ticket)
            }
            TicketStatus::InAttention => {
                let cashier_id = request.cashier_id.ok_or_else(|| {
                    QueueError::Validation("cashier_id is required to dispatch".to_string())
                })?;
                let now = self.clock.now();
                let result = self
                    .store
                    .write(|tx| lifecycle::dispatch(tx, request.ticket_id, cashier_id, user, now));
                record_transition(Transition::Dispatch.as_str(), &result);
                let outcome = track(result)?;
                if outcome.changed {
                    self.publish_ticket(
                        events::TICKET_DISPATCHED,
                        &outcome.ticket,
                        &[outcome.ticket.assigned_cashier_id],
                    );
                }
                Ok(outcome.ticket)
            }
            to @ (TicketStatus::Completed | TicketStatus::Cancelled) => {
                let now = self.clock.now();
                let result = self.store.write(|tx| {
                    lifecycle::finish(
                        tx,
                        request.ticket_id,
                        to,
                        request.cashier_id,
                        user,
                        observations,
                        now,
                    )
                });
                record_transition("finish", &result);
                let outcome = track(result)?;
                observe_attention(outcome.closed_span.as_ref(), to);
                let event = match to {
                    TicketStatus::Completed => events::TICKET_COMPLETED,
                    _ => events::TICKET_CANCELLED,
                };
                self.publish_ticket(event, &outcome.ticket, &[outcome.ticket.assigned_cashier_id]);
                Ok(outcome.ticket)
            }
            TicketStatus::TransferPending => {
                let ticket = self.get_ticket(request.ticket_id)?;
                track(Err(ConflictReason::InvalidTransition {
                    ticket_id: ticket.id,
                    from: ticket.status,
                    to: TicketStatus::TransferPending,
                }
                .into()))
            }
        }
    }

    /// Move an in-attention ticket to another cashier without re-queueing it.
    pub async fn handoff_ticket(
        &self,
        ticket_id: i64,
        to_cashier_id: i64,
        user: &str,
        comment: Option<&str>,
    ) -> Result<Ticket, QueueError> {
        require_actor(user)?;
        check_comment(comment)?;
        let now = self.clock.now();
        let result = self
            .store
            .write(|tx| lifecycle::handoff(tx, ticket_id, to_cashier_id, user, comment, now));
        record_transition(Transition::Handoff.as_str(), &result);
        let outcome = track(result)?;
        if outcome.changed {
            self.publish_ticket(
                events::TICKET_HANDED_OFF,
                &outcome.ticket,
                &[outcome.previous_cashier_id, Some(to_cashier_id)],
            );
        }
        Ok(outcome.ticket)
    }

    /// Pin a pending ticket to a cashier, or clear the pin with `None`.
    pub async fn reserve_ticket(
        &self,
        ticket_id: i64,
        cashier_id: Option<i64>,
        user: &str,
    ) -> Result<Ticket, QueueError> {
        require_actor(user)?;
        let now = self.clock.now();
        let ticket = track(
            self.store
                .write(|tx| lifecycle::reserve(tx, ticket_id, cashier_id, now)),
        )?;
        info!(ticket_id, reserved_for = ?cashier_id, user, "Reservation changed");
        self.publish_ticket(events::TICKET_RESERVED, &ticket, &[cashier_id]);
        Ok(ticket)
    }

    /// End-of-day sweep: cancel every pending ticket issued before `before_day`.
    pub async fn cancel_stale_pending(
        &self,
        before_day: NaiveDate,
        user: &str,
    ) -> Result<Vec<Ticket>, QueueError> {
        require_actor(user)?;
        let now = self.clock.now();
        let abandoned = self
            .store
            .write(|tx| lifecycle::abandon_stale(tx, before_day, user, now))?;
        for ticket in &abandoned {
            TRANSITIONS
                .with_label_values(&[Transition::Abandon.as_str(), "applied"])
                .inc();
            self.publish_ticket(events::TICKET_CANCELLED, ticket, &[]);
        }
        Ok(abandoned)
    }

    pub fn get_ticket(&self, ticket_id: i64) -> Result<Ticket, QueueError> {
        self.store.read(|conn| repo::get_ticket(conn, ticket_id))
    }

    pub fn ticket_history(&self, ticket_id: i64) -> Result<Vec<TicketHistoryEntry>, QueueError> {
        self.store.read(|conn| {
            repo::get_ticket(conn, ticket_id)?;
            repo::list_history(conn, ticket_id)
        })
    }

    pub fn ticket_transfers(&self, ticket_id: i64) -> Result<Vec<TicketTransfer>, QueueError> {
        self.store.read(|conn| {
            repo::get_ticket(conn, ticket_id)?;
            repo::list_transfers(conn, ticket_id)
        })
    }

    pub fn attendance_spans(&self, ticket_id: i64) -> Result<Vec<AttendanceSpan>, QueueError> {
        self.store.read(|conn| {
            repo::get_ticket(conn, ticket_id)?;
            attendance::list_spans(conn, ticket_id)
        })
    }

    // =========================================================================
    // Cashier state
    // =========================================================================

    pub async fn pause_cashier(
        &self,
        cashier_id: i64,
        comment: Option<&str>,
        user: &str,
    ) -> Result<IntervalChange, QueueError> {
        require_actor(user)?;
        check_comment(comment)?;
        let now = self.clock.now();
        let change = track(
            self.store
                .write(|tx| state::pause(tx, cashier_id, comment, user, now)),
        )?;
        CASHIER_STATE_CHANGES.with_label_values(&["pause"]).inc();
        self.publish_cashier(events::CASHIER_PAUSED, &change);
        Ok(change)
    }

    pub async fn out_of_service_cashier(
        &self,
        cashier_id: i64,
        comment: Option<&str>,
        user: &str,
    ) -> Result<IntervalChange, QueueError> {
        require_actor(user)?;
        check_comment(comment)?;
        let now = self.clock.now();
        let change = track(
            self.store
                .write(|tx| state::out_of_service(tx, cashier_id, comment, user, now)),
        )?;
        CASHIER_STATE_CHANGES
            .with_label_values(&["out_of_service"])
            .inc();
        self.publish_cashier(events::CASHIER_OUT_OF_SERVICE, &change);
        Ok(change)
    }

    pub async fn resume_cashier(
        &self,
        cashier_id: i64,
        comment: Option<&str>,
        user: &str,
    ) -> Result<IntervalChange, QueueError> {
        require_actor(user)?;
        check_comment(comment)?;
        let now = self.clock.now();
        let change = track(
            self.store
                .write(|tx| state::resume(tx, cashier_id, comment, user, now)),
        )?;
        CASHIER_STATE_CHANGES.with_label_values(&["resume"]).inc();
        self.publish_cashier(events::CASHIER_RESUMED, &change);
        Ok(change)
    }

    /// Status log of a cashier, newest first.
    pub fn get_status_history(
        &self,
        cashier_id: i64,
        limit: usize,
    ) -> Result<Vec<CashierStatusLog>, QueueError> {
        if limit == 0 || limit > MAX_HISTORY_LIMIT {
            return Err(QueueError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_HISTORY_LIMIT
            )));
        }
        self.store.read(|conn| {
            cashier_repo::get_cashier(conn, cashier_id)?;
            cashier_repo::status_history(conn, cashier_id, limit)
        })
    }
}
