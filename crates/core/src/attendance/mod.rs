//! Attendance spans: the intervals during which a cashier works a ticket.
//!
//! At most one span per ticket is open at a time. The partial unique index
//! on `attendance_spans(ticket_id) WHERE ended_at IS NULL` backs this up at
//! the store level; the functions here check it first so callers get a
//! conflict rather than a constraint error.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;

use crate::error::{ConflictReason, QueueError};
use crate::store::{encode_ts, opt_ts_column, ts_column};

/// Interval of a cashier attending a ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceSpan {
    pub id: i64,
    pub ticket_id: i64,
    pub cashier_id: i64,
    pub service_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl AttendanceSpan {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Length of a closed span.
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }
}

/// Result of [`rotate_span`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRotation {
    /// The span open after the call.
    pub span: AttendanceSpan,
    /// True when a new span was opened.
    pub rotated: bool,
    /// The span closed by the rotation, if any.
    pub closed: Option<AttendanceSpan>,
}

const SPAN_COLUMNS: &str = "id, ticket_id, cashier_id, service_id, started_at, ended_at";

fn row_to_span(row: &rusqlite::Row) -> rusqlite::Result<AttendanceSpan> {
    Ok(AttendanceSpan {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        cashier_id: row.get(2)?,
        service_id: row.get(3)?,
        started_at: ts_column(row, 4)?,
        ended_at: opt_ts_column(row, 5)?,
    })
}

pub fn find_open_span(conn: &Connection, ticket_id: i64) -> Result<Option<AttendanceSpan>, QueueError> {
    let sql = format!(
        "SELECT {} FROM attendance_spans WHERE ticket_id = ?1 AND ended_at IS NULL",
        SPAN_COLUMNS
    );
    Ok(conn.query_row(&sql, [ticket_id], row_to_span).optional()?)
}

/// Open a span for `ticket_id` at `cashier_id`.
///
/// Fails with a conflict naming the current holder if the ticket already
/// has an open span.
pub fn open_span(
    conn: &Connection,
    ticket_id: i64,
    cashier_id: i64,
    service_id: i64,
    now: DateTime<Utc>,
) -> Result<AttendanceSpan, QueueError> {
    if let Some(open) = find_open_span(conn, ticket_id)? {
        return Err(ConflictReason::TicketAlreadyInAttentionElsewhere {
            ticket_id,
            cashier_id: open.cashier_id,
        }
        .into());
    }

    conn.execute(
        "INSERT INTO attendance_spans (ticket_id, cashier_id, service_id, started_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![ticket_id, cashier_id, service_id, encode_ts(&now)],
    )?;
    let span = AttendanceSpan {
        id: conn.last_insert_rowid(),
        ticket_id,
        cashier_id,
        service_id,
        started_at: now,
        ended_at: None,
    };
    debug!(ticket_id, cashier_id, span_id = span.id, "Opened attendance span");
    Ok(span)
}

/// Close the ticket's open span, if it has one.
pub fn close_open_span(
    conn: &Connection,
    ticket_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<AttendanceSpan>, QueueError> {
    let Some(mut span) = find_open_span(conn, ticket_id)? else {
        return Ok(None);
    };

    conn.execute(
        "UPDATE attendance_spans SET ended_at = ?1 WHERE id = ?2",
        params![encode_ts(&now), span.id],
    )?;
    span.ended_at = Some(now);
    debug!(ticket_id, span_id = span.id, "Closed attendance span");
    Ok(Some(span))
}

/// Hand the ticket's attendance to `cashier_id`.
///
/// Same cashier: returns the open span untouched. Different cashier: closes
/// it and opens a new one. No open span: opens one.
pub fn rotate_span(
    conn: &Connection,
    ticket_id: i64,
    cashier_id: i64,
    service_id: i64,
    now: DateTime<Utc>,
) -> Result<SpanRotation, QueueError> {
    let closed = match find_open_span(conn, ticket_id)? {
        Some(open) if open.cashier_id == cashier_id => {
            return Ok(SpanRotation {
                span: open,
                rotated: false,
                closed: None,
            });
        }
        Some(_) => close_open_span(conn, ticket_id, now)?,
        None => None,
    };

    let span = open_span(conn, ticket_id, cashier_id, service_id, now)?;
    Ok(SpanRotation {
        span,
        rotated: true,
        closed,
    })
}

/// Every span of a ticket, oldest first.
pub fn list_spans(conn: &Connection, ticket_id: i64) -> Result<Vec<AttendanceSpan>, QueueError> {
    let sql = format!(
        "SELECT {} FROM attendance_spans WHERE ticket_id = ?1 ORDER BY started_at, id",
        SPAN_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let spans = stmt
        .query_map([ticket_id], row_to_span)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(spans)
}
