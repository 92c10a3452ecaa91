//! Row-level persistence for tickets, their history and transfer log.
//!
//! Functions take a `&Connection`; inside a write closure pass the
//! transaction, which derefs to its connection.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{Ticket, TicketHistoryEntry, TicketStatus, TicketTransfer};
use crate::error::{EntityKind, QueueError};
use crate::store::{day_column, encode_day, encode_ts, opt_ts_column, ts_column};

const TICKET_COLUMNS: &str = "id, service_id, client_id, service_day, sequence_number, \
     display_label, status, assigned_cashier_id, reserved_for_cashier_id, dispatching_user_id, \
     observations, created_at, updated_at, attended_at, finished_at";

/// Fields of a ticket row about to be inserted.
pub(crate) struct NewTicket<'a> {
    pub service_id: i64,
    pub client_id: &'a str,
    pub service_day: NaiveDate,
    pub sequence_number: i64,
    pub display_label: &'a str,
    pub reserved_for_cashier_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A history entry about to be appended.
pub(crate) struct HistoryRecord<'a> {
    pub ticket_id: i64,
    pub from_status: Option<TicketStatus>,
    pub to_status: TicketStatus,
    pub changed_by: &'a str,
    pub cashier_id: Option<i64>,
    pub comment: Option<&'a str>,
    pub changed_at: DateTime<Utc>,
}

fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
    Ok(Ticket {
        id: row.get(0)?,
        service_id: row.get(1)?,
        client_id: row.get(2)?,
        service_day: day_column(row, 3)?,
        sequence_number: row.get(4)?,
        display_label: row.get(5)?,
        status: row.get(6)?,
        assigned_cashier_id: row.get(7)?,
        reserved_for_cashier_id: row.get(8)?,
        dispatching_user_id: row.get(9)?,
        observations: row.get(10)?,
        created_at: ts_column(row, 11)?,
        updated_at: ts_column(row, 12)?,
        attended_at: opt_ts_column(row, 13)?,
        finished_at: opt_ts_column(row, 14)?,
    })
}

fn row_to_history(row: &rusqlite::Row) -> rusqlite::Result<TicketHistoryEntry> {
    Ok(TicketHistoryEntry {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        from_status: row.get(2)?,
        to_status: row.get(3)?,
        changed_by: row.get(4)?,
        cashier_id: row.get(5)?,
        comment: row.get(6)?,
        changed_at: ts_column(row, 7)?,
    })
}

fn row_to_transfer(row: &rusqlite::Row) -> rusqlite::Result<TicketTransfer> {
    Ok(TicketTransfer {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        from_cashier_id: row.get(2)?,
        to_cashier_id: row.get(3)?,
        from_service_id: row.get(4)?,
        to_service_id: row.get(5)?,
        performed_by: row.get(6)?,
        comment: row.get(7)?,
        transferred_at: ts_column(row, 8)?,
    })
}

pub(crate) fn find_ticket(conn: &Connection, id: i64) -> Result<Option<Ticket>, QueueError> {
    let sql = format!("SELECT {} FROM tickets WHERE id = ?1", TICKET_COLUMNS);
    Ok(conn.query_row(&sql, [id], row_to_ticket).optional()?)
}

pub(crate) fn get_ticket(conn: &Connection, id: i64) -> Result<Ticket, QueueError> {
    find_ticket(conn, id)?.ok_or_else(|| QueueError::not_found(EntityKind::Ticket, id))
}

pub(crate) fn insert_ticket(conn: &Connection, new: &NewTicket<'_>) -> Result<Ticket, QueueError> {
    let created_at = encode_ts(&new.created_at);
    conn.execute(
        "INSERT INTO tickets (service_id, client_id, service_day, sequence_number, display_label, \
         status, reserved_for_cashier_id, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            new.service_id,
            new.client_id,
            encode_day(new.service_day),
            new.sequence_number,
            new.display_label,
            TicketStatus::Pending,
            new.reserved_for_cashier_id,
            created_at,
        ],
    )?;
    get_ticket(conn, conn.last_insert_rowid())
}

/// Persist every mutable column of `ticket`.
pub(crate) fn save_ticket(conn: &Connection, ticket: &Ticket) -> Result<(), QueueError> {
    let updated = conn.execute(
        "UPDATE tickets SET service_id = ?1, status = ?2, assigned_cashier_id = ?3, \
         reserved_for_cashier_id = ?4, dispatching_user_id = ?5, observations = ?6, \
         updated_at = ?7, attended_at = ?8, finished_at = ?9 WHERE id = ?10",
        params![
            ticket.service_id,
            ticket.status,
            ticket.assigned_cashier_id,
            ticket.reserved_for_cashier_id,
            ticket.dispatching_user_id,
            ticket.observations,
            encode_ts(&ticket.updated_at),
            ticket.attended_at.as_ref().map(encode_ts),
            ticket.finished_at.as_ref().map(encode_ts),
            ticket.id,
        ],
    )?;
    if updated == 0 {
        return Err(QueueError::not_found(EntityKind::Ticket, ticket.id));
    }
    Ok(())
}

/// Whether `label` is already used by any ticket on `day`.
pub(crate) fn label_taken(conn: &Connection, day: NaiveDate, label: &str) -> Result<bool, QueueError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tickets WHERE service_day = ?1 AND display_label = ?2)",
        params![encode_day(day), label],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Id of the ticket currently in attention at `cashier_id`, if any.
pub(crate) fn in_attention_at(conn: &Connection, cashier_id: i64) -> Result<Option<i64>, QueueError> {
    Ok(conn
        .query_row(
            "SELECT id FROM tickets WHERE assigned_cashier_id = ?1 AND status = ?2",
            params![cashier_id, TicketStatus::InAttention],
            |row| row.get(0),
        )
        .optional()?)
}

/// Tickets a cashier could possibly see: those of its service plus those
/// pinned to it. Visibility rules are applied by the caller.
pub(crate) fn queue_candidates(
    conn: &Connection,
    service_id: Option<i64>,
    cashier_id: i64,
    include_in_attention: bool,
) -> Result<Vec<Ticket>, QueueError> {
    let second_status = if include_in_attention {
        TicketStatus::InAttention
    } else {
        TicketStatus::Pending
    };
    let sql = format!(
        "SELECT {} FROM tickets WHERE status IN (?1, ?2) \
         AND (service_id = ?3 OR reserved_for_cashier_id = ?4)",
        TICKET_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let tickets = stmt
        .query_map(
            params![TicketStatus::Pending, second_status, service_id, cashier_id],
            row_to_ticket,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tickets)
}

/// Pending tickets issued on a day before `before_day`.
pub(crate) fn stale_pending(conn: &Connection, before_day: NaiveDate) -> Result<Vec<Ticket>, QueueError> {
    let sql = format!(
        "SELECT {} FROM tickets WHERE status = ?1 AND service_day < ?2 ORDER BY id",
        TICKET_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let tickets = stmt
        .query_map(params![TicketStatus::Pending, encode_day(before_day)], row_to_ticket)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tickets)
}

pub(crate) fn append_history(conn: &Connection, record: &HistoryRecord<'_>) -> Result<(), QueueError> {
    conn.execute(
        "INSERT INTO ticket_history (ticket_id, from_status, to_status, changed_by, cashier_id, \
         comment, changed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.ticket_id,
            record.from_status,
            record.to_status,
            record.changed_by,
            record.cashier_id,
            record.comment,
            encode_ts(&record.changed_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn list_history(conn: &Connection, ticket_id: i64) -> Result<Vec<TicketHistoryEntry>, QueueError> {
    let mut stmt = conn.prepare(
        "SELECT id, ticket_id, from_status, to_status, changed_by, cashier_id, comment, changed_at \
         FROM ticket_history WHERE ticket_id = ?1 ORDER BY id",
    )?;
    let entries = stmt
        .query_map([ticket_id], row_to_history)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub(crate) fn insert_transfer(
    conn: &Connection,
    transfer: &TicketTransfer,
) -> Result<TicketTransfer, QueueError> {
    conn.execute(
        "INSERT INTO ticket_transfers (ticket_id, from_cashier_id, to_cashier_id, from_service_id, \
         to_service_id, performed_by, comment, transferred_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            transfer.ticket_id,
            transfer.from_cashier_id,
            transfer.to_cashier_id,
            transfer.from_service_id,
            transfer.to_service_id,
            transfer.performed_by,
            transfer.comment,
            encode_ts(&transfer.transferred_at),
        ],
    )?;
    Ok(TicketTransfer {
        id: conn.last_insert_rowid(),
        ..transfer.clone()
    })
}

pub(crate) fn list_transfers(conn: &Connection, ticket_id: i64) -> Result<Vec<TicketTransfer>, QueueError> {
    let mut stmt = conn.prepare(
        "SELECT id, ticket_id, from_cashier_id, to_cashier_id, from_service_id, to_service_id, \
         performed_by, comment, transferred_at FROM ticket_transfers WHERE ticket_id = ?1 ORDER BY id",
    )?;
    let transfers = stmt
        .query_map([ticket_id], row_to_transfer)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(transfers)
}
