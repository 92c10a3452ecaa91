use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{Cashier, CashierStatusLog, IntervalType};
use crate::error::{EntityKind, QueueError};
use crate::store::{encode_ts, opt_ts_column, ts_column};

const CASHIER_COLUMNS: &str = "id, name, service_id, active, paused, out_of_service, \
     last_state_comment, last_state_at, created_at";

const LOG_COLUMNS: &str =
    "id, cashier_id, interval_type, comment, started_at, ended_at, performed_by, closed_by";

fn row_to_cashier(row: &rusqlite::Row) -> rusqlite::Result<Cashier> {
    Ok(Cashier {
        id: row.get(0)?,
        name: row.get(1)?,
        service_id: row.get(2)?,
        active: row.get(3)?,
        paused: row.get(4)?,
        out_of_service: row.get(5)?,
        last_state_comment: row.get(6)?,
        last_state_at: opt_ts_column(row, 7)?,
        created_at: ts_column(row, 8)?,
    })
}

fn row_to_log(row: &rusqlite::Row) -> rusqlite::Result<CashierStatusLog> {
    Ok(CashierStatusLog {
        id: row.get(0)?,
        cashier_id: row.get(1)?,
        interval_type: row.get(2)?,
        comment: row.get(3)?,
        started_at: ts_column(row, 4)?,
        ended_at: opt_ts_column(row, 5)?,
        performed_by: row.get(6)?,
        closed_by: row.get(7)?,
    })
}

pub(crate) fn get_cashier(conn: &Connection, id: i64) -> Result<Cashier, QueueError> {
    let sql = format!("SELECT {} FROM cashiers WHERE id = ?1", CASHIER_COLUMNS);
    conn.query_row(&sql, [id], row_to_cashier)
        .optional()?
        .ok_or_else(|| QueueError::not_found(EntityKind::Cashier, id))
}

pub(crate) fn list_cashiers(
    conn: &Connection,
    service_id: Option<i64>,
) -> Result<Vec<Cashier>, QueueError> {
    let sql = format!(
        "SELECT {} FROM cashiers WHERE (?1 IS NULL OR service_id = ?1) ORDER BY id",
        CASHIER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let cashiers = stmt
        .query_map([service_id], row_to_cashier)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cashiers)
}

pub(crate) fn insert_cashier(
    conn: &Connection,
    name: &str,
    service_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Cashier, QueueError> {
    conn.execute(
        "INSERT INTO cashiers (name, service_id, created_at) VALUES (?1, ?2, ?3)",
        params![name, service_id, encode_ts(&now)],
    )?;
    get_cashier(conn, conn.last_insert_rowid())
}

/// Persist the mutable columns of `cashier`.
pub(crate) fn save_cashier(conn: &Connection, cashier: &Cashier) -> Result<(), QueueError> {
    let updated = conn.execute(
        "UPDATE cashiers SET service_id = ?1, active = ?2, paused = ?3, out_of_service = ?4, \
         last_state_comment = ?5, last_state_at = ?6 WHERE id = ?7",
        params![
            cashier.service_id,
            cashier.active,
            cashier.paused,
            cashier.out_of_service,
            cashier.last_state_comment,
            cashier.last_state_at.as_ref().map(encode_ts),
            cashier.id,
        ],
    )?;
    if updated == 0 {
        return Err(QueueError::not_found(EntityKind::Cashier, cashier.id));
    }
    Ok(())
}

pub(crate) fn open_intervals(
    conn: &Connection,
    cashier_id: i64,
) -> Result<Vec<CashierStatusLog>, QueueError> {
    let sql = format!(
        "SELECT {} FROM cashier_status_logs WHERE cashier_id = ?1 AND ended_at IS NULL ORDER BY id",
        LOG_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let logs = stmt
        .query_map([cashier_id], row_to_log)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}

pub(crate) fn insert_interval(
    conn: &Connection,
    cashier_id: i64,
    interval_type: IntervalType,
    comment: Option<&str>,
    performed_by: &str,
    started_at: DateTime<Utc>,
) -> Result<CashierStatusLog, QueueError> {
    conn.execute(
        "INSERT INTO cashier_status_logs (cashier_id, interval_type, comment, started_at, performed_by) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            cashier_id,
            interval_type,
            comment,
            encode_ts(&started_at),
            performed_by
        ],
    )?;
    Ok(CashierStatusLog {
        id: conn.last_insert_rowid(),
        cashier_id,
        interval_type,
        comment: comment.map(str::to_string),
        started_at,
        ended_at: None,
        performed_by: performed_by.to_string(),
        closed_by: None,
    })
}

pub(crate) fn close_interval(
    conn: &Connection,
    mut log: CashierStatusLog,
    closed_by: &str,
    ended_at: DateTime<Utc>,
) -> Result<CashierStatusLog, QueueError> {
    conn.execute(
        "UPDATE cashier_status_logs SET ended_at = ?1, closed_by = ?2 WHERE id = ?3",
        params![encode_ts(&ended_at), closed_by, log.id],
    )?;
    log.ended_at = Some(ended_at);
    log.closed_by = Some(closed_by.to_string());
    Ok(log)
}

/// Status log for a cashier, newest first.
pub(crate) fn status_history(
    conn: &Connection,
    cashier_id: i64,
    limit: usize,
) -> Result<Vec<CashierStatusLog>, QueueError> {
    let sql = format!(
        "SELECT {} FROM cashier_status_logs WHERE cashier_id = ?1 \
         ORDER BY started_at DESC, id DESC LIMIT ?2",
        LOG_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let logs = stmt
        .query_map(params![cashier_id, limit as i64], row_to_log)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}
