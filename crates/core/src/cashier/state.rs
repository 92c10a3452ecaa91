//! Pause / out-of-service interval tracking.
//!
//! Each function expects to run inside a write transaction and reads the
//! cashier row first, so two callers can never both observe "no open
//! interval" and open one each.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

use super::repo;
use super::{Cashier, IntervalChange, IntervalType};
use crate::error::{ConflictReason, QueueError};

fn record_state(cashier: &mut Cashier, comment: Option<&str>, now: DateTime<Utc>) {
    cashier.last_state_comment = comment.map(str::to_string);
    cashier.last_state_at = Some(now);
}

fn reject(reason: ConflictReason) -> QueueError {
    warn!(reason = reason.reason_code(), "Cashier state change rejected: {}", reason);
    QueueError::Conflict(reason)
}

/// Open a Pause interval.
pub(crate) fn pause(
    conn: &Connection,
    cashier_id: i64,
    comment: Option<&str>,
    user: &str,
    now: DateTime<Utc>,
) -> Result<IntervalChange, QueueError> {
    let mut cashier = repo::get_cashier(conn, cashier_id)?;
    let open = repo::open_intervals(conn, cashier_id)?;

    if cashier.out_of_service
        || open
            .iter()
            .any(|log| log.interval_type == IntervalType::OutOfService)
    {
        return Err(reject(ConflictReason::IntervalAlreadyOpen {
            cashier_id,
            interval: IntervalType::OutOfService,
        }));
    }
    if open.iter().any(|log| log.interval_type == IntervalType::Pause) {
        return Err(reject(ConflictReason::IntervalAlreadyOpen {
            cashier_id,
            interval: IntervalType::Pause,
        }));
    }

    let opened = repo::insert_interval(conn, cashier_id, IntervalType::Pause, comment, user, now)?;
    cashier.paused = true;
    record_state(&mut cashier, comment, now);
    repo::save_cashier(conn, &cashier)?;

    info!(cashier_id, user, "Cashier paused");
    Ok(IntervalChange {
        cashier,
        opened: Some(opened),
        closed: Vec::new(),
    })
}

/// Open an OutOfService interval, closing a dangling Pause first.
pub(crate) fn out_of_service(
    conn: &Connection,
    cashier_id: i64,
    comment: Option<&str>,
    user: &str,
    now: DateTime<Utc>,
) -> Result<IntervalChange, QueueError> {
    let mut cashier = repo::get_cashier(conn, cashier_id)?;
    let open = repo::open_intervals(conn, cashier_id)?;

    if open
        .iter()
        .any(|log| log.interval_type == IntervalType::OutOfService)
    {
        return Err(reject(ConflictReason::IntervalAlreadyOpen {
            cashier_id,
            interval: IntervalType::OutOfService,
        }));
    }

    let mut closed = Vec::new();
    for log in open {
        // Only pauses can be open here.
        closed.push(repo::close_interval(conn, log, user, now)?);
    }

    let opened = repo::insert_interval(
        conn,
        cashier_id,
        IntervalType::OutOfService,
        comment,
        user,
        now,
    )?;
    cashier.paused = false;
    cashier.out_of_service = true;
    record_state(&mut cashier, comment, now);
    repo::save_cashier(conn, &cashier)?;

    info!(
        cashier_id,
        user,
        closed_pauses = closed.len(),
        "Cashier out of service"
    );
    Ok(IntervalChange {
        cashier,
        opened: Some(opened),
        closed,
    })
}

/// Close every open interval and clear both flags.
pub(crate) fn resume(
    conn: &Connection,
    cashier_id: i64,
    comment: Option<&str>,
    user: &str,
    now: DateTime<Utc>,
) -> Result<IntervalChange, QueueError> {
    let mut cashier = repo::get_cashier(conn, cashier_id)?;
    let open = repo::open_intervals(conn, cashier_id)?;

    if open.is_empty() && !cashier.paused && !cashier.out_of_service {
        return Err(reject(ConflictReason::NoOpenInterval { cashier_id }));
    }

    let closed = open
        .into_iter()
        .map(|log| repo::close_interval(conn, log, user, now))
        .collect::<Result<Vec<_>, _>>()?;

    cashier.paused = false;
    cashier.out_of_service = false;
    record_state(&mut cashier, comment, now);
    repo::save_cashier(conn, &cashier)?;

    info!(cashier_id, user, closed = closed.len(), "Cashier resumed");
    Ok(IntervalChange {
        cashier,
        opened: None,
        closed,
    })
}
