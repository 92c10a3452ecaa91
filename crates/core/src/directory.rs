//! Services and cashier registration.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cashier::{repo as cashier_repo, Cashier};
use crate::error::{ConflictReason, EntityKind, QueueError};
use crate::store::{encode_ts, ts_column};

static PREFIX_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{1,8}$").unwrap());

pub const MAX_NAME_LEN: usize = 120;

/// A request category with its own label prefix and daily sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub prefix: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCashierRequest {
    pub name: String,
    #[serde(default)]
    pub service_id: Option<i64>,
}

fn validate_name(name: &str) -> Result<(), QueueError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(QueueError::Validation("name cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(QueueError::Validation(format!(
            "name cannot exceed {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

pub fn validate_prefix(prefix: &str) -> Result<(), QueueError> {
    if !PREFIX_PATTERN.is_match(prefix) {
        return Err(QueueError::Validation(format!(
            "prefix must be 1 to 8 uppercase letters or digits, got '{}'",
            prefix
        )));
    }
    Ok(())
}

fn row_to_service(row: &rusqlite::Row) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        prefix: row.get(2)?,
        active: row.get(3)?,
        created_at: ts_column(row, 4)?,
    })
}

pub(crate) fn get_service(conn: &Connection, id: i64) -> Result<Service, QueueError> {
    conn.query_row(
        "SELECT id, name, prefix, active, created_at FROM services WHERE id = ?1",
        [id],
        row_to_service,
    )
    .optional()?
    .ok_or_else(|| QueueError::not_found(EntityKind::Service, id))
}

pub(crate) fn list_services(conn: &Connection) -> Result<Vec<Service>, QueueError> {
    let mut stmt =
        conn.prepare("SELECT id, name, prefix, active, created_at FROM services ORDER BY id")?;
    let services = stmt
        .query_map([], row_to_service)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(services)
}

fn service_with_prefix(conn: &Connection, prefix: &str) -> Result<Option<i64>, QueueError> {
    let id = conn
        .query_row(
            "SELECT id FROM services WHERE prefix = ?1",
            params![prefix],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub(crate) fn create_service(
    conn: &Connection,
    request: &CreateServiceRequest,
    now: DateTime<Utc>,
) -> Result<Service, QueueError> {
    validate_name(&request.name)?;
    validate_prefix(&request.prefix)?;
    if let Some(service_id) = service_with_prefix(conn, &request.prefix)? {
        warn!(prefix = %request.prefix, service_id, "Rejected duplicate service prefix");
        return Err(QueueError::Conflict(ConflictReason::PrefixInUse {
            prefix: request.prefix.clone(),
            service_id,
        }));
    }

    conn.execute(
        "INSERT INTO services (name, prefix, created_at) VALUES (?1, ?2, ?3)",
        params![request.name.trim(), request.prefix, encode_ts(&now)],
    )?;
    let service = get_service(conn, conn.last_insert_rowid())?;
    info!(service_id = service.id, prefix = %service.prefix, "Created service");
    Ok(service)
}

pub(crate) fn set_service_active(
    conn: &Connection,
    id: i64,
    active: bool,
) -> Result<Service, QueueError> {
    let updated = conn.execute(
        "UPDATE services SET active = ?1 WHERE id = ?2",
        params![active, id],
    )?;
    if updated == 0 {
        return Err(QueueError::not_found(EntityKind::Service, id));
    }
    get_service(conn, id)
}

pub(crate) fn create_cashier(
    conn: &Connection,
    request: &CreateCashierRequest,
    now: DateTime<Utc>,
) -> Result<Cashier, QueueError> {
    validate_name(&request.name)?;
    if let Some(service_id) = request.service_id {
        get_service(conn, service_id)?;
    }

    let cashier = cashier_repo::insert_cashier(conn, request.name.trim(), request.service_id, now)?;
    info!(cashier_id = cashier.id, service_id = ?cashier.service_id, "Created cashier");
    Ok(cashier)
}

/// Bind a cashier to a service (or unbind it with `None`).
pub(crate) fn assign_cashier_service(
    conn: &Connection,
    cashier_id: i64,
    service_id: Option<i64>,
) -> Result<Cashier, QueueError> {
    let mut cashier = cashier_repo::get_cashier(conn, cashier_id)?;
    if let Some(service_id) = service_id {
        get_service(conn, service_id)?;
    }
    cashier.service_id = service_id;
    cashier_repo::save_cashier(conn, &cashier)?;
    info!(cashier_id, service_id = ?service_id, "Assigned cashier service");
    Ok(cashier)
}

pub(crate) fn set_cashier_active(
    conn: &Connection,
    cashier_id: i64,
    active: bool,
) -> Result<Cashier, QueueError> {
    let mut cashier = cashier_repo::get_cashier(conn, cashier_id)?;
    cashier.active = active;
    cashier_repo::save_cashier(conn, &cashier)?;
    info!(cashier_id, active, "Set cashier active flag");
    Ok(cashier)
}
