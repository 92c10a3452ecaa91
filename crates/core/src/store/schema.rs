use rusqlite::Connection;

use crate::error::QueueError;

/// Create every table and index if they do not exist yet.
pub(crate) fn initialize_schema(conn: &Connection) -> Result<(), QueueError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS services (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            prefix TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        -- Labels are unique per day across services, so prefixes must be too.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_services_prefix ON services (prefix);

        CREATE TABLE IF NOT EXISTS cashiers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            service_id INTEGER REFERENCES services(id),
            active INTEGER NOT NULL DEFAULT 1,
            paused INTEGER NOT NULL DEFAULT 0,
            out_of_service INTEGER NOT NULL DEFAULT 0,
            last_state_comment TEXT,
            last_state_at TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS daily_sequence_counters (
            service_id INTEGER NOT NULL REFERENCES services(id),
            service_day TEXT NOT NULL,
            next_value INTEGER NOT NULL,
            PRIMARY KEY (service_id, service_day)
        );

        CREATE TABLE IF NOT EXISTS tickets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            service_id INTEGER NOT NULL REFERENCES services(id),
            client_id TEXT NOT NULL,
            service_day TEXT NOT NULL,
            sequence_number INTEGER NOT NULL,
            display_label TEXT NOT NULL,
            status TEXT NOT NULL,
            assigned_cashier_id INTEGER REFERENCES cashiers(id),
            reserved_for_cashier_id INTEGER REFERENCES cashiers(id),
            dispatching_user_id TEXT,
            observations TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            attended_at TEXT,
            finished_at TEXT,
            UNIQUE (service_id, service_day, sequence_number),
            UNIQUE (service_day, display_label)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_one_in_attention_per_cashier
            ON tickets(assigned_cashier_id) WHERE status = 'in_attention';
        CREATE INDEX IF NOT EXISTS idx_tickets_service_status
            ON tickets(service_id, status);
        CREATE INDEX IF NOT EXISTS idx_tickets_reserved_for
            ON tickets(reserved_for_cashier_id) WHERE reserved_for_cashier_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_tickets_day_status
            ON tickets(service_day, status);

        CREATE TABLE IF NOT EXISTS attendance_spans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_id INTEGER NOT NULL REFERENCES tickets(id),
            cashier_id INTEGER NOT NULL REFERENCES cashiers(id),
            service_id INTEGER NOT NULL REFERENCES services(id),
            started_at TEXT NOT NULL,
            ended_at TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_spans_one_open_per_ticket
            ON attendance_spans(ticket_id) WHERE ended_at IS NULL;
        CREATE INDEX IF NOT EXISTS idx_spans_ticket ON attendance_spans(ticket_id);

        CREATE TABLE IF NOT EXISTS cashier_status_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cashier_id INTEGER NOT NULL REFERENCES cashiers(id),
            interval_type TEXT NOT NULL,
            comment TEXT,
            started_at TEXT NOT NULL,
            ended_at TEXT,
            performed_by TEXT NOT NULL,
            closed_by TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_status_logs_one_open_per_type
            ON cashier_status_logs(cashier_id, interval_type) WHERE ended_at IS NULL;
        CREATE INDEX IF NOT EXISTS idx_status_logs_cashier
            ON cashier_status_logs(cashier_id, started_at DESC);

        CREATE TABLE IF NOT EXISTS ticket_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_id INTEGER NOT NULL REFERENCES tickets(id),
            from_status TEXT,
            to_status TEXT NOT NULL,
            changed_by TEXT NOT NULL,
            cashier_id INTEGER,
            comment TEXT,
            changed_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_ticket_history_ticket ON ticket_history(ticket_id);

        CREATE TABLE IF NOT EXISTS ticket_transfers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_id INTEGER NOT NULL REFERENCES tickets(id),
            from_cashier_id INTEGER NOT NULL,
            to_cashier_id INTEGER NOT NULL,
            from_service_id INTEGER NOT NULL,
            to_service_id INTEGER NOT NULL,
            performed_by TEXT NOT NULL,
            comment TEXT,
            transferred_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_ticket_transfers_ticket ON ticket_transfers(ticket_id);
        "#,
    )?;

    Ok(())
}
