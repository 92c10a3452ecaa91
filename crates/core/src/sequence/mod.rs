//! Daily ticket numbering.
//!
//! One counter row per (service, calendar day), created lazily. The
//! upsert-and-increment is a single statement inside the caller's write
//! transaction, so two concurrent allocations for the same key never return
//! the same value. Allocated numbers are never handed out again.

use std::time::Duration;

use chrono::NaiveDate;
use rand::Rng;
use rusqlite::{params, Connection};

use crate::config::AllocationConfig;
use crate::error::QueueError;
use crate::store::encode_day;

/// Allocate the next sequence number for `service_id` on `day`, starting at 1.
pub fn next_sequence(conn: &Connection, service_id: i64, day: NaiveDate) -> Result<i64, QueueError> {
    let value: i64 = conn.query_row(
        "INSERT INTO daily_sequence_counters (service_id, service_day, next_value) \
         VALUES (?1, ?2, 2) \
         ON CONFLICT (service_id, service_day) DO UPDATE SET next_value = next_value + 1 \
         RETURNING next_value - 1",
        params![service_id, encode_day(day)],
        |row| row.get(0),
    )?;
    Ok(value)
}

/// `PREFIX-NNN`, zero-padded to `width` digits. Wider numbers are kept whole.
pub fn format_label(prefix: &str, sequence: i64, width: usize) -> String {
    format!("{}-{:0width$}", prefix, sequence, width = width)
}

/// Jittered exponential backoff between allocation attempts.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    base: Duration,
    max: Duration,
}

impl RetryBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn from_config(config: &AllocationConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Upper bound for the delay after the given (0-based) failed attempt.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Full jitter: uniform in `[0, ceiling(attempt)]`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }
}
