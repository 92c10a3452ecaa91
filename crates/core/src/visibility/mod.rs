//! Which queued tickets a cashier sees, and in what order.
//!
//! Pure functions over candidate rows. The read that feeds them takes no
//! write lock, so the result is advisory: dispatch re-checks every guard.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::{Ticket, TicketStatus};

pub const DEFAULT_QUEUE_LIMIT: usize = 100;
pub const MAX_QUEUE_LIMIT: usize = 1000;

/// Options for a queue view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueViewOptions {
    /// Hide tickets pinned to other cashiers and show tickets pinned to the
    /// requester from any service. Turn off for supervisory views.
    #[serde(default = "default_true")]
    pub reservation_aware: bool,
    /// Include tickets in attention at the service, ranked before pending ones.
    #[serde(default)]
    pub include_in_attention: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_true() -> bool {
    true
}

fn default_limit() -> usize {
    DEFAULT_QUEUE_LIMIT
}

impl Default for QueueViewOptions {
    fn default() -> Self {
        Self {
            reservation_aware: true,
            include_in_attention: false,
            limit: DEFAULT_QUEUE_LIMIT,
        }
    }
}

impl QueueViewOptions {
    pub fn supervisory() -> Self {
        Self {
            reservation_aware: false,
            ..Default::default()
        }
    }

    pub fn with_in_attention(mut self) -> Self {
        self.include_in_attention = true;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// How a ticket's reservation pin relates to the requesting cashier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Affinity {
    Unpinned = 0,
    PinnedToRequester = 1,
    PinnedToOther = 2,
}

impl Affinity {
    pub fn of(ticket: &Ticket, cashier_id: i64) -> Self {
        match ticket.reserved_for_cashier_id {
            None => Affinity::Unpinned,
            Some(pinned) if pinned == cashier_id => Affinity::PinnedToRequester,
            Some(_) => Affinity::PinnedToOther,
        }
    }
}

fn status_rank(status: TicketStatus) -> u8 {
    match status {
        TicketStatus::InAttention => 0,
        _ => 1,
    }
}

/// Whether `ticket` belongs in the view of cashier `cashier_id` bound to `service_id`.
pub fn is_visible(
    ticket: &Ticket,
    cashier_id: i64,
    service_id: Option<i64>,
    options: &QueueViewOptions,
) -> bool {
    let status_ok = match ticket.status {
        TicketStatus::Pending => true,
        TicketStatus::InAttention => options.include_in_attention,
        _ => false,
    };
    if !status_ok {
        return false;
    }

    let same_service = service_id == Some(ticket.service_id);
    if !options.reservation_aware {
        return same_service;
    }

    match Affinity::of(ticket, cashier_id) {
        Affinity::Unpinned => same_service,
        Affinity::PinnedToRequester => true,
        Affinity::PinnedToOther => false,
    }
}

/// Sort key: affinity, status rank, service day, sequence, created, updated, id.
///
/// Sequence numbers restart every day, so the day goes first to keep
/// unswept tickets from earlier days ahead of today's.
pub fn order_key(
    ticket: &Ticket,
    cashier_id: i64,
) -> (Affinity, u8, NaiveDate, i64, DateTime<Utc>, DateTime<Utc>, i64) {
    (
        Affinity::of(ticket, cashier_id),
        status_rank(ticket.status),
        ticket.service_day,
        ticket.sequence_number,
        ticket.created_at,
        ticket.updated_at,
        ticket.id,
    )
}

pub fn compare(a: &Ticket, b: &Ticket, cashier_id: i64) -> Ordering {
    order_key(a, cashier_id).cmp(&order_key(b, cashier_id))
}

/// Filter, order and truncate candidates into the cashier's view.
pub fn visible_queue(
    candidates: Vec<Ticket>,
    cashier_id: i64,
    service_id: Option<i64>,
    options: &QueueViewOptions,
) -> Vec<Ticket> {
    let mut visible: Vec<Ticket> = candidates
        .into_iter()
        .filter(|ticket| is_visible(ticket, cashier_id, service_id, options))
        .collect();
    visible.sort_by(|a, b| compare(a, b, cashier_id));
    visible.truncate(options.limit);
    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const ME: i64 = 7;
    const OTHER: i64 = 8;
    const SERVICE: i64 = 1;

    fn ticket(id: i64, sequence: i64, service_id: i64, pin: Option<i64>) -> Ticket {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(sequence);
        Ticket {
            id,
            service_id,
            client_id: format!("client-{}", id),
            service_day: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            sequence_number: sequence,
            display_label: format!("ATC-{:03}", sequence),
            status: TicketStatus::Pending,
            assigned_cashier_id: None,
            reserved_for_cashier_id: pin,
            dispatching_user_id: None,
            observations: None,
            created_at: created,
            updated_at: created,
            attended_at: None,
            finished_at: None,
        }
    }

    fn ids(tickets: &[Ticket]) -> Vec<i64> {
        tickets.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_reservation_aware_hides_tickets_pinned_to_others() {
        let candidates = vec![
            ticket(1, 1, SERVICE, None),
            ticket(2, 2, SERVICE, Some(OTHER)),
            ticket(3, 3, SERVICE, Some(ME)),
        ];
        let view = visible_queue(candidates, ME, Some(SERVICE), &QueueViewOptions::default());
        assert_eq!(ids(&view), vec![1, 3]);
    }

    #[test]
    fn test_pinned_ticket_visible_across_services() {
        let candidates = vec![ticket(1, 1, 2, Some(ME)), ticket(2, 2, 2, None)];
        let view = visible_queue(candidates, ME, Some(SERVICE), &QueueViewOptions::default());
        assert_eq!(ids(&view), vec![1]);
    }

    #[test]
    fn test_pinned_tickets_never_overtake_unpinned_arrivals() {
        let candidates = vec![
            ticket(10, 1, SERVICE, Some(ME)),
            ticket(11, 2, SERVICE, None),
            ticket(12, 3, SERVICE, None),
        ];
        let view = visible_queue(candidates, ME, Some(SERVICE), &QueueViewOptions::default());
        assert_eq!(ids(&view), vec![11, 12, 10]);
    }

    #[test]
    fn test_earlier_day_stays_ahead_of_today() {
        let mut yesterday = ticket(1, 5, SERVICE, None);
        yesterday.service_day = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        yesterday.created_at -= Duration::days(1);
        yesterday.updated_at = yesterday.created_at;
        let candidates = vec![ticket(2, 1, SERVICE, None), yesterday];

        let view = visible_queue(candidates, ME, Some(SERVICE), &QueueViewOptions::default());
        assert_eq!(ids(&view), vec![1, 2]);
    }

    #[test]
    fn test_supervisory_view_shows_everything_in_service() {
        let candidates = vec![
            ticket(1, 1, SERVICE, Some(OTHER)),
            ticket(2, 2, SERVICE, None),
            ticket(3, 3, 2, Some(ME)),
        ];
        let view = visible_queue(candidates, ME, Some(SERVICE), &QueueViewOptions::supervisory());
        assert_eq!(ids(&view), vec![2, 1]);
    }

    #[test]
    fn test_combined_view_ranks_in_attention_first() {
        let mut attending = ticket(1, 1, SERVICE, None);
        attending.status = TicketStatus::InAttention;
        let candidates = vec![ticket(2, 2, SERVICE, None), attending.clone()];

        let default_view =
            visible_queue(candidates.clone(), ME, Some(SERVICE), &QueueViewOptions::default());
        assert_eq!(ids(&default_view), vec![2]);

        let combined = visible_queue(
            candidates,
            ME,
            Some(SERVICE),
            &QueueViewOptions::default().with_in_attention(),
        );
        assert_eq!(ids(&combined), vec![1, 2]);
    }

    #[test]
    fn test_cashier_without_service_sees_only_its_pins() {
        let candidates = vec![ticket(1, 1, SERVICE, None), ticket(2, 2, SERVICE, Some(ME))];
        let view = visible_queue(candidates, ME, None, &QueueViewOptions::default());
        assert_eq!(ids(&view), vec![2]);
    }

    #[test]
    fn test_terminal_tickets_never_visible() {
        let mut done = ticket(1, 1, SERVICE, None);
        done.status = TicketStatus::Completed;
        let options = QueueViewOptions::supervisory().with_in_attention();
        assert!(!is_visible(&done, ME, Some(SERVICE), &options));
    }

    #[test]
    fn test_ties_broken_by_created_then_id() {
        let mut a = ticket(5, 1, SERVICE, None);
        let mut b = ticket(4, 1, SERVICE, None);
        b.created_at = a.created_at;
        b.updated_at = a.updated_at;
        assert_eq!(compare(&b, &a, ME), Ordering::Less);

        a.created_at -= Duration::seconds(1);
        assert_eq!(compare(&a, &b, ME), Ordering::Less);
    }

    #[test]
    fn test_limit_truncates() {
        let candidates = (1..=5).map(|i| ticket(i, i, SERVICE, None)).collect();
        let view = visible_queue(
            candidates,
            ME,
            Some(SERVICE),
            &QueueViewOptions::default().with_limit(2),
        );
        assert_eq!(ids(&view), vec![1, 2]);
    }
}
