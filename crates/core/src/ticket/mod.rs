//! Tickets: numbered service requests and their lifecycle.

pub mod lifecycle;
pub(crate) mod repo;
mod types;

pub use lifecycle::{Transition, TransitionOutcome};
pub use types::{CreateTicketRequest, Ticket, TicketHistoryEntry, TicketStatus, TicketTransfer};
