//! Ticket queue orchestration core.
//!
//! Issues daily-numbered tickets per service, decides what each cashier
//! sees, and drives tickets through their lifecycle on a shared SQLite
//! store where every state change is one immediate transaction.

pub mod attendance;
pub mod cashier;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod metrics;
pub mod orchestrator;
pub mod sequence;
pub mod store;
pub mod testing;
pub mod ticket;
pub mod visibility;

pub use attendance::AttendanceSpan;
pub use cashier::{Cashier, CashierStatusLog, IntervalChange, IntervalType, OperationalState};
pub use clock::{Clock, SystemClock};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use directory::{CreateCashierRequest, CreateServiceRequest, Service};
pub use error::{ConflictReason, EntityKind, NotOperationalReason, QueueError};
pub use events::{BroadcastPublisher, EventPublisher, NoopPublisher, QueueEvent};
pub use orchestrator::{QueueOrchestrator, TransferResult, TransitionRequest};
pub use store::SqliteQueueStore;
pub use ticket::{
    CreateTicketRequest, Ticket, TicketHistoryEntry, TicketStatus, TicketTransfer, Transition,
};
pub use visibility::QueueViewOptions;
