//! Test doubles and fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use queuedesk_core::testing::QueueFixture;
//!
//! let fixture = QueueFixture::in_memory();
//! let service = fixture.service("Atención", "ATC");
//! let cashier = fixture.cashier("Window 7", Some(service.id));
//! let ticket = fixture.orchestrator.create_ticket(CreateTicketRequest::new(service.id, "c1")).await?;
//! assert_eq!(fixture.publisher.events_named("ticket.created").len(), 1);
//! ```

mod clock;
mod publisher;

pub use clock::ManualClock;
pub use publisher::{RecordedEvent, RecordingPublisher};

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cashier::Cashier;
use crate::clock::Clock;
use crate::config::{DatabaseConfig, QueueConfig};
use crate::directory::{self, CreateCashierRequest, CreateServiceRequest, Service};
use crate::orchestrator::QueueOrchestrator;
use crate::store::SqliteQueueStore;
use crate::ticket::lifecycle::{self, CreateAttempt};
use crate::ticket::{CreateTicketRequest, Ticket};

/// Store, clock, publisher and orchestrator wired together.
pub struct QueueFixture {
    pub store: Arc<SqliteQueueStore>,
    pub clock: Arc<ManualClock>,
    pub publisher: Arc<RecordingPublisher>,
    pub orchestrator: QueueOrchestrator,
}

impl QueueFixture {
    /// Fixture over an in-memory database with default queue settings.
    pub fn in_memory() -> Self {
        Self::with_store(
            SqliteQueueStore::in_memory().expect("in-memory store"),
            QueueConfig::default(),
        )
    }

    /// Fixture over a database file. Several fixtures may share one file.
    pub fn on_file(path: &Path) -> Self {
        let store = SqliteQueueStore::new(path, &DatabaseConfig::default()).expect("file store");
        Self::with_store(store, QueueConfig::default())
    }

    pub fn with_store(store: SqliteQueueStore, config: QueueConfig) -> Self {
        let store = Arc::new(store);
        let clock = Arc::new(ManualClock::default());
        let publisher = Arc::new(RecordingPublisher::new());
        let orchestrator =
            QueueOrchestrator::new(store.clone(), publisher.clone(), clock.clone(), config);
        Self {
            store,
            clock,
            publisher,
            orchestrator,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn service(&self, name: &str, prefix: &str) -> Service {
        let request = CreateServiceRequest {
            name: name.to_string(),
            prefix: prefix.to_string(),
        };
        let now = self.now();
        self.store
            .write(|tx| directory::create_service(tx, &request, now))
            .expect("create service")
    }

    pub fn cashier(&self, name: &str, service_id: Option<i64>) -> Cashier {
        let request = CreateCashierRequest {
            name: name.to_string(),
            service_id,
        };
        let now = self.now();
        self.store
            .write(|tx| directory::create_cashier(tx, &request, now))
            .expect("create cashier")
    }

    /// Insert a pending ticket without going through the retry loop.
    pub fn pending_ticket(&self, service_id: i64) -> Ticket {
        self.create(CreateTicketRequest::new(service_id, "fixture-client"))
    }

    pub fn pinned_ticket(&self, service_id: i64, cashier_id: i64) -> Ticket {
        self.create(CreateTicketRequest::new(service_id, "fixture-client").with_reservation(cashier_id))
    }

    fn create(&self, request: CreateTicketRequest) -> Ticket {
        let now = self.now();
        let day = self.orchestrator.service_day_of(now);
        let width = self.orchestrator.config().label_width;
        match self
            .store
            .write(|tx| lifecycle::create(tx, &request, day, width, now))
            .expect("create ticket")
        {
            CreateAttempt::Created(ticket) => ticket,
            CreateAttempt::LabelTaken { label } => panic!("label {} already taken", label),
        }
    }
}
