//! Several orchestrators racing on one database file.
//!
//! Each fixture opens its own connection, the way separate server processes
//! would, so the guards are exercised against real SQLite locking.

use std::collections::BTreeSet;
use std::sync::Arc;

use tempfile::tempdir;

use queuedesk_core::testing::QueueFixture;
use queuedesk_core::{ConflictReason, CreateTicketRequest, TicketStatus, TransitionRequest};

const WORKERS: usize = 8;

fn fixtures(path: &std::path::Path) -> Vec<Arc<QueueFixture>> {
    (0..WORKERS)
        .map(|_| Arc::new(QueueFixture::on_file(path)))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creation_yields_dense_sequence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let setup = QueueFixture::on_file(&path);
    let service_id = setup.service("Atención", "ATC").id;

    let mut handles = Vec::new();
    for (i, fixture) in fixtures(&path).into_iter().enumerate() {
        handles.push(tokio::spawn(async move {
            fixture
                .orchestrator
                .create_ticket(CreateTicketRequest::new(service_id, format!("client-{}", i)))
                .await
        }));
    }

    let mut sequences = BTreeSet::new();
    let mut labels = BTreeSet::new();
    for handle in handles {
        let ticket = handle.await.unwrap().unwrap();
        sequences.insert(ticket.sequence_number);
        labels.insert(ticket.display_label);
    }

    let expected: BTreeSet<i64> = (1..=WORKERS as i64).collect();
    assert_eq!(sequences, expected);
    assert_eq!(labels.len(), WORKERS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cashier_takes_one_ticket_under_contention() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let setup = QueueFixture::on_file(&path);
    let atc = setup.service("Atención", "ATC");
    let window = setup.cashier("Window 7", Some(atc.id));
    let tickets: Vec<_> = (0..WORKERS).map(|_| setup.pending_ticket(atc.id)).collect();

    let mut handles = Vec::new();
    for (fixture, ticket) in fixtures(&path).into_iter().zip(&tickets) {
        let request = TransitionRequest::new(ticket.id, TicketStatus::InAttention, "operator")
            .with_cashier(window.id);
        handles.push(tokio::spawn(async move {
            fixture.orchestrator.transition(request).await
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(ticket) => winners.push(ticket.id),
            Err(err) => assert!(
                matches!(
                    err.conflict(),
                    Some(ConflictReason::CashierAlreadyBusy { cashier_id, .. }) if *cashier_id == window.id
                ),
                "unexpected error: {}",
                err
            ),
        }
    }
    assert_eq!(winners.len(), 1);

    let in_attention: Vec<_> = tickets
        .iter()
        .map(|t| setup.orchestrator.get_ticket(t.id).unwrap())
        .filter(|t| t.status == TicketStatus::InAttention)
        .collect();
    assert_eq!(in_attention.len(), 1);
    assert_eq!(in_attention[0].id, winners[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ticket_taken_by_one_cashier_under_contention() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let setup = QueueFixture::on_file(&path);
    let atc = setup.service("Atención", "ATC");
    let windows: Vec<_> = (0..WORKERS)
        .map(|i| setup.cashier(&format!("Window {}", i), Some(atc.id)))
        .collect();
    let ticket = setup.pending_ticket(atc.id);

    let mut handles = Vec::new();
    for (fixture, window) in fixtures(&path).into_iter().zip(&windows) {
        let request = TransitionRequest::new(ticket.id, TicketStatus::InAttention, "operator")
            .with_cashier(window.id);
        handles.push(tokio::spawn(async move {
            fixture.orchestrator.transition(request).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => assert_eq!(err.reason_code(), "ticket_already_in_attention_elsewhere"),
        }
    }
    assert_eq!(successes, 1);

    let spans = setup.orchestrator.attendance_spans(ticket.id).unwrap();
    assert_eq!(spans.len(), 1);
    assert!(spans[0].is_open());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pause_opens_one_interval() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let setup = QueueFixture::on_file(&path);
    let cashier_id = setup.cashier("Window 7", None).id;

    let mut handles = Vec::new();
    for fixture in fixtures(&path) {
        handles.push(tokio::spawn(async move {
            fixture
                .orchestrator
                .pause_cashier(cashier_id, Some("break"), "supervisor")
                .await
        }));
    }

    let mut opened = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => opened += 1,
            Err(err) => assert_eq!(err.reason_code(), "interval_already_open"),
        }
    }
    assert_eq!(opened, 1);

    let history = setup.orchestrator.get_status_history(cashier_id, 100).unwrap();
    assert_eq!(history.iter().filter(|log| log.is_open()).count(), 1);
}
