//! At-most-once delivery under concurrent cycles sharing one database file

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{TestDb, SHOP};
use walkin_core::application::{CycleOutcome, GateOutcome, JoinRequest, ThresholdPolicy};
use walkin_core::domain::{EntryStatus, QueueEntry};
use walkin_core::port::notification_transport::mocks::MockTransport;
use walkin_core::port::time_provider::mocks::ManualTimeProvider;
use walkin_core::port::{ClaimOutcome, NotificationClaim, QueueStore};

async fn join(db: &TestDb, name: &str, phone: &str) -> QueueEntry {
    db.service()
        .join(JoinRequest {
            shop_id: SHOP.to_string(),
            customer_name: name.to_string(),
            phone_number: phone.to_string(),
            requested_provider: None,
        })
        .await
        .unwrap()
}

/// Two independently built cycles (as two daemon instances would be) race
/// on the same entry while the transport is slow
#[tokio::test]
async fn test_overlapping_cycles_send_once() {
    let db = TestDb::new().await;
    db.init_shop(15, 15).await;
    let a = join(&db, "Ana", "+15550000001").await;

    let transport = Arc::new(MockTransport::new_success().with_delay(Duration::from_millis(100)));
    let first = db.cycle(ThresholdPolicy::Wait, transport.clone());
    let second = db.cycle(ThresholdPolicy::Wait, transport.clone());

    let (r1, r2) = tokio::join!(first.run_once(), second.run_once());
    let delivered: usize = [r1.unwrap(), r2.unwrap()]
        .into_iter()
        .map(|outcome| match outcome {
            CycleOutcome::Completed(report) => report.delivered,
            CycleOutcome::Skipped => 0,
        })
        .sum();

    assert_eq!(delivered, 1);
    assert_eq!(transport.call_count(), 1);
    assert!(db.queue.find_by_id(&a.id).await.unwrap().unwrap().notified);
}

#[tokio::test]
async fn test_many_gates_one_send() {
    let db = TestDb::new().await;
    db.init_shop(15, 15).await;
    let entry = join(&db, "Ana", "+15550000001").await;
    let transport = Arc::new(MockTransport::new_success().with_delay(Duration::from_millis(20)));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let gate = db.gate(transport.clone());
        let entry = entry.clone();
        handles.push(tokio::spawn(async move {
            gate.dispatch(&entry, "Your turn is close").await
        }));
    }

    let mut delivered = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            GateOutcome::Delivered { .. } => delivered += 1,
            GateOutcome::Skipped => {}
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    assert_eq!(delivered, 1);
    assert_eq!(transport.call_count(), 1);
}

/// A cycle that died mid-send leaves its claim behind; the entry is
/// untouched until the lease lapses, then picked up again
#[tokio::test]
async fn test_stale_claim_expires() {
    let db = TestDb::new().await;
    db.init_shop(15, 15).await;
    let entry = join(&db, "Ana", "+15550000001").await;

    let stale = NotificationClaim {
        token: "crashed-cycle".to_string(),
        now_millis: 1_000,
        expires_at: 61_000,
    };
    assert_eq!(
        db.queue.claim_for_notification(&entry.id, &stale).await.unwrap(),
        ClaimOutcome::Claimed
    );

    let clock = Arc::new(ManualTimeProvider::new(30_000));
    let transport = Arc::new(MockTransport::new_success());
    let gate = db.gate_at(transport.clone(), clock.clone());

    assert_eq!(
        gate.dispatch(&entry, "Your turn is close").await.unwrap(),
        GateOutcome::Skipped
    );
    assert_eq!(transport.call_count(), 0);

    clock.advance(40_000);
    assert!(matches!(
        gate.dispatch(&entry, "Your turn is close").await.unwrap(),
        GateOutcome::Delivered { .. }
    ));
    assert_eq!(transport.call_count(), 1);
}

/// Serving does not wait on an in-flight notification, and the later
/// flag update does not resurrect the entry
#[tokio::test]
async fn test_serve_during_send() {
    let db = TestDb::new().await;
    db.init_shop(15, 15).await;
    let entry = join(&db, "Ana", "+15550000001").await;

    let transport = Arc::new(MockTransport::new_success().with_delay(Duration::from_millis(100)));
    let gate = db.gate(transport.clone());
    let service = db.service();

    let (outcome, served) = tokio::join!(gate.dispatch(&entry, "Your turn is close"), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        service.serve(&entry.id).await
    });

    served.unwrap();
    assert!(matches!(outcome.unwrap(), GateOutcome::Delivered { .. }));
    assert_eq!(transport.call_count(), 1);

    let stored = db.queue.find_by_id(&entry.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EntryStatus::Served);
    assert!(db.queue.fetch_waiting(SHOP).await.unwrap().is_empty());
}
