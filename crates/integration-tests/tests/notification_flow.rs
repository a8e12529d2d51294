//! Join-to-notify flow against a real SQLite database

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{TestDb, SHOP};
use walkin_core::application::{CycleOutcome, CycleReport, DispatchCycle, JoinRequest, ThresholdPolicy};
use walkin_core::domain::{EntryStatus, QueueEntry};
use walkin_core::port::notification_transport::mocks::{MockBehavior, MockTransport};
use walkin_core::port::QueueStore;
use walkin_infra_sms::LogTransport;

async fn join(db: &TestDb, name: &str, phone: &str, provider: Option<&str>) -> QueueEntry {
    let entry = db
        .service()
        .join(JoinRequest {
            shop_id: SHOP.to_string(),
            customer_name: name.to_string(),
            phone_number: phone.to_string(),
            requested_provider: provider.map(str::to_string),
        })
        .await
        .unwrap();
    // Distinct join times keep arrival order independent of ID order
    tokio::time::sleep(Duration::from_millis(5)).await;
    entry
}

async fn run(cycle: &DispatchCycle) -> CycleReport {
    match cycle.run_once().await.unwrap() {
        CycleOutcome::Completed(report) => report,
        CycleOutcome::Skipped => panic!("cycle unexpectedly skipped"),
    }
}

/// Two any-provider customers, 15 minute default, threshold 15:
/// first is due now, second only after the first is served
#[tokio::test]
async fn test_any_provider_queue_advances() {
    let db = TestDb::new().await;
    db.init_shop(15, 15).await;
    let a = join(&db, "Ana", "+15550000001", None).await;
    let b = join(&db, "Ben", "+15550000002", None).await;

    let transport = Arc::new(MockTransport::new_success());
    let cycle = db.cycle(ThresholdPolicy::Wait, transport.clone());

    let report = run(&cycle).await;
    assert_eq!(report.waiting, 2);
    assert_eq!(report.eligible, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(
        transport.sent(),
        vec![(
            "+15550000001".to_string(),
            "Hi Ana, you're ~15 minutes away from your turn at Fade Lab!".to_string()
        )]
    );
    assert!(db.queue.find_by_id(&a.id).await.unwrap().unwrap().notified);

    db.service().serve(&a.id).await.unwrap();
    let report = run(&cycle).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(transport.sends_to("+15550000002"), 1);

    let stored = db.queue.find_by_id(&b.id).await.unwrap().unwrap();
    assert!(stored.notified);
    assert_eq!(stored.status, EntryStatus::Waiting);
}

#[tokio::test]
async fn test_provider_duration_drives_eligibility() {
    let db = TestDb::new().await;
    db.init_shop(15, 15).await;
    let service = db.service();
    let marco = service.add_provider(SHOP, "Marco").await.unwrap();
    service.set_provider_duration(&marco.id, 25).await.unwrap();
    join(&db, "Cy", "+15550000003", Some(&marco.id)).await;

    let transport = Arc::new(MockTransport::new_success());
    let cycle = db.cycle(ThresholdPolicy::Wait, transport.clone());

    let report = run(&cycle).await;
    assert_eq!(report.eligible, 0);
    assert_eq!(transport.call_count(), 0);

    service.set_provider_duration(&marco.id, 10).await.unwrap();
    run(&cycle).await;
    assert_eq!(
        transport.sent()[0].1,
        "Hi Cy, you're ~10 minutes away from your turn at Fade Lab with Marco!"
    );
}

#[tokio::test]
async fn test_position_policy_uses_queue_position() {
    let db = TestDb::new().await;
    db.init_shop(2, 15).await;
    for (name, phone) in [("A", "+15550000011"), ("B", "+15550000012"), ("C", "+15550000013")] {
        join(&db, name, phone, None).await;
    }

    let transport = Arc::new(MockTransport::new_success());
    let report = run(&db.cycle(ThresholdPolicy::Position, transport.clone())).await;

    assert_eq!(report.delivered, 2);
    assert_eq!(transport.sends_to("+15550000013"), 0);
}

#[tokio::test]
async fn test_repeated_cycles_send_once() {
    let db = TestDb::new().await;
    db.init_shop(60, 15).await;
    join(&db, "Ana", "+15550000001", None).await;
    join(&db, "Ben", "+15550000002", None).await;

    let transport = Arc::new(MockTransport::new_success());
    let cycle = db.cycle(ThresholdPolicy::Wait, transport.clone());
    for _ in 0..5 {
        run(&cycle).await;
    }

    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn test_failed_send_retried_next_cycle() {
    let db = TestDb::new().await;
    db.init_shop(15, 15).await;
    let a = join(&db, "Ana", "+15550000001", None).await;

    let transport = Arc::new(MockTransport::new_fail("carrier down"));
    let cycle = db.cycle(ThresholdPolicy::Wait, transport.clone());

    let report = run(&cycle).await;
    assert_eq!(report.transport_failures, 1);
    assert!(!db.queue.find_by_id(&a.id).await.unwrap().unwrap().notified);

    transport.set_behavior(MockBehavior::Success);
    let report = run(&cycle).await;
    assert_eq!(report.delivered, 1);
    assert!(db.queue.find_by_id(&a.id).await.unwrap().unwrap().notified);
}

#[tokio::test]
async fn test_notified_flag_survives_restart() {
    let db = TestDb::new().await;
    db.init_shop(15, 15).await;
    join(&db, "Ana", "+15550000001", None).await;

    let first = Arc::new(LogTransport::new());
    run(&db.cycle(ThresholdPolicy::Wait, first.clone())).await;
    assert_eq!(first.sent_count(), 1);

    let db = db.reopen().await;
    let second = Arc::new(LogTransport::new());
    let report = run(&db.cycle(ThresholdPolicy::Wait, second.clone())).await;

    assert_eq!(report.pending, 0);
    assert_eq!(second.sent_count(), 0);
}

#[tokio::test]
async fn test_removed_customer_not_notified() {
    let db = TestDb::new().await;
    db.init_shop(15, 15).await;
    let a = join(&db, "Ana", "+15550000001", None).await;
    db.service().remove(&a.id).await.unwrap();

    let transport = Arc::new(MockTransport::new_success());
    let report = run(&db.cycle(ThresholdPolicy::Wait, transport.clone())).await;

    assert_eq!(report.waiting, 0);
    assert_eq!(transport.call_count(), 0);
    assert!(db.service().serve(&a.id).await.is_err());
}

#[tokio::test]
async fn test_unconfigured_shop_aborts_cycle() {
    let db = TestDb::new().await;
    let transport = Arc::new(MockTransport::new_success());

    let result = db.cycle(ThresholdPolicy::Wait, transport).run_once().await;

    assert!(result.is_err());
}
