use event_tix_core::{AllocationError, PriorityClass, RequestStatus};
use eyre::Result;
use uuid::Uuid;

mod util;

#[test]
#[ntest::timeout(20_000)]
fn queue_drains_vip_first_and_positions_track_the_drain() -> Result<()> {
    let engine = util::manual_engine();
    let event = Uuid::new_v4();
    util::seed_class(&engine, event, PriorityClass::Vip, 2, 5000);
    util::seed_class(&engine, event, PriorityClass::Regular, 2, 2000);

    let (v1, p1) = engine.enqueue(Uuid::new_v4(), event, PriorityClass::Vip)?;
    let (r1, p2) = engine.enqueue(Uuid::new_v4(), event, PriorityClass::Regular)?;
    let (v2, p3) = engine.enqueue(Uuid::new_v4(), event, PriorityClass::Vip)?;
    let (r2, p4) = engine.enqueue(Uuid::new_v4(), event, PriorityClass::Regular)?;

    // enqueue positions are ranks within the caller's class
    assert_eq!((p1, p2, p3, p4), (1, 1, 2, 2));

    // polled positions count higher-class requests that are ahead
    assert_eq!(engine.request_status(r2)?.position, Some(4));
    assert_eq!(engine.request_status(v2)?.position, Some(2));

    // drain one: the head VIP wins, everyone behind moves up one
    engine.drain_now();
    assert!(util::wait_until(|| {
        engine.request_status(v1).unwrap().status == RequestStatus::Done
    }));
    assert_eq!(engine.request_status(v2)?.position, Some(1));
    assert_eq!(engine.request_status(r1)?.position, Some(2));
    assert_eq!(engine.request_status(r2)?.position, Some(3));

    for _ in 0..3 {
        engine.drain_now();
    }
    assert!(util::wait_until(|| {
        [v2, r1, r2]
            .iter()
            .all(|id| engine.request_status(*id).unwrap().status == RequestStatus::Done)
    }));

    // the audit log preserves the drain order: VIP, VIP, Regular, Regular
    let confirmed: Vec<Uuid> = engine
        .audit_records()
        .iter()
        .filter(|r| r.outcome == "confirmed")
        .map(|r| r.reference)
        .collect();
    assert_eq!(
        confirmed,
        vec![v1, v2, r1, r2],
        "requests must be fulfilled in priority order, FIFO within a class",
    );

    engine.shutdown();
    Ok(())
}

#[test]
#[ntest::timeout(20_000)]
fn sold_out_requests_fail_terminally() -> Result<()> {
    let engine = util::manual_engine();
    let event = Uuid::new_v4();
    util::seed_class(&engine, event, PriorityClass::Vip, 1, 5000);

    let (winner, _) = engine.enqueue(Uuid::new_v4(), event, PriorityClass::Vip)?;
    let (loser, _) = engine.enqueue(Uuid::new_v4(), event, PriorityClass::Vip)?;

    engine.drain_now();
    engine.drain_now();
    assert!(util::wait_until(|| {
        engine.request_status(loser).unwrap().status == RequestStatus::Failed
    }));

    let won = engine.request_status(winner)?;
    assert_eq!(won.status, RequestStatus::Done);
    assert!(won.result_order_id.is_some());

    let lost = engine.request_status(loser)?;
    assert_eq!(lost.failure_reason.as_deref(), Some("sold_out"));
    assert_eq!(lost.position, None);

    // the failed attempt consumed nothing
    assert_eq!(engine.availability(event)[0].sold_count, 1);

    engine.shutdown();
    Ok(())
}

#[test]
fn enqueue_for_unknown_ticket_type_is_rejected() {
    let engine = util::manual_engine();
    let err = engine
        .enqueue(Uuid::new_v4(), Uuid::new_v4(), PriorityClass::Vip)
        .unwrap_err();
    assert_eq!(err, AllocationError::NotFound("ticket_type"));

    assert_eq!(
        engine.request_status(Uuid::new_v4()).unwrap_err(),
        AllocationError::NotFound("request"),
    );
    engine.shutdown();
}

#[test]
#[ntest::timeout(20_000)]
fn timer_driven_processor_drains_without_nudges() -> Result<()> {
    let engine = util::fast_engine();
    let event = Uuid::new_v4();
    util::seed_class(&engine, event, PriorityClass::Regular, 3, 2000);

    let ids: Vec<Uuid> = (0..3)
        .map(|_| {
            engine
                .enqueue(Uuid::new_v4(), event, PriorityClass::Regular)
                .map(|(id, _)| id)
        })
        .collect::<Result<_, _>>()?;

    assert!(util::wait_until(|| {
        ids.iter()
            .all(|id| engine.request_status(*id).unwrap().status == RequestStatus::Done)
    }));
    assert_eq!(engine.availability(event)[0].sold_count, 3);

    engine.shutdown();
    Ok(())
}
