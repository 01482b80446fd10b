use event_tix_core::{AllocationError, OrderStatus, PriorityClass, RequestStatus, TicketStatus};
use eyre::Result;
use uuid::Uuid;

mod util;

#[test]
#[ntest::timeout(20_000)]
fn check_in_is_exactly_once() -> Result<()> {
    let engine = util::manual_engine();
    let event = Uuid::new_v4();
    util::seed_class(&engine, event, PriorityClass::Vip, 1, 5000);

    let order = engine.checkout(Uuid::new_v4(), event, PriorityClass::Vip, None)?;
    let token = order.ticket.qr_token.clone();

    let verification = engine.verify(&token);
    assert!(verification.valid);
    assert_eq!(verification.status, Some(TicketStatus::Issued));
    assert_eq!(verification.order_id, Some(order.id));

    let first = engine.check_in(&token)?;
    assert!(first.ok);
    assert_eq!(first.previous_status, TicketStatus::Issued);
    assert_eq!(first.new_status, TicketStatus::CheckedIn);

    // the second scan is an idempotent rejection, not an error
    let second = engine.check_in(&token)?;
    assert!(!second.ok);
    assert_eq!(second.previous_status, TicketStatus::CheckedIn);

    // a checked-in ticket can no longer be cancelled
    assert_eq!(
        engine.cancel(order.id, order.user_id).unwrap_err(),
        AllocationError::InvalidTransition {
            status: TicketStatus::CheckedIn
        },
    );

    engine.shutdown();
    Ok(())
}

#[test]
#[ntest::timeout(20_000)]
fn cancel_voids_the_ticket_and_reclaims_capacity() -> Result<()> {
    let engine = util::manual_engine();
    let event = Uuid::new_v4();
    util::seed_class(&engine, event, PriorityClass::Vip, 1, 5000);

    let user = Uuid::new_v4();
    let order = engine.checkout(user, event, PriorityClass::Vip, None)?;
    assert_eq!(engine.availability(event)[0].remaining(), 0);

    engine.cancel(order.id, user)?;

    let cancelled = engine.order(order.id).expect("orders are never deleted");
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.ticket.status, TicketStatus::Void);
    assert_eq!(engine.availability(event)[0].remaining(), 1);

    // a void ticket neither verifies nor checks in
    assert!(!engine.verify(&order.ticket.qr_token).valid);
    assert_eq!(
        engine.check_in(&order.ticket.qr_token).unwrap_err(),
        AllocationError::InvalidTransition {
            status: TicketStatus::Void
        },
    );

    // cancelling twice is an invalid transition
    assert_eq!(
        engine.cancel(order.id, user).unwrap_err(),
        AllocationError::InvalidTransition {
            status: TicketStatus::Void
        },
    );

    engine.shutdown();
    Ok(())
}

#[test]
#[ntest::timeout(20_000)]
fn cancelled_unit_goes_to_the_waiting_queue() -> Result<()> {
    let engine = util::manual_engine();
    let event = Uuid::new_v4();
    util::seed_class(&engine, event, PriorityClass::Vip, 1, 5000);

    let holder = Uuid::new_v4();
    let order = engine.checkout(holder, event, PriorityClass::Vip, None)?;

    // someone queues for the sold-out class
    let (request, _) = engine.enqueue(Uuid::new_v4(), event, PriorityClass::Vip)?;

    // the cancellation reclaims the unit and nudges the processor
    engine.cancel(order.id, holder)?;
    assert!(util::wait_until(|| {
        engine.request_status(request).unwrap().status == RequestStatus::Done
    }));

    assert_eq!(engine.availability(event)[0].sold_count, 1);
    let record = engine.request_status(request)?;
    let new_order = engine.order(record.result_order_id.unwrap()).unwrap();
    assert_eq!(new_order.status, OrderStatus::Confirmed);

    engine.shutdown();
    Ok(())
}

#[test]
fn unknown_tokens_and_foreign_orders() {
    let engine = util::manual_engine();
    let event = Uuid::new_v4();
    util::seed_class(&engine, event, PriorityClass::Vip, 1, 5000);

    assert!(!engine.verify("no-such-token").valid);
    assert_eq!(
        engine.check_in("no-such-token").unwrap_err(),
        AllocationError::NotFound("ticket"),
    );
    assert_eq!(
        engine.cancel(Uuid::new_v4(), Uuid::new_v4()).unwrap_err(),
        AllocationError::NotFound("order"),
    );

    // another user's order looks like a missing one
    let owner = Uuid::new_v4();
    let order = engine.checkout(owner, event, PriorityClass::Vip, None).unwrap();
    assert_eq!(
        engine.cancel(order.id, Uuid::new_v4()).unwrap_err(),
        AllocationError::NotFound("order"),
    );

    engine.shutdown();
}

#[test]
#[ntest::timeout(20_000)]
fn audit_log_sees_every_terminal_outcome() -> Result<()> {
    let engine = util::manual_engine();
    let event = Uuid::new_v4();
    util::seed_class(&engine, event, PriorityClass::Vip, 1, 5000);

    let user = Uuid::new_v4();
    let order = engine.checkout(user, event, PriorityClass::Vip, None)?;
    let _ = engine.checkout(Uuid::new_v4(), event, PriorityClass::Vip, None);
    engine.cancel(order.id, user)?;

    let outcomes: Vec<(&str, String)> = engine
        .audit_records()
        .iter()
        .map(|r| (r.outcome, r.reason.clone()))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("confirmed", String::new()),
            ("failed", "sold_out".into()),
            ("cancelled", "user_cancelled".into()),
        ],
    );

    engine.shutdown();
    Ok(())
}
