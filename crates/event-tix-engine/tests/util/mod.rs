use std::time::{Duration, Instant};

use event_tix_core::{Config, PriorityClass, TicketType};
use event_tix_engine::Engine;
use uuid::Uuid;

/// Engine whose processor only ticks when nudged via `drain_now`
#[allow(unused)]
pub fn manual_engine() -> Engine {
    event_tix_engine::launch(Config {
        tick_ms: 3_600_000,
        ..Config::default()
    })
}

/// Engine ticking fast enough for tests to wait on the timer alone
#[allow(unused)]
pub fn fast_engine() -> Engine {
    event_tix_engine::launch(Config {
        tick_ms: 10,
        ..Config::default()
    })
}

/// Register a ticket type and return its id
#[allow(unused)]
pub fn seed_class(
    engine: &Engine,
    event_id: Uuid,
    class: PriorityClass,
    capacity: u32,
    price_cents: u32,
) -> Uuid {
    let id = Uuid::new_v4();
    engine.register_ticket_type(TicketType {
        id,
        event_id,
        class,
        capacity,
        sold_count: 0,
        price_cents,
        sale_start: None,
        sale_end: None,
    });
    id
}

/// Poll `cond` for up to five seconds
#[allow(unused)]
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}
