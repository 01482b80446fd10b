//! Implementation of the capacity ledger
//!
//! The ledger is the exclusive owner of every ticket type's
//! `capacity`/`sold_count` pair. All reads and writes go through one mutex, so
//! "check `sold_count < capacity`, then increment" is indivisible from any
//! other such sequence, across the processor thread and concurrent checkout
//! callers alike.

use std::collections::HashMap;

use event_tix_core::{PriorityClass, TicketType};
use parking_lot::Mutex;
use uuid::Uuid;

/// Outcome of a reservation attempt
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Reservation {
    /// One unit of capacity was consumed
    Reserved,
    /// Capacity is exhausted; nothing changed
    SoldOut,
}

/// Exclusive owner of per-ticket-type capacity accounting
pub struct CapacityLedger {
    types: Mutex<HashMap<Uuid, TicketType>>,
}

impl CapacityLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self {
            types: Mutex::new(HashMap::new()),
        }
    }

    /// Register a ticket type with the ledger
    ///
    /// Seeding hook for the catalog collaborator; the ledger takes over the
    /// counters from here on.
    pub fn register(&self, ticket_type: TicketType) {
        self.types.lock().insert(ticket_type.id, ticket_type);
    }

    /// Atomically reserve one unit of capacity
    ///
    /// Checks `sold_count < capacity` and increments in the same critical
    /// section. Returns [`Reservation::SoldOut`] without side effects when no
    /// unit is left, or when the id is unknown.
    pub fn try_reserve(&self, ticket_type_id: Uuid) -> Reservation {
        let mut types = self.types.lock();
        match types.get_mut(&ticket_type_id) {
            Some(tt) if tt.sold_count < tt.capacity => {
                tt.sold_count += 1;
                Reservation::Reserved
            }
            _ => Reservation::SoldOut,
        }
    }

    /// Atomically return one unit of capacity
    ///
    /// Clamped at zero, so a release without a matching reserve can never
    /// drive `sold_count` negative.
    pub fn release(&self, ticket_type_id: Uuid) {
        let mut types = self.types.lock();
        if let Some(tt) = types.get_mut(&ticket_type_id) {
            tt.sold_count = tt.sold_count.saturating_sub(1);
        }
    }

    /// Snapshot of one ticket type by id
    pub fn get(&self, ticket_type_id: Uuid) -> Option<TicketType> {
        self.types.lock().get(&ticket_type_id).cloned()
    }

    /// Snapshot of one ticket type by event and class
    pub fn lookup(&self, event_id: Uuid, class: PriorityClass) -> Option<TicketType> {
        self.types
            .lock()
            .values()
            .find(|tt| tt.event_id == event_id && tt.class == class)
            .cloned()
    }

    /// Snapshot of every ticket type of an event, VIP first
    pub fn availability(&self, event_id: Uuid) -> Vec<TicketType> {
        let mut out: Vec<TicketType> = self
            .types
            .lock()
            .values()
            .filter(|tt| tt.event_id == event_id)
            .cloned()
            .collect();
        out.sort_by_key(|tt| tt.class);
        out
    }
}

impl Default for CapacityLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with_capacity(capacity: u32) -> (CapacityLedger, Uuid) {
        let ledger = CapacityLedger::new();
        let id = Uuid::new_v4();
        ledger.register(TicketType {
            id,
            event_id: Uuid::new_v4(),
            class: PriorityClass::Vip,
            capacity,
            sold_count: 0,
            price_cents: 5000,
            sale_start: None,
            sale_end: None,
        });
        (ledger, id)
    }

    #[test]
    fn reserve_stops_at_capacity() {
        let (ledger, id) = ledger_with_capacity(2);
        assert_eq!(ledger.try_reserve(id), Reservation::Reserved);
        assert_eq!(ledger.try_reserve(id), Reservation::Reserved);
        assert_eq!(ledger.try_reserve(id), Reservation::SoldOut);
        assert_eq!(ledger.get(id).unwrap().sold_count, 2);
    }

    #[test]
    fn release_restores_and_clamps_at_zero() {
        let (ledger, id) = ledger_with_capacity(1);
        assert_eq!(ledger.try_reserve(id), Reservation::Reserved);
        ledger.release(id);
        assert_eq!(ledger.get(id).unwrap().sold_count, 0);
        // unmatched release must not go negative
        ledger.release(id);
        assert_eq!(ledger.get(id).unwrap().sold_count, 0);
        assert_eq!(ledger.try_reserve(id), Reservation::Reserved);
    }

    #[test]
    fn reserve_unknown_type_is_sold_out() {
        let (ledger, _) = ledger_with_capacity(1);
        assert_eq!(ledger.try_reserve(Uuid::new_v4()), Reservation::SoldOut);
    }

    #[test]
    fn concurrent_reserves_never_exceed_capacity() {
        let (ledger, id) = ledger_with_capacity(100);
        let won = std::sync::atomic::AtomicU32::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        if ledger.try_reserve(id) == Reservation::Reserved {
                            won.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                    }
                });
            }
        });
        assert_eq!(won.load(std::sync::atomic::Ordering::Relaxed), 100);
        assert_eq!(ledger.get(id).unwrap().sold_count, 100);
    }
}
