//! In-memory order records
//!
//! Orders are inserted once and transitioned in place, never deleted. The
//! `qr_token` index is maintained alongside every insert so ticket operations
//! can resolve a token without scanning.

use dashmap::DashMap;
use event_tix_core::{Order, OrderStatus};
use uuid::Uuid;

/// Record store for orders and their embedded tickets
pub struct OrderStore {
    orders: DashMap<Uuid, Order>,
    by_token: DashMap<String, Uuid>,
}

impl OrderStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            by_token: DashMap::new(),
        }
    }

    /// Insert a freshly allocated order and index its qr token
    pub fn insert(&self, order: Order) {
        self.by_token
            .insert(order.ticket.qr_token.clone(), order.id);
        self.orders.insert(order.id, order);
    }

    /// Snapshot of an order
    pub fn get(&self, order_id: Uuid) -> Option<Order> {
        self.orders.get(&order_id).map(|o| o.clone())
    }

    /// Resolve a qr token to its order id
    pub fn order_id_by_token(&self, qr_token: &str) -> Option<Uuid> {
        self.by_token.get(qr_token).map(|id| *id)
    }

    /// Mutable access to one order, for status transitions
    ///
    /// The returned guard locks the order's entry; transition plus any paired
    /// side effect (capacity reclaim) happen under it.
    pub fn get_mut(&self, order_id: Uuid) -> Option<dashmap::mapref::one::RefMut<'_, Uuid, Order>> {
        self.orders.get_mut(&order_id)
    }

    /// Number of confirmed orders a user holds for an event
    pub fn confirmed_count(&self, user_id: Uuid, event_id: Uuid) -> u32 {
        self.orders
            .iter()
            .filter(|o| {
                o.user_id == user_id && o.event_id == event_id && o.status == OrderStatus::Confirmed
            })
            .count() as u32
    }

    /// All orders of a user, newest first
    pub fn orders_for_user(&self, user_id: Uuid) -> Vec<Order> {
        let mut out: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .map(|o| o.clone())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}

impl Default for OrderStore {
    fn default() -> Self {
        Self::new()
    }
}
