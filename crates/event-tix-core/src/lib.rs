//! Shared domain types for the ticket allocation core.
#![warn(missing_docs)]

mod error;
mod types;

pub use error::{AllocationError, PromoReason};
pub use types::{
    Discount, Order, OrderStatus, PriorityClass, PromoCode, RequestStatus, Ticket, TicketRequest,
    TicketStatus, TicketType,
};

/// Configuration of the allocation engine
#[derive(Clone, Debug)]
pub struct Config {
    /// Processor tick period in milliseconds
    pub tick_ms: u64,
    /// Maximum number of requests drained per tick
    pub batch_per_tick: u32,
    /// Maximum confirmed orders per user and event
    pub max_orders_per_user: u32,
    /// Path of the append-only transaction log; `None` keeps records in memory
    pub audit_path: Option<std::path::PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_ms: 500,
            batch_per_tick: 1,
            max_orders_per_user: 2,
            audit_path: None,
        }
    }
}
