//! The ticket allocation core
//!
//! A finite number of tickets, split into priority classes, sold under
//! concurrent demand without ever overselling. Requests arrive either through
//! the priority queue (drained by a background processor at a fixed cadence)
//! or synchronously through checkout; both paths converge on the capacity
//! ledger for the atomic capacity decision, then on the promo engine for
//! pricing, then on the ticket lifecycle to mint a ticket, and finally emit a
//! record to the audit sink.

#![warn(missing_docs)]

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Sender};
use event_tix_core::{
    AllocationError, Config, Order, PriorityClass, PromoCode, RequestStatus, TicketType,
};
use uuid::Uuid;

mod allocator;
mod audit;
mod ledger;
mod lifecycle;
mod processor;
mod promo;
mod queue;
mod store;

pub use allocator::PriceQuote;
pub use audit::{AuditRecord, AuditSink, CsvAuditSink, MemoryAuditSink};
pub use ledger::{CapacityLedger, Reservation};
pub use lifecycle::{CheckIn, TicketLifecycle, Verification};
pub use promo::PromoEngine;
pub use queue::RequestQueue;
pub use store::OrderStore;

use allocator::Allocator;
use processor::{Processor, ProcessorMsg};

/// Polled view of a queued or terminal ticket request
#[derive(Clone, Debug)]
pub struct RequestStatusView {
    /// Current status
    pub status: RequestStatus,
    /// Drain rank while still queued
    pub position: Option<usize>,
    /// Confirmed order once done
    pub result_order_id: Option<Uuid>,
    /// Failure code once failed
    pub failure_reason: Option<String>,
}

/// The assembled allocation engine
///
/// Owns the background processor thread; [`Engine::shutdown`] stops and joins
/// it. Queued requests are held in memory only — a restart loses anything not
/// yet drained, while orders, tickets and capacity counters stay consistent.
pub struct Engine {
    allocator: Arc<Allocator>,
    lifecycle: TicketLifecycle,
    memory_audit: Option<Arc<MemoryAuditSink>>,
    processor_control: Sender<ProcessorMsg>,
    processor_thread: JoinHandle<()>,
}

/// Construct the engine and start the background processor
pub fn launch(config: Config) -> Engine {
    let ledger = Arc::new(CapacityLedger::new());
    let queue = Arc::new(RequestQueue::new());
    let promos = Arc::new(PromoEngine::new());
    let orders = Arc::new(OrderStore::new());

    let mut memory_audit = None;
    let audit: Arc<dyn AuditSink> = match &config.audit_path {
        Some(path) => Arc::new(CsvAuditSink::new(path.clone())),
        None => {
            let sink = Arc::new(MemoryAuditSink::new());
            memory_audit = Some(sink.clone());
            sink
        }
    };

    let allocator = Arc::new(Allocator {
        config,
        ledger: ledger.clone(),
        queue,
        promos,
        orders: orders.clone(),
        audit,
    });
    let lifecycle = TicketLifecycle::new(orders, ledger);

    let (control_tx, control_rx) = unbounded();
    let processor = Processor::new(allocator.clone(), control_rx);
    let processor_thread = thread::spawn(move || processor.run());

    Engine {
        allocator,
        lifecycle,
        memory_audit,
        processor_control: control_tx,
        processor_thread,
    }
}

impl Engine {
    // -- catalog seeding ----------------------------------------------------

    /// Register a ticket type; its counters are owned by the ledger from here
    pub fn register_ticket_type(&self, ticket_type: TicketType) {
        self.allocator.ledger.register(ticket_type);
    }

    /// Register a promo code
    pub fn register_promo(&self, promo: PromoCode) {
        self.allocator.promos.register(promo);
    }

    // -- queue path ---------------------------------------------------------

    /// Enqueue a ticket request; returns `(request_id, position)`
    ///
    /// The position is the 1-based rank within the caller's priority class at
    /// enqueue time.
    pub fn enqueue(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        class: PriorityClass,
    ) -> Result<(Uuid, usize), AllocationError> {
        if self.allocator.ledger.lookup(event_id, class).is_none() {
            return Err(AllocationError::NotFound("ticket_type"));
        }
        let (id, position) = self.allocator.queue.enqueue(user_id, event_id, class);
        tracing::debug!(request = %id, class = %class, position, "request enqueued");
        Ok((id, position))
    }

    /// Poll a request's status and, while queued, its current drain rank
    pub fn request_status(&self, request_id: Uuid) -> Result<RequestStatusView, AllocationError> {
        let request = self
            .allocator
            .queue
            .get(request_id)
            .ok_or(AllocationError::NotFound("request"))?;
        Ok(RequestStatusView {
            status: request.status,
            position: self.allocator.queue.position_of(request_id),
            result_order_id: request.result_order_id,
            failure_reason: request.failure_reason,
        })
    }

    // -- checkout path ------------------------------------------------------

    /// Synchronous purchase with an optional promo code
    pub fn checkout(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        class: PriorityClass,
        promo_code: Option<&str>,
    ) -> Result<Order, AllocationError> {
        self.allocator.checkout(user_id, event_id, class, promo_code)
    }

    /// Pure price quote; commits nothing
    pub fn quote(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        class: PriorityClass,
        promo_code: Option<&str>,
    ) -> Result<PriceQuote, AllocationError> {
        self.allocator.quote(user_id, event_id, class, promo_code)
    }

    // -- ticket operations --------------------------------------------------

    /// Verify a qr token (pure read)
    pub fn verify(&self, qr_token: &str) -> Verification {
        self.lifecycle.verify(qr_token)
    }

    /// Check a ticket in; exactly-once, idempotent on repeat
    pub fn check_in(&self, qr_token: &str) -> Result<CheckIn, AllocationError> {
        self.lifecycle.check_in(qr_token)
    }

    /// Cancel a confirmed order, reclaim its unit and nudge the processor
    ///
    /// The reclaimed unit is immediately contested by the queue: one
    /// out-of-band drain tick runs on the processor thread.
    pub fn cancel(&self, order_id: Uuid, user_id: Uuid) -> Result<(), AllocationError> {
        let order = self.lifecycle.cancel(order_id, user_id)?;
        self.allocator.record_outcome(
            order.id,
            order.class,
            "cancelled",
            order.ticket_price_cents,
            order.discount_cents,
            "user_cancelled".into(),
        );
        let _ = self.processor_control.send(ProcessorMsg::DrainNow);
        Ok(())
    }

    /// Run one out-of-band drain tick on the processor thread
    ///
    /// Operator hook for manual draining; cancellation uses the same nudge.
    /// The tick runs on the processor thread, so the single-consumer
    /// discipline of the queue is preserved.
    pub fn drain_now(&self) {
        let _ = self.processor_control.send(ProcessorMsg::DrainNow);
    }

    // -- read views ---------------------------------------------------------

    /// Snapshot of an order
    pub fn order(&self, order_id: Uuid) -> Option<Order> {
        self.allocator.orders.get(order_id)
    }

    /// All orders of a user, newest first
    pub fn orders_for_user(&self, user_id: Uuid) -> Vec<Order> {
        self.allocator.orders.orders_for_user(user_id)
    }

    /// Per-class availability snapshot for an event, VIP first
    pub fn availability(&self, event_id: Uuid) -> Vec<TicketType> {
        self.allocator.ledger.availability(event_id)
    }

    /// Records captured by the in-memory audit sink (empty with a CSV sink)
    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.memory_audit
            .as_ref()
            .map(|sink| sink.records())
            .unwrap_or_default()
    }

    // -- lifecycle of the engine itself -------------------------------------

    /// Stop the background processor and wait for it to terminate
    pub fn shutdown(self) {
        let _ = self.processor_control.send(ProcessorMsg::Shutdown);
        self.processor_thread
            .join()
            .expect("processor thread panicked");
    }
}
