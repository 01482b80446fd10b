//! Implementation of the background processor
//!
//! One thread draining the request queue at a fixed cadence. The loop blocks
//! on its control channel with the tick period as the timeout, so shutdown
//! and drain nudges are handled promptly and two ticks can never overlap.

use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use uuid::Uuid;

use crate::allocator::Allocator;

/// Control messages for the processor thread
pub(crate) enum ProcessorMsg {
    /// Run one out-of-band tick (sent after a cancellation reclaims a unit)
    DrainNow,
    /// Stop the loop
    Shutdown,
}

/// The background loop draining the request queue
pub(crate) struct Processor {
    allocator: Arc<Allocator>,
    control: Receiver<ProcessorMsg>,
}

impl Processor {
    pub fn new(allocator: Arc<Allocator>, control: Receiver<ProcessorMsg>) -> Self {
        Self { allocator, control }
    }

    /// The processor's main routine; returns on shutdown
    pub fn run(&self) {
        let tick = Duration::from_millis(self.allocator.config.tick_ms);
        loop {
            match self.control.recv_timeout(tick) {
                Ok(ProcessorMsg::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(ProcessorMsg::DrainNow) | Err(RecvTimeoutError::Timeout) => self.run_tick(),
            }
        }
        tracing::debug!("processor stopped");
    }

    /// One tick: drain at most `batch_per_tick` requests
    fn run_tick(&self) {
        for _ in 0..self.allocator.config.batch_per_tick {
            if !self.process_one() {
                break;
            }
        }
    }

    /// Allocate the next queued request; returns false when the queue is empty
    ///
    /// The stored request carries no promo; only the checkout path applies
    /// codes.
    fn process_one(&self) -> bool {
        let Some(request) = self.allocator.queue.dequeue() else {
            return false;
        };

        let order_id = Uuid::new_v4();
        match self.allocator.allocate(
            order_id,
            request.user_id,
            request.event_id,
            request.class,
            None,
        ) {
            Ok(order) => {
                self.allocator.queue.mark_done(request.id, order.id);
                self.allocator.record_outcome(
                    request.id,
                    request.class,
                    "confirmed",
                    order.ticket_price_cents,
                    order.discount_cents,
                    String::new(),
                );
                tracing::info!(request = %request.id, order = %order.id, class = %request.class, "request fulfilled");
            }
            Err(err) => {
                let reason = err.code();
                self.allocator.queue.mark_failed(request.id, &reason);
                self.allocator.record_outcome(
                    request.id,
                    request.class,
                    "failed",
                    self.allocator.unit_price(request.event_id, request.class),
                    0,
                    reason,
                );
                tracing::info!(request = %request.id, %err, class = %request.class, "request failed");
            }
        }
        true
    }
}
