//! The allocation sequence shared by both entry paths
//!
//! The background processor (queue path) and the synchronous checkout path
//! both funnel through [`Allocator::allocate`], so they contend on the same
//! ledger primitives and can never hold separate capacity views.

use std::sync::Arc;

use chrono::Utc;
use event_tix_core::{
    AllocationError, Config, Order, OrderStatus, PriorityClass, TicketType,
};
use uuid::Uuid;

use crate::audit::{AuditRecord, AuditSink};
use crate::ledger::{CapacityLedger, Reservation};
use crate::lifecycle::issue_ticket;
use crate::promo::{self, PromoEngine};
use crate::queue::RequestQueue;
use crate::store::OrderStore;

/// Non-committing price quote for a prospective purchase
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PriceQuote {
    /// Unit price in cents
    pub ticket_price_cents: u32,
    /// Discount in cents, zero without a promo
    pub discount_cents: u32,
    /// `ticket_price_cents - discount_cents`
    pub total_cents: u32,
}

/// Shared state of the allocation core
pub(crate) struct Allocator {
    pub config: Config,
    pub ledger: Arc<CapacityLedger>,
    pub queue: Arc<RequestQueue>,
    pub promos: Arc<PromoEngine>,
    pub orders: Arc<OrderStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl Allocator {
    /// Turn one request into a confirmed order, consuming one unit of capacity
    ///
    /// Sequence: evaluate the promo (pure), reserve capacity, create the
    /// order with its issued ticket, commit the promo use in the same
    /// critical section as the order insert. Any failure after a successful
    /// reserve releases the unit before surfacing — the rollback is
    /// mandatory, not best-effort.
    pub fn allocate(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        event_id: Uuid,
        class: PriorityClass,
        promo_code: Option<&str>,
    ) -> Result<Order, AllocationError> {
        let ticket_type = self
            .ledger
            .lookup(event_id, class)
            .ok_or(AllocationError::NotFound("ticket_type"))?;

        // quote first so a bad code fails before capacity is touched
        let discount_cents = match promo_code {
            Some(code) => self
                .promos
                .evaluate(code, event_id, class, ticket_type.price_cents, user_id)
                .map_err(AllocationError::InvalidPromo)?,
            None => 0,
        };

        if self.ledger.try_reserve(ticket_type.id) == Reservation::SoldOut {
            return Err(AllocationError::SoldOut);
        }

        let order = Order {
            id: order_id,
            user_id,
            event_id,
            class,
            status: OrderStatus::Confirmed,
            ticket: issue_ticket(),
            ticket_price_cents: ticket_type.price_cents,
            discount_cents,
            total_cents: ticket_type.price_cents - discount_cents,
            promo_code: promo_code.map(promo::normalize),
            created_at: Utc::now(),
        };

        let inserted = match promo_code {
            // the promo entry lock spans the limit re-check, the counter
            // increment and the order insert: they succeed or fail together
            Some(code) => self
                .promos
                .commit_with(code, user_id, || {
                    self.orders.insert(order.clone());
                    order.id
                })
                .map(|_| ())
                .map_err(AllocationError::InvalidPromo),
            None => {
                self.orders.insert(order.clone());
                Ok(())
            }
        };

        match inserted {
            Ok(()) => {
                tracing::debug!(order = %order.id, class = %class, "allocation confirmed");
                Ok(order)
            }
            Err(err) => {
                self.ledger.release(ticket_type.id);
                tracing::warn!(%err, class = %class, "allocation rolled back after reserve");
                Err(err)
            }
        }
    }

    /// Synchronous purchase, contending on the same ledger as the processor
    pub fn checkout(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        class: PriorityClass,
        promo_code: Option<&str>,
    ) -> Result<Order, AllocationError> {
        // the prospective order id doubles as the audit reference, so failed
        // attempts are traceable too
        let order_id = Uuid::new_v4();
        let result = self
            .precheck(user_id, event_id, class)
            .and_then(|_| self.allocate(order_id, user_id, event_id, class, promo_code));

        match &result {
            Ok(order) => self.record_outcome(
                order.id,
                class,
                "confirmed",
                order.ticket_price_cents,
                order.discount_cents,
                String::new(),
            ),
            Err(err) => self.record_outcome(
                order_id,
                class,
                "failed",
                self.unit_price(event_id, class),
                0,
                err.code(),
            ),
        }
        result
    }

    /// Pure price quote; commits nothing, counts no promo use
    pub fn quote(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        class: PriorityClass,
        promo_code: Option<&str>,
    ) -> Result<PriceQuote, AllocationError> {
        let ticket_type = self.precheck(user_id, event_id, class)?;
        if ticket_type.remaining() == 0 {
            return Err(AllocationError::SoldOut);
        }
        let discount_cents = match promo_code {
            Some(code) => self
                .promos
                .evaluate(code, event_id, class, ticket_type.price_cents, user_id)
                .map_err(AllocationError::InvalidPromo)?,
            None => 0,
        };
        Ok(PriceQuote {
            ticket_price_cents: ticket_type.price_cents,
            discount_cents,
            total_cents: ticket_type.price_cents - discount_cents,
        })
    }

    /// Checks shared by quote and checkout: type exists, sale window open,
    /// user below the per-event order cap
    fn precheck(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        class: PriorityClass,
    ) -> Result<TicketType, AllocationError> {
        let ticket_type = self
            .ledger
            .lookup(event_id, class)
            .ok_or(AllocationError::NotFound("ticket_type"))?;

        let now = Utc::now();
        if ticket_type.sale_start.is_some_and(|t| now < t)
            || ticket_type.sale_end.is_some_and(|t| now > t)
        {
            return Err(AllocationError::SaleWindowClosed);
        }

        // count and check are not serialized: a user racing their own
        // checkouts can land one order past the cap
        let current = self.orders.confirmed_count(user_id, event_id);
        if current >= self.config.max_orders_per_user {
            return Err(AllocationError::UserLimitReached { current });
        }
        Ok(ticket_type)
    }

    /// Append one terminal outcome to the audit sink
    pub fn record_outcome(
        &self,
        reference: Uuid,
        ticket_type: PriorityClass,
        outcome: &'static str,
        price_cents: u32,
        discount_cents: u32,
        reason: String,
    ) {
        self.audit.append(&AuditRecord {
            timestamp: Utc::now(),
            reference,
            ticket_type,
            outcome,
            price_cents,
            discount_cents,
            reason,
        });
    }

    /// Current unit price, zero when the type is unknown (for failure records)
    pub fn unit_price(&self, event_id: Uuid, class: PriorityClass) -> u32 {
        self.ledger
            .lookup(event_id, class)
            .map(|tt| tt.price_cents)
            .unwrap_or(0)
    }
}
