//! Implementation of the ticket lifecycle
//!
//! State machine of an issued ticket: `issued -> checked_in` (terminal) via
//! the door scanner, `issued -> void` via order cancellation. `checked_in` is
//! terminal; nothing transitions out of it.

use std::sync::Arc;

use event_tix_core::{AllocationError, Order, OrderStatus, Ticket, TicketStatus};
use rand::Rng;
use uuid::Uuid;

use crate::ledger::CapacityLedger;
use crate::store::OrderStore;

/// Result of verifying a qr token
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Verification {
    /// Whether the ticket admits entry
    pub valid: bool,
    /// Ticket status, when the token resolved to a ticket
    pub status: Option<TicketStatus>,
    /// Owning order, when the ticket is valid
    pub order_id: Option<Uuid>,
}

/// Result of a check-in attempt
///
/// `ok = false` with `previous_status = CheckedIn` is the idempotent
/// rejection of a repeated scan, not an error.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CheckIn {
    /// Whether this call performed the transition
    pub ok: bool,
    /// Status before the call
    pub previous_status: TicketStatus,
    /// Status after the call
    pub new_status: TicketStatus,
}

/// Owner of all ticket status transitions
pub struct TicketLifecycle {
    orders: Arc<OrderStore>,
    ledger: Arc<CapacityLedger>,
}

/// Mint a ticket with a fresh unguessable qr token
///
/// 128 bits from the thread-local CSPRNG, formatted as a compact uuid.
pub fn issue_ticket() -> Ticket {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    Ticket {
        qr_token: Uuid::from_bytes(bytes).simple().to_string(),
        status: TicketStatus::Issued,
    }
}

impl TicketLifecycle {
    /// Create the lifecycle over the shared order store and ledger
    pub fn new(orders: Arc<OrderStore>, ledger: Arc<CapacityLedger>) -> Self {
        Self { orders, ledger }
    }

    /// Verify a qr token; pure read, mutates nothing
    ///
    /// Valid iff the token exists and its order has not been cancelled.
    pub fn verify(&self, qr_token: &str) -> Verification {
        let order = self
            .orders
            .order_id_by_token(qr_token)
            .and_then(|id| self.orders.get(id));
        match order {
            Some(order) if order.status == OrderStatus::Confirmed => Verification {
                valid: true,
                status: Some(order.ticket.status),
                order_id: Some(order.id),
            },
            Some(order) => Verification {
                valid: false,
                status: Some(order.ticket.status),
                order_id: None,
            },
            None => Verification {
                valid: false,
                status: None,
                order_id: None,
            },
        }
    }

    /// Check a ticket in; transitions `issued -> checked_in` exactly once
    ///
    /// A second scan returns `ok = false` with the previous status, a scan of
    /// a void ticket is an [`AllocationError::InvalidTransition`], an unknown
    /// token is [`AllocationError::NotFound`].
    pub fn check_in(&self, qr_token: &str) -> Result<CheckIn, AllocationError> {
        let order_id = self
            .orders
            .order_id_by_token(qr_token)
            .ok_or(AllocationError::NotFound("ticket"))?;
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or(AllocationError::NotFound("ticket"))?;

        match order.ticket.status {
            TicketStatus::Issued => {
                order.ticket.status = TicketStatus::CheckedIn;
                tracing::info!(order = %order_id, "ticket checked in");
                Ok(CheckIn {
                    ok: true,
                    previous_status: TicketStatus::Issued,
                    new_status: TicketStatus::CheckedIn,
                })
            }
            TicketStatus::CheckedIn => Ok(CheckIn {
                ok: false,
                previous_status: TicketStatus::CheckedIn,
                new_status: TicketStatus::CheckedIn,
            }),
            TicketStatus::Void => Err(AllocationError::InvalidTransition {
                status: TicketStatus::Void,
            }),
        }
    }

    /// Cancel an order: void the ticket, flip the order, reclaim capacity
    ///
    /// Permitted only while the ticket is `issued`. The status flip and the
    /// capacity release happen under the order's entry lock, so no caller can
    /// observe a cancelled order whose unit has not been reclaimed. Returns
    /// the cancelled order snapshot.
    pub fn cancel(&self, order_id: Uuid, user_id: Uuid) -> Result<Order, AllocationError> {
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or(AllocationError::NotFound("order"))?;
        // ownership check; a foreign order looks like a missing one
        if order.user_id != user_id {
            return Err(AllocationError::NotFound("order"));
        }
        if order.status != OrderStatus::Confirmed || order.ticket.status != TicketStatus::Issued {
            return Err(AllocationError::InvalidTransition {
                status: order.ticket.status,
            });
        }

        let ticket_type = self
            .ledger
            .lookup(order.event_id, order.class)
            .ok_or(AllocationError::NotFound("ticket_type"))?;

        order.ticket.status = TicketStatus::Void;
        order.status = OrderStatus::Cancelled;
        self.ledger.release(ticket_type.id);
        tracing::info!(order = %order_id, class = %order.class, "order cancelled, capacity reclaimed");
        Ok(order.clone())
    }
}
