use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority class of a ticket type
///
/// VIP requests are always drained ahead of Regular ones.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum PriorityClass {
    /// Drained first
    Vip,
    /// Drained once no VIP request is pending
    Regular,
}

impl PriorityClass {
    /// Canonical name, as it appears in the catalog and the audit log
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityClass::Vip => "VIP",
            PriorityClass::Regular => "Regular",
        }
    }

    /// Parse the canonical name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "VIP" => Some(PriorityClass::Vip),
            "REGULAR" => Some(PriorityClass::Regular),
            _ => None,
        }
    }
}

impl std::fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sellable ticket type within an event
///
/// The `capacity`/`sold_count` pair is exclusively mutated by the capacity
/// ledger; `0 <= sold_count <= capacity` holds at all times.
#[derive(Clone, Debug)]
pub struct TicketType {
    /// Unique id
    pub id: Uuid,
    /// Event this type belongs to
    pub event_id: Uuid,
    /// Priority class, doubles as the type's name
    pub class: PriorityClass,
    /// Total number of sellable units
    pub capacity: u32,
    /// Units currently consumed by committed orders
    pub sold_count: u32,
    /// Unit price in cents
    pub price_cents: u32,
    /// Sales are rejected before this instant, if set
    pub sale_start: Option<DateTime<Utc>>,
    /// Sales are rejected after this instant, if set
    pub sale_end: Option<DateTime<Utc>>,
}

impl TicketType {
    /// Units still available for sale
    pub fn remaining(&self) -> u32 {
        self.capacity - self.sold_count
    }
}

/// Status of a queued ticket request
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting in the queue
    Queued,
    /// Dequeued, allocation in progress
    Processing,
    /// Allocation succeeded
    Done,
    /// Allocation failed (sold out or a downstream error)
    Failed,
}

/// A pending or terminal ticket request (async path)
///
/// Created on enqueue, mutated only by the processor, retained after it
/// reaches a terminal status so callers can keep polling it.
#[derive(Clone, Debug)]
pub struct TicketRequest {
    /// Unique id, handed back to the caller for polling
    pub id: Uuid,
    /// Opaque authenticated user
    pub user_id: Uuid,
    /// Event the request is for
    pub event_id: Uuid,
    /// Requested priority class
    pub class: PriorityClass,
    /// Instant the request entered the queue
    pub enqueued_at: DateTime<Utc>,
    /// Current status
    pub status: RequestStatus,
    /// Confirmed order, set when `status` is `Done`
    pub result_order_id: Option<Uuid>,
    /// Failure reason, set when `status` is `Failed`
    pub failure_reason: Option<String>,
}

/// Status of an order
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Capacity consumed, ticket issued
    Confirmed,
    /// Cancelled by the user, capacity reclaimed
    Cancelled,
}

/// Status of an issued ticket
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Issued, not yet used at the door
    Issued,
    /// Used at the door; terminal
    CheckedIn,
    /// Voided by order cancellation; terminal
    Void,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TicketStatus::Issued => "issued",
            TicketStatus::CheckedIn => "checked_in",
            TicketStatus::Void => "void",
        };
        f.write_str(s)
    }
}

/// The QR-bearing ticket embedded in a confirmed order
#[derive(Clone, Debug)]
pub struct Ticket {
    /// Unguessable token encoded in the QR code
    pub qr_token: String,
    /// Current status
    pub status: TicketStatus,
}

/// A confirmed (or cancelled) allocation
///
/// Orders are never deleted, only transitioned.
#[derive(Clone, Debug)]
pub struct Order {
    /// Unique id
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Event the ticket is for
    pub event_id: Uuid,
    /// Priority class bought
    pub class: PriorityClass,
    /// Current status
    pub status: OrderStatus,
    /// The issued ticket
    pub ticket: Ticket,
    /// Unit price at allocation time, in cents
    pub ticket_price_cents: u32,
    /// Discount applied at allocation time, in cents
    pub discount_cents: u32,
    /// `ticket_price_cents - discount_cents`
    pub total_cents: u32,
    /// Promo code applied, if any
    pub promo_code: Option<String>,
    /// Creation instant
    pub created_at: DateTime<Utc>,
}

/// Discount carried by a promo code
///
/// A promo is exactly one of percent-off or amount-off, never both.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Discount {
    /// `floor(price * percent / 100)` off, clamped at the unit price
    PercentOff(u32),
    /// A flat amount off, clamped at the unit price
    AmountOff(u32),
}

impl Discount {
    /// Discount in cents for a unit price, never exceeding the price
    ///
    /// The clamp keeps `price - discount` from underflowing anywhere
    /// downstream; an over-generous promo sells the ticket for zero.
    pub fn apply(&self, unit_price_cents: u32) -> u32 {
        match *self {
            Discount::PercentOff(percent) => {
                ((u64::from(unit_price_cents) * u64::from(percent) / 100) as u32)
                    .min(unit_price_cents)
            }
            Discount::AmountOff(cents) => cents.min(unit_price_cents),
        }
    }
}

/// A promo code with optional scoping and usage limits
#[derive(Clone, Debug)]
pub struct PromoCode {
    /// The code, stored upper-cased; comparison is case-insensitive
    pub code: String,
    /// Restricts the promo to one event, if set
    pub event_id: Option<Uuid>,
    /// Restricts the promo to one priority class, if set
    pub class: Option<PriorityClass>,
    /// The discount
    pub discount: Discount,
    /// Total redemptions allowed across all users, if set
    pub max_total_uses: Option<u32>,
    /// Redemptions allowed per user, if set
    pub max_uses_per_user: Option<u32>,
    /// Minimum unit price the promo applies to, if set
    pub min_order_cents: Option<u32>,
    /// Not valid before this instant, if set
    pub starts_at: Option<DateTime<Utc>>,
    /// Not valid after this instant, if set
    pub ends_at: Option<DateTime<Utc>>,
    /// Inactive promos fail validation regardless of anything else
    pub is_active: bool,
    /// Committed redemptions; mutated only alongside a committed order
    pub used_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_discount_floors() {
        assert_eq!(Discount::PercentOff(10).apply(5000), 500);
        assert_eq!(Discount::PercentOff(33).apply(100), 33);
        assert_eq!(Discount::PercentOff(33).apply(50), 16);
    }

    #[test]
    fn amount_discount_clamps_at_price() {
        assert_eq!(Discount::AmountOff(700).apply(5000), 700);
        assert_eq!(Discount::AmountOff(700).apply(500), 500);
    }

    #[test]
    fn percent_discount_above_100_clamps_at_price() {
        assert_eq!(Discount::PercentOff(100).apply(5000), 5000);
        assert_eq!(Discount::PercentOff(150).apply(5000), 5000);
    }

    #[test]
    fn class_names_round_trip() {
        assert_eq!(PriorityClass::parse("VIP"), Some(PriorityClass::Vip));
        assert_eq!(PriorityClass::parse("regular"), Some(PriorityClass::Regular));
        assert_eq!(PriorityClass::parse("backstage"), None);
        assert_eq!(PriorityClass::Vip.to_string(), "VIP");
    }
}
