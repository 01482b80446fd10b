use thiserror::Error;

/// Reason a promo code was rejected
///
/// The variants are ordered the way validation checks run; the first failing
/// check wins, so the reported reason is deterministic.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PromoReason {
    /// No promo with this code exists
    NotFound,
    /// The promo has been deactivated
    Inactive,
    /// `starts_at` lies in the future
    NotStarted,
    /// `ends_at` has passed
    Expired,
    /// The promo is scoped to a different event
    WrongEvent,
    /// The promo is scoped to a different priority class
    WrongTicketType,
    /// The unit price is below `min_order_cents`
    BelowMinimum,
    /// `max_total_uses` has been reached
    Exhausted,
    /// This user has reached `max_uses_per_user`
    UserLimitReached,
}

impl PromoReason {
    /// Stable reason string, surfaced to callers and the audit log
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoReason::NotFound => "not_found",
            PromoReason::Inactive => "inactive",
            PromoReason::NotStarted => "not_started",
            PromoReason::Expired => "expired",
            PromoReason::WrongEvent => "wrong_event",
            PromoReason::WrongTicketType => "wrong_ticket_type",
            PromoReason::BelowMinimum => "below_minimum",
            PromoReason::Exhausted => "exhausted",
            PromoReason::UserLimitReached => "user_limit_reached",
        }
    }
}

impl std::fmt::Display for PromoReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured, user-facing failure of an allocation-core operation
///
/// None of these are unexpected faults; every variant maps to a response the
/// caller is expected to handle.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum AllocationError {
    /// Capacity for the requested ticket type is exhausted
    #[error("sold out")]
    SoldOut,
    /// The promo code was rejected; the caller may retry without it
    #[error("invalid promo code: {0}")]
    InvalidPromo(PromoReason),
    /// Unknown request id, order id, qr token, ticket type or promo code
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The requested ticket state transition is not permitted
    #[error("invalid transition: ticket is {status}")]
    InvalidTransition {
        /// Status that blocked the transition
        status: crate::TicketStatus,
    },
    /// The ticket type is outside its sale window
    #[error("sale window closed")]
    SaleWindowClosed,
    /// The user already holds the maximum number of confirmed orders
    #[error("user limit reached ({current} confirmed orders)")]
    UserLimitReached {
        /// Confirmed orders the user already holds for this event
        current: u32,
    },
}

impl AllocationError {
    /// Stable machine-readable code, used in request records and the audit log
    pub fn code(&self) -> String {
        match self {
            AllocationError::SoldOut => "sold_out".into(),
            AllocationError::InvalidPromo(reason) => format!("invalid_promo:{reason}"),
            AllocationError::NotFound(what) => format!("{what}_not_found"),
            AllocationError::InvalidTransition { .. } => "invalid_transition".into(),
            AllocationError::SaleWindowClosed => "sale_window_closed".into(),
            AllocationError::UserLimitReached { .. } => "user_limit_reached".into(),
        }
    }
}
