//! Implementation of the promo engine
//!
//! Evaluation ("quoting") is pure and mutates nothing. Usage counters move
//! only in [`PromoEngine::commit_with`], which re-checks the race-able limits
//! and creates the paired order inside the same critical section, so a promo
//! with one use left admits exactly one of two concurrent allocations.

use chrono::Utc;
use dashmap::DashMap;
use event_tix_core::{PriorityClass, PromoCode, PromoReason};
use uuid::Uuid;

struct Entry {
    promo: PromoCode,
    /// Committed redemptions as `(user_id, order_id)`
    redemptions: Vec<(Uuid, Uuid)>,
}

/// Stateless evaluator and single writer of promo usage counters
pub struct PromoEngine {
    promos: DashMap<String, Entry>,
}

/// Upper-cased, trimmed form of a promo code
///
/// The single canonical form: map keys, stored order fields and lookups all
/// go through here.
pub(crate) fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

impl PromoEngine {
    /// Create an engine with no promos
    pub fn new() -> Self {
        Self {
            promos: DashMap::new(),
        }
    }

    /// Register a promo code (seeding hook for the catalog collaborator)
    pub fn register(&self, mut promo: PromoCode) {
        promo.code = normalize(&promo.code);
        self.promos.insert(
            promo.code.clone(),
            Entry {
                promo,
                redemptions: Vec::new(),
            },
        );
    }

    /// Evaluate a promo against a prospective line item
    ///
    /// Pure read; performs no mutation. Checks run in a fixed order and the
    /// first failing one wins, so the reported reason is deterministic:
    /// existence and `is_active`, time window, event scope, class scope,
    /// minimum price, total use limit, per-user use limit.
    pub fn evaluate(
        &self,
        code: &str,
        event_id: Uuid,
        class: PriorityClass,
        unit_price_cents: u32,
        user_id: Uuid,
    ) -> Result<u32, PromoReason> {
        let entry = self
            .promos
            .get(&normalize(code))
            .ok_or(PromoReason::NotFound)?;
        let promo = &entry.promo;

        if !promo.is_active {
            return Err(PromoReason::Inactive);
        }
        let now = Utc::now();
        if promo.starts_at.is_some_and(|t| now < t) {
            return Err(PromoReason::NotStarted);
        }
        if promo.ends_at.is_some_and(|t| now > t) {
            return Err(PromoReason::Expired);
        }
        if promo.event_id.is_some_and(|id| id != event_id) {
            return Err(PromoReason::WrongEvent);
        }
        if promo.class.is_some_and(|c| c != class) {
            return Err(PromoReason::WrongTicketType);
        }
        if promo
            .min_order_cents
            .is_some_and(|min| unit_price_cents < min)
        {
            return Err(PromoReason::BelowMinimum);
        }
        if promo.max_total_uses.is_some_and(|max| promo.used_count >= max) {
            return Err(PromoReason::Exhausted);
        }
        if let Some(max) = promo.max_uses_per_user {
            let used = entry
                .redemptions
                .iter()
                .filter(|(user, _)| *user == user_id)
                .count() as u32;
            if used >= max {
                return Err(PromoReason::UserLimitReached);
            }
        }

        Ok(promo.discount.apply(unit_price_cents))
    }

    /// Commit one redemption together with the order it pays for
    ///
    /// Re-checks the use limits and runs `create_order` while holding the
    /// promo's entry lock; the counter increment and the order creation
    /// therefore succeed or fail together. Under concurrent contention on the
    /// last remaining use, exactly one caller's `create_order` runs; the
    /// losers get [`PromoReason::Exhausted`] (or
    /// [`PromoReason::UserLimitReached`]) and must roll back their capacity
    /// reservation.
    pub fn commit_with<F>(&self, code: &str, user_id: Uuid, create_order: F) -> Result<Uuid, PromoReason>
    where
        F: FnOnce() -> Uuid,
    {
        let mut entry = self
            .promos
            .get_mut(&normalize(code))
            .ok_or(PromoReason::NotFound)?;

        if entry
            .promo
            .max_total_uses
            .is_some_and(|max| entry.promo.used_count >= max)
        {
            return Err(PromoReason::Exhausted);
        }
        if let Some(max) = entry.promo.max_uses_per_user {
            let used = entry
                .redemptions
                .iter()
                .filter(|(user, _)| *user == user_id)
                .count() as u32;
            if used >= max {
                return Err(PromoReason::UserLimitReached);
            }
        }

        let order_id = create_order();
        entry.promo.used_count += 1;
        entry.redemptions.push((user_id, order_id));
        Ok(order_id)
    }

    /// Snapshot of a promo, if it exists
    pub fn get(&self, code: &str) -> Option<PromoCode> {
        self.promos.get(&normalize(code)).map(|e| e.promo.clone())
    }
}

impl Default for PromoEngine {
    fn default() -> Self {
        Self::new()
    }
}
