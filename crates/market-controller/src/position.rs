//! In-memory position store
//!
//! Positions are keyed by (currency, maturity, user) and mutated only
//! through matching, itayose, and roll operations. Positive future
//! value is a lender claim, negative a borrower obligation.

use std::collections::HashMap;

use common::{Currency, Maturity, UserId};

#[derive(Debug, Default)]
pub struct PositionStore {
    positions: HashMap<(Currency, Maturity), HashMap<UserId, i128>>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a signed future-value delta to a user's position
    pub fn apply(&mut self, currency: &Currency, maturity: Maturity, user: UserId, delta: i128) {
        if delta == 0 {
            return;
        }
        let book_positions = self
            .positions
            .entry((currency.clone(), maturity))
            .or_default();
        let balance = book_positions.entry(user).or_insert(0);
        *balance += delta;
        if *balance == 0 {
            book_positions.remove(&user);
        }
    }

    /// A user's future value at one maturity
    pub fn get(&self, currency: &Currency, maturity: Maturity, user: UserId) -> i128 {
        self.positions
            .get(&(currency.clone(), maturity))
            .and_then(|m| m.get(&user))
            .copied()
            .unwrap_or(0)
    }

    /// Remove and return every non-zero position at a maturity
    pub fn take_all(&mut self, currency: &Currency, maturity: Maturity) -> Vec<(UserId, i128)> {
        self.positions
            .remove(&(currency.clone(), maturity))
            .map(|m| {
                let mut entries: Vec<_> = m.into_iter().collect();
                // deterministic migration order
                entries.sort_by_key(|(user, _)| *user);
                entries
            })
            .unwrap_or_default()
    }

    /// Sum of all positions at a maturity (zero when conserved)
    pub fn total(&self, currency: &Currency, maturity: Maturity) -> i128 {
        self.positions
            .get(&(currency.clone(), maturity))
            .map(|m| m.values().sum())
            .unwrap_or(0)
    }

    /// Number of users holding a position at a maturity
    pub fn holders(&self, currency: &Currency, maturity: Maturity) -> usize {
        self.positions
            .get(&(currency.clone(), maturity))
            .map(|m| m.len())
            .unwrap_or(0)
    }
}
