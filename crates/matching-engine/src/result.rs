//! Result types for matching operations

use common::{OrderId, UnitPrice};

use crate::domain::{BookOrder, Trade};

/// Result of submitting or unwinding against an order book
#[derive(Debug, Clone)]
pub struct FillResult {
    /// Id of the incoming order (also the taker id on its trades)
    pub order_id: OrderId,
    /// Present value filled
    pub filled_amount: u64,
    /// Future value filled, accumulated per trade tick
    pub filled_amount_fv: u64,
    /// Price of the final match in the sequence
    pub last_unit_price: Option<UnitPrice>,
    /// True when the circuit breaker halted consumption
    pub circuit_breaker_triggered: bool,
    /// Remaining order, when a limit remainder rested on the book
    pub remaining_order: Option<BookOrder>,
    /// Trades generated by this operation
    pub trades: Vec<Trade>,
}

impl FillResult {
    /// Check if any trades were generated
    pub fn has_trades(&self) -> bool {
        !self.trades.is_empty()
    }

    /// True when nothing was filled at all
    pub fn is_unfilled(&self) -> bool {
        self.filled_amount == 0
    }
}

/// Result of a cancel operation
#[derive(Debug, Clone)]
pub struct CancelResult {
    /// The order that was removed
    pub order: BookOrder,
    /// Whether it was still queued for the opening auction
    pub was_pre_order: bool,
}

/// Result of an opening auction
#[derive(Debug, Clone)]
pub struct ItayoseResult {
    /// Discovered opening price; `None` when no orders crossed
    pub opening_unit_price: Option<UnitPrice>,
    /// Present value executed per side at the opening price
    pub offset_amount: u64,
    /// Total order amount crossed at the open, counting both sides
    pub total_matched: u64,
    /// Uniform-price trades generated at the open
    pub trades: Vec<Trade>,
    /// Orders transferred onto the live book after the auction
    pub carried_orders: usize,
}

impl ItayoseResult {
    /// Auction with no crossing orders: the book opens empty
    pub fn no_cross() -> Self {
        Self {
            opening_unit_price: None,
            offset_amount: 0,
            total_matched: 0,
            trades: Vec::new(),
            carried_orders: 0,
        }
    }

    pub fn executed(&self) -> bool {
        self.opening_unit_price.is_some()
    }
}
