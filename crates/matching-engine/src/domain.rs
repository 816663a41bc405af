//! Domain types for the matching engine
//!
//! This module defines the order, price level, and order book types.
//! Unit prices are integer fixed-point values, so price levels key
//! directly on the raw `u64`.

use std::collections::{BTreeMap, HashMap, VecDeque};

use common::{Currency, Maturity, OrderId, Side, UnitPrice, UserId};
use serde::{Deserialize, Serialize};

/// How many per-step traded prices the book remembers
pub const TRADED_PRICE_HISTORY: usize = 5;

// ============================================================================
// Book Order
// ============================================================================

/// Order resting in (or queued for) an order book
///
/// Immutable once placed except for the remaining amount, which only
/// decreases. `sequence` fixes time priority within a price level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookOrder {
    pub order_id: OrderId,
    pub user: UserId,
    pub side: Side,
    /// Limit unit price
    pub unit_price: UnitPrice,
    /// Remaining present-value amount
    pub amount: u64,
    /// Present value filled so far
    pub filled_amount: u64,
    /// Future value filled so far
    pub filled_future_value: u64,
    /// Time priority within a price level
    pub sequence: u64,
    pub timestamp: i64,
}

impl BookOrder {
    pub fn new(
        user: UserId,
        side: Side,
        unit_price: UnitPrice,
        amount: u64,
        sequence: u64,
        timestamp: i64,
    ) -> Self {
        Self {
            order_id: OrderId::new(),
            user,
            side,
            unit_price,
            amount,
            filled_amount: 0,
            filled_future_value: 0,
            sequence,
            timestamp,
        }
    }

    /// Reduce the remaining amount after a fill
    pub fn fill(&mut self, amount: u64, future_value: u64) {
        self.amount = self.amount.saturating_sub(amount);
        self.filled_amount += amount;
        self.filled_future_value += future_value;
    }

    /// Check if the order is completely filled
    pub fn is_filled(&self) -> bool {
        self.amount == 0
    }
}

// ============================================================================
// Price Level
// ============================================================================

/// FIFO queue of orders at a single unit price
#[derive(Debug, Clone, Default)]
pub struct PriceLevel {
    orders: VecDeque<BookOrder>,
    total_amount: u64,
}

impl PriceLevel {
    /// Append an order at the back of the queue (time priority)
    pub fn push_back(&mut self, order: BookOrder) {
        self.total_amount += order.amount;
        self.orders.push_back(order);
    }

    /// Front order without removing it
    pub fn front(&self) -> Option<&BookOrder> {
        self.orders.front()
    }

    /// Consume present value from the front order. Returns the filled
    /// order when the fill empties it.
    pub fn consume_front(&mut self, amount: u64, future_value: u64) -> Option<BookOrder> {
        let front = self.orders.front_mut()?;
        front.fill(amount, future_value);
        self.total_amount = self.total_amount.saturating_sub(amount);
        if front.is_filled() {
            self.orders.pop_front()
        } else {
            None
        }
    }

    /// Remove an order from the queue by id
    pub fn remove(&mut self, order_id: OrderId) -> Option<BookOrder> {
        let position = self.orders.iter().position(|o| o.order_id == order_id)?;
        let order = self.orders.remove(position)?;
        self.total_amount = self.total_amount.saturating_sub(order.amount);
        Some(order)
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Total present value resting at this level
    pub fn total_amount(&self) -> u64 {
        self.total_amount
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn orders(&self) -> impl Iterator<Item = &BookOrder> {
        self.orders.iter()
    }
}

// ============================================================================
// Price Level Book (one side)
// ============================================================================

/// All price levels of one side of a book
///
/// Lend levels are best-first descending (a borrower executes against the
/// highest price first); borrow levels are best-first ascending. FIFO
/// within a level.
#[derive(Debug, Clone)]
pub struct PriceLevelBook {
    side: Side,
    levels: BTreeMap<u64, PriceLevel>,
}

impl PriceLevelBook {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Insert a resting order at its limit price level
    pub fn insert(&mut self, order: BookOrder) {
        self.levels
            .entry(order.unit_price.as_u64())
            .or_default()
            .push_back(order);
    }

    /// Best executable price for a taker on the opposite side
    pub fn best_price(&self) -> Option<UnitPrice> {
        let raw = match self.side {
            Side::Lend => self.levels.keys().next_back(),
            Side::Borrow => self.levels.keys().next(),
        }?;
        UnitPrice::try_new(*raw)
    }

    /// Best level with its raw price, mutable
    pub fn best_level_mut(&mut self) -> Option<(u64, &mut PriceLevel)> {
        let entry = match self.side {
            Side::Lend => self.levels.iter_mut().next_back(),
            Side::Borrow => self.levels.iter_mut().next(),
        }?;
        Some((*entry.0, entry.1))
    }

    /// Remove an order by id from the level at the given price
    pub fn remove(&mut self, price: u64, order_id: OrderId) -> Option<BookOrder> {
        let level = self.levels.get_mut(&price)?;
        let order = level.remove(order_id)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(order)
    }

    /// Drop empty levels after a matching walk
    pub fn cleanup_empty_levels(&mut self) {
        self.levels.retain(|_, level| !level.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn order_count(&self) -> usize {
        self.levels.values().map(|l| l.order_count()).sum()
    }

    pub fn total_amount(&self) -> u64 {
        self.levels.values().map(|l| l.total_amount()).sum()
    }

    /// Levels in best-first order
    pub fn levels_best_first(&self) -> Box<dyn Iterator<Item = (u64, &PriceLevel)> + '_> {
        match self.side {
            Side::Lend => Box::new(self.levels.iter().rev().map(|(p, l)| (*p, l))),
            Side::Borrow => Box::new(self.levels.iter().map(|(p, l)| (*p, l))),
        }
    }
}

// ============================================================================
// Trade
// ============================================================================

/// A matched execution between a taker and one resting maker order
///
/// `future_value` is derived from `amount` at this tick's price; the same
/// value credits the lender and debits the borrower, so every trade is
/// exactly zero-sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: uuid::Uuid,
    pub currency: Currency,
    pub maturity: Maturity,
    pub taker_order_id: OrderId,
    pub maker_order_id: OrderId,
    pub lender: UserId,
    pub borrower: UserId,
    /// Execution price (the maker's price in continuous trading)
    pub unit_price: UnitPrice,
    /// Present value exchanged
    pub amount: u64,
    /// Future value due at maturity
    pub future_value: u64,
    pub taker_side: Side,
    pub sequence: u64,
    /// Settlement step the trade belongs to
    pub step: u64,
}

// ============================================================================
// Order Book
// ============================================================================

/// Opening-auction lifecycle of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItayoseState {
    /// Pre-open: only pre-orders accepted
    NotStarted,
    /// Continuous trading
    Opened,
}

/// Where an order currently lives, for O(1) cancel routing
#[derive(Debug, Clone, Copy)]
enum OrderLocation {
    Resting { side: Side, price: u64 },
    PreOpen,
}

/// Fully-filled maker order retained until cleanup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilledOrder {
    pub order_id: OrderId,
    pub user: UserId,
    pub side: Side,
    pub unit_price: UnitPrice,
    pub filled_amount: u64,
    pub filled_future_value: u64,
}

/// Last traded price of one settlement step
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepPrice {
    pub step: u64,
    pub unit_price: UnitPrice,
}

/// Order book for a single (currency, maturity) market
#[derive(Debug)]
pub struct OrderBook {
    pub currency: Currency,
    pub maturity: Maturity,
    /// First instant continuous trading may open
    pub opening_date: i64,
    /// First instant pre-orders are accepted
    pub pre_opening_date: i64,
    pub lend: PriceLevelBook,
    pub borrow: PriceLevelBook,
    pub itayose_state: ItayoseState,
    /// Price discovered by the opening auction, if any
    pub opening_unit_price: Option<UnitPrice>,
    pre_orders: Vec<BookOrder>,
    order_index: HashMap<OrderId, OrderLocation>,
    /// Last traded price per settlement step, newest at the back
    traded_prices: VecDeque<StepPrice>,
    /// Present value traded in the current step
    step_traded_amount: Option<(u64, u64)>,
    /// Circuit-breaker state for the current step
    pub(crate) breaker: Option<crate::circuit_breaker::StepBreaker>,
    filled_orders: Vec<FilledOrder>,
}

impl OrderBook {
    pub fn new(currency: Currency, maturity: Maturity, opening_date: i64, pre_opening_date: i64) -> Self {
        Self {
            currency,
            maturity,
            opening_date,
            pre_opening_date,
            lend: PriceLevelBook::new(Side::Lend),
            borrow: PriceLevelBook::new(Side::Borrow),
            itayose_state: ItayoseState::NotStarted,
            opening_unit_price: None,
            pre_orders: Vec::new(),
            order_index: HashMap::new(),
            traded_prices: VecDeque::new(),
            step_traded_amount: None,
            breaker: None,
            filled_orders: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.itayose_state == ItayoseState::Opened
    }

    pub fn side(&self, side: Side) -> &PriceLevelBook {
        match side {
            Side::Lend => &self.lend,
            Side::Borrow => &self.borrow,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut PriceLevelBook {
        match side {
            Side::Lend => &mut self.lend,
            Side::Borrow => &mut self.borrow,
        }
    }

    /// Insert a resting order and index it for cancellation
    pub fn insert_resting(&mut self, order: BookOrder) {
        self.order_index.insert(
            order.order_id,
            OrderLocation::Resting {
                side: order.side,
                price: order.unit_price.as_u64(),
            },
        );
        self.side_mut(order.side).insert(order);
    }

    /// Remove a live order by id. Returns the order and whether it was a
    /// pre-order.
    pub fn remove_order(&mut self, order_id: OrderId) -> Option<(BookOrder, bool)> {
        match self.order_index.get(&order_id).copied()? {
            OrderLocation::Resting { side, price } => {
                let order = self.side_mut(side).remove(price, order_id)?;
                self.order_index.remove(&order_id);
                Some((order, false))
            }
            OrderLocation::PreOpen => {
                let position = self.pre_orders.iter().position(|o| o.order_id == order_id)?;
                let order = self.pre_orders.remove(position);
                self.order_index.remove(&order_id);
                Some((order, true))
            }
        }
    }

    /// Owner of a live order, if known
    pub fn order_owner(&self, order_id: OrderId) -> Option<UserId> {
        match self.order_index.get(&order_id).copied()? {
            OrderLocation::Resting { side, price } => self
                .side(side)
                .levels_best_first()
                .find(|(p, _)| *p == price)
                .and_then(|(_, level)| level.orders().find(|o| o.order_id == order_id))
                .map(|o| o.user),
            OrderLocation::PreOpen => self
                .pre_orders
                .iter()
                .find(|o| o.order_id == order_id)
                .map(|o| o.user),
        }
    }

    /// Drop a filled maker from the index and retain its stub
    pub fn retire_filled(&mut self, order: BookOrder) {
        self.order_index.remove(&order.order_id);
        self.filled_orders.push(FilledOrder {
            order_id: order.order_id,
            user: order.user,
            side: order.side,
            unit_price: order.unit_price,
            filled_amount: order.filled_amount,
            filled_future_value: order.filled_future_value,
        });
    }

    /// Take the retained filled-order stubs for one user
    pub fn drain_filled(&mut self, user: UserId) -> Vec<FilledOrder> {
        let (drained, kept) = std::mem::take(&mut self.filled_orders)
            .into_iter()
            .partition(|o| o.user == user);
        self.filled_orders = kept;
        drained
    }

    /// Queue a pre-order for the opening auction
    pub fn queue_pre_order(&mut self, order: BookOrder) {
        self.order_index.insert(order.order_id, OrderLocation::PreOpen);
        self.pre_orders.push(order);
    }

    /// Side of an existing pre-order for the user, if any
    pub fn pre_order_side(&self, user: UserId) -> Option<Side> {
        self.pre_orders.iter().find(|o| o.user == user).map(|o| o.side)
    }

    pub fn pre_orders(&self) -> &[BookOrder] {
        &self.pre_orders
    }

    /// Take the pre-order queue for itayose execution, clearing the index
    pub fn take_pre_orders(&mut self) -> Vec<BookOrder> {
        let orders = std::mem::take(&mut self.pre_orders);
        for order in &orders {
            self.order_index.remove(&order.order_id);
        }
        orders
    }

    /// Record a trade at a step: updates the per-step price ring and the
    /// traded-amount accumulator.
    pub fn record_trade(&mut self, step: u64, unit_price: UnitPrice, amount: u64) {
        match self.traded_prices.back_mut() {
            Some(last) if last.step == step => last.unit_price = unit_price,
            _ => {
                self.traded_prices.push_back(StepPrice { step, unit_price });
                while self.traded_prices.len() > TRADED_PRICE_HISTORY {
                    self.traded_prices.pop_front();
                }
            }
        }
        match &mut self.step_traded_amount {
            Some((s, total)) if *s == step => *total += amount,
            other => *other = Some((step, amount)),
        }
    }

    /// Last traded price of the most recent step strictly before `step`
    pub fn reference_price(&self, step: u64) -> Option<UnitPrice> {
        self.traded_prices
            .iter()
            .rev()
            .find(|p| p.step < step)
            .map(|p| p.unit_price)
    }

    /// Most recent traded price regardless of step
    pub fn last_unit_price(&self) -> Option<UnitPrice> {
        self.traded_prices.back().map(|p| p.unit_price)
    }

    /// Per-step price history, newest first
    pub fn unit_price_history(&self) -> Vec<StepPrice> {
        self.traded_prices.iter().rev().copied().collect()
    }

    /// Present value traded in the given step
    pub fn step_traded_amount(&self, step: u64) -> u64 {
        match self.step_traded_amount {
            Some((s, total)) if s == step => total,
            _ => 0,
        }
    }

    pub fn best_lend_price(&self) -> Option<UnitPrice> {
        self.lend.best_price()
    }

    pub fn best_borrow_price(&self) -> Option<UnitPrice> {
        self.borrow.best_price()
    }

    /// Depth snapshot for market data
    pub fn snapshot(&self, depth: usize) -> OrderBookSnapshot {
        let collect = |side: &PriceLevelBook| {
            side.levels_best_first()
                .take(depth)
                .map(|(price, level)| LevelSnapshot {
                    unit_price: price,
                    amount: level.total_amount(),
                    order_count: level.order_count(),
                })
                .collect()
        };
        OrderBookSnapshot {
            currency: self.currency.clone(),
            maturity: self.maturity,
            lend_levels: collect(&self.lend),
            borrow_levels: collect(&self.borrow),
            last_unit_price: self.last_unit_price(),
            opening_unit_price: self.opening_unit_price,
        }
    }
}

/// Aggregated price level for market data snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub unit_price: u64,
    pub amount: u64,
    pub order_count: usize,
}

/// Order book snapshot for market data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub currency: Currency,
    pub maturity: Maturity,
    /// Best first (highest price)
    pub lend_levels: Vec<LevelSnapshot>,
    /// Best first (lowest price)
    pub borrow_levels: Vec<LevelSnapshot>,
    pub last_unit_price: Option<UnitPrice>,
    pub opening_unit_price: Option<UnitPrice>,
}
