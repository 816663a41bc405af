//! Core matching engine
//!
//! Implements deterministic price-time-priority matching over per
//! (currency, maturity) order books, together with the per-step circuit
//! breaker and the opening auction.
//!
//! Execution is fully serialized: every public operation runs to
//! completion before the next is observed, and either succeeds with its
//! full effect or fails with no state change.

use std::collections::HashMap;
use std::sync::Arc;

use common::{Currency, Maturity, OrderId, OrderType, Side, UnitPrice, UserId, PRICE_SCALE};
use settlement::value;
use tracing::{debug, info, warn};

use crate::circuit_breaker::{
    admissible_band, BootstrapPriceSource, CircuitBreakerConfig, PriceBand, StepBreaker,
};
use crate::domain::{BookOrder, FilledOrder, OrderBook, StepPrice, Trade};
use crate::error::MatchingError;
use crate::event::{EngineEvent, EventJournal};
use crate::itayose;
use crate::metrics::EngineMetrics;
use crate::result::{CancelResult, FillResult, ItayoseResult};
use crate::Result;

/// Largest accepted present-value amount. Keeps every derived future
/// value inside `i64`, so conversion inside a matching walk cannot fail
/// after validation has passed.
pub const MAX_ORDER_AMOUNT: u64 = i64::MAX as u64 / PRICE_SCALE;

/// What a matching walk consumes: a present-value order amount, or a
/// future-value position being unwound
#[derive(Debug, Clone, Copy)]
enum WalkTarget {
    PresentValue(u64),
    FutureValue(u64),
}

struct WalkParams<'a> {
    currency: &'a Currency,
    maturity: Maturity,
    step: u64,
    taker_order_id: OrderId,
    taker_user: UserId,
    taker_side: Side,
    limit: Option<UnitPrice>,
    target: WalkTarget,
}

#[derive(Debug, Default)]
struct WalkOutcome {
    trades: Vec<Trade>,
    filled_pv: u64,
    filled_fv: u64,
    last_price: Option<UnitPrice>,
    triggered: bool,
    remaining_pv: u64,
}

/// Matching engine over all order books
///
/// Owns the books, the global sequence counter, the circuit-breaker
/// configuration, and the bootstrap price collaborator. Deterministic:
/// the same operation stream always produces the same trades.
pub struct MatchingEngine {
    books: HashMap<(Currency, Maturity), OrderBook>,
    sequence: u64,
    cb_config: CircuitBreakerConfig,
    price_source: Arc<dyn BootstrapPriceSource>,
    metrics: EngineMetrics,
    journal: EventJournal,
}

impl MatchingEngine {
    pub fn new(cb_config: CircuitBreakerConfig, price_source: Arc<dyn BootstrapPriceSource>) -> Self {
        Self {
            books: HashMap::new(),
            sequence: 0,
            cb_config,
            price_source,
            metrics: EngineMetrics::new(),
            journal: EventJournal::new(),
        }
    }

    /// Current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Metrics snapshot
    pub fn metrics(&self) -> crate::metrics::MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Event journal
    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    // ------------------------------------------------------------------
    // Book lifecycle
    // ------------------------------------------------------------------

    /// Create an order book for a (currency, maturity) market
    pub fn create_book(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        opening_date: i64,
        pre_opening_date: i64,
    ) -> Result<()> {
        let key = (currency.clone(), maturity);
        if self.books.contains_key(&key) {
            return Err(MatchingError::BookAlreadyExists {
                currency: currency.to_string(),
                maturity: maturity.as_timestamp(),
            });
        }
        self.books.insert(
            key,
            OrderBook::new(currency.clone(), maturity, opening_date, pre_opening_date),
        );
        info!(currency = %currency, maturity = %maturity, "Order book created");
        Ok(())
    }

    /// Remove a book (at rotation), returning it for settlement
    pub fn remove_book(&mut self, currency: &Currency, maturity: Maturity) -> Option<OrderBook> {
        let book = self.books.remove(&(currency.clone(), maturity));
        if book.is_some() {
            info!(currency = %currency, maturity = %maturity, "Order book removed");
            self.update_open_books_gauge();
        }
        book
    }

    pub fn has_book(&self, currency: &Currency, maturity: Maturity) -> bool {
        self.books.contains_key(&(currency.clone(), maturity))
    }

    /// Read access to a book
    pub fn book(&self, currency: &Currency, maturity: Maturity) -> Result<&OrderBook> {
        self.books
            .get(&(currency.clone(), maturity))
            .ok_or_else(|| MatchingError::BookNotFound {
                currency: currency.to_string(),
                maturity: maturity.as_timestamp(),
            })
    }

    fn book_mut(&mut self, currency: &Currency, maturity: Maturity) -> Result<&mut OrderBook> {
        Self::take_book(&mut self.books, currency, maturity)
    }

    /// Field-scoped lookup so callers can keep using the other engine
    /// fields while holding the book
    fn take_book<'a>(
        books: &'a mut HashMap<(Currency, Maturity), OrderBook>,
        currency: &Currency,
        maturity: Maturity,
    ) -> Result<&'a mut OrderBook> {
        books
            .get_mut(&(currency.clone(), maturity))
            .ok_or_else(|| MatchingError::BookNotFound {
                currency: currency.to_string(),
                maturity: maturity.as_timestamp(),
            })
    }

    fn update_open_books_gauge(&self) {
        let open = self.books.values().filter(|b| b.is_open()).count() as u64;
        self.metrics.open_books.set(open);
    }

    // ------------------------------------------------------------------
    // Continuous trading
    // ------------------------------------------------------------------

    /// Submit an order for continuous trading.
    ///
    /// Market orders walk the opposing side until exhausted, the book
    /// empties, or the circuit breaker halts; they never rest. Limit
    /// orders match at prices at least as favorable as the limit and
    /// rest any remainder at the limit price.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_order(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        user: UserId,
        side: Side,
        order_type: OrderType,
        unit_price: u64,
        amount: u64,
        step: u64,
        now: i64,
    ) -> Result<FillResult> {
        self.metrics.orders_received.increment();
        let result =
            self.submit_order_inner(currency, maturity, user, side, order_type, unit_price, amount, step, now);
        match &result {
            Ok(fill) => {
                if fill.has_trades() {
                    self.metrics.orders_matched.increment();
                    for _ in &fill.trades {
                        self.metrics.trades_executed.increment();
                    }
                }
                if fill.circuit_breaker_triggered {
                    self.metrics.circuit_breaker_halts.increment();
                }
            }
            Err(_) => self.metrics.orders_rejected.increment(),
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn submit_order_inner(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        user: UserId,
        side: Side,
        order_type: OrderType,
        unit_price: u64,
        amount: u64,
        step: u64,
        now: i64,
    ) -> Result<FillResult> {
        let limit = Self::validate_order(order_type, unit_price, amount)?;

        debug!(
            currency = %currency,
            maturity = %maturity,
            user = %user,
            side = %side,
            order_type = %order_type,
            unit_price,
            amount,
            step,
            "Matching order"
        );

        let bootstrap = self.price_source.bootstrap_unit_price(currency);
        let book = Self::take_book(&mut self.books, currency, maturity)?;
        Self::check_tradeable(book, now)?;
        Self::ensure_breaker(book, step, &self.cb_config, bootstrap);

        self.sequence += 1;
        let order_sequence = self.sequence;
        let order_id = OrderId::new();

        let outcome = Self::walk(
            book,
            &mut self.sequence,
            WalkParams {
                currency,
                maturity,
                step,
                taker_order_id: order_id,
                taker_user: user,
                taker_side: side,
                limit,
                target: WalkTarget::PresentValue(amount),
            },
        )?;

        let mut remaining_order = None;
        if let Some(limit_price) = limit {
            if outcome.remaining_pv > 0 {
                let resting = BookOrder {
                    order_id,
                    user,
                    side,
                    unit_price: limit_price,
                    amount: outcome.remaining_pv,
                    filled_amount: outcome.filled_pv,
                    filled_future_value: outcome.filled_fv,
                    sequence: order_sequence,
                    timestamp: now,
                };
                book.insert_resting(resting.clone());
                self.journal.append(EngineEvent::OrderAccepted {
                    order_id,
                    currency: currency.clone(),
                    maturity,
                    sequence: order_sequence,
                });
                remaining_order = Some(resting);
            }
        }
        for trade in &outcome.trades {
            self.journal.append(EngineEvent::TradeExecuted {
                trade: trade.clone(),
                sequence: trade.sequence,
            });
        }

        Ok(FillResult {
            order_id,
            filled_amount: outcome.filled_pv,
            filled_amount_fv: outcome.filled_fv,
            last_unit_price: outcome.last_price,
            circuit_breaker_triggered: outcome.triggered,
            remaining_order,
            trades: outcome.trades,
        })
    }

    /// Close an existing future-value position by trading the equivalent
    /// amount on the opposite side at the best available prices, under
    /// the same circuit breaker. May unwind partially.
    pub fn unwind_position(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        user: UserId,
        position_fv: i64,
        step: u64,
        now: i64,
    ) -> Result<FillResult> {
        if position_fv == 0 {
            return Err(MatchingError::InvalidOrder("no position to unwind".into()));
        }
        // a lender sells its claim (acts as borrower); a borrower buys it back
        let taker_side = if position_fv > 0 { Side::Borrow } else { Side::Lend };
        let target_fv = position_fv.unsigned_abs();

        let bootstrap = self.price_source.bootstrap_unit_price(currency);
        let book = Self::take_book(&mut self.books, currency, maturity)?;
        Self::check_tradeable(book, now)?;
        Self::ensure_breaker(book, step, &self.cb_config, bootstrap);

        let order_id = OrderId::new();
        let outcome = Self::walk(
            book,
            &mut self.sequence,
            WalkParams {
                currency,
                maturity,
                step,
                taker_order_id: order_id,
                taker_user: user,
                taker_side,
                limit: None,
                target: WalkTarget::FutureValue(target_fv),
            },
        )?;

        for trade in &outcome.trades {
            self.metrics.trades_executed.increment();
            self.journal.append(EngineEvent::TradeExecuted {
                trade: trade.clone(),
                sequence: trade.sequence,
            });
        }
        if outcome.triggered {
            self.metrics.circuit_breaker_halts.increment();
        }

        Ok(FillResult {
            order_id,
            filled_amount: outcome.filled_pv,
            filled_amount_fv: outcome.filled_fv,
            last_unit_price: outcome.last_price,
            circuit_breaker_triggered: outcome.triggered,
            remaining_order: None,
            trades: outcome.trades,
        })
    }

    /// Cancel a live order by id and owner
    pub fn cancel_order(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        user: UserId,
        order_id: OrderId,
    ) -> Result<CancelResult> {
        let book = self.book_mut(currency, maturity)?;
        let owner = book
            .order_owner(order_id)
            .ok_or(MatchingError::OrderNotFound(order_id))?;
        if owner != user {
            return Err(MatchingError::OrderNotOwned(order_id));
        }
        let (order, was_pre_order) = book
            .remove_order(order_id)
            .ok_or(MatchingError::OrderNotFound(order_id))?;

        self.sequence += 1;
        self.journal.append(EngineEvent::OrderCancelled {
            order_id,
            currency: currency.clone(),
            maturity,
            sequence: self.sequence,
        });
        info!(currency = %currency, maturity = %maturity, order_id = %order_id, "Order cancelled");

        Ok(CancelResult {
            order,
            was_pre_order,
        })
    }

    // ------------------------------------------------------------------
    // Pre-open and auction
    // ------------------------------------------------------------------

    /// Queue a pre-order for the opening auction.
    ///
    /// Pre-orders are limit-only, accepted inside the pre-open window,
    /// and a user may only queue one side per maturity.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_pre_order(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        user: UserId,
        side: Side,
        unit_price: u64,
        amount: u64,
        now: i64,
    ) -> Result<OrderId> {
        let limit = Self::validate_order(OrderType::Limit, unit_price, amount)?
            .ok_or_else(|| MatchingError::Internal("limit order without price".into()))?;

        let book = Self::take_book(&mut self.books, currency, maturity)?;
        if book.is_open() {
            return Err(MatchingError::ItayoseAlreadyExecuted {
                currency: currency.to_string(),
                maturity: maturity.as_timestamp(),
            });
        }
        if now < book.pre_opening_date || now >= book.opening_date {
            return Err(MatchingError::PreOrderWindowClosed {
                currency: currency.to_string(),
                maturity: maturity.as_timestamp(),
            });
        }
        if book.pre_order_side(user) == Some(side.opposite()) {
            return Err(MatchingError::OppositeSidePreOrder);
        }

        self.sequence += 1;
        let order = BookOrder::new(user, side, limit, amount, self.sequence, now);
        let order_id = order.order_id;
        book.queue_pre_order(order);

        self.metrics.pre_orders_received.increment();
        self.journal.append(EngineEvent::OrderAccepted {
            order_id,
            currency: currency.clone(),
            maturity,
            sequence: self.sequence,
        });
        debug!(currency = %currency, maturity = %maturity, order_id = %order_id, "Pre-order queued");
        Ok(order_id)
    }

    /// Run the opening auction and open the book for continuous trading.
    ///
    /// With crossing pre-orders, fills them at the discovered uniform
    /// price and carries the excess onto the book; otherwise the book
    /// opens empty. The opening price, when found, seeds the
    /// circuit-breaker reference and the traded-price history.
    pub fn execute_itayose(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        step: u64,
        now: i64,
    ) -> Result<ItayoseResult> {
        let book = Self::take_book(&mut self.books, currency, maturity)?;
        if book.is_open() {
            return Err(MatchingError::ItayoseAlreadyExecuted {
                currency: currency.to_string(),
                maturity: maturity.as_timestamp(),
            });
        }
        if now < book.opening_date {
            return Err(MatchingError::MarketNotOpen {
                currency: currency.to_string(),
                maturity: maturity.as_timestamp(),
            });
        }

        let pre_orders = book.take_pre_orders();
        let outcome = itayose::run_auction(currency, maturity, step, pre_orders, &mut self.sequence)?;

        let carried_orders = outcome.residual_orders.len();
        for order in outcome.residual_orders {
            book.insert_resting(order);
        }
        book.itayose_state = crate::domain::ItayoseState::Opened;

        if let Some(opening) = outcome.opening {
            book.opening_unit_price = Some(opening.unit_price);
            book.record_trade(step, opening.unit_price, opening.offset_amount);
            book.breaker = Some(StepBreaker::new(
                step,
                Some(admissible_band(opening.unit_price, &self.cb_config)),
            ));
        }

        for trade in &outcome.trades {
            self.metrics.trades_executed.increment();
            self.journal.append(EngineEvent::TradeExecuted {
                trade: trade.clone(),
                sequence: trade.sequence,
            });
        }
        self.sequence += 1;
        self.journal.append(EngineEvent::MarketOpened {
            currency: currency.clone(),
            maturity,
            opening_unit_price: outcome.opening.map(|o| o.unit_price),
            sequence: self.sequence,
        });
        self.update_open_books_gauge();
        info!(
            currency = %currency,
            maturity = %maturity,
            opening_price = ?outcome.opening.map(|o| o.unit_price),
            "Market opened"
        );

        Ok(ItayoseResult {
            opening_unit_price: outcome.opening.map(|o| o.unit_price),
            offset_amount: outcome.opening.map(|o| o.offset_amount).unwrap_or(0),
            total_matched: outcome.total_matched,
            trades: outcome.trades,
            carried_orders,
        })
    }

    // ------------------------------------------------------------------
    // Queries and cleanup
    // ------------------------------------------------------------------

    /// Admissible price band for the step, fixing it if this is the
    /// step's first use
    pub fn circuit_breaker_thresholds(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        step: u64,
    ) -> Result<Option<PriceBand>> {
        let bootstrap = self.price_source.bootstrap_unit_price(currency);
        let cb_config = self.cb_config.clone();
        let book = self.book_mut(currency, maturity)?;
        Self::ensure_breaker(book, step, &cb_config, bootstrap);
        Ok(book.breaker.and_then(|b| b.band))
    }

    /// Per-step traded-price history, newest first
    pub fn unit_price_history(&self, currency: &Currency, maturity: Maturity) -> Result<Vec<StepPrice>> {
        Ok(self.book(currency, maturity)?.unit_price_history())
    }

    /// Take the filled-order stubs retained for a user on one book
    pub fn drain_filled_orders(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        user: UserId,
    ) -> Result<Vec<FilledOrder>> {
        Ok(self.book_mut(currency, maturity)?.drain_filled(user))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn validate_order(order_type: OrderType, unit_price: u64, amount: u64) -> Result<Option<UnitPrice>> {
        if amount == 0 {
            return Err(MatchingError::InvalidOrder("amount must be positive".into()));
        }
        if amount > MAX_ORDER_AMOUNT {
            return Err(MatchingError::InvalidOrder(format!(
                "amount exceeds maximum {MAX_ORDER_AMOUNT}"
            )));
        }
        match order_type {
            OrderType::Market => Ok(None),
            OrderType::Limit => UnitPrice::try_new(unit_price)
                .map(Some)
                .ok_or_else(|| {
                    MatchingError::InvalidOrder(format!("unit price out of range: {unit_price}"))
                }),
        }
    }

    fn check_tradeable(book: &OrderBook, now: i64) -> Result<()> {
        if !book.is_open() {
            return Err(MatchingError::MarketNotOpen {
                currency: book.currency.to_string(),
                maturity: book.maturity.as_timestamp(),
            });
        }
        if book.maturity.is_matured(now) {
            return Err(MatchingError::MarketMatured {
                currency: book.currency.to_string(),
                maturity: book.maturity.as_timestamp(),
            });
        }
        Ok(())
    }

    /// Fix the breaker band on the step's first use. The reference is
    /// the previous step's last traded price, falling back to the
    /// bootstrap conversion value for never-traded books.
    fn ensure_breaker(
        book: &mut OrderBook,
        step: u64,
        config: &CircuitBreakerConfig,
        bootstrap: Option<UnitPrice>,
    ) {
        let stale = book.breaker.map_or(true, |b| b.step != step);
        if stale {
            let reference = book.reference_price(step).or(bootstrap);
            if reference.is_none() {
                debug!(
                    currency = %book.currency,
                    maturity = %book.maturity,
                    step,
                    "No breaker reference available; step is unbounded"
                );
            }
            let band = reference.map(|r| admissible_band(r, config));
            book.breaker = Some(StepBreaker::new(step, band));
        }
    }

    /// Price-time-priority walk over the opposing side.
    ///
    /// Stops when the target is exhausted, the book empties, the limit
    /// stops crossing, or the circuit breaker halts consumption.
    fn walk(book: &mut OrderBook, sequence: &mut u64, params: WalkParams<'_>) -> Result<WalkOutcome> {
        let opposing = params.taker_side.opposite();
        let mut outcome = WalkOutcome::default();
        let (mut remaining_pv, mut remaining_fv) = match params.target {
            WalkTarget::PresentValue(pv) => (pv, 0),
            WalkTarget::FutureValue(fv) => (0, fv),
        };

        loop {
            let exhausted = match params.target {
                WalkTarget::PresentValue(_) => remaining_pv == 0,
                WalkTarget::FutureValue(_) => remaining_fv == 0,
            };
            if exhausted {
                break;
            }

            let Some(level_price) = book.side(opposing).best_price() else {
                break;
            };
            if let Some(limit) = params.limit {
                let crosses = match params.taker_side {
                    Side::Lend => level_price <= limit,
                    Side::Borrow => level_price >= limit,
                };
                if !crosses {
                    break;
                }
            }
            if !book.breaker.map_or(true, |b| b.admits(level_price)) {
                outcome.triggered = true;
                if let Some(breaker) = book.breaker.as_mut() {
                    breaker.triggered = true;
                }
                warn!(
                    currency = %params.currency,
                    maturity = %params.maturity,
                    step = params.step,
                    level_price = %level_price,
                    "Circuit breaker halted consumption"
                );
                break;
            }

            let Some((_, level)) = book.side_mut(opposing).best_level_mut() else {
                break;
            };
            let Some(front) = level.front() else {
                break;
            };
            let maker_id = front.order_id;
            let maker_user = front.user;
            let maker_amount = front.amount;

            // per-tick amounts, rounding applied per fill
            let (take_pv, take_fv) = match params.target {
                WalkTarget::PresentValue(_) => {
                    let pv = remaining_pv.min(maker_amount);
                    (pv, value::present_to_future(pv, level_price)?)
                }
                WalkTarget::FutureValue(_) => {
                    let maker_fv = value::present_to_future(maker_amount, level_price)?;
                    if maker_fv <= remaining_fv {
                        (maker_amount, maker_fv)
                    } else {
                        let pv = value::future_to_present(remaining_fv, level_price)?;
                        (pv, value::present_to_future(pv, level_price)?)
                    }
                }
            };
            if take_pv == 0 {
                // the residual target is dust below one price unit
                break;
            }

            if let Some(filled_maker) = level.consume_front(take_pv, take_fv) {
                book.retire_filled(filled_maker);
            }
            book.side_mut(opposing).cleanup_empty_levels();

            *sequence += 1;
            let (lender, borrower) = match params.taker_side {
                Side::Lend => (params.taker_user, maker_user),
                Side::Borrow => (maker_user, params.taker_user),
            };
            outcome.trades.push(Trade {
                trade_id: uuid::Uuid::new_v4(),
                currency: params.currency.clone(),
                maturity: params.maturity,
                taker_order_id: params.taker_order_id,
                maker_order_id: maker_id,
                lender,
                borrower,
                unit_price: level_price,
                amount: take_pv,
                future_value: take_fv,
                taker_side: params.taker_side,
                sequence: *sequence,
                step: params.step,
            });
            book.record_trade(params.step, level_price, take_pv);

            outcome.filled_pv += take_pv;
            outcome.filled_fv += take_fv;
            outcome.last_price = Some(level_price);
            remaining_pv = remaining_pv.saturating_sub(take_pv);
            remaining_fv = remaining_fv.saturating_sub(take_fv);
        }

        outcome.remaining_pv = remaining_pv;
        Ok(outcome)
    }
}

// ============================================================================
// Tests
// ============================================================================
