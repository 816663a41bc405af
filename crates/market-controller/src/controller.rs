//! Market controller
//!
//! Orchestrates the matrix of (currency, maturity) order books: routes
//! order flow, applies position deltas for both parties of every trade,
//! advances the settlement-step counter, and drives auto-roll through
//! the genesis-value vault when a maturity closes.
//!
//! Each currency rotates its maturities through a fixed ring of
//! order-book slots; a slot is reused only after its prior maturity has
//! been rotated out.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use common::{Currency, Maturity, OrderId, OrderType, Side, UnitPrice, UserId};
use matching_engine::{
    BootstrapPriceSource, CancelResult, CircuitBreakerConfig, EventJournal, FillResult,
    ItayoseResult, MatchingEngine, MetricsSnapshot, OrderBookSnapshot, PriceBand, StepPrice, Trade,
};
use settlement::genesis::MaturityUnitPriceRecord;
use settlement::{value, GenesisValueVault};
use tracing::{debug, info, warn};

use crate::error::ControllerError;
use crate::position::PositionStore;
use crate::Result;

/// Outcome of rotating one maturity out of a currency
#[derive(Debug)]
pub struct RotationResult {
    pub matured: Maturity,
    pub closing_unit_price: UnitPrice,
    pub compound_factor: u128,
    /// Positions migrated into genesis balances
    pub migrated_positions: usize,
    pub next_active: Option<Maturity>,
    /// Opening auction run for the successor, when its time had come
    pub itayose: Option<ItayoseResult>,
}

/// Per-currency ring of order-book slots
#[derive(Debug)]
struct CurrencyMarkets {
    slots: Vec<Option<Maturity>>,
    next_slot: usize,
    /// Listed maturities, nearest first
    maturities: VecDeque<Maturity>,
}

impl CurrencyMarkets {
    fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
            next_slot: 0,
            maturities: VecDeque::new(),
        }
    }

    fn next_slot_free(&self) -> bool {
        self.slots[self.next_slot].is_none()
    }

    fn occupy(&mut self, maturity: Maturity) {
        self.slots[self.next_slot] = Some(maturity);
        self.next_slot = (self.next_slot + 1) % self.slots.len();
        self.maturities.push_back(maturity);
    }

    fn release(&mut self, maturity: Maturity) {
        for slot in self.slots.iter_mut() {
            if *slot == Some(maturity) {
                *slot = None;
            }
        }
        if self.maturities.front() == Some(&maturity) {
            self.maturities.pop_front();
        }
    }
}

/// Orchestration layer over the matching engine and the vault
///
/// Owns all shared mutable state; callers interact only through these
/// operations, which run serialized to completion.
pub struct MarketController {
    engine: MatchingEngine,
    vault: GenesisValueVault,
    positions: PositionStore,
    markets: HashMap<Currency, CurrencyMarkets>,
    price_source: Arc<dyn BootstrapPriceSource>,
    order_book_slots: usize,
    depth_levels: usize,
    current_step: u64,
    current_time: i64,
}

impl MarketController {
    pub fn new(
        cb_config: CircuitBreakerConfig,
        order_book_slots: usize,
        depth_levels: usize,
        price_source: Arc<dyn BootstrapPriceSource>,
    ) -> Self {
        Self {
            engine: MatchingEngine::new(cb_config, price_source.clone()),
            vault: GenesisValueVault::new(),
            positions: PositionStore::new(),
            markets: HashMap::new(),
            price_source,
            order_book_slots: order_book_slots.max(1),
            depth_levels,
            current_step: 0,
            current_time: 0,
        }
    }

    /// Build a controller from a validated configuration
    pub fn from_config(config: &config::MasterConfig) -> Self {
        let source = Arc::new(crate::price_source::StaticPriceSource::from_config(config));
        Self::new(
            CircuitBreakerConfig::from(&config.circuit_breaker),
            config.market.order_book_slots,
            config.market.depth_levels,
            source,
        )
    }

    // ------------------------------------------------------------------
    // Clock and settlement steps
    // ------------------------------------------------------------------

    /// Advance to the next settlement step; circuit-breaker bands are
    /// re-derived on each step's first order
    pub fn advance_step(&mut self) -> u64 {
        self.current_step += 1;
        debug!(step = self.current_step, "Settlement step advanced");
        self.current_step
    }

    pub fn step(&self) -> u64 {
        self.current_step
    }

    /// Set the controller clock (Unix seconds)
    pub fn set_time(&mut self, now: i64) {
        if now < self.current_time {
            warn!(now, current = self.current_time, "Clock moved backwards");
        }
        self.current_time = now;
    }

    pub fn time(&self) -> i64 {
        self.current_time
    }

    // ------------------------------------------------------------------
    // Market lifecycle
    // ------------------------------------------------------------------

    /// List a new maturity for a currency, claiming the next order-book
    /// slot in the ring
    pub fn create_order_book(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        opening_date: i64,
        pre_opening_date: i64,
    ) -> Result<()> {
        let slot_count = self.order_book_slots;
        let markets = self
            .markets
            .entry(currency.clone())
            .or_insert_with(|| CurrencyMarkets::new(slot_count));
        if let Some(&last) = markets.maturities.back() {
            if maturity <= last {
                return Err(ControllerError::NonChronologicalMaturity {
                    currency: currency.to_string(),
                    maturity: maturity.as_timestamp(),
                });
            }
        }
        if !markets.next_slot_free() {
            return Err(ControllerError::SlotsExhausted(currency.to_string()));
        }

        self.engine
            .create_book(currency, maturity, opening_date, pre_opening_date)?;
        self.markets
            .get_mut(currency)
            .ok_or_else(|| ControllerError::Internal("currency markets vanished".into()))?
            .occupy(maturity);
        Ok(())
    }

    /// Maturities currently listed for a currency, nearest first
    pub fn maturities(&self, currency: &Currency) -> Vec<Maturity> {
        self.markets
            .get(currency)
            .map(|m| m.maturities.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The nearest listed maturity
    pub fn active_maturity(&self, currency: &Currency) -> Option<Maturity> {
        self.markets
            .get(currency)?
            .maturities
            .front()
            .copied()
    }

    // ------------------------------------------------------------------
    // Order flow
    // ------------------------------------------------------------------

    /// Submit an order for continuous trading and settle both parties
    /// of every resulting trade
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
    ) -> Result<FillResult> {
        let result = self.engine.submit_order(
            currency,
            maturity,
            user,
            side,
            order_type,
            unit_price,
            amount,
            self.current_step,
            self.current_time,
        )?;
        self.apply_trades(&result.trades);
        Ok(result)
    }

    /// Queue a pre-order for a maturity's opening auction
    pub fn submit_pre_order(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        user: UserId,
        side: Side,
        unit_price: u64,
        amount: u64,
    ) -> Result<OrderId> {
        Ok(self.engine.submit_pre_order(
            currency,
            maturity,
            user,
            side,
            unit_price,
            amount,
            self.current_time,
        )?)
    }

    /// Cancel a live order by id and owner
    pub fn cancel_order(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        user: UserId,
        order_id: OrderId,
    ) -> Result<CancelResult> {
        Ok(self.engine.cancel_order(currency, maturity, user, order_id)?)
    }

    /// Close the user's position at a maturity against the live book.
    /// May unwind partially when the circuit breaker halts consumption.
    pub fn unwind_position(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        user: UserId,
    ) -> Result<FillResult> {
        let fv = self.positions.get(currency, maturity, user);
        let fv = i64::try_from(fv)
            .map_err(|_| ControllerError::Internal("position exceeds i64".into()))?;
        let result = self.engine.unwind_position(
            currency,
            maturity,
            user,
            fv,
            self.current_step,
            self.current_time,
        )?;
        self.apply_trades(&result.trades);
        Ok(result)
    }

    /// Run the opening auction for a maturity and settle its trades
    pub fn execute_itayose_call(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
    ) -> Result<ItayoseResult> {
        let result =
            self.engine
                .execute_itayose(currency, maturity, self.current_step, self.current_time)?;
        self.apply_trades(&result.trades);
        Ok(result)
    }

    /// Sweep a user's filled-order stubs across the currency's books.
    /// Idempotent: a second call finds nothing.
    pub fn clean_up_orders(&mut self, currency: &Currency, user: UserId) -> Result<usize> {
        let maturities = self.maturities(currency);
        let mut swept = 0;
        for maturity in maturities {
            swept += self
                .engine
                .drain_filled_orders(currency, maturity, user)?
                .len();
        }
        debug!(currency = %currency, user = %user, swept, "Filled orders swept");
        Ok(swept)
    }

    // ------------------------------------------------------------------
    // Auto-roll
    // ------------------------------------------------------------------

    /// Rotate the currency's matured nearest maturity: record its
    /// closing price, migrate every open position into genesis units,
    /// retire the book, and open the successor when its time has come.
    ///
    /// Advances exactly one maturity per call; safe to call repeatedly
    /// to catch up several missed maturities.
    pub fn rotate_maturity(&mut self, currency: &Currency) -> Result<RotationResult> {
        let markets = self
            .markets
            .get(currency)
            .ok_or_else(|| ControllerError::NoActiveMaturity(currency.to_string()))?;
        let active = *markets
            .maturities
            .front()
            .ok_or_else(|| ControllerError::NoActiveMaturity(currency.to_string()))?;
        if !active.is_matured(self.current_time) {
            return Err(ControllerError::MarketNotMatured {
                currency: currency.to_string(),
                maturity: active.as_timestamp(),
            });
        }
        let next = markets
            .maturities
            .get(1)
            .copied()
            .ok_or_else(|| ControllerError::NoNextMaturity(currency.to_string()))?;

        // closing price: last traded on the maturing book, else the
        // successor's opening auction price
        let closing_unit_price = self
            .engine
            .book(currency, active)?
            .last_unit_price()
            .or_else(|| {
                self.engine
                    .book(currency, next)
                    .ok()
                    .and_then(|b| b.opening_unit_price)
            })
            .ok_or(ControllerError::NoClosingPrice {
                currency: currency.to_string(),
                maturity: active.as_timestamp(),
            })?;

        let compound_factor = self
            .vault
            .record_maturity(currency, active, closing_unit_price)?;

        let migrated = self.positions.take_all(currency, active);
        let migrated_positions = migrated.len();
        for (user, fv) in migrated {
            let fv = i64::try_from(fv)
                .map_err(|_| ControllerError::Internal("position exceeds i64".into()))?;
            self.vault.migrate_future_value(currency, user, active, fv)?;
        }

        self.engine.remove_book(currency, active);
        self.markets
            .get_mut(currency)
            .ok_or_else(|| ControllerError::Internal("currency markets vanished".into()))?
            .release(active);

        // open the successor if it is due and still pre-open
        let mut itayose = None;
        if let Ok(book) = self.engine.book(currency, next) {
            if !book.is_open() && self.current_time >= book.opening_date {
                itayose = Some(self.execute_itayose_call(currency, next)?);
            }
        }

        info!(
            currency = %currency,
            matured = %active,
            closing_unit_price = %closing_unit_price,
            compound_factor,
            migrated_positions,
            next_active = %next,
            "Maturity rotated"
        );

        Ok(RotationResult {
            matured: active,
            closing_unit_price,
            compound_factor,
            migrated_positions,
            next_active: Some(next),
            itayose,
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// A user's future value at a maturity. At the currency's active
    /// maturity this includes the genesis carry from rolled positions.
    pub fn position(&self, currency: &Currency, maturity: Maturity, user: UserId) -> Result<i128> {
        let mut fv = self.positions.get(currency, maturity, user);
        if self.active_maturity(currency) == Some(maturity) {
            if let Some(latest) = self.vault.latest_maturity(currency) {
                fv += self.vault.future_value_of(currency, user, latest)? as i128;
            }
        }
        Ok(fv)
    }

    /// Raw genesis-unit balance carried across rolls
    pub fn genesis_value(&self, currency: &Currency, user: UserId) -> i128 {
        self.vault.balance(currency, user)
    }

    /// The currency's maturity chain of closing records, oldest first
    pub fn genesis_records(&self, currency: &Currency) -> Vec<&MaturityUnitPriceRecord> {
        self.vault.maturity_chain(currency)
    }

    /// A user's aggregate position across all listed maturities of a
    /// currency, in present-value terms. Marks each maturity at its last
    /// traded price, falling back to the bootstrap value, then par.
    /// Callers own any withdrawal-limit clamping policy; none is applied
    /// here.
    pub fn total_present_value(&self, currency: &Currency, user: UserId) -> Result<i128> {
        let mut total = 0i128;
        for maturity in self.maturities(currency) {
            let fv = self.position(currency, maturity, user)?;
            if fv == 0 {
                continue;
            }
            let fv = i64::try_from(fv)
                .map_err(|_| ControllerError::Internal("position exceeds i64".into()))?;
            let mark = self.mark_price(currency, maturity);
            total += value::future_to_present_signed(fv, mark)? as i128;
        }
        Ok(total)
    }

    fn mark_price(&self, currency: &Currency, maturity: Maturity) -> UnitPrice {
        self.engine
            .book(currency, maturity)
            .ok()
            .and_then(|b| b.last_unit_price())
            .or_else(|| self.price_source.bootstrap_unit_price(currency))
            .unwrap_or(UnitPrice::PAR)
    }

    /// Admissible price band for the current step
    pub fn circuit_breaker_thresholds(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
    ) -> Result<Option<PriceBand>> {
        Ok(self
            .engine
            .circuit_breaker_thresholds(currency, maturity, self.current_step)?)
    }

    /// Per-step traded-price history, newest first
    pub fn block_unit_price_history(
        &self,
        currency: &Currency,
        maturity: Maturity,
    ) -> Result<Vec<StepPrice>> {
        Ok(self.engine.unit_price_history(currency, maturity)?)
    }

    /// Book depth snapshot
    pub fn order_book_snapshot(
        &self,
        currency: &Currency,
        maturity: Maturity,
    ) -> Result<OrderBookSnapshot> {
        Ok(self.engine.book(currency, maturity)?.snapshot(self.depth_levels))
    }

    /// Engine counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.engine.metrics()
    }

    /// Engine event journal
    pub fn journal(&self) -> &EventJournal {
        self.engine.journal()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Credit the lender and debit the borrower of every trade with the
    /// same future value; conservation is exact by construction.
    fn apply_trades(&mut self, trades: &[Trade]) {
        for trade in trades {
            let fv = trade.future_value as i128;
            self.positions
                .apply(&trade.currency, trade.maturity, trade.lender, fv);
            self.positions
                .apply(&trade.currency, trade.maturity, trade.borrower, -fv);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_source::StaticPriceSource;
    use assert_matches::assert_matches;

    fn ccy() -> Currency {
        Currency::new("USDC")
    }

    fn controller_with_slots(slots: usize) -> MarketController {
        let source = Arc::new(
            StaticPriceSource::new().with_price(ccy(), UnitPrice::try_new(8_000).unwrap()),
        );
        MarketController::new(CircuitBreakerConfig::default(), slots, 50, source)
    }

    #[test]
    fn test_maturities_must_be_chronological() {
        let mut controller = controller_with_slots(4);
        controller
            .create_order_book(&ccy(), Maturity::from_timestamp(2_000), 100, 0)
            .unwrap();
        assert_matches!(
            controller.create_order_book(&ccy(), Maturity::from_timestamp(1_000), 100, 0),
            Err(ControllerError::NonChronologicalMaturity { .. })
        );
    }

    #[test]
    fn test_slot_ring_blocks_until_rotation() {
        let mut controller = controller_with_slots(2);
        controller
            .create_order_book(&ccy(), Maturity::from_timestamp(1_000), 100, 0)
            .unwrap();
        controller
            .create_order_book(&ccy(), Maturity::from_timestamp(2_000), 100, 0)
            .unwrap();
        assert_matches!(
            controller.create_order_book(&ccy(), Maturity::from_timestamp(3_000), 100, 0),
            Err(ControllerError::SlotsExhausted(_))
        );
    }

    #[test]
    fn test_rotation_requires_matured_active() {
        let mut controller = controller_with_slots(4);
        controller
            .create_order_book(&ccy(), Maturity::from_timestamp(1_000), 100, 0)
            .unwrap();
        controller
            .create_order_book(&ccy(), Maturity::from_timestamp(2_000), 100, 0)
            .unwrap();
        controller.set_time(500);
        assert_matches!(
            controller.rotate_maturity(&ccy()),
            Err(ControllerError::MarketNotMatured { .. })
        );
    }

    #[test]
    fn test_rotation_requires_successor() {
        let mut controller = controller_with_slots(4);
        controller
            .create_order_book(&ccy(), Maturity::from_timestamp(1_000), 100, 0)
            .unwrap();
        controller.set_time(1_000);
        assert_matches!(
            controller.rotate_maturity(&ccy()),
            Err(ControllerError::NoNextMaturity(_))
        );
    }

    #[test]
    fn test_unknown_currency_has_no_active_maturity() {
        let mut controller = controller_with_slots(4);
        assert_matches!(
            controller.rotate_maturity(&Currency::new("JPY")),
            Err(ControllerError::NoActiveMaturity(_))
        );
        assert!(controller.active_maturity(&Currency::new("JPY")).is_none());
    }
}
