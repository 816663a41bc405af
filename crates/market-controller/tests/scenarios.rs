//! End-to-end scenarios across matching, auction, positions, and roll

use std::sync::Arc;

use common::{Currency, Maturity, OrderType, Side, UnitPrice, UserId};
use market_controller::{ControllerError, MarketController, StaticPriceSource};
use matching_engine::CircuitBreakerConfig;

const OPENING: i64 = 100;

fn ccy() -> Currency {
    Currency::new("USDC")
}

fn price(raw: u64) -> UnitPrice {
    UnitPrice::try_new(raw).unwrap()
}

fn controller() -> MarketController {
    let source = Arc::new(StaticPriceSource::new().with_price(ccy(), price(8_000)));
    MarketController::new(CircuitBreakerConfig::default(), 4, 50, source)
}

/// Create and open (empty auction) a market maturing at `maturity_ts`
fn open_market(controller: &mut MarketController, maturity_ts: i64) -> Maturity {
    let maturity = Maturity::from_timestamp(maturity_ts);
    controller
        .create_order_book(&ccy(), maturity, OPENING, 0)
        .unwrap();
    if controller.time() < OPENING {
        controller.set_time(OPENING);
    }
    controller.execute_itayose_call(&ccy(), maturity).unwrap();
    maturity
}

#[test]
fn scenario_a_full_match_creates_opposite_positions() {
    let mut controller = controller();
    let maturity = open_market(&mut controller, 10_000);
    let lender = UserId::new();
    let borrower = UserId::new();

    controller
        .submit_order(&ccy(), maturity, lender, Side::Lend, OrderType::Limit, 8_000, 100_000)
        .unwrap();
    let fill = controller
        .submit_order(&ccy(), maturity, borrower, Side::Borrow, OrderType::Market, 0, 100_000)
        .unwrap();

    assert_eq!(fill.filled_amount, 100_000);
    assert_eq!(fill.filled_amount_fv, 125_000);
    assert_eq!(controller.position(&ccy(), maturity, lender).unwrap(), 125_000);
    assert_eq!(controller.position(&ccy(), maturity, borrower).unwrap(), -125_000);
}

#[test]
fn scenario_b_itayose_price_discovery() {
    let mut controller = controller();
    let maturity = Maturity::from_timestamp(10_000);
    controller
        .create_order_book(&ccy(), maturity, OPENING, 0)
        .unwrap();
    controller.set_time(10);

    let users: Vec<UserId> = (0..4).map(|_| UserId::new()).collect();
    controller
        .submit_pre_order(&ccy(), maturity, users[0], Side::Borrow, 8_500, 300_000)
        .unwrap();
    controller
        .submit_pre_order(&ccy(), maturity, users[1], Side::Borrow, 8_000, 100_000)
        .unwrap();
    controller
        .submit_pre_order(&ccy(), maturity, users[2], Side::Lend, 8_300, 200_000)
        .unwrap();
    controller
        .submit_pre_order(&ccy(), maturity, users[3], Side::Lend, 7_800, 300_000)
        .unwrap();

    controller.set_time(OPENING);
    let result = controller.execute_itayose_call(&ccy(), maturity).unwrap();

    assert_eq!(result.opening_unit_price.unwrap().as_u64(), 8_300);
    assert_eq!(result.total_matched, 200_000);

    // uniform-price fills settle zero-sum positions
    let total: i128 = users
        .iter()
        .map(|&u| controller.position(&ccy(), maturity, u).unwrap())
        .sum();
    assert_eq!(total, 0);

    // the opening price seeds the traded-price history
    let history = controller.block_unit_price_history(&ccy(), maturity).unwrap();
    assert_eq!(history[0].unit_price.as_u64(), 8_300);
}

#[test]
fn scenario_c_auto_roll_compounds_across_maturities() {
    let mut controller = controller();
    let m1 = open_market(&mut controller, 1_000);
    let m2 = open_market(&mut controller, 2_000);
    let m3 = open_market(&mut controller, 3_000);

    let lender = UserId::new();
    let borrower = UserId::new();
    controller
        .submit_order(&ccy(), m1, lender, Side::Lend, OrderType::Limit, 8_000, 100_000)
        .unwrap();
    controller
        .submit_order(&ccy(), m1, borrower, Side::Borrow, OrderType::Market, 0, 100_000)
        .unwrap();
    assert_eq!(controller.position(&ccy(), m1, lender).unwrap(), 125_000);

    // first roll at closing price 8000: compound factor 10000 -> 12500
    controller.set_time(1_000);
    let rotation = controller.rotate_maturity(&ccy()).unwrap();
    assert_eq!(rotation.closing_unit_price.as_u64(), 8_000);
    assert_eq!(rotation.compound_factor, 12_500);
    assert_eq!(rotation.migrated_positions, 2);
    assert_eq!(controller.genesis_value(&ccy(), lender), 100_000);
    assert_eq!(controller.genesis_value(&ccy(), borrower), -100_000);

    // the carried position is visible at the new active maturity
    assert_eq!(controller.position(&ccy(), m2, lender).unwrap(), 125_000);

    // trade m2 at 8000 so the second roll closes at the same price
    let helper_lend = UserId::new();
    let helper_borrow = UserId::new();
    controller
        .submit_order(&ccy(), m2, helper_lend, Side::Lend, OrderType::Limit, 8_000, 10_000)
        .unwrap();
    controller
        .submit_order(&ccy(), m2, helper_borrow, Side::Borrow, OrderType::Market, 0, 10_000)
        .unwrap();

    // second roll: compound factor 12500 -> 15625
    controller.set_time(2_000);
    let rotation = controller.rotate_maturity(&ccy()).unwrap();
    assert_eq!(rotation.compound_factor, 15_625);

    // 125000 * 15625 / 12500
    assert_eq!(controller.position(&ccy(), m3, lender).unwrap(), 156_250);
    assert_eq!(controller.position(&ccy(), m3, borrower).unwrap(), -156_250);

    let factors: Vec<u128> = controller
        .genesis_records(&ccy())
        .iter()
        .map(|r| r.compound_factor)
        .collect();
    assert_eq!(factors, vec![12_500, 15_625]);
}

#[test]
fn rolling_without_positions_only_advances_the_chain() {
    let mut controller = controller();
    let m1 = open_market(&mut controller, 1_000);
    let _m2 = open_market(&mut controller, 2_000);

    // price the maturing book without leaving positions open: trade and
    // fully unwind both sides
    let a = UserId::new();
    let b = UserId::new();
    controller
        .submit_order(&ccy(), m1, a, Side::Lend, OrderType::Limit, 8_000, 50_000)
        .unwrap();
    controller
        .submit_order(&ccy(), m1, b, Side::Borrow, OrderType::Market, 0, 50_000)
        .unwrap();
    controller
        .submit_order(&ccy(), m1, a, Side::Borrow, OrderType::Limit, 8_000, 50_000)
        .unwrap();
    controller
        .submit_order(&ccy(), m1, b, Side::Lend, OrderType::Market, 0, 50_000)
        .unwrap();
    assert_eq!(controller.position(&ccy(), m1, a).unwrap(), 0);
    assert_eq!(controller.position(&ccy(), m1, b).unwrap(), 0);

    controller.set_time(1_000);
    let rotation = controller.rotate_maturity(&ccy()).unwrap();
    assert_eq!(rotation.migrated_positions, 0);
    assert_eq!(controller.genesis_value(&ccy(), a), 0);
    assert_eq!(controller.genesis_value(&ccy(), b), 0);
    assert_eq!(controller.genesis_records(&ccy()).len(), 1);
}

#[test]
fn rotation_falls_back_to_successor_opening_price() {
    let mut controller = controller();
    let m1 = Maturity::from_timestamp(1_000);
    let m2 = Maturity::from_timestamp(2_000);
    controller.create_order_book(&ccy(), m1, OPENING, 0).unwrap();
    controller.create_order_book(&ccy(), m2, OPENING, 0).unwrap();

    // the successor discovers 8200 at its auction; m1 never trades
    let lender = UserId::new();
    let borrower = UserId::new();
    controller.set_time(10);
    controller
        .submit_pre_order(&ccy(), m2, lender, Side::Lend, 8_200, 100_000)
        .unwrap();
    controller
        .submit_pre_order(&ccy(), m2, borrower, Side::Borrow, 8_200, 100_000)
        .unwrap();
    controller.set_time(OPENING);
    controller.execute_itayose_call(&ccy(), m1).unwrap();
    controller.execute_itayose_call(&ccy(), m2).unwrap();

    controller.set_time(1_000);
    let rotation = controller.rotate_maturity(&ccy()).unwrap();
    assert_eq!(rotation.closing_unit_price.as_u64(), 8_200);
}

#[test]
fn rotation_without_any_price_fails_cleanly() {
    let mut controller = controller();
    let _m1 = open_market(&mut controller, 1_000);
    let _m2 = open_market(&mut controller, 2_000);

    controller.set_time(1_000);
    let err = controller.rotate_maturity(&ccy()).unwrap_err();
    assert!(matches!(err, ControllerError::NoClosingPrice { .. }));
    // nothing was recorded
    assert!(controller.genesis_records(&ccy()).is_empty());
}

#[test]
fn rotation_catches_up_one_maturity_per_call() {
    let mut controller = controller();
    let m1 = open_market(&mut controller, 1_000);
    let m2 = open_market(&mut controller, 2_000);
    let m3 = open_market(&mut controller, 3_000);

    for maturity in [m1, m2] {
        let a = UserId::new();
        controller
            .submit_order(&ccy(), maturity, a, Side::Lend, OrderType::Limit, 8_000, 10_000)
            .unwrap();
        controller
            .submit_order(&ccy(), maturity, UserId::new(), Side::Borrow, OrderType::Market, 0, 10_000)
            .unwrap();
    }

    // both m1 and m2 are long matured; each call advances exactly one
    controller.set_time(5_000);
    controller.rotate_maturity(&ccy()).unwrap();
    assert_eq!(controller.active_maturity(&ccy()), Some(m2));
    controller.rotate_maturity(&ccy()).unwrap();
    assert_eq!(controller.active_maturity(&ccy()), Some(m3));
    // m3 has no successor to roll into
    assert!(matches!(
        controller.rotate_maturity(&ccy()),
        Err(ControllerError::NoNextMaturity(_))
    ));
}

#[test]
fn slot_is_reusable_after_rotation() {
    let source = Arc::new(StaticPriceSource::new().with_price(ccy(), price(8_000)));
    let mut controller = MarketController::new(CircuitBreakerConfig::default(), 2, 50, source);

    let m1 = Maturity::from_timestamp(1_000);
    let m2 = Maturity::from_timestamp(2_000);
    controller.create_order_book(&ccy(), m1, OPENING, 0).unwrap();
    controller.create_order_book(&ccy(), m2, OPENING, 0).unwrap();
    controller.set_time(OPENING);
    controller.execute_itayose_call(&ccy(), m1).unwrap();
    controller.execute_itayose_call(&ccy(), m2).unwrap();

    controller
        .submit_order(&ccy(), m1, UserId::new(), Side::Lend, OrderType::Limit, 8_000, 10_000)
        .unwrap();
    controller
        .submit_order(&ccy(), m1, UserId::new(), Side::Borrow, OrderType::Market, 0, 10_000)
        .unwrap();

    // ring full until the matured slot is rotated out
    assert!(matches!(
        controller.create_order_book(&ccy(), Maturity::from_timestamp(3_000), OPENING, 0),
        Err(ControllerError::SlotsExhausted(_))
    ));
    controller.set_time(1_000);
    controller.rotate_maturity(&ccy()).unwrap();
    controller
        .create_order_book(&ccy(), Maturity::from_timestamp(3_000), 1_500, 1_100)
        .unwrap();
}

#[test]
fn unwind_closes_a_position_through_the_controller() {
    let mut controller = controller();
    let maturity = open_market(&mut controller, 10_000);
    let lender = UserId::new();
    let borrower = UserId::new();

    controller
        .submit_order(&ccy(), maturity, lender, Side::Lend, OrderType::Limit, 8_000, 100_000)
        .unwrap();
    controller
        .submit_order(&ccy(), maturity, borrower, Side::Borrow, OrderType::Market, 0, 100_000)
        .unwrap();
    assert_eq!(controller.position(&ccy(), maturity, borrower).unwrap(), -125_000);

    // resting borrow liquidity lets the borrower buy the claim back
    let helper = UserId::new();
    controller
        .submit_order(&ccy(), maturity, helper, Side::Borrow, OrderType::Limit, 8_000, 150_000)
        .unwrap();
    let fill = controller.unwind_position(&ccy(), maturity, borrower).unwrap();
    assert_eq!(fill.filled_amount_fv, 125_000);
    assert_eq!(controller.position(&ccy(), maturity, borrower).unwrap(), 0);

    // the obligation moved to the helper; the system stays zero-sum
    assert_eq!(controller.position(&ccy(), maturity, helper).unwrap(), -125_000);
    let open_interest: i128 = [lender, borrower, helper]
        .iter()
        .map(|&u| controller.position(&ccy(), maturity, u).unwrap())
        .sum();
    assert_eq!(open_interest, 0);
}

#[test]
fn clean_up_orders_is_idempotent() {
    let mut controller = controller();
    let maturity = open_market(&mut controller, 10_000);
    let maker = UserId::new();

    controller
        .submit_order(&ccy(), maturity, maker, Side::Lend, OrderType::Limit, 8_000, 100_000)
        .unwrap();
    controller
        .submit_order(&ccy(), maturity, UserId::new(), Side::Borrow, OrderType::Market, 0, 100_000)
        .unwrap();

    assert_eq!(controller.clean_up_orders(&ccy(), maker).unwrap(), 1);
    assert_eq!(controller.clean_up_orders(&ccy(), maker).unwrap(), 0);
    // sweeping does not disturb the settled position
    assert_eq!(controller.position(&ccy(), maturity, maker).unwrap(), 125_000);
}

#[test]
fn total_present_value_marks_at_last_traded_price() {
    let mut controller = controller();
    let maturity = open_market(&mut controller, 10_000);
    let lender = UserId::new();
    let borrower = UserId::new();

    controller
        .submit_order(&ccy(), maturity, lender, Side::Lend, OrderType::Limit, 8_000, 100_000)
        .unwrap();
    controller
        .submit_order(&ccy(), maturity, borrower, Side::Borrow, OrderType::Market, 0, 100_000)
        .unwrap();

    // 125000 fv marked at 8000
    assert_eq!(controller.total_present_value(&ccy(), lender).unwrap(), 100_000);
    assert_eq!(controller.total_present_value(&ccy(), borrower).unwrap(), -100_000);
}

#[test]
fn circuit_breaker_thresholds_follow_the_last_step_price() {
    let mut controller = controller();
    let maturity = open_market(&mut controller, 10_000);

    // bootstrap reference 8000
    let band = controller
        .circuit_breaker_thresholds(&ccy(), maturity)
        .unwrap()
        .unwrap();
    assert_eq!(band.lower.as_u64(), 7_600);
    assert_eq!(band.upper.as_u64(), 8_400);

    controller
        .submit_order(&ccy(), maturity, UserId::new(), Side::Lend, OrderType::Limit, 8_200, 10_000)
        .unwrap();
    controller
        .submit_order(&ccy(), maturity, UserId::new(), Side::Borrow, OrderType::Market, 0, 10_000)
        .unwrap();

    controller.advance_step();
    let band = controller
        .circuit_breaker_thresholds(&ccy(), maturity)
        .unwrap()
        .unwrap();
    assert_eq!(band.lower.as_u64(), 7_790);
    assert_eq!(band.upper.as_u64(), 8_610);
}

#[test]
fn itayose_is_deterministic_across_runs() {
    let run = || {
        let mut controller = controller();
        let maturity = Maturity::from_timestamp(10_000);
        controller.create_order_book(&ccy(), maturity, OPENING, 0).unwrap();
        controller.set_time(10);
        for (side, price, amount) in [
            (Side::Borrow, 8_500u64, 300_000u64),
            (Side::Borrow, 8_000, 100_000),
            (Side::Lend, 8_300, 200_000),
            (Side::Lend, 7_800, 300_000),
        ] {
            controller
                .submit_pre_order(&ccy(), maturity, UserId::new(), side, price, amount)
                .unwrap();
        }
        controller.set_time(OPENING);
        let result = controller.execute_itayose_call(&ccy(), maturity).unwrap();
        (result.opening_unit_price, result.total_matched, result.trades.len())
    };
    assert_eq!(run(), run());
}
