//! Itayose opening auction
//!
//! Uniform-price call auction run once per (currency, maturity) before
//! continuous trading opens. Lend orders are the bid curve (a lend limit
//! is the maximum acceptable price), borrow orders the ask curve (a
//! borrow limit is the minimum acceptable). The opening price maximizes
//! executable volume `min(lend volume at limit >= p, borrow volume at
//! limit <= p)`; ties resolve toward the price closest to the midpoint
//! of the last crossing pair, and an exact midpoint tie resolves to the
//! higher price.

use std::collections::BTreeSet;

use common::{Currency, Maturity, Side, UnitPrice};
use settlement::value;
use tracing::{debug, info};

use crate::domain::{BookOrder, Trade};
use crate::Result;

/// Discovered opening price and the volume executed per side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opening {
    pub unit_price: UnitPrice,
    pub offset_amount: u64,
}

/// Everything the engine needs to apply an executed auction
#[derive(Debug)]
pub(crate) struct AuctionOutcome {
    pub opening: Option<Opening>,
    pub trades: Vec<Trade>,
    /// Total order amount crossed at the open, counting both sides
    pub total_matched: u64,
    /// Orders (or remainders) transferred onto the live book
    pub residual_orders: Vec<BookOrder>,
    /// Pre-orders discarded because nothing crossed
    pub discarded_orders: usize,
}

/// Scan the pre-order curves for the volume-maximizing opening price.
///
/// Returns `None` when no price crosses any volume.
pub fn compute_opening(pre_orders: &[BookOrder]) -> Option<Opening> {
    let candidates: BTreeSet<u64> = pre_orders.iter().map(|o| o.unit_price.as_u64()).collect();
    if candidates.is_empty() {
        return None;
    }

    let volume_at = |p: u64| -> (u64, u64) {
        let mut lend = 0u64;
        let mut borrow = 0u64;
        for order in pre_orders {
            match order.side {
                Side::Lend if order.unit_price.as_u64() >= p => lend += order.amount,
                Side::Borrow if order.unit_price.as_u64() <= p => borrow += order.amount,
                _ => {}
            }
        }
        (lend, borrow)
    };

    let mut max_matched = 0u64;
    let mut tied: Vec<u64> = Vec::new();
    for &p in &candidates {
        let (lend, borrow) = volume_at(p);
        let matched = lend.min(borrow);
        if matched > max_matched {
            max_matched = matched;
            tied.clear();
            tied.push(p);
        } else if matched == max_matched && matched > 0 {
            tied.push(p);
        }
    }
    if max_matched == 0 {
        return None;
    }

    let unit_price = if tied.len() == 1 {
        tied[0]
    } else {
        let midpoint = crossing_midpoint(pre_orders).unwrap_or(tied[0]);
        tied.sort_by_key(|&p| (p.abs_diff(midpoint), std::cmp::Reverse(p)));
        tied[0]
    };

    Some(Opening {
        unit_price: UnitPrice::try_new(unit_price)?,
        offset_amount: max_matched,
    })
}

/// Midpoint of the last price pair that still crosses: the k-th best
/// lend level (descending) against the k-th best borrow level
/// (ascending), walked while lend >= borrow.
fn crossing_midpoint(pre_orders: &[BookOrder]) -> Option<u64> {
    let mut lend_prices: Vec<u64> = pre_orders
        .iter()
        .filter(|o| o.side.is_lend())
        .map(|o| o.unit_price.as_u64())
        .collect();
    let mut borrow_prices: Vec<u64> = pre_orders
        .iter()
        .filter(|o| o.side.is_borrow())
        .map(|o| o.unit_price.as_u64())
        .collect();
    lend_prices.sort_unstable_by(|a, b| b.cmp(a));
    lend_prices.dedup();
    borrow_prices.sort_unstable();
    borrow_prices.dedup();

    let mut last = None;
    for (lend, borrow) in lend_prices.iter().zip(borrow_prices.iter()) {
        if lend >= borrow {
            last = Some((*lend + *borrow) / 2);
        } else {
            break;
        }
    }
    last
}

/// Execute the auction over a taken pre-order queue.
///
/// Eligible orders fill at the single opening price, most aggressive
/// first (lend descending, borrow ascending, FIFO within a price); the
/// one-sided excess and any order remainder transfer onto the live book
/// at their original prices. With no crossing volume the queue is
/// discarded and the book opens empty.
pub(crate) fn run_auction(
    currency: &Currency,
    maturity: Maturity,
    step: u64,
    pre_orders: Vec<BookOrder>,
    sequence: &mut u64,
) -> Result<AuctionOutcome> {
    let Some(opening) = compute_opening(&pre_orders) else {
        let discarded = pre_orders.len();
        if discarded > 0 {
            info!(
                currency = %currency,
                maturity = %maturity,
                discarded,
                "Itayose found no crossing orders; book opens empty"
            );
        }
        return Ok(AuctionOutcome {
            opening: None,
            trades: Vec::new(),
            total_matched: 0,
            residual_orders: Vec::new(),
            discarded_orders: discarded,
        });
    };

    let p = opening.unit_price;
    let raw = p.as_u64();

    let mut lends: Vec<BookOrder> = Vec::new();
    let mut borrows: Vec<BookOrder> = Vec::new();
    let mut residual_orders: Vec<BookOrder> = Vec::new();
    for order in pre_orders {
        match order.side {
            Side::Lend if order.unit_price.as_u64() >= raw => lends.push(order),
            Side::Borrow if order.unit_price.as_u64() <= raw => borrows.push(order),
            _ => residual_orders.push(order),
        }
    }
    // most aggressive first, FIFO within a price
    lends.sort_by_key(|o| (std::cmp::Reverse(o.unit_price.as_u64()), o.sequence));
    borrows.sort_by_key(|o| (o.unit_price.as_u64(), o.sequence));

    let mut trades = Vec::new();
    let mut total_matched = 0u64;
    let (mut li, mut bi) = (0usize, 0usize);
    while li < lends.len() && bi < borrows.len() {
        let take = lends[li].amount.min(borrows[bi].amount);
        let future_value = value::present_to_future(take, p)?;
        lends[li].fill(take, future_value);
        borrows[bi].fill(take, future_value);
        total_matched += take * 2;

        *sequence += 1;
        trades.push(Trade {
            trade_id: uuid::Uuid::new_v4(),
            currency: currency.clone(),
            maturity,
            taker_order_id: lends[li].order_id,
            maker_order_id: borrows[bi].order_id,
            lender: lends[li].user,
            borrower: borrows[bi].user,
            unit_price: p,
            amount: take,
            future_value,
            taker_side: Side::Lend,
            sequence: *sequence,
            step,
        });

        if lends[li].is_filled() {
            li += 1;
        }
        if borrows[bi].is_filled() {
            bi += 1;
        }
    }

    // one-sided excess rests at original prices
    residual_orders.extend(lends.into_iter().skip(li).filter(|o| !o.is_filled()));
    residual_orders.extend(borrows.into_iter().skip(bi).filter(|o| !o.is_filled()));

    debug!(
        currency = %currency,
        maturity = %maturity,
        opening_price = %p,
        offset_amount = opening.offset_amount,
        carried = residual_orders.len(),
        "Itayose executed"
    );

    Ok(AuctionOutcome {
        opening: Some(opening),
        trades,
        total_matched,
        residual_orders,
        discarded_orders: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::UserId;

    fn pre_order(side: Side, raw_price: u64, amount: u64, sequence: u64) -> BookOrder {
        BookOrder::new(
            UserId::new(),
            side,
            UnitPrice::try_new(raw_price).unwrap(),
            amount,
            sequence,
            0,
        )
    }

    #[test]
    fn test_opening_price_discovery() {
        let orders = vec![
            pre_order(Side::Borrow, 8_500, 300_000, 1),
            pre_order(Side::Borrow, 8_000, 100_000, 2),
            pre_order(Side::Lend, 8_300, 200_000, 3),
            pre_order(Side::Lend, 7_800, 300_000, 4),
        ];
        let opening = compute_opening(&orders).unwrap();
        assert_eq!(opening.unit_price.as_u64(), 8_300);
        assert_eq!(opening.offset_amount, 100_000);
    }

    #[test]
    fn test_opening_is_deterministic() {
        let orders = vec![
            pre_order(Side::Borrow, 8_500, 300_000, 1),
            pre_order(Side::Borrow, 8_000, 100_000, 2),
            pre_order(Side::Lend, 8_300, 200_000, 3),
            pre_order(Side::Lend, 7_800, 300_000, 4),
        ];
        assert_eq!(compute_opening(&orders), compute_opening(&orders));
    }

    #[test]
    fn test_no_cross_yields_no_opening() {
        let orders = vec![
            pre_order(Side::Lend, 7_000, 100_000, 1),
            pre_order(Side::Borrow, 9_000, 100_000, 2),
        ];
        assert!(compute_opening(&orders).is_none());
    }

    #[test]
    fn test_one_sided_queue_yields_no_opening() {
        let orders = vec![pre_order(Side::Lend, 8_000, 100_000, 1)];
        assert!(compute_opening(&orders).is_none());
    }

    #[test]
    fn test_auction_fills_and_residuals() {
        let ccy = Currency::new("USDC");
        let maturity = Maturity::from_timestamp(1_000);
        let orders = vec![
            pre_order(Side::Borrow, 8_500, 300_000, 1),
            pre_order(Side::Borrow, 8_000, 100_000, 2),
            pre_order(Side::Lend, 8_300, 200_000, 3),
            pre_order(Side::Lend, 7_800, 300_000, 4),
        ];
        let mut sequence = 0;
        let outcome = run_auction(&ccy, maturity, 1, orders, &mut sequence).unwrap();

        let opening = outcome.opening.unwrap();
        assert_eq!(opening.unit_price.as_u64(), 8_300);
        assert_eq!(outcome.total_matched, 200_000);

        // one uniform-price trade: lend 8300 x borrow 8000, 100000 pv
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].amount, 100_000);
        assert_eq!(outcome.trades[0].unit_price.as_u64(), 8_300);
        // fv at the opening price: 100000 * 10000 / 8300
        assert_eq!(outcome.trades[0].future_value, 120_481);

        // residuals: lend 8300 remainder, lend 7800, borrow 8500
        assert_eq!(outcome.residual_orders.len(), 3);
        let lend_excess = outcome
            .residual_orders
            .iter()
            .find(|o| o.unit_price.as_u64() == 8_300)
            .unwrap();
        assert_eq!(lend_excess.amount, 100_000);
    }

    #[test]
    fn test_auction_without_cross_discards_queue() {
        let ccy = Currency::new("USDC");
        let maturity = Maturity::from_timestamp(1_000);
        let orders = vec![
            pre_order(Side::Lend, 7_000, 100_000, 1),
            pre_order(Side::Borrow, 9_000, 100_000, 2),
        ];
        let mut sequence = 0;
        let outcome = run_auction(&ccy, maturity, 1, orders, &mut sequence).unwrap();
        assert!(outcome.opening.is_none());
        assert!(outcome.residual_orders.is_empty());
        assert_eq!(outcome.discarded_orders, 2);
    }
}
