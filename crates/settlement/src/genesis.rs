//! Genesis-value ledger and maturity chain
//!
//! Each currency carries a strictly chronological chain of
//! [`MaturityUnitPriceRecord`]s, one per rotated maturity, plus per-user
//! balances normalized to "genesis units". A position migrated at a
//! rolled maturity keeps compounding through later maturities without
//! being re-materialized at each one.
//!
//! Conversion between a future value at maturity `m` and genesis units:
//!
//! ```text
//! units = fv * GENESIS_FACTOR / compound_factor(m)
//! fv    = units * compound_factor(m) / GENESIS_FACTOR
//! ```
//!
//! where `compound_factor` chains `prev * PRICE_SCALE / closing_price`
//! across successive closings. Divisions truncate toward zero, so each
//! migration can lose at most one unit of dust.

use std::collections::HashMap;

use common::{Currency, Maturity, UnitPrice, UserId, PRICE_SCALE};
use tracing::{debug, info};

use crate::error::SettlementError;
use crate::Result;

/// Identity compound factor; the basis genesis units are expressed in.
pub const GENESIS_FACTOR: u128 = PRICE_SCALE as u128;

/// Closing record for one rotated maturity
///
/// Records form a singly-linked chronological chain via explicit
/// prev/next maturities; traversal is always forward from a known
/// maturity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaturityUnitPriceRecord {
    pub maturity: Maturity,
    /// Closing unit price used for the roll-over
    pub unit_price: UnitPrice,
    /// Cumulative factor chaining all closings up to this maturity
    pub compound_factor: u128,
    pub prev: Option<Maturity>,
    pub next: Option<Maturity>,
}

#[derive(Debug, Default)]
struct CurrencyLedger {
    records: HashMap<Maturity, MaturityUnitPriceRecord>,
    genesis: Option<Maturity>,
    latest: Option<Maturity>,
    balances: HashMap<UserId, i128>,
}

/// Per-currency store of maturity records and genesis balances
#[derive(Debug, Default)]
pub struct GenesisValueVault {
    ledgers: HashMap<Currency, CurrencyLedger>,
}

impl GenesisValueVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the closing record for a rotated maturity.
    ///
    /// Returns the new cumulative compound factor. Each maturity is
    /// recorded exactly once and must come after the latest recorded
    /// maturity.
    pub fn record_maturity(
        &mut self,
        currency: &Currency,
        maturity: Maturity,
        closing_price: UnitPrice,
    ) -> Result<u128> {
        let ledger = self.ledgers.entry(currency.clone()).or_default();

        if ledger.records.contains_key(&maturity) {
            return Err(SettlementError::MaturityAlreadyRecorded(maturity.as_timestamp()));
        }
        if let Some(latest) = ledger.latest {
            if maturity <= latest {
                return Err(SettlementError::NonChronologicalMaturity(maturity.as_timestamp()));
            }
        }

        let prev_factor = match ledger.latest {
            Some(latest) => {
                ledger
                    .records
                    .get(&latest)
                    .ok_or_else(|| SettlementError::Internal("missing latest record".into()))?
                    .compound_factor
            }
            None => GENESIS_FACTOR,
        };
        let compound_factor = prev_factor
            .checked_mul(PRICE_SCALE as u128)
            .ok_or_else(|| SettlementError::AmountOverflow("compound factor".into()))?
            / closing_price.as_u64() as u128;

        if let Some(latest) = ledger.latest {
            if let Some(prev_record) = ledger.records.get_mut(&latest) {
                prev_record.next = Some(maturity);
            }
        }
        ledger.records.insert(
            maturity,
            MaturityUnitPriceRecord {
                maturity,
                unit_price: closing_price,
                compound_factor,
                prev: ledger.latest,
                next: None,
            },
        );
        ledger.genesis.get_or_insert(maturity);
        ledger.latest = Some(maturity);

        info!(
            currency = %currency,
            maturity = %maturity,
            closing_price = %closing_price,
            compound_factor,
            "Maturity closing recorded"
        );
        Ok(compound_factor)
    }

    /// Migrate a future value held at a recorded maturity into the
    /// user's genesis balance. Returns the signed genesis-unit delta.
    pub fn migrate_future_value(
        &mut self,
        currency: &Currency,
        user: UserId,
        maturity: Maturity,
        future_value: i64,
    ) -> Result<i128> {
        let factor = self
            .compound_factor(currency, maturity)
            .ok_or(SettlementError::MaturityNotFound(maturity.as_timestamp()))?;
        let factor = i128::try_from(factor)
            .map_err(|_| SettlementError::AmountOverflow("compound factor".into()))?;

        let units = (future_value as i128)
            .checked_mul(GENESIS_FACTOR as i128)
            .ok_or_else(|| SettlementError::AmountOverflow("genesis units".into()))?
            / factor;

        let ledger = self
            .ledgers
            .get_mut(currency)
            .ok_or(SettlementError::MaturityNotFound(maturity.as_timestamp()))?;
        let balance = ledger.balances.entry(user).or_insert(0);
        *balance = balance
            .checked_add(units)
            .ok_or_else(|| SettlementError::AmountOverflow("genesis balance".into()))?;

        debug!(
            currency = %currency,
            user = %user,
            maturity = %maturity,
            future_value,
            units,
            "Future value migrated to genesis balance"
        );
        Ok(units)
    }

    /// Raw genesis-unit balance for a user
    pub fn balance(&self, currency: &Currency, user: UserId) -> i128 {
        self.ledgers
            .get(currency)
            .and_then(|ledger| ledger.balances.get(&user))
            .copied()
            .unwrap_or(0)
    }

    /// The user's balance expressed as a future value at the given
    /// recorded maturity, without mutating anything.
    pub fn future_value_of(
        &self,
        currency: &Currency,
        user: UserId,
        maturity: Maturity,
    ) -> Result<i64> {
        let units = self.balance(currency, user);
        if units == 0 {
            return Ok(0);
        }
        let factor = self
            .compound_factor(currency, maturity)
            .ok_or(SettlementError::MaturityNotFound(maturity.as_timestamp()))?;
        let factor = i128::try_from(factor)
            .map_err(|_| SettlementError::AmountOverflow("compound factor".into()))?;

        let fv = units
            .checked_mul(factor)
            .ok_or_else(|| SettlementError::AmountOverflow("future value".into()))?
            / GENESIS_FACTOR as i128;
        i64::try_from(fv).map_err(|_| SettlementError::AmountOverflow("future value".into()))
    }

    /// Compound factor recorded at a maturity
    pub fn compound_factor(&self, currency: &Currency, maturity: Maturity) -> Option<u128> {
        self.record(currency, maturity).map(|r| r.compound_factor)
    }

    /// Closing record for a maturity, if rotated
    pub fn record(&self, currency: &Currency, maturity: Maturity) -> Option<&MaturityUnitPriceRecord> {
        self.ledgers.get(currency)?.records.get(&maturity)
    }

    /// Earliest recorded maturity for a currency
    pub fn genesis_maturity(&self, currency: &Currency) -> Option<Maturity> {
        self.ledgers.get(currency)?.genesis
    }

    /// Most recently recorded maturity for a currency
    pub fn latest_maturity(&self, currency: &Currency) -> Option<Maturity> {
        self.ledgers.get(currency)?.latest
    }

    /// Forward traversal of the maturity chain from genesis
    pub fn maturity_chain(&self, currency: &Currency) -> Vec<&MaturityUnitPriceRecord> {
        let mut chain = Vec::new();
        let Some(ledger) = self.ledgers.get(currency) else {
            return chain;
        };
        let mut cursor = ledger.genesis;
        while let Some(maturity) = cursor {
            match ledger.records.get(&maturity) {
                Some(record) => {
                    cursor = record.next;
                    chain.push(record);
                }
                None => break,
            }
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(raw: u64) -> UnitPrice {
        UnitPrice::try_new(raw).unwrap()
    }

    fn ccy() -> Currency {
        Currency::new("USDC")
    }

    #[test]
    fn test_compound_factor_chain() {
        let mut vault = GenesisValueVault::new();
        let m1 = Maturity::from_timestamp(1_000);
        let m2 = Maturity::from_timestamp(2_000);

        assert_eq!(vault.record_maturity(&ccy(), m1, price(8_000)).unwrap(), 12_500);
        assert_eq!(vault.record_maturity(&ccy(), m2, price(8_000)).unwrap(), 15_625);

        let chain = vault.maturity_chain(&ccy());
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].next, Some(m2));
        assert_eq!(chain[1].prev, Some(m1));
        assert_eq!(vault.genesis_maturity(&ccy()), Some(m1));
        assert_eq!(vault.latest_maturity(&ccy()), Some(m2));
    }

    #[test]
    fn test_record_is_created_exactly_once() {
        let mut vault = GenesisValueVault::new();
        let m1 = Maturity::from_timestamp(1_000);
        vault.record_maturity(&ccy(), m1, price(8_000)).unwrap();
        assert_eq!(
            vault.record_maturity(&ccy(), m1, price(9_000)),
            Err(SettlementError::MaturityAlreadyRecorded(1_000))
        );
    }

    #[test]
    fn test_records_must_be_chronological() {
        let mut vault = GenesisValueVault::new();
        vault
            .record_maturity(&ccy(), Maturity::from_timestamp(2_000), price(8_000))
            .unwrap();
        assert_eq!(
            vault.record_maturity(&ccy(), Maturity::from_timestamp(1_000), price(8_000)),
            Err(SettlementError::NonChronologicalMaturity(1_000))
        );
    }

    #[test]
    fn test_migration_and_carry_forward() {
        let mut vault = GenesisValueVault::new();
        let user = UserId::new();
        let m1 = Maturity::from_timestamp(1_000);
        let m2 = Maturity::from_timestamp(2_000);

        vault.record_maturity(&ccy(), m1, price(8_000)).unwrap();
        let units = vault.migrate_future_value(&ccy(), user, m1, 125_000).unwrap();
        assert_eq!(units, 100_000);
        assert_eq!(vault.balance(&ccy(), user), 100_000);

        vault.record_maturity(&ccy(), m2, price(8_000)).unwrap();
        assert_eq!(vault.future_value_of(&ccy(), user, m2).unwrap(), 156_250);
    }

    #[test]
    fn test_migration_is_zero_sum() {
        let mut vault = GenesisValueVault::new();
        let lender = UserId::new();
        let borrower = UserId::new();
        let m1 = Maturity::from_timestamp(1_000);

        vault.record_maturity(&ccy(), m1, price(8_000)).unwrap();
        vault.migrate_future_value(&ccy(), lender, m1, 125_000).unwrap();
        vault.migrate_future_value(&ccy(), borrower, m1, -125_000).unwrap();

        assert_eq!(vault.balance(&ccy(), lender) + vault.balance(&ccy(), borrower), 0);
    }

    #[test]
    fn test_unknown_maturity_is_rejected() {
        let mut vault = GenesisValueVault::new();
        let user = UserId::new();
        let m1 = Maturity::from_timestamp(1_000);
        assert_eq!(
            vault.migrate_future_value(&ccy(), user, m1, 1),
            Err(SettlementError::MaturityNotFound(1_000))
        );
        assert_eq!(vault.balance(&ccy(), user), 0);
    }

    #[test]
    fn test_zero_balance_needs_no_records() {
        let vault = GenesisValueVault::new();
        assert_eq!(vault.balance(&ccy(), UserId::new()), 0);
        assert!(vault.maturity_chain(&ccy()).is_empty());
    }
}
