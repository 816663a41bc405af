//! Bootstrap price collaborators
//!
//! The currency-conversion service that seeds circuit breakers lives
//! outside the core; this module provides the static implementation
//! built from configuration, which doubles as the test stand-in.

use std::collections::HashMap;

use common::{Currency, UnitPrice};
use config::MasterConfig;
use matching_engine::BootstrapPriceSource;

/// Bootstrap prices from a fixed per-currency table
#[derive(Debug, Default)]
pub struct StaticPriceSource {
    prices: HashMap<Currency, UnitPrice>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the configured currency list
    pub fn from_config(config: &MasterConfig) -> Self {
        let mut source = Self::new();
        for currency in config.currencies.iter().filter(|c| c.enabled) {
            if let Some(price) = currency.bootstrap_unit_price.and_then(UnitPrice::try_new) {
                source.prices.insert(Currency::new(&currency.symbol), price);
            }
        }
        source
    }

    pub fn with_price(mut self, currency: Currency, unit_price: UnitPrice) -> Self {
        self.prices.insert(currency, unit_price);
        self
    }
}

impl BootstrapPriceSource for StaticPriceSource {
    fn bootstrap_unit_price(&self, currency: &Currency) -> Option<UnitPrice> {
        self.prices.get(currency).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let config = config::generate_default_config();
        let source = StaticPriceSource::from_config(&config);
        assert!(source.bootstrap_unit_price(&Currency::new("USDC")).is_some());
        assert!(source.bootstrap_unit_price(&Currency::new("JPY")).is_none());
    }

    #[test]
    fn test_with_price() {
        let source = StaticPriceSource::new()
            .with_price(Currency::new("ETH"), UnitPrice::try_new(9_000).unwrap());
        assert_eq!(
            source.bootstrap_unit_price(&Currency::new("ETH")).unwrap().as_u64(),
            9_000
        );
    }
}
