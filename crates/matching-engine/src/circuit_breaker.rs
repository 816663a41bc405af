//! Circuit breaker for the matching engine
//!
//! Bounds how far traded prices may move within one settlement step. The
//! band is derived once per step from the previous step's last traded
//! price (or a bootstrap conversion value when the book has no history)
//! and stays fixed until the step counter advances, however many orders
//! consume it.

use common::{Currency, UnitPrice, PRICE_SCALE};
use serde::{Deserialize, Serialize};

/// External collaborator that seeds the breaker when a book has never
/// traded. Margin and collateral checks live behind the same boundary
/// and are not consulted here.
pub trait BootstrapPriceSource {
    /// Bootstrap unit price for a currency, if one can be derived
    fn bootstrap_unit_price(&self, currency: &Currency) -> Option<UnitPrice>;
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Maximum rise from the reference price, in basis points of it
    pub max_rise_bps: u64,
    /// Maximum drop from the reference price, in basis points of it
    pub max_drop_bps: u64,
    /// Minimum absolute half-band, so references near the price bounds
    /// still allow movement
    pub min_band_width: u64,
    /// Maximum absolute half-band, so the band never exceeds this spread
    /// at mid prices
    pub max_band_width: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_rise_bps: 500,
            max_drop_bps: 500,
            min_band_width: 100,
            max_band_width: 1_000,
        }
    }
}

impl From<&config::CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &config::CircuitBreakerSettings) -> Self {
        Self {
            max_rise_bps: settings.max_rise_bps,
            max_drop_bps: settings.max_drop_bps,
            min_band_width: settings.min_band_width,
            max_band_width: settings.max_band_width,
        }
    }
}

/// Admissible price band for one settlement step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub lower: UnitPrice,
    pub upper: UnitPrice,
}

impl PriceBand {
    pub fn contains(&self, unit_price: UnitPrice) -> bool {
        self.lower <= unit_price && unit_price <= self.upper
    }
}

/// Compute the admissible band around a reference price.
///
/// Each half-band is `reference * rate / PRICE_SCALE` clamped to the
/// configured absolute min/max widths, then the whole band is clamped to
/// the valid price domain `[1, PRICE_SCALE]`.
pub fn admissible_band(reference: UnitPrice, config: &CircuitBreakerConfig) -> PriceBand {
    let reference = reference.as_u64();
    let rise = (reference * config.max_rise_bps / PRICE_SCALE)
        .clamp(config.min_band_width, config.max_band_width);
    let drop = (reference * config.max_drop_bps / PRICE_SCALE)
        .clamp(config.min_band_width, config.max_band_width);

    let upper = (reference + rise).min(PRICE_SCALE);
    let lower = reference.saturating_sub(drop).max(1);

    PriceBand {
        // both bounds are within [1, PRICE_SCALE] by construction
        lower: UnitPrice::try_new(lower).unwrap_or(UnitPrice::PAR),
        upper: UnitPrice::try_new(upper).unwrap_or(UnitPrice::PAR),
    }
}

/// Breaker state for the settlement step currently in progress
///
/// `band` is `None` when the book has neither trade history nor a
/// bootstrap value; matching is then unconstrained for the step.
#[derive(Debug, Clone, Copy)]
pub struct StepBreaker {
    pub step: u64,
    pub band: Option<PriceBand>,
    /// Latched once any order in this step was halted by the band
    pub triggered: bool,
}

impl StepBreaker {
    pub fn new(step: u64, band: Option<PriceBand>) -> Self {
        Self {
            step,
            band,
            triggered: false,
        }
    }

    /// True when a fill at this price is admissible
    pub fn admits(&self, unit_price: UnitPrice) -> bool {
        self.band.map_or(true, |band| band.contains(unit_price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(raw: u64) -> UnitPrice {
        UnitPrice::try_new(raw).unwrap()
    }

    #[test]
    fn test_band_at_mid_price() {
        let band = admissible_band(price(8_000), &CircuitBreakerConfig::default());
        // 5% of 8000 = 400
        assert_eq!(band.lower, price(7_600));
        assert_eq!(band.upper, price(8_400));
    }

    #[test]
    fn test_minimum_width_near_bounds() {
        let band = admissible_band(price(50), &CircuitBreakerConfig::default());
        // 5% of 50 would be 2; the minimum width of 100 applies, floored at 1
        assert_eq!(band.lower, price(1));
        assert_eq!(band.upper, price(150));
    }

    #[test]
    fn test_maximum_width_caps_wide_bands() {
        let config = CircuitBreakerConfig {
            max_rise_bps: 5_000,
            max_drop_bps: 5_000,
            ..CircuitBreakerConfig::default()
        };
        let band = admissible_band(price(8_000), &config);
        // 50% of 8000 = 4000, capped at 1000
        assert_eq!(band.lower, price(7_000));
        assert_eq!(band.upper, price(9_000));
    }

    #[test]
    fn test_band_clamped_to_price_domain() {
        let band = admissible_band(price(9_950), &CircuitBreakerConfig::default());
        assert_eq!(band.upper, UnitPrice::PAR);
        assert!(band.contains(price(9_980)));
    }

    #[test]
    fn test_step_breaker_without_band_admits_everything() {
        let breaker = StepBreaker::new(1, None);
        assert!(breaker.admits(price(1)));
        assert!(breaker.admits(UnitPrice::PAR));
    }
}
