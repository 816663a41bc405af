use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Top-level configuration for an OpenTerm deployment
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MasterConfig {
    pub exchange: ExchangeConfig,
    pub currencies: Vec<CurrencyConfig>,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeConfig {
    pub name: String,
    pub description: String,
    pub version: String,
}

/// A currency whose maturities are listed on the exchange
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CurrencyConfig {
    pub symbol: String,
    pub name: String,
    pub decimals: u32,
    /// Unit price used to seed the circuit breaker before a market has
    /// ever traded; in [1, 10000] when set
    #[serde(rename = "bootstrap_unit_price")]
    #[serde(default)]
    pub bootstrap_unit_price: Option<u64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Order-book orchestration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketConfig {
    /// Fixed number of order-book slots per currency; maturities rotate
    /// through them
    #[serde(default = "default_order_book_slots")]
    pub order_book_slots: usize,
    /// Depth levels returned in book snapshots
    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            order_book_slots: default_order_book_slots(),
            depth_levels: default_depth_levels(),
        }
    }
}

/// Circuit-breaker band parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerSettings {
    /// Maximum rise from the step reference price, in basis points
    #[serde(default = "default_max_rise_bps")]
    pub max_rise_bps: u64,
    /// Maximum drop from the step reference price, in basis points
    #[serde(default = "default_max_drop_bps")]
    pub max_drop_bps: u64,
    /// Minimum absolute half-band in price units
    #[serde(default = "default_min_band_width")]
    pub min_band_width: u64,
    /// Maximum absolute half-band in price units
    #[serde(default = "default_max_band_width")]
    pub max_band_width: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            max_rise_bps: default_max_rise_bps(),
            max_drop_bps: default_max_drop_bps(),
            min_band_width: default_min_band_width(),
            max_band_width: default_max_band_width(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml_applies_defaults() {
        let yaml = r#"
exchange:
  name: Test Exchange
  description: A test deployment
  version: 1.0.0
currencies:
  - symbol: USDC
    name: USD Coin
    decimals: 6
    bootstrap_unit_price: 9500
"#;
        let config: MasterConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.exchange.name, "Test Exchange");
        assert_eq!(config.currencies.len(), 1);
        assert!(config.currencies[0].enabled);
        assert_eq!(config.market.order_book_slots, default_order_book_slots());
        assert_eq!(config.circuit_breaker.max_rise_bps, default_max_rise_bps());
    }

    #[test]
    fn test_round_trip_serialization() {
        let config = parser::generate_default_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: MasterConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.exchange.name, config.exchange.name);
        assert_eq!(parsed.currencies.len(), config.currencies.len());
    }
}
