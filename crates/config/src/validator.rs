use crate::*;
use regex::Regex;
use thiserror::Error;

const PRICE_SCALE: u64 = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Exchange name is required")]
    MissingExchangeName,

    #[error("Invalid version format: {0}. Must be in format X.Y.Z (e.g., 1.0.0)")]
    InvalidVersionFormat(String),

    #[error("No currencies defined")]
    NoCurrencies,

    #[error("At least one currency must be enabled")]
    NoEnabledCurrencies,

    #[error("Duplicate currency symbol: {0}")]
    DuplicateCurrency(String),

    #[error("Currency {symbol}: {message}")]
    InvalidCurrency { symbol: String, message: String },

    #[error("Circuit breaker: {message}")]
    InvalidCircuitBreaker { message: String },

    #[error("Market: {message}")]
    InvalidMarket { message: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a loaded configuration, collecting every problem rather
/// than failing on the first
pub fn validate_config(config: &MasterConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    validate_exchange(&config.exchange, &mut report);
    validate_currencies(&config.currencies, &mut report);
    validate_circuit_breaker(&config.circuit_breaker, &mut report);
    validate_market(&config.market, &mut report);

    report
}

fn validate_exchange(exchange: &ExchangeConfig, report: &mut ValidationReport) {
    if exchange.name.trim().is_empty() {
        report.errors.push(ValidationError::MissingExchangeName);
    }
    let version_ok = Regex::new(r"^\d+\.\d+\.\d+$")
        .map(|re| re.is_match(&exchange.version))
        .unwrap_or(false);
    if !version_ok {
        report
            .errors
            .push(ValidationError::InvalidVersionFormat(exchange.version.clone()));
    }
}

fn validate_currencies(currencies: &[CurrencyConfig], report: &mut ValidationReport) {
    if currencies.is_empty() {
        report.errors.push(ValidationError::NoCurrencies);
        return;
    }
    if !currencies.iter().any(|c| c.enabled) {
        report.errors.push(ValidationError::NoEnabledCurrencies);
    }

    let mut seen = std::collections::HashSet::new();
    for currency in currencies {
        if !seen.insert(currency.symbol.to_uppercase()) {
            report
                .errors
                .push(ValidationError::DuplicateCurrency(currency.symbol.clone()));
        }
        if currency.symbol.trim().is_empty() {
            report.errors.push(ValidationError::InvalidCurrency {
                symbol: currency.symbol.clone(),
                message: "symbol is required".to_string(),
            });
        }
        if currency.decimals > 18 {
            report.errors.push(ValidationError::InvalidCurrency {
                symbol: currency.symbol.clone(),
                message: format!("decimals must be <= 18, got {}", currency.decimals),
            });
        }
        match currency.bootstrap_unit_price {
            Some(price) if !(1..=PRICE_SCALE).contains(&price) => {
                report.errors.push(ValidationError::InvalidCurrency {
                    symbol: currency.symbol.clone(),
                    message: format!("bootstrap_unit_price must be in [1, {PRICE_SCALE}], got {price}"),
                });
            }
            Some(_) => {}
            None => {
                report.warnings.push(ValidationWarning {
                    field: format!("currencies.{}.bootstrap_unit_price", currency.symbol),
                    message: "not set; circuit breaker is unbounded until the first trade".to_string(),
                });
            }
        }
    }
}

fn validate_circuit_breaker(settings: &CircuitBreakerSettings, report: &mut ValidationReport) {
    if settings.max_rise_bps > PRICE_SCALE || settings.max_drop_bps > PRICE_SCALE {
        report.errors.push(ValidationError::InvalidCircuitBreaker {
            message: format!("rate limits must be <= {PRICE_SCALE} bps"),
        });
    }
    if settings.min_band_width == 0 {
        report.errors.push(ValidationError::InvalidCircuitBreaker {
            message: "min_band_width must be positive".to_string(),
        });
    }
    if settings.min_band_width > settings.max_band_width {
        report.errors.push(ValidationError::InvalidCircuitBreaker {
            message: format!(
                "min_band_width {} exceeds max_band_width {}",
                settings.min_band_width, settings.max_band_width
            ),
        });
    }
    let defaults = CircuitBreakerSettings::default();
    if settings.max_rise_bps == defaults.max_rise_bps && settings.max_drop_bps == defaults.max_drop_bps {
        report.defaults_applied.push(DefaultApplied {
            field: "circuit_breaker".to_string(),
            value: format!("{}bps rise / {}bps drop", defaults.max_rise_bps, defaults.max_drop_bps),
        });
    }
}

fn validate_market(market: &MarketConfig, report: &mut ValidationReport) {
    if market.order_book_slots == 0 {
        report.errors.push(ValidationError::InvalidMarket {
            message: "order_book_slots must be positive".to_string(),
        });
    }
    if market.depth_levels == 0 {
        report.errors.push(ValidationError::InvalidMarket {
            message: "depth_levels must be positive".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_config_is_valid() {
        let config = crate::parser::generate_default_config();
        let report = validate_config(&config);
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn test_bad_version_is_rejected() {
        let mut config = crate::parser::generate_default_config();
        config.exchange.version = "one".to_string();
        let report = validate_config(&config);
        assert_matches!(report.errors[0], ValidationError::InvalidVersionFormat(_));
    }

    #[test]
    fn test_bootstrap_price_bounds() {
        let mut config = crate::parser::generate_default_config();
        config.currencies[0].bootstrap_unit_price = Some(10_001);
        let report = validate_config(&config);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_missing_bootstrap_price_warns() {
        let mut config = crate::parser::generate_default_config();
        config.currencies[0].bootstrap_unit_price = None;
        let report = validate_config(&config);
        assert!(report.is_valid());
        assert!(!report.warnings.is_empty());
    }

    #[test]
    fn test_band_width_ordering() {
        let mut config = crate::parser::generate_default_config();
        config.circuit_breaker.min_band_width = 2_000;
        let report = validate_config(&config);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_no_currencies_is_rejected() {
        let mut config = crate::parser::generate_default_config();
        config.currencies.clear();
        let report = validate_config(&config);
        assert_matches!(report.errors[0], ValidationError::NoCurrencies);
    }
}
