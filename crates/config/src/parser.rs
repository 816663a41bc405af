use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MasterConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    // Perform environment variable substitution
    let substituted = substitution::substitute_env_vars(&content)?;

    let config: MasterConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!("Configuration loaded successfully");
    Ok(config)
}

#[instrument]
pub fn generate_default_config() -> MasterConfig {
    MasterConfig {
        exchange: ExchangeConfig {
            name: "OpenTerm".to_string(),
            description: "A fixed-maturity interest-rate exchange".to_string(),
            version: "1.0.0".to_string(),
        },
        currencies: vec![
            CurrencyConfig {
                symbol: "USDC".to_string(),
                name: "USD Coin".to_string(),
                decimals: 6,
                bootstrap_unit_price: Some(9_500),
                enabled: true,
            },
            CurrencyConfig {
                symbol: "ETH".to_string(),
                name: "Ether".to_string(),
                decimals: 18,
                bootstrap_unit_price: Some(9_500),
                enabled: true,
            },
        ],
        market: MarketConfig::default(),
        circuit_breaker: CircuitBreakerSettings::default(),
    }
}

#[instrument]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &MasterConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}
