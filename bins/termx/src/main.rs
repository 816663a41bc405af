//! OpenTerm CLI binary
//!
//! This is the main entry point for the OpenTerm application. It
//! provides commands for initializing and validating configuration,
//! and for running a scripted in-process trading session.

use anyhow::{Context, Result};
use cli::{Cli, Commands};
use common::{Currency, Maturity, OrderType, Side, UserId};
use config::{generate_default_config, load_config, save_config, validate_config, MasterConfig};
use market_controller::MarketController;
use observability::{init_logging, LogFormat};
use std::path::Path;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    // Initialize logging
    init_logging("termx", LogFormat::Pretty)?;

    info!("OpenTerm starting...");

    let cli = Cli::parse_args();
    debug!(?cli, "CLI arguments parsed");

    match cli.command {
        Commands::Validate { config } => {
            info!("Executing 'validate' command");
            validate_command(config)
        }
        Commands::Init { output } => {
            info!("Executing 'init' command");
            init_command(output)
        }
        Commands::Simulate { config } => {
            info!("Executing 'simulate' command");
            simulate_command(config)
        }
    }
}

fn load_validated_config<P: AsRef<Path>>(config_path: P) -> Result<MasterConfig> {
    let config = load_config(&config_path)?;
    let report = validate_config(&config);

    if !report.warnings.is_empty() {
        warn!("Configuration warnings:");
        for warning in &report.warnings {
            warn!(field = %warning.field, message = %warning.message);
        }
    }
    if !report.is_valid() {
        error!(
            error_count = report.errors.len(),
            "Configuration validation failed"
        );
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Invalid configuration");
    }
    Ok(config)
}

fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Exchange: {}", config.exchange.name);
    println!("Version: {}", config.exchange.version);
    println!("Currencies: {}", config.currencies.len());
    println!("Order book slots: {}", config.market.order_book_slots);

    Ok(())
}

fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to customize currencies and limits");
    println!(
        "  2. Run 'termx validate --config {:?}' to check configuration",
        output_path
    );
    println!(
        "  3. Run 'termx simulate --config {:?}' to run a demo session",
        output_path
    );

    Ok(())
}

/// Run a small scripted session: open a market through its auction,
/// trade it, unwind a position, and print the resulting state.
fn simulate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let config = load_validated_config(config_path)?;
    let currency_config = config
        .currencies
        .iter()
        .find(|c| c.enabled)
        .context("No enabled currency in configuration")?;
    let currency = Currency::new(&currency_config.symbol);

    let mut controller = MarketController::from_config(&config);

    let now = chrono::Utc::now().timestamp();
    let maturity = Maturity::from_timestamp(now + 90 * 24 * 3600);
    controller.set_time(now - 3600);
    controller
        .create_order_book(&currency, maturity, now, now - 7200)
        .context("Failed to create order book")?;

    println!("\n=== OpenTerm simulation: {} {} ===\n", currency, maturity);

    // pre-open: queue crossing pre-orders, then run the auction
    let alice = UserId::new();
    let bob = UserId::new();
    let carol = UserId::new();
    controller.submit_pre_order(&currency, maturity, alice, Side::Lend, 9_500, 1_000_000)?;
    controller.submit_pre_order(&currency, maturity, bob, Side::Borrow, 9_500, 800_000)?;

    controller.set_time(now);
    let auction = controller.execute_itayose_call(&currency, maturity)?;
    match auction.opening_unit_price {
        Some(price) => println!(
            "Opening auction: price {} / matched {} ({} per side)",
            price, auction.total_matched, auction.offset_amount
        ),
        None => println!("Opening auction: no crossing orders, book opened empty"),
    }

    // continuous trading
    controller.advance_step();
    controller.submit_order(&currency, maturity, alice, Side::Lend, OrderType::Limit, 9_400, 500_000)?;
    let fill = controller.submit_order(
        &currency, maturity, carol, Side::Borrow, OrderType::Market, 0, 300_000,
    )?;
    println!(
        "Market borrow: filled {} pv / {} fv at {:?}{}",
        fill.filled_amount,
        fill.filled_amount_fv,
        fill.last_unit_price.map(|p| p.as_u64()),
        if fill.circuit_breaker_triggered {
            " (circuit breaker)"
        } else {
            ""
        },
    );

    // bob takes the rest of the lend depth and rests the remainder
    controller.submit_order(&currency, maturity, bob, Side::Borrow, OrderType::Limit, 9_300, 600_000)?;

    // carol buys her obligation back against the resting borrow depth
    let unwind = controller.unwind_position(&currency, maturity, carol)?;
    println!(
        "Unwind: closed {} fv of carol's position",
        unwind.filled_amount_fv
    );

    controller.clean_up_orders(&currency, alice)?;

    println!();
    for (name, user) in [("alice", alice), ("bob", bob), ("carol", carol)] {
        println!(
            "Position {name}: {} fv ({} pv)",
            controller.position(&currency, maturity, user)?,
            controller.total_present_value(&currency, user)?,
        );
    }

    let snapshot = controller.order_book_snapshot(&currency, maturity)?;
    println!();
    println!("Book depth: {} lend / {} borrow levels", snapshot.lend_levels.len(), snapshot.borrow_levels.len());
    if let Some(band) = controller.circuit_breaker_thresholds(&currency, maturity)? {
        println!("Circuit breaker band: [{}, {}]", band.lower, band.upper);
    }

    let metrics = controller.metrics();
    println!(
        "Engine: {} orders received, {} trades executed",
        metrics.orders_received, metrics.trades_executed
    );

    Ok(())
}
