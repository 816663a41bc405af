use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "termx")]
#[command(about = "OpenTerm - a fixed-maturity interest-rate exchange")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration without starting anything
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "openterm.yaml")]
        config: PathBuf,
    },

    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "openterm.yaml")]
        output: PathBuf,
    },

    /// Run a small scripted trading session against an in-process
    /// exchange and print the results
    Simulate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "openterm.yaml")]
        config: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
