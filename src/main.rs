//! CLI entry point for daq-caps
//!
//! # Usage
//!
//! Probe the boards described in a config file:
//! ```bash
//! daq-caps probe --config daq-caps.toml --format json
//! ```
//!
//! List models with known quirks:
//! ```bash
//! daq-caps models
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use daq_caps::config::CapsConfig;
use daq_caps::logging;
use daq_caps::report::CapabilityReport;
use daq_caps::sim::SimulatedBoard;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "daq-caps")]
#[command(about = "Discover data acquisition board capabilities", long_about = None)]
struct Cli {
    /// Config file (TOML). Environment variables prefixed DAQ_CAPS_ override it.
    #[arg(long, global = true, default_value = "daq-caps.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every configured board (or the demo boards) and print a report
    Probe {
        /// Only probe the board with this name
        #[arg(long)]
        board: Option<String>,

        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// List models with known packet size / trigger resolution
    Models,

    /// Load and validate the config file
    CheckConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = CapsConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    config.validate().context("Invalid configuration")?;
    logging::init_from_config(&config).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Probe { board, format } => probe(&config, board.as_deref(), format),
        Commands::Models => {
            print_models(&config);
            Ok(())
        }
        Commands::CheckConfig => {
            println!(
                "Configuration OK: {} boards, {} quirk overrides",
                config.boards.len(),
                config.quirks.len()
            );
            Ok(())
        }
    }
}

fn probe(config: &CapsConfig, only: Option<&str>, format: Format) -> Result<()> {
    let boards: Vec<_> = config
        .boards_or_demo()
        .into_iter()
        .filter(|board| only.map_or(true, |name| board.name == name))
        .collect();
    if boards.is_empty() {
        bail!("No board named '{}'", only.unwrap_or_default());
    }

    let registry = config.registry();
    registry.init();

    let mut reports = Vec::new();
    let mut failures = 0;
    for profile in boards {
        let name = profile.name.clone();
        let descriptor = profile.descriptor();
        let device = match registry.open(descriptor, Arc::new(SimulatedBoard::new(profile))) {
            Ok(device) => device,
            Err(e) => {
                error!(board = %name, error = %e, "Failed to open board");
                failures += 1;
                continue;
            }
        };

        match CapabilityReport::collect(&device) {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!(board = %name, error = %e, "Failed to collect capabilities");
                failures += 1;
            }
        }
        registry
            .close(device)
            .with_context(|| format!("Failed to close {}", name))?;
    }
    registry.teardown();

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        Format::Table => {
            for report in &reports {
                println!("{}", report.render_table());
            }
        }
    }

    info!(probed = reports.len(), failures, "Probe finished");
    if failures > 0 {
        bail!("{} board(s) could not be probed", failures);
    }
    Ok(())
}

fn print_models(config: &CapsConfig) {
    let table = config.quirk_table();
    println!("{:<8}  {:<14}  {:>11}  {:>18}", "MODEL", "NAME", "PACKET SIZE", "TRIGGER RESOLUTION");
    for quirks in table.entries() {
        println!(
            "{:<8}  {:<14}  {:>11}  {:>18}",
            quirks.model.to_string(),
            quirks.name,
            quirks.packet_size,
            quirks.trigger_resolution
        );
    }
}
