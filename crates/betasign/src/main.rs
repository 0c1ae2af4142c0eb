// SPDX-FileCopyrightText: 2026 Betasign Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! betasign - tracks which beta firmware builds are still being signed.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use betasign::commands;
use clap::{Parser, Subcommand};

/// betasign - tracks which beta firmware builds are still being signed.
#[derive(Parser, Debug)]
#[command(name = "betasign", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the refresh loop and the lookup service.
    Serve,
    /// Run one refresh cycle and print its report.
    Refresh,
    /// Print the stored records for a device identifier.
    Lookup {
        /// Device identifier, e.g. `iPhone10,3`.
        identifier: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => betasign_config::load_and_validate_path(path),
        None => betasign_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            betasign_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    commands::init_tracing(&config.service.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => commands::run_serve(config).await,
        Some(Commands::Refresh) => commands::run_refresh(config).await,
        Some(Commands::Lookup { identifier }) => commands::run_lookup(config, &identifier).await,
        None => {
            println!("betasign: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn lookup_takes_an_identifier() {
        let cli = Cli::try_parse_from(["betasign", "lookup", "iPhone10,3"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Lookup { identifier }) if identifier == "iPhone10,3"));
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["betasign", "refresh", "--config", "/etc/b.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/b.toml")));
        assert!(matches!(cli.command, Some(Commands::Refresh)));
    }

    #[test]
    fn inline_config_loads_with_defaults() {
        let config = betasign_config::load_and_validate_str("[refresh]\ninterval_secs = 120\n")
            .expect("inline config should be valid");
        assert_eq!(config.refresh.interval_secs, 120);
        assert_eq!(config.service.name, "betasign");
    }
}
