//! PWDongle CLI
//!
//! Runs the dongle against the local machine (serial console on stdio, BLE
//! link on a TCP port) and offers offline tools for macro files and the store.

use anyhow::Result;
use clap::Parser;

mod cli;
use cli::{Cli, Commands, StoreCommands};

mod commands;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            sink,
            ble_addr,
            no_ble,
            gadget,
        } => commands::run::run(config, sink, ble_addr, no_ble, &gadget),
        Commands::Play {
            file,
            sink,
            raw,
            gadget,
        } => commands::play::play(&config, &file, sink, raw, &gadget),
        Commands::Check { file, no_delays } => commands::check::check(&config, &file, no_delays),
        Commands::Store(cmd) => match cmd {
            StoreCommands::List { show_secrets } => commands::store::list(&config, show_secrets),
            StoreCommands::Clear { namespace } => commands::store::clear(&config, &namespace),
            StoreCommands::SetPin { pin } => commands::store::set_pin(&config, &pin),
        },
        Commands::Eval {
            expr,
            condition,
            vars,
        } => commands::eval::eval(&expr, condition, vars),
        Commands::Unlock { code } => commands::unlock::unlock(config, &code),
    }
}
