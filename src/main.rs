//! Sampler FX CLI
//!
//! Command-line interface for the sampler-fx offline renderer.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sampler_fx::cli::commands;
use sampler_fx::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Sampler FX v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(cmd) => handle_command(cmd, &config),
        None => {
            println!("Sampler FX v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: &sampler_fx::EngineConfig) -> Result<()> {
    match cmd {
        Commands::Chain {
            render,
            effects,
            state,
            save_state,
        } => commands::render_chain(
            config,
            &render,
            &effects,
            state.as_deref(),
            save_state.as_deref(),
        ),
        Commands::Stretch {
            render,
            division,
            pitch,
            mix,
        } => commands::render_stretch(config, &render, division, pitch, mix),
        Commands::Granular { render, seed } => commands::render_granular(config, &render, seed),
        Commands::Effects => commands::list_effects(),
    }
}
