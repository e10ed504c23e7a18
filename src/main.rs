//! Buster - a cache-busting asset pipeline for static sites.

#![allow(dead_code)]

mod asset;
mod cli;
mod config;
mod core;
mod logger;
mod pipeline;
mod rev;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands, build::build_site};
use config::{BusterConfig, clear_clean_flag, init_config};
use core::BuildMode;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = init_config(BusterConfig::load(cli)?);

    match &cli.command {
        Commands::Build { dev, .. } => {
            let mode = if *dev {
                BuildMode::DEVELOPMENT
            } else {
                BuildMode::PRODUCTION
            };
            build_site(mode, &config, false)
        }
        Commands::Serve { .. } => serve(),
        Commands::Deploy { .. } => {
            build_site(BuildMode::PRODUCTION, &config, false)?;
            cli::deploy::deploy_site(&config)
        }
    }
}

// =============================================================================
// Serve Command
// =============================================================================

/// Start the development server with a background initial build.
fn serve() -> Result<()> {
    use crate::core::{set_healthy, set_serving};

    // Bind the HTTP server first so early requests get a loading page
    // instead of a connection error
    let bound_server = cli::serve::bind_server()?;

    // Initial development build in the background
    std::thread::spawn(move || {
        let config = config::cfg();

        let build_success = match build_site(BuildMode::DEVELOPMENT, &config, false) {
            Ok(()) => true,
            Err(e) => {
                log!("error"; "initial build failed: {:#}", e);
                false
            }
        };

        // Track build health for the watcher (an unhealthy tree forces
        // the next change to rebuild everything)
        set_healthy(build_success);

        // Only clear the clean flag after a successful build, so a
        // retry still cleans the output directory
        if build_success {
            clear_clean_flag();
        }

        set_serving();
    });

    bound_server.run()
}
