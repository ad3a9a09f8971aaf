//! Convox Installer CLI.
//!
//! Installs a Convox rack on AWS, creates the application with its S3, RDS
//! and ElastiCache resources, and deploys it.

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use convox_installer::{ui, InstallerError};

mod commands;

use commands::install::InstallCommand;

/// Convox Installer - rack and application provisioning for AWS.
#[derive(Parser)]
#[command(
    name = "convox-installer",
    version,
    about = "Install a Convox rack and application on AWS",
    long_about = "Install a Convox rack on AWS and deploy your application.\n\n\
                  Answers are saved as you go. Every step checks whether its\n\
                  resource already exists, so if anything fails you can re-run\n\
                  the installer and it will continue where it left off."
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    install: InstallCommand,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing, RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info,convox_installer=debug")
        } else {
            EnvFilter::new("warn,convox_installer=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.install.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::print_error(&format!("{err:#}"));
            ui::print_info(failure_hint(&err));
            ExitCode::FAILURE
        }
    }
}

fn failure_hint(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<InstallerError>() {
        Some(e) if e.is_retryable_by_rerun() => "Nothing is lost. Re-run the installer to continue.",
        _ => "Fix the problem above, then re-run the installer to continue.",
    }
}
