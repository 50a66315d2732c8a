//! scenepack CLI entry point
//!
//! Parses command-line arguments, runs the selected subcommand, and turns
//! failures into user-friendly error output with suggestions.

use anyhow::Result;
use clap::Parser;
use scenepack::cli;
use scenepack::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
