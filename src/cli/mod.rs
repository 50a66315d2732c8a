//! Command-line interface for scenepack.
//!
//! Each subcommand lives in its own module with its own argument struct and
//! execution logic:
//!
//! - `package` - generate `upload.json` and `render_settings.json` for a
//!   scene, then bundle the scene and its dependencies into a zip archive
//! - `externals` - inspect a scene and print its expanded external-file
//!   lists as JSON
//!
//! Both commands emit a single machine-readable JSON line on stdout so that
//! wrapping tools (submitters, farm dashboards) can consume the result
//! without scraping logs. Human-readable progress goes to the run log
//! (console and/or `--log-file`), diagnostics to `tracing` on stderr.

mod externals;
mod package;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Top-level CLI for the scenepack packaging tool.
#[derive(Parser)]
#[command(
    name = "scenepack",
    about = "Package a Maya scene and its dependencies for render-farm upload",
    version,
    long_about = "scenepack extracts every external file a Maya scene depends on \
(textures, caches, references, XGen data), writes an upload manifest and render \
settings summary, and bundles everything into a zip archive laid out by server path."
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose diagnostic output on stderr.
    ///
    /// Equivalent to `RUST_LOG=debug`. Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress everything except errors and the final JSON result.
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Generate upload.json, render_settings.json and the upload zip.
    Package(package::PackageCommand),

    /// Inspect a scene and print its expanded external files as JSON.
    Externals(externals::ExternalsCommand),
}

impl Cli {
    /// Executes the parsed command.
    ///
    /// Installs the tracing subscriber exactly once, honoring `RUST_LOG`
    /// over the verbosity flags, then dispatches.
    pub async fn execute(self) -> Result<()> {
        let default_filter = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();

        match self.command {
            Commands::Package(cmd) => cmd.execute(self.quiet).await,
            Commands::Externals(cmd) => cmd.execute().await,
        }
    }
}
