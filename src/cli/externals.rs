//! The `externals` subcommand.
//!
//! Inspects a scene with the host application and prints its expanded
//! external-file lists as a single JSON object, without writing any
//! packaging artifacts. Useful for pre-flight checks and debugging which
//! dependencies a scene will pull in.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::core::ScenePackError;
use crate::expand::expand_external_files;
use crate::inspect::HostApp;
use crate::report::NullLog;

/// Arguments for the `externals` subcommand.
#[derive(Args)]
pub struct ExternalsCommand {
    /// Path to the `.ma` or `.mb` scene file.
    #[arg(long)]
    scene: PathBuf,

    /// Explicit path to the host application interpreter (`mayapy`).
    #[arg(long)]
    inspector: Option<PathBuf>,
}

impl ExternalsCommand {
    /// Executes the command, printing the JSON result on stdout.
    pub async fn execute(self) -> Result<()> {
        if !self.scene.is_file() {
            return Err(ScenePackError::SceneNotFound {
                path: self.scene.to_string_lossy().into_owned(),
            }
            .into());
        }

        // This command exists to report what the host sees, so a missing
        // host application is fatal here, unlike `package`.
        let host = HostApp::locate(self.inspector)?;
        let scene_abs = std::path::absolute(&self.scene)?;

        let out_json = tempfile::Builder::new()
            .prefix("scene_description")
            .suffix(".json")
            .tempfile()?;
        let description = host.inspect_scene(&scene_abs, out_json.path()).await?;

        let expanded = expand_external_files(&scene_abs, &description, &NullLog);

        println!(
            "{}",
            json!({
                "scene": scene_abs.to_string_lossy(),
                "renderer": description.renderer,
                "all_files": expanded.all_files,
                "by_type": expanded.by_type,
            })
        );
        Ok(())
    }
}
