//! Host-application boundary
//!
//! Scene inspection and binary-to-text conversion are delegated to the host
//! application's Python interpreter (`mayapy`), treated as an opaque external
//! command. The contract is narrow:
//!
//! - **Inspection**: `<program> <scene> <output.json>` writes a structured
//!   scene description to the output path, or prints it as the last JSON
//!   object on stdout. Deadline: 300 seconds.
//! - **Conversion**: `<program> --convert <input.mb> <output.ma>` writes the
//!   text-format scene. Deadline: 1200 seconds.
//!
//! A timeout, a non-zero exit, or output that parses as neither file nor
//! stdout JSON is a run-fatal error; the pipeline does not retry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::core::ScenePackError;
use crate::expand::SceneDescription;

/// Deadline for scene inspection.
pub const INSPECT_TIMEOUT_SECS: u64 = 300;
/// Deadline for binary-to-text conversion.
pub const CONVERT_TIMEOUT_SECS: u64 = 1200;

/// Handle on a located host-application interpreter.
#[derive(Debug, Clone)]
pub struct HostApp {
    program: PathBuf,
}

impl HostApp {
    /// Uses an explicitly configured interpreter path.
    #[must_use]
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Locates `mayapy` on `PATH`, preferring an explicit override.
    ///
    /// An explicit path that does not exist is an error, not a fallback to
    /// the `PATH` search.
    pub fn locate(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(program) = explicit {
            if !program.is_file() {
                return Err(ScenePackError::HostAppNotFound.into());
            }
            return Ok(Self::new(program));
        }
        let program = which::which("mayapy").map_err(|_| ScenePackError::HostAppNotFound)?;
        Ok(Self::new(program))
    }

    /// The interpreter path this handle runs.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Inspects a scene, returning its structured description.
    pub async fn inspect_scene(
        &self,
        scene_path: &Path,
        output_json: &Path,
    ) -> Result<SceneDescription> {
        let output = self
            .run(
                &[scene_path.as_os_str(), output_json.as_os_str()],
                INSPECT_TIMEOUT_SECS,
            )
            .await?;

        // The description may land in the output file or on stdout,
        // whichever the host script chose.
        if output_json.exists() {
            let content = std::fs::read_to_string(output_json)?;
            if let Ok(description) = serde_json::from_str(&content) {
                return Ok(description);
            }
        }
        last_json_line(&output).ok_or_else(|| {
            ScenePackError::InspectionFailed {
                reason: "host application produced no parseable scene description".into(),
            }
            .into()
        })
    }

    /// Converts a binary scene to the text format at `output_ma`.
    pub async fn convert_scene(&self, input_mb: &Path, output_ma: &Path) -> Result<()> {
        self.run(
            &[
                std::ffi::OsStr::new("--convert"),
                input_mb.as_os_str(),
                output_ma.as_os_str(),
            ],
            CONVERT_TIMEOUT_SECS,
        )
        .await?;

        if !output_ma.exists() {
            return Err(ScenePackError::ConversionFailed {
                reason: format!("no output written at {}", output_ma.display()),
            }
            .into());
        }
        Ok(())
    }

    async fn run(&self, args: &[&std::ffi::OsStr], deadline_secs: u64) -> Result<String> {
        debug!("running host application {:?} {args:?}", self.program);
        let child = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = timeout(Duration::from_secs(deadline_secs), child)
            .await
            .map_err(|_| ScenePackError::InspectionTimeout { seconds: deadline_secs })?
            .map_err(|err| ScenePackError::InspectionFailed {
                reason: format!("failed to launch {}: {err}", self.program.display()),
            })?;

        if !output.status.success() {
            return Err(ScenePackError::InspectionFailed {
                reason: format!(
                    "exit status {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Scans stdout from the last line backwards for a JSON object that parses
/// as a scene description. Host scripts tend to print diagnostics first and
/// the payload last.
fn last_json_line(stdout: &str) -> Option<SceneDescription> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str(line).ok())
}
