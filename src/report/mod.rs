//! Per-run progress reporting
//!
//! Every packaging run constructs its own [`Reporter`] and threads it through
//! the pipeline as a `&dyn RunLog`. There is no process-global logging state
//! for run output: the reporter is opened at run start and flushed at run end,
//! so two runs in one process never interleave their log files.
//!
//! Diagnostic logging (the `tracing` macros) remains separate and is
//! controlled by `--verbose`/`--quiet`/`RUST_LOG`; `RunLog` carries the
//! user-facing run narrative - step headers, per-category counts, warnings
//! about degraded collection.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;

/// Logging capability passed into every pipeline component.
///
/// Components never decide where output goes; they report through whatever
/// implementation the caller hands them. Tests typically pass [`NullLog`].
pub trait RunLog {
    /// Reports normal progress output.
    fn info(&self, message: &str);
    /// Reports a recoverable problem; the run continues.
    fn warn(&self, message: &str);
    /// Reports a fatal problem; the caller decides whether to abort.
    fn error(&self, message: &str);
}

/// A `RunLog` that discards everything. Used by tests and library callers
/// that do their own reporting.
pub struct NullLog;

impl RunLog for NullLog {
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Timestamped console/file reporter for one packaging run.
pub struct Reporter {
    console: bool,
    file: Option<Mutex<BufWriter<File>>>,
}

impl Reporter {
    /// Creates a console-only reporter.
    #[must_use]
    pub fn console() -> Self {
        Self { console: true, file: None }
    }

    /// Creates a reporter that writes nowhere. Quiet runs still need a
    /// concrete reporter for the pipeline signature.
    #[must_use]
    pub fn silent() -> Self {
        Self { console: false, file: None }
    }

    /// Creates a reporter writing to `path`, optionally echoing to the
    /// console. `append` controls whether an existing log file is extended or
    /// truncated.
    pub fn with_log_file(path: &Path, console: bool, append: bool) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        Ok(Self { console, file: Some(Mutex::new(BufWriter::new(file))) })
    }

    /// Prints a section header surrounded by separators.
    pub fn section(&self, title: &str) {
        self.separator('=');
        self.info(title);
        self.separator('=');
    }

    /// Prints a separator line.
    pub fn separator(&self, ch: char) {
        self.write_line(&ch.to_string().repeat(60), None);
    }

    /// Flushes the log file, if any. Called once at run end.
    pub fn flush(&self) {
        if let Some(file) = &self.file
            && let Ok(mut writer) = file.lock()
        {
            let _ = writer.flush();
        }
    }

    fn write_line(&self, message: &str, level: Option<&str>) {
        let stamped = format!("[{}] {message}", Local::now().format("%H:%M:%S"));
        if self.console {
            match level {
                Some("warn") => eprintln!("{}", stamped.yellow()),
                Some("error") => eprintln!("{}", stamped.red()),
                _ => eprintln!("{stamped}"),
            }
        }
        if let Some(file) = &self.file
            && let Ok(mut writer) = file.lock()
        {
            let _ = writeln!(writer, "{stamped}");
        }
    }
}

impl RunLog for Reporter {
    fn info(&self, message: &str) {
        self.write_line(message, None);
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
        self.write_line(&format!("WARNING: {message}"), Some("warn"));
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
        self.write_line(&format!("ERROR: {message}"), Some("error"));
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.flush();
    }
}
