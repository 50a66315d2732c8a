//! Error handling for scenepack
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`ScenePackError`]) for the failure modes the
//!    pipeline distinguishes: input validation, host-application boundary
//!    failures, and manifest/archive structural problems.
//! 2. **User-friendly presentation** ([`ErrorContext`]) with actionable
//!    suggestions for CLI users.
//!
//! Resolution misses (a referenced file that does not exist on disk) are not
//! errors at all - they are counted in diagnostics and dropped. Per-document
//! parse failures degrade to empty results with a warning. Only conditions
//! that prevent producing a structurally valid manifest or archive surface
//! through this module.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for scenepack operations.
#[derive(Error, Debug)]
pub enum ScenePackError {
    /// The input scene file does not exist.
    #[error("Scene file not found: {path}")]
    SceneNotFound {
        /// Path that was checked
        path: String,
    },

    /// The input scene carries an extension other than `.ma`/`.mb`.
    #[error("Unsupported scene format '{extension}' (expected .ma or .mb)")]
    UnsupportedSceneFormat {
        /// The offending extension
        extension: String,
    },

    /// No host application (mayapy) could be located for a step that
    /// requires it.
    #[error("Host application not found; pass --inspector or put mayapy on PATH")]
    HostAppNotFound,

    /// The host-application subprocess failed or produced no usable JSON.
    #[error("Scene inspection failed: {reason}")]
    InspectionFailed {
        /// What went wrong (exit status, missing output, parse failure)
        reason: String,
    },

    /// The host-application subprocess exceeded its deadline.
    #[error("Host application timed out after {seconds}s")]
    InspectionTimeout {
        /// The deadline that was exceeded
        seconds: u64,
    },

    /// Binary-to-text scene conversion failed.
    #[error("Scene conversion failed: {reason}")]
    ConversionFailed {
        /// What went wrong
        reason: String,
    },

    /// The upload manifest on disk could not be parsed.
    #[error("Invalid upload manifest: {file}")]
    ManifestParseError {
        /// Path to the manifest that failed to parse
        file: String,
    },

    /// The output archive could not be created at all (as opposed to
    /// individual member write failures, which are counted and logged).
    #[error("Failed to create archive {path}: {reason}")]
    ArchiveCreateFailed {
        /// Intended archive path
        path: String,
        /// Underlying cause
        reason: String,
    },

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wraps an error with a user-facing suggestion and optional details.
pub struct ErrorContext {
    /// The underlying error
    pub error: anyhow::Error,
    /// A short actionable hint
    pub suggestion: Option<String>,
    /// Longer background information
    pub details: Option<String>,
}

impl ErrorContext {
    /// Creates a context with no suggestion.
    #[must_use]
    pub fn new(error: anyhow::Error) -> Self {
        Self { error, suggestion: None, details: None }
    }

    /// Attaches a suggestion line.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attaches a details line.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Prints the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{} {}", "Error:".red().bold(), self.error);
        if let Some(details) = &self.details {
            eprintln!("  {details}");
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("{} {}", "Hint:".yellow().bold(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\n  {details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nHint: {suggestion}")?;
        }
        Ok(())
    }
}

/// Converts any error into a user-friendly [`ErrorContext`], attaching
/// suggestions for the failure modes users can act on.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let suggestion = match error.downcast_ref::<ScenePackError>() {
        Some(ScenePackError::SceneNotFound { .. }) => {
            Some("Check the --scene path; it must point at an existing .ma or .mb file".to_string())
        }
        Some(ScenePackError::UnsupportedSceneFormat { .. }) => {
            Some("Only Maya ASCII (.ma) and Maya Binary (.mb) scenes can be packaged".to_string())
        }
        Some(ScenePackError::HostAppNotFound) => Some(
            "Install Maya and ensure mayapy is on PATH, or pass --inspector /path/to/mayapy"
                .to_string(),
        ),
        Some(ScenePackError::InspectionTimeout { .. }) => {
            Some("Large scenes can exceed the inspection deadline; retry on a faster disk or simplify the scene".to_string())
        }
        Some(ScenePackError::ManifestParseError { .. }) => {
            Some("Re-run the package step to regenerate upload.json, or fix the hand-edited file".to_string())
        }
        _ => None,
    };

    let mut context = ErrorContext::new(error);
    if let Some(suggestion) = suggestion {
        context = context.with_suggestion(suggestion);
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_not_found_gets_suggestion() {
        let err = anyhow::Error::from(ScenePackError::SceneNotFound { path: "/x.ma".into() });
        let ctx = user_friendly_error(err);
        assert!(ctx.suggestion.is_some());
        assert!(format!("{ctx}").contains("/x.ma"));
    }

    #[test]
    fn generic_error_has_no_suggestion() {
        let ctx = user_friendly_error(anyhow::anyhow!("boom"));
        assert!(ctx.suggestion.is_none());
    }
}
