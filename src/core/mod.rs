//! Core types and error handling
//!
//! This module defines the typed error enum shared across the packaging
//! pipeline and the user-friendly error presentation used by the CLI.

pub mod error;

pub use error::{ErrorContext, ScenePackError, user_friendly_error};

/// Extension of the text scene format. The packager only parses this format;
/// the binary variant is converted by the host application first.
pub const ASCII_SCENE_EXT: &str = ".ma";

/// Extension of the legacy binary scene format.
pub const BINARY_SCENE_EXT: &str = ".mb";

/// Extension of procedural-hair description files.
pub const XGEN_EXT: &str = ".xgen";

/// Returns true when `path` (case-insensitively) carries the given extension.
#[must_use]
pub fn has_extension(path: &str, ext: &str) -> bool {
    path.to_lowercase().ends_with(ext)
}
