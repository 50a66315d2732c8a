//! Cross-platform utilities shared by the packaging pipeline
//!
//! This module provides the path handling primitives every other component
//! builds on: separator normalization, absolute/relative classification, and
//! filtered directory collection.
//!
//! # Cross-Platform Considerations
//!
//! Maya scenes travel between Windows workstations and Linux render nodes, so
//! every path that enters the pipeline is normalized to forward slashes before
//! any comparison or deduplication takes place. Drive letters are preserved
//! here and only folded by the server path mapper.

pub mod paths;

pub use paths::{
    OCIO_EXTENSIONS, collect_directory_files, is_absolute_path, normalize_separators,
    resolve_against,
};
