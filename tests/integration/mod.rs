//! Integration test suite for scenepack
//!
//! End-to-end tests that build real scene trees in temp directories and
//! exercise the packaging pipeline both through the library API and through
//! the compiled binary.
//!
//! # Running
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **packaging**: library-level pipeline (extraction, manifest, archive)
//! - **cli**: binary invocations of `package` and `externals`

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli;
mod packaging;
