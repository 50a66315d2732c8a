//! scenepack - Maya scene packaging for render-farm upload
//!
//! A packaging tool that takes a Maya scene file (`.ma` or `.mb`), discovers
//! every external file the scene depends on, and produces the three artifacts
//! a render farm needs to pick the job up:
//!
//! - `upload.json` - the upload manifest mapping each local file to its
//!   server-side path, with content hashes for the scene itself
//! - `render_settings.json` - renderer, resolution, frame range and output
//!   format extracted from the scene
//! - `<scene>_<ext>.zip` - the scene and its dependencies laid out by server
//!   path, ready to unpack at the farm's input root
//!
//! # Architecture Overview
//!
//! Dependency discovery works on the scene's text form without loading it
//! into the host application:
//! - A fixed battery of regular expressions pulls candidate paths out of the
//!   scene source ([`extract`])
//! - Candidates are resolved against an ordered list of base directories and
//!   filtered to files that exist on disk
//! - XGen description files are parsed for their `${PROJECT}`/`${DESC}`
//!   variable paths and data directories ([`xgen`])
//! - OCIO color-management configs pull in their sibling LUT directories
//!
//! The host application (`mayapy`) is only consulted at two points, both
//! behind the [`inspect`] boundary: converting binary scenes to text, and
//! producing the structured scene description that feeds render settings and
//! the [`expand`] module's external-file view. A text scene can be packaged
//! without the host application installed.
//!
//! # Core Modules
//!
//! - [`cli`] - command-line interface (`package`, `externals`)
//! - [`core`] - scene-format constants and the error type
//! - [`extract`] - regex-based scene reference extraction and resolution
//! - [`xgen`] - XGen description parsing and variable-path resolution
//! - [`expand`] - external-file expansion of the host's scene description
//! - [`manifest`] - upload manifest model, hashing, server-path mapping
//! - [`archive`] - upload zip assembly
//! - [`inspect`] - host-application subprocess boundary
//! - [`report`] - run logging to console and/or file
//! - [`utils`] - path normalization and directory collection

#![warn(clippy::all)]

pub mod archive;
pub mod cli;
pub mod core;
pub mod expand;
pub mod extract;
pub mod inspect;
pub mod manifest;
pub mod report;
pub mod utils;
pub mod xgen;
