//! Upload manifest model and builder
//!
//! The upload manifest (`upload.json`) is the contract between the packager
//! and the render farm: one scene entry carrying two content fingerprints,
//! plus one asset entry per dependency, each with a local path and its mapped
//! server path.
//!
//! ```json
//! {
//!   "scene": [
//!     { "hash": "<32-hex md5>", "local": "C:/Wolf/scenes/wolf.ma",
//!       "server": "/C/Wolf/scenes/wolf.ma", "xxhash": "1234567890" }
//!   ],
//!   "asset": [
//!     { "local": "C:/Wolf/tex/skin.png", "server": "/C/Wolf/tex/skin.png" }
//!   ]
//! }
//! ```
//!
//! Invariants:
//! - `scene` always holds exactly one entry.
//! - `asset` entries are unique by `local`, and the scene's own path never
//!   appears among them.
//! - Every asset `local` is an existing file at build time.
//!
//! The manifest is built from scratch on every packaging run and written to a
//! single JSON file. The archive assembler reads it back from disk rather
//! than reusing the in-memory value, so a hand-edited manifest is honored.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

use crate::core::{ASCII_SCENE_EXT, XGEN_EXT, has_extension};
use crate::extract::collect_existing_paths;
use crate::report::RunLog;
use crate::utils::normalize_separators;


/// The single scene entry of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SceneEntry {
    /// MD5 digest of the scene file content, 32 hex characters.
    pub hash: String,
    /// Normalized absolute local path.
    pub local: String,
    /// Mapped server path.
    pub server: String,
    /// XXH64 digest of the scene file content, as a decimal string.
    pub xxhash: String,
}

/// One dependency of the scene.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetEntry {
    /// Normalized absolute local path.
    pub local: String,
    /// Mapped server path.
    pub server: String,
}

/// The persisted upload manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadManifest {
    /// Exactly one entry for the scene file itself.
    pub scene: Vec<SceneEntry>,
    /// Every bundled dependency, unique by `local`.
    pub asset: Vec<AssetEntry>,
}

impl UploadManifest {
    /// Loads a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid upload manifest: {}", path.display()))
    }

    /// Writes the manifest as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write manifest {}", path.display()))
    }

    /// The scene's local path, when the manifest has its scene entry.
    #[must_use]
    pub fn scene_local(&self) -> Option<&str> {
        self.scene.first().map(|entry| entry.local.as_str())
    }
}

/// Maps a local path to its canonical server-side path.
///
/// The local path is normalized, a leading drive letter is folded
/// (`C:/Project/x` becomes `/C/Project/x`), and a non-empty `server_root` is
/// prefixed onto the result. Pure and total for any input string.
///
/// # Examples
///
/// ```
/// use scenepack::manifest::to_server_path;
///
/// assert_eq!(to_server_path("C:/Project/x.ma", ""), "/C/Project/x.ma");
/// assert_eq!(to_server_path("C:/Project/x.ma", "/input/job"), "/input/job/C/Project/x.ma");
/// ```
#[must_use]
pub fn to_server_path(local_path: &str, server_root: &str) -> String {
    let mut path = normalize_separators(local_path);

    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        let drive = (bytes[0] as char).to_ascii_uppercase();
        path = format!("/{drive}{}", &path[2..]);
    }

    if server_root.trim().is_empty() {
        return path;
    }

    let mut root = server_root.to_string();
    if !root.ends_with('/') {
        root.push('/');
    }
    format!("{root}{}", path.trim_start_matches('/'))
}

/// Returns true when an `.xgen` asset should be excluded because its
/// basename does not start with the scene's basename.
fn is_foreign_xgen(local: &str, scene_basename: &str) -> bool {
    if !has_extension(local, XGEN_EXT) || scene_basename.is_empty() {
        return false;
    }
    Path::new(local)
        .file_stem()
        .map(|stem| !stem.to_string_lossy().starts_with(scene_basename))
        .unwrap_or(false)
}

/// Builds the upload manifest for a scene.
///
/// Runs the extractor's full resolution and enrichment pipeline rooted at the
/// scene's directory, filters the results (the scene itself, any `.ma` file,
/// and foreign `.xgen` descriptions are never assets), maps every surviving
/// path to its server path, and fingerprints the scene bytes with MD5 and
/// XXH64.
///
/// A scene without the text format extension yields an empty manifest and an
/// error log entry, not a panic or an `Err` - the caller gates on the
/// extension before getting here in normal operation. A scene that cannot be
/// read for hashing degrades to sentinel zero digests with a warning.
pub fn build_upload_mapping(
    scene_path: &Path,
    server_root: &str,
    log: &dyn RunLog,
) -> UploadManifest {
    let scene_str = scene_path.to_string_lossy();
    if !has_extension(&scene_str, ASCII_SCENE_EXT) {
        log.error(&format!("not a Maya ASCII scene: {scene_str}"));
        return UploadManifest::default();
    }

    let (existing_files, _stats) = collect_existing_paths(scene_path, None, log);

    log.info("  [2/3] building asset mapping...");

    let scene_local =
        normalize_separators(&std::path::absolute(scene_path).unwrap_or_else(|_| scene_path.to_path_buf()).to_string_lossy());
    let scene_basename =
        scene_path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();

    let mut asset: Vec<AssetEntry> = Vec::new();
    let mut added: BTreeSet<String> = BTreeSet::new();

    for file_path in &existing_files {
        let normalized = normalize_separators(file_path);
        if normalized == scene_local {
            continue;
        }
        // The scene format never travels as an asset, even when referenced.
        if has_extension(&normalized, ASCII_SCENE_EXT) {
            continue;
        }
        if is_foreign_xgen(&normalized, &scene_basename) {
            continue;
        }
        if added.insert(normalized.clone()) {
            asset.push(AssetEntry {
                server: to_server_path(&normalized, server_root),
                local: normalized,
            });
        }
    }

    log.info("  [3/3] hashing scene file...");

    let (hash, xxhash) = match std::fs::read(scene_path) {
        Ok(content) => {
            let mut md5 = Md5::new();
            md5.update(&content);
            (hex::encode(md5.finalize()), xxh64(&content, 0).to_string())
        }
        Err(err) => {
            log.warn(&format!("could not hash scene file: {err}"));
            ("0".repeat(32), "0".to_string())
        }
    };

    let server = to_server_path(&scene_local, server_root);
    UploadManifest {
        scene: vec![SceneEntry { hash, local: scene_local, server, xxhash }],
        asset,
    }
}
