//! XGen description file parser
//!
//! `.xgen` files describe procedural hair/fur setups in a line-oriented text
//! grammar: top-level blocks (`Palette`, `Description`, ...) hold
//! `key<ws>value` pairs, and a special `MapTextures` block (terminated by a
//! literal `endAttrs` line) holds tab-separated `(module, attribute, path)`
//! triples. Values may embed two path variables:
//!
//! - `${PROJECT}` - the palette's project root (`xgProjectPath`)
//! - `${DESC}` - the collection data directory on disk
//!
//! and `map('...')` function calls whose argument is itself a path.
//!
//! The parser extracts every reference, substitutes variables, and resolves
//! each candidate against an ordered list of base directories, keeping only
//! paths that exist on disk.
//!
//! # Example grammar
//!
//! ```text
//! Palette
//!     name            wolf_fur_v02
//!     xgDataPath      ${PROJECT}xgen/collections/wolf_fur_v02
//!     xgProjectPath   C:/Project/Wolf/
//!
//! Description
//!     name            fur_of_body
//!     cacheFileName   ${DESC}/guides.abc
//!
//! MapTextures
//! Clumping1\tmask\tE:/textures/fur_mask.iff
//! endAttrs
//! ```

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::report::RunLog;
use crate::utils::{collect_directory_files, is_absolute_path, normalize_separators};


/// Extensions collected when an `xgDataPath` value resolves to a directory:
/// textures, Alembic guide caches, XGen config files, and groom scripts.
const DATA_DIR_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".exr", ".tif", ".tiff", ".iff", ".tga", ".abc", ".xgc", ".xgd",
    ".mel", ".py",
];

static KV_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\t+|\s{2,}").expect("valid key/value split pattern"));

static MAP_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"map\(['"]([^'"]+)['"]\)"#).expect("valid map() pattern"));

/// Structured contents of one parsed `.xgen` file.
#[derive(Debug, Default, Clone)]
pub struct XgenDoc {
    /// First `xgProjectPath` value seen in the file (first occurrence wins).
    pub project_path: String,
    /// Every `xgDataPath` value, in document order.
    pub data_paths: Vec<String>,
    /// Every `cacheFileName` value, in document order.
    pub cache_file_names: Vec<String>,
    /// Paths pulled out of `map('...')` expressions anywhere in the file.
    pub map_references: Vec<String>,
    /// `MapTextures` triples keyed by `module_attribute`.
    pub map_textures: BTreeMap<String, String>,
}

/// Parses the text grammar into an [`XgenDoc`]. Pure function, no I/O.
#[must_use]
pub fn parse_text(content: &str) -> XgenDoc {
    let mut doc = XgenDoc::default();
    let mut in_map_textures = false;

    for line in content.lines() {
        let stripped = line.trim();

        if stripped == "MapTextures" {
            in_map_textures = true;
            continue;
        }
        if stripped == "endAttrs" && in_map_textures {
            in_map_textures = false;
            continue;
        }

        // Tab-separated (module, attribute, path) triples inside MapTextures.
        if in_map_textures && line.contains('\t') {
            let fields: Vec<&str> =
                line.split('\t').map(str::trim).filter(|f| !f.is_empty()).collect();
            if fields.len() >= 3 {
                doc.map_textures.insert(format!("{}_{}", fields[0], fields[1]), fields[2].into());
            }
            continue;
        }

        // Key/value pairs split on tabs or 2+ spaces.
        if stripped.contains('\t') || stripped.contains("  ") {
            let mut parts = KV_SPLIT_RE.splitn(stripped, 2);
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if value.is_empty() {
                continue;
            }

            match key {
                // First occurrence wins; later palettes do not override.
                "xgProjectPath" if doc.project_path.is_empty() => {
                    doc.project_path = value.to_string();
                }
                "xgDataPath" => doc.data_paths.push(value.to_string()),
                "cacheFileName" => doc.cache_file_names.push(value.to_string()),
                _ => {}
            }

            if value.contains("map(") {
                doc.map_references.extend(extract_map_references(value));
            }
        }
    }

    doc
}

/// Extracts the path arguments of every `map('...')` call in an expression,
/// with trailing slashes stripped.
#[must_use]
pub fn extract_map_references(expression: &str) -> Vec<String> {
    MAP_CALL_RE
        .captures_iter(expression)
        .filter_map(|caps| {
            let path = caps[1].trim_end_matches('/');
            (!path.is_empty()).then(|| path.to_string())
        })
        .collect()
}

/// Resolves one raw reference from an `.xgen` file to an existing absolute
/// path, or `None` when no candidate exists on disk.
///
/// Steps:
/// 1. Normalize separators.
/// 2. Substitute `${PROJECT}` with `project_path`, or with a root derived two
///    directory levels above `data_root` when the project path is unknown.
/// 3. Substitute `${DESC}` with `data_root`.
/// 4. An absolute result is returned if it exists; otherwise a file with the
///    same basename is searched for under `data_root` (renamed project roots
///    are common after a project moves between machines).
/// 5. A relative result is tried against each base in order - data root,
///    project path, then the description file's own directory - and the
///    first candidate that exists wins.
#[must_use]
pub fn resolve_variable_path(
    raw: &str,
    data_root: Option<&Path>,
    project_path: &str,
    fallback_dir: &Path,
) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let mut resolved = normalize_separators(raw).trim().to_string();

    if resolved.contains("${PROJECT}") {
        if !project_path.is_empty() {
            let root = format!("{}/", project_path.trim_end_matches('/'));
            resolved = resolved.replace("${PROJECT}", &root);
        } else if let Some(root) = data_root.and_then(derive_project_root) {
            resolved = resolved.replace("${PROJECT}", &format!("{root}/"));
        }
    }

    if resolved.contains("${DESC}")
        && let Some(root) = data_root
    {
        let root = normalize_separators(&root.to_string_lossy());
        resolved = resolved.replace("${DESC}", root.trim_end_matches('/'));
    }

    if is_absolute_path(&resolved) {
        if Path::new(&resolved).exists() {
            return Some(resolved);
        }
        // The recorded path may predate a project move; fall back to a
        // basename search under the data root.
        let file_name = Path::new(&resolved).file_name()?.to_owned();
        let data_root = data_root.filter(|root| root.exists())?;
        for entry in WalkDir::new(data_root).into_iter().flatten() {
            if entry.file_type().is_file() && entry.file_name() == file_name {
                return Some(normalize_separators(&entry.path().to_string_lossy()));
            }
        }
        return None;
    }

    // Ordered fallback: the most specific base directory is tried first.
    let bases: [Option<PathBuf>; 3] = [
        data_root.map(Path::to_path_buf),
        (!project_path.is_empty()).then(|| PathBuf::from(project_path)),
        Some(fallback_dir.to_path_buf()),
    ];
    bases
        .into_iter()
        .flatten()
        .map(|base| normalize_separators(&base.join(&resolved).to_string_lossy()))
        .find(|candidate| Path::new(candidate).exists())
}

/// Approximates the project root as two directory levels above the data
/// root (`<project>/xgen/collections` being the conventional layout).
fn derive_project_root(data_root: &Path) -> Option<String> {
    let root = data_root.parent()?.parent()?;
    Some(normalize_separators(&root.to_string_lossy()))
}

/// Parses one `.xgen` file and returns every referenced file that exists on
/// disk, as sorted normalized absolute paths.
///
/// Collects, in order: `MapTextures` entries, `cacheFileName` values,
/// `map('...')` references, and - when an `xgDataPath` value resolves to a
/// directory - the allow-listed contents of that directory.
pub fn parse_xgen_file(xgen_path: &Path, data_root: &Path, log: &dyn RunLog) -> Vec<String> {
    if !xgen_path.exists() {
        return Vec::new();
    }

    let content = match std::fs::read(xgen_path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            log.warn(&format!("failed to read xgen file {}: {err}", xgen_path.display()));
            return Vec::new();
        }
    };

    let doc = parse_text(&content);
    let fallback_dir = xgen_path.parent().unwrap_or(Path::new("."));
    let mut referenced: BTreeSet<String> = BTreeSet::new();

    let direct_refs = doc
        .map_textures
        .values()
        .chain(doc.cache_file_names.iter())
        .chain(doc.map_references.iter());
    for reference in direct_refs {
        if let Some(path) =
            resolve_variable_path(reference, Some(data_root), &doc.project_path, fallback_dir)
            && Path::new(&path).is_file()
        {
            referenced.insert(path);
        }
    }

    for data_path in &doc.data_paths {
        if let Some(path) =
            resolve_variable_path(data_path, Some(data_root), &doc.project_path, fallback_dir)
            && Path::new(&path).is_dir()
        {
            let mut collected = Vec::new();
            collect_directory_files(Path::new(&path), &mut collected, Some(DATA_DIR_EXTENSIONS));
            referenced.extend(collected);
        }
    }

    referenced.into_iter().collect()
}

/// Collects every dependency of an `.xgen` file, auto-detecting the data root
/// when none is supplied.
///
/// Detection assumes the conventional project layout: a description file in
/// `<project>/scenes/` pairs with data under `<project>/xgen/`. Returns an
/// empty list (with a warning) when no data root can be located; the caller
/// decides whether to degrade to a broader collection.
pub fn collect_xgen_dependencies(
    xgen_path: &Path,
    data_root: Option<&Path>,
    log: &dyn RunLog,
) -> Vec<String> {
    if !xgen_path.exists() {
        return Vec::new();
    }

    let detected;
    let data_root = match data_root {
        Some(root) => root,
        None => {
            let Some(root) = detect_data_root(xgen_path) else {
                log.warn(&format!(
                    "no xgen data directory found for {}",
                    xgen_path.display()
                ));
                return Vec::new();
            };
            detected = root;
            detected.as_path()
        }
    };

    if !data_root.exists() {
        log.warn(&format!("xgen data directory missing: {}", data_root.display()));
        return Vec::new();
    }

    parse_xgen_file(xgen_path, data_root, log)
}

fn detect_data_root(xgen_path: &Path) -> Option<PathBuf> {
    let scene_dir = xgen_path.parent()?;
    let dir_name = scene_dir.file_name()?.to_string_lossy().to_lowercase();
    if dir_name != "scenes" {
        return None;
    }
    let candidate = scene_dir.parent()?.join("xgen");
    candidate.is_dir().then_some(candidate)
}
