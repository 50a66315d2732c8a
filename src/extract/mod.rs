//! Scene reference extraction and resolution
//!
//! A Maya ASCII scene records every external file it uses as a quoted string
//! inside `setAttr`/`file` statements. This module runs an ordered battery of
//! pattern extractors over the scene text - one per asset category - then
//! resolves each raw reference to an existing absolute path, and finally
//! enriches the result with two post-passes:
//!
//! - **Color management**: a resolved `.ocio` config pulls in every LUT and
//!   transform file from its directory tree.
//! - **XGen**: description files in the scene directory whose name starts
//!   with the scene basename are added, their embedded absolute paths are
//!   harvested, and the [`crate::xgen`] parser is run against each known data
//!   directory.
//!
//! Extraction never raises: an unreadable scene degrades to an empty set with
//! a warning. Resolution misses are expected (stale references, offline
//! caches) and only show up in [`ResolveStats`].
//!
//! The battery order is fixed for reproducibility; it does not affect results
//! because every added path is deduplicated by its normalized form.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::core::{ASCII_SCENE_EXT, XGEN_EXT, has_extension};
use crate::report::RunLog;
use crate::utils::{
    OCIO_EXTENSIONS, collect_directory_files, is_absolute_path, normalize_separators,
    resolve_against,
};
use crate::xgen;


/// How far back from a `cachePath` attribute the `createNode cacheFile`
/// marker may sit for the attribute to count as a cache-file reference.
const CACHE_NODE_WINDOW: usize = 500;

/// The quoted-attribute battery, applied in this order. Each entry is
/// `(category, pattern)` where the pattern's first capture group is the raw
/// path string.
static ATTR_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    let attr = |name: &str| {
        format!(r#"setAttr\s+"\.{name}"\s+-type\s+"string"\s+"([^"]+)""#)
    };
    vec![
        ("file_texture", Regex::new(&attr("fileTextureName")).expect("valid pattern")),
        ("reference", Regex::new(r#"file\s+-r[^"]*"\s*"([^"]+)""#).expect("valid pattern")),
        ("alembic", Regex::new(&attr("abc_File")).expect("valid pattern")),
        ("usd", Regex::new(&attr("filePath")).expect("valid pattern")),
        ("gpu_cache", Regex::new(&attr("cacheFileName")).expect("valid pattern")),
        ("arnold_standin", Regex::new(&attr("dso")).expect("valid pattern")),
        ("arnold_image", Regex::new(&attr("filename")).expect("valid pattern")),
        (
            "disk_cache",
            Regex::new(
                r#"(?i)setAttr\s+"\.cacheName"\s+-type\s+"string"\s+"([^"]+\.(?:dc|diskCache))"#,
            )
            .expect("valid pattern"),
        ),
        (
            "audio",
            Regex::new(
                r#"(?i)setAttr\s+"\.filename"\s+-type\s+"string"\s+"([^"]+\.(?:wav|mp3|aac|ogg|flac))"#,
            )
            .expect("valid pattern"),
        ),
        ("particle_cache", Regex::new(&attr("cachePath")).expect("valid pattern")),
        (
            "color_management",
            Regex::new(
                r#"setAttr\s+"\.(?:colorManagementPrefs|ocioConfig)"\s+-type\s+"string"\s+"([^"]+)""#,
            )
            .expect("valid pattern"),
        ),
    ]
});

/// `cacheFile` nodes split the reference across two attributes; this pattern
/// pairs them up so `<cachePath>/<cacheName>.xml` can be synthesized.
static CACHE_COMBO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)createNode\s+cacheFile[^;]*;.*?setAttr\s+"\.cachePath"\s+-type\s+"string"\s+"([^"]+)"[^;]*;.*?setAttr\s+"\.cacheName"\s+-type\s+"string"\s+"([^"]+)""#,
    )
    .expect("valid pattern")
});

static CACHE_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"setAttr\s+"\.cachePath"\s+-type\s+"string"\s+"([^"]+)""#).expect("valid pattern")
});

/// Catch-all for any quoted absolute path the attribute battery missed.
/// False positives are acceptable; the existence check drops them later.
#[cfg(windows)]
static GENERIC_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([A-Za-z]:[^"]+)""#).expect("valid pattern"));
#[cfg(not(windows))]
static GENERIC_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(/[^"]+)""#).expect("valid pattern"));

static XG_DATA_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"setAttr\s+"\.xgDataPath"\s+-type\s+"string"\s+"([^"]+)""#)
        .expect("valid pattern")
});

/// Bare absolute paths inside an `.xgen` file's text.
#[cfg(windows)]
static XGEN_ABS_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z]:[/\\][^\s"'<>|]+)"#).expect("valid pattern"));
#[cfg(not(windows))]
static XGEN_ABS_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(/[^\s"'<>|]+)"#).expect("valid pattern"));

/// Counters produced by the resolution pass. Diagnostic only; they never
/// affect control flow.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStats {
    /// References classified as absolute.
    pub absolute_total: usize,
    /// Files added from absolute references (directory expansion included).
    pub absolute_existing: usize,
    /// References classified as relative.
    pub relative_total: usize,
    /// Files added from relative references.
    pub relative_existing: usize,
}

/// Runs the full pattern battery over scene text and returns the raw,
/// deduplicated reference set. Pure function; nothing is validated against
/// the filesystem yet.
#[must_use]
pub fn extract_file_paths(content: &str) -> BTreeSet<String> {
    let mut refs = BTreeSet::new();

    for (_category, pattern) in ATTR_PATTERNS.iter() {
        for caps in pattern.captures_iter(content) {
            let path = caps[1].trim();
            if !path.is_empty() {
                refs.insert(path.to_string());
            }
        }
    }

    // cacheFile nodes: synthesize <cachePath>/<cacheName>.xml.
    for caps in CACHE_COMBO_RE.captures_iter(content) {
        let (cache_path, cache_name) = (caps[1].trim(), caps[2].trim());
        if !cache_path.is_empty() && !cache_name.is_empty() {
            refs.insert(format!(
                "{}/{cache_name}.xml",
                cache_path.trim_end_matches('/')
            ));
        }
    }

    // Lone cachePath attributes count only when a cacheFile node was created
    // within the preceding window.
    for caps in CACHE_PATH_RE.captures_iter(content) {
        let group = caps.get(1).expect("capture group");
        let start = caps.get(0).expect("whole match").start();
        let mut window_start = start.saturating_sub(CACHE_NODE_WINDOW);
        while !content.is_char_boundary(window_start) {
            window_start += 1;
        }
        if content[window_start..start].contains("createNode cacheFile") {
            let path = group.as_str().trim();
            if !path.is_empty() {
                refs.insert(path.to_string());
            }
        }
    }

    for caps in GENERIC_PATH_RE.captures_iter(content) {
        let path = caps[1].trim();
        if path.len() > 3
            && !path.starts_with('.')
            && (path.contains('/') || path.contains('\\'))
        {
            refs.insert(path.to_string());
        }
    }

    refs
}

/// Reads a scene file and extracts its raw reference set.
///
/// Returns an empty set when the file is missing, is not the text scene
/// format, or cannot be read - extraction never fails the run.
pub fn extract_scene_references(scene_path: &Path, log: &dyn RunLog) -> BTreeSet<String> {
    if !scene_path.exists() {
        return BTreeSet::new();
    }
    if !has_extension(&scene_path.to_string_lossy(), ASCII_SCENE_EXT) {
        return BTreeSet::new();
    }
    match std::fs::read(scene_path) {
        Ok(bytes) => extract_file_paths(&String::from_utf8_lossy(&bytes)),
        Err(err) => {
            log.warn(&format!("failed to read scene {}: {err}", scene_path.display()));
            BTreeSet::new()
        }
    }
}

fn note_file(path: &str, out: &mut Vec<String>) -> usize {
    let normalized = normalize_separators(path);
    if out.contains(&normalized) {
        0
    } else {
        out.push(normalized);
        1
    }
}

fn process_resolved(path: &Path, out: &mut Vec<String>) -> usize {
    if path.is_file() {
        note_file(&path.to_string_lossy(), out)
    } else if path.is_dir() {
        collect_directory_files(path, out, None)
    } else {
        0
    }
}

/// Resolves every reference in a scene against `base_dir` (defaulting to the
/// scene's own directory), expands directory references, runs the OCIO and
/// XGen enrichment passes, and returns the sorted list of existing files
/// together with the resolution counters.
pub fn collect_existing_paths(
    scene_path: &Path,
    base_dir: Option<&Path>,
    log: &dyn RunLog,
) -> (Vec<String>, ResolveStats) {
    let refs = extract_scene_references(scene_path, log);

    let scene_dir = scene_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let base = base_dir.map_or(scene_dir, Path::to_path_buf);

    let mut existing: Vec<String> = Vec::new();
    let mut stats = ResolveStats::default();

    for reference in &refs {
        if is_absolute_path(reference) {
            stats.absolute_total += 1;
            stats.absolute_existing +=
                process_resolved(Path::new(&normalize_separators(reference)), &mut existing);
        } else {
            stats.relative_total += 1;
            let resolved = resolve_against(&base, reference);
            stats.relative_existing += process_resolved(&resolved, &mut existing);
        }
    }

    let xgen_files = find_xgen_files(scene_path, log);

    let before_ocio = existing.len();
    process_ocio_configs(&mut existing);
    let ocio_added = existing.len() - before_ocio;

    let before_xgen = existing.len();
    process_xgen_files(&xgen_files, scene_path, &base, &mut existing, log);
    let xgen_added = existing.len() - before_xgen;

    log.info(&format!("  [1/3] extracted {} path references from scene", refs.len()));
    if ocio_added > 0 {
        log.info(&format!("    collected {ocio_added} files from OCIO config directories"));
    }
    if xgen_added > 0 {
        log.info(&format!("    collected {xgen_added} files from XGen processing"));
    }
    log.info("    path statistics:");
    log.info(&format!(
        "      absolute: {} total ({} existing)",
        stats.absolute_total, stats.absolute_existing
    ));
    log.info(&format!(
        "      relative: {} total ({} existing)",
        stats.relative_total, stats.relative_existing
    ));
    log.info(&format!("      total: {} files", existing.len()));

    existing.sort();
    (existing, stats)
}

/// Finds XGen description files in the scene's directory whose filename
/// starts with the full scene basename.
///
/// The basename may carry a conversion timestamp; in that case only
/// generated description files match, which keeps a user's unrelated `.xgen`
/// files out of the bundle. The prefix rule is deliberately permissive (a
/// scene named `wolf` also matches `wolf2__body.xgen`); the source behavior
/// is preserved.
pub fn find_xgen_files(scene_path: &Path, log: &dyn RunLog) -> Vec<PathBuf> {
    let Some(scene_dir) = scene_path.parent() else {
        return Vec::new();
    };
    let Some(basename) = scene_path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        return Vec::new();
    };

    let entries = match std::fs::read_dir(scene_dir) {
        Ok(entries) => entries,
        Err(err) => {
            log.warn(&format!("failed to scan for xgen files: {err}"));
            return Vec::new();
        }
    };

    let mut found: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            has_extension(&name, XGEN_EXT)
                && name.starts_with(&basename)
                && entry.path().is_file()
        })
        .map(|entry| entry.path())
        .collect();
    found.sort();
    found
}

/// For every resolved `.ocio` config, pulls the rest of its color-management
/// directory (LUTs, transforms, configs) into the result list. Each config
/// directory is visited at most once.
fn process_ocio_configs(existing: &mut Vec<String>) {
    let configs: Vec<String> =
        existing.iter().filter(|p| p.to_lowercase().ends_with(".ocio")).cloned().collect();
    if configs.is_empty() {
        return;
    }

    let mut visited_dirs: BTreeSet<String> = BTreeSet::new();
    for config in configs {
        let Some(config_dir) = Path::new(&config).parent() else {
            continue;
        };
        let normalized_dir = normalize_separators(&config_dir.to_string_lossy());
        if !visited_dirs.insert(normalized_dir) {
            continue;
        }
        if config_dir.is_dir() {
            collect_directory_files(config_dir, existing, Some(OCIO_EXTENSIONS));
        }
    }
}

/// Extracts XGen data directories referenced by the scene (`xgDataPath`
/// attributes), falling back to the conventional `<project>/xgen` sibling of
/// a `scenes` directory when the scene names none.
pub fn extract_xgen_data_dirs(scene_path: &Path, base_dir: &Path, log: &dyn RunLog) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    match std::fs::read(scene_path) {
        Ok(bytes) => {
            let content = String::from_utf8_lossy(&bytes);
            for caps in XG_DATA_PATH_RE.captures_iter(&content) {
                let raw = caps[1].trim();
                if raw.is_empty() {
                    continue;
                }
                let candidate = if is_absolute_path(raw) {
                    PathBuf::from(normalize_separators(raw))
                } else {
                    resolve_against(base_dir, raw)
                };
                if candidate.is_dir() && !dirs.contains(&candidate) {
                    dirs.push(candidate);
                }
            }
        }
        Err(err) => {
            log.warn(&format!("failed to read scene for xgen data dirs: {err}"));
        }
    }

    if dirs.is_empty()
        && base_dir
            .file_name()
            .is_some_and(|name| name.to_string_lossy().to_lowercase() == "scenes")
        && let Some(project_root) = base_dir.parent()
    {
        let candidate = project_root.join("xgen");
        if candidate.is_dir() {
            dirs.push(candidate);
        }
    }

    dirs
}

/// Harvests bare absolute paths embedded in an `.xgen` file, keeping only
/// those that exist on disk as files (directories are handled by the parser's
/// data-path collection instead).
fn extract_absolute_paths_from_xgen(xgen_path: &Path, log: &dyn RunLog) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    let content = match std::fs::read(xgen_path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            log.warn(&format!("failed to read xgen file {}: {err}", xgen_path.display()));
            return paths;
        }
    };

    for caps in XGEN_ABS_PATH_RE.captures_iter(&content) {
        let raw = caps[1].trim();
        if raw.len() <= 2 || !is_absolute_path(raw) {
            continue;
        }
        let normalized = normalize_separators(raw);
        if Path::new(&normalized).is_file() {
            paths.insert(normalized);
        }
    }
    paths
}

fn process_xgen_files(
    xgen_files: &[PathBuf],
    scene_path: &Path,
    base_dir: &Path,
    existing: &mut Vec<String>,
    log: &dyn RunLog,
) {
    if xgen_files.is_empty() {
        return;
    }

    let data_dirs = extract_xgen_data_dirs(scene_path, base_dir, log);

    for xgen_file in xgen_files {
        note_file(&xgen_file.to_string_lossy(), existing);

        for path in extract_absolute_paths_from_xgen(xgen_file, log) {
            note_file(&path, existing);
        }

        let mut parsed = false;
        for data_dir in &data_dirs {
            if !data_dir.exists() {
                continue;
            }
            let dependencies = xgen::collect_xgen_dependencies(xgen_file, Some(data_dir), log);
            if !dependencies.is_empty() {
                for dependency in dependencies {
                    note_file(&dependency, existing);
                }
                parsed = true;
            }
            break;
        }

        // Degraded case: no dependencies could be parsed but a data
        // directory is known. Collect it wholesale and say so, rather than
        // silently under-collecting.
        if !parsed && let Some(data_dir) = data_dirs.iter().find(|dir| dir.exists()) {
            log.warn(&format!(
                "could not parse xgen dependencies for {}; collecting entire data directory {}",
                xgen_file.display(),
                data_dir.display()
            ));
            collect_directory_files(data_dir, existing, None);
        }
    }
}
