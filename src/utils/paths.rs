//! Path normalization and filtered directory collection
//!
//! All paths flowing through the packager are compared as normalized strings:
//! backslashes become forward slashes and runs of consecutive slashes collapse
//! to one. Normalization is a pure string operation and never touches the
//! filesystem; existence checks happen at resolution time in the extractor.

use std::path::{Component, Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// Subdirectory names skipped during every recursive collection pass.
///
/// These are conventional scratch locations inside Maya project trees; pulling
/// them into an upload bundle would balloon the archive with files the render
/// never reads.
pub const DENY_DIRS: &[&str] = &["backup", "temp", "cache", ".git"];

/// File extensions collected when expanding the directory of an OCIO config.
///
/// A `.ocio` config references LUTs and transform files by relative path, so
/// the whole color-management directory travels with it.
pub const OCIO_EXTENSIONS: &[&str] = &[
    ".lut", ".spi1d", ".spi3d", ".cube", ".3dl", ".csp", ".ctf", ".clf", ".cc", ".ccc", ".cdl",
    ".mga", ".m3d", ".ocio", ".xml", ".yaml", ".yml",
];

/// Normalizes path separators: backslashes become forward slashes, then every
/// run of two or more slashes collapses to a single one.
///
/// The collapse is a fixed-point loop rather than a single substitution:
/// replacing `//` with `/` in `///` leaves `//` behind, so the loop continues
/// until no run remains. The function is idempotent and never consults the
/// filesystem.
///
/// # Examples
///
/// ```
/// use scenepack::utils::normalize_separators;
///
/// assert_eq!(normalize_separators(r"C:\\a\\\\b///c"), "C:/a/b/c");
/// assert_eq!(normalize_separators("/already/clean"), "/already/clean");
/// ```
#[must_use]
pub fn normalize_separators(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut normalized = path.replace('\\', "/");
    while normalized.contains("//") {
        normalized = normalized.replace("//", "/");
    }
    normalized
}

/// Classifies a reference string as absolute under the current platform's
/// rules: drive-letter or UNC prefix on Windows, leading slash elsewhere.
#[must_use]
pub fn is_absolute_path(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    Path::new(path).is_absolute()
}

/// Joins a relative reference against a base directory and resolves `.`/`..`
/// segments lexically, without touching the filesystem.
///
/// Returned paths still need an existence check before they count as resolved
/// files.
#[must_use]
pub fn resolve_against(base: &Path, relative: &str) -> PathBuf {
    let joined = base.join(relative);
    let mut components: Vec<Component> = Vec::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            c => components.push(c),
        }
    }
    components.iter().collect()
}

fn is_denied_dir(name: &str) -> bool {
    let lower = name.to_lowercase();
    DENY_DIRS.iter().any(|deny| lower == *deny)
}

/// Recursively collects files under `directory` into `out`, preserving
/// discovery order and skipping anything already present.
///
/// Subdirectories named in [`DENY_DIRS`] (case-insensitive) are not descended
/// into. When `extensions` is `Some`, only files whose lowercased name ends in
/// one of the given suffixes are collected. Returns the number of files added.
pub fn collect_directory_files(
    directory: &Path,
    out: &mut Vec<String>,
    extensions: Option<&[&str]>,
) -> usize {
    let mut added = 0;
    let walker = WalkDir::new(directory).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        !entry.file_name().to_str().is_some_and(is_denied_dir)
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("directory walk error under {}: {err}", directory.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(exts) = extensions {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if !exts.iter().any(|ext| name.ends_with(ext)) {
                continue;
            }
        }
        let path = normalize_separators(&entry.path().to_string_lossy());
        if !out.contains(&path) {
            out.push(path);
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn normalize_collapses_mixed_separators() {
        assert_eq!(normalize_separators(r"C:\\a\\\\b///c"), "C:/a/b/c");
        assert_eq!(normalize_separators("a\\b\\c"), "a/b/c");
        assert_eq!(normalize_separators("///"), "/");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [r"C:\proj\\tex//x.png", "/a//b", "", "relative/x"] {
            let once = normalize_separators(raw);
            assert_eq!(normalize_separators(&once), once);
        }
    }

    #[test]
    fn normalize_keeps_drive_letter() {
        assert_eq!(normalize_separators(r"D:\x"), "D:/x");
    }

    #[test]
    fn resolve_against_collapses_dot_segments() {
        let base = Path::new("/proj/scenes");
        let resolved = resolve_against(base, "../textures/./skin.png");
        assert_eq!(resolved, PathBuf::from("/proj/textures/skin.png"));
    }

    #[test]
    fn collect_skips_deny_listed_dirs() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.png"), b"x").unwrap();
        fs::write(temp.path().join("b.abc"), b"x").unwrap();
        fs::write(temp.path().join("c.txt"), b"x").unwrap();
        fs::create_dir(temp.path().join("cache")).unwrap();
        fs::write(temp.path().join("cache/d.png"), b"x").unwrap();

        let mut files = Vec::new();
        let added = collect_directory_files(temp.path(), &mut files, None);
        assert_eq!(added, 3);
        assert!(!files.iter().any(|f| f.contains("/cache/")));
    }

    #[test]
    fn collect_honors_extension_filter() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.png"), b"x").unwrap();
        fs::write(temp.path().join("b.log"), b"x").unwrap();

        let mut files = Vec::new();
        collect_directory_files(temp.path(), &mut files, Some(&[".png"]));
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.png"));
    }
}
