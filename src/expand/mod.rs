//! External-file categorization and expansion
//!
//! The host application's structured scene description lists external files
//! per category. A category's value is either a flat list of paths or a map
//! of named sub-lists; both shapes deserialize into the explicit
//! [`CategoryEntries`] union rather than being shape-inspected at runtime.
//!
//! Each candidate path is resolved against a computed workspace root, kept
//! only when it exists on disk, and recorded in both a flat collection and a
//! per-category bucket. Two categories get specialized treatment:
//!
//! - `color_management` expands every config's directory the same way the
//!   extractor does.
//! - `xgen` prefers the host-collected detailed file list when present,
//!   otherwise parses each description file against the candidate data
//!   directories, and only degrades to a full directory sweep when no parse
//!   yields anything.
//!
//! The reserved `xgen_data_dirs` category is never emitted as files; it only
//! feeds the description parsing above.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::report::RunLog;
use crate::utils::{
    OCIO_EXTENSIONS, collect_directory_files, is_absolute_path, normalize_separators,
    resolve_against,
};
use crate::xgen;


/// Reserved category holding XGen data directories (resolution input only).
const XGEN_DATA_DIRS_KEY: &str = "xgen_data_dirs";
/// Optional category with host-collected per-file XGen dependencies.
const XGEN_DETAILED_KEY: &str = "xgen_detailed_files";

/// One category's worth of external-file entries from the collaborator
/// payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CategoryEntries {
    /// A flat list of path strings.
    Flat(Vec<String>),
    /// Named sub-lists, flattened transparently during expansion.
    Grouped(BTreeMap<String, Vec<String>>),
}

impl CategoryEntries {
    /// Iterates every path in the category regardless of shape.
    pub fn paths(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Self::Flat(paths) => Box::new(paths.iter().map(String::as_str)),
            Self::Grouped(groups) => {
                Box::new(groups.values().flatten().map(String::as_str))
            }
        }
    }
}

/// Project information embedded in the collaborator payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Workspace root reported by the host application.
    #[serde(default)]
    pub workspace: Option<String>,
}

/// Name and version of a loaded host-application plugin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin name as reported by the host.
    #[serde(default)]
    pub name: String,
    /// Plugin version string, when known.
    #[serde(default)]
    pub version: Option<String>,
}

/// The structured scene description produced by the host application.
///
/// Only the fields the packager consumes are modeled; render settings and
/// render path stay as raw JSON for pass-through into the settings artifact.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SceneDescription {
    /// Active renderer name, or `"unknown"`.
    #[serde(default)]
    pub renderer: Option<String>,
    /// Loaded plugins with versions.
    #[serde(default)]
    pub plugins: Vec<PluginInfo>,
    /// Raw render settings blob (pass-through).
    #[serde(default)]
    pub render_settings: serde_json::Value,
    /// Raw render path blob (pass-through).
    #[serde(default)]
    pub render_path: serde_json::Value,
    /// Project information.
    #[serde(default)]
    pub project: Option<ProjectInfo>,
    /// External files per category.
    #[serde(default)]
    pub external_files: BTreeMap<String, CategoryEntries>,
    /// Texture files collected by the host.
    #[serde(default)]
    pub file_textures: Vec<String>,
    /// Referenced scene files collected by the host.
    #[serde(default)]
    pub references: Vec<String>,
}

/// Result of expansion: a flat sorted collection plus sorted per-category
/// buckets.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ExpandedFiles {
    /// Every collected file, sorted and unique.
    pub all_files: Vec<String>,
    /// Per-category buckets, each sorted and unique.
    pub by_type: BTreeMap<String, Vec<String>>,
}

struct Collector {
    workspace: PathBuf,
    collected: BTreeSet<String>,
    categorized: BTreeMap<String, BTreeSet<String>>,
}

impl Collector {
    /// Resolves one candidate path. Env vars are expanded, relative paths
    /// join the workspace, and only on-disk entries survive. Directories are
    /// expanded into their contained files under the same category.
    fn add(&mut self, raw: &str, category: &str) {
        if raw.is_empty() {
            return;
        }
        let expanded = shellexpand::env(raw).map_or_else(|_| raw.to_string(), |s| s.into_owned());

        let resolved = if is_absolute_path(&expanded) {
            PathBuf::from(normalize_separators(&expanded))
        } else {
            resolve_against(&self.workspace, &expanded)
        };

        if resolved.is_file() {
            self.insert(&resolved.to_string_lossy(), category);
        } else if resolved.is_dir() {
            let mut files = Vec::new();
            collect_directory_files(&resolved, &mut files, None);
            for file in files {
                self.insert(&file, category);
            }
        }
    }

    fn insert(&mut self, path: &str, category: &str) {
        let normalized = normalize_separators(path);
        self.collected.insert(normalized.clone());
        self.categorized.entry(category.to_string()).or_default().insert(normalized);
    }

    fn finish(self) -> ExpandedFiles {
        ExpandedFiles {
            all_files: self.collected.into_iter().collect(),
            by_type: self
                .categorized
                .into_iter()
                .map(|(category, files)| (category, files.into_iter().collect()))
                .collect(),
        }
    }
}

/// Computes the workspace root used to resolve relative collaborator paths.
///
/// The scene's parent of a conventional `scenes` directory wins over a
/// workspace hint that points into the host's generic template project; an
/// explicit real workspace is honored otherwise.
fn compute_workspace(scene_path: &Path, hint: Option<&str>) -> PathBuf {
    let scene_dir = scene_path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let project_root = if scene_dir
        .file_name()
        .is_some_and(|name| name.to_string_lossy().to_lowercase() == "scenes")
    {
        scene_dir.parent().map(Path::to_path_buf).unwrap_or(scene_dir)
    } else {
        scene_dir
    };

    match hint {
        Some(workspace)
            if !normalize_separators(workspace)
                .to_lowercase()
                .contains("maya/projects/default") =>
        {
            PathBuf::from(normalize_separators(workspace))
        }
        _ => project_root,
    }
}

/// Expands the collaborator's external-file categories into the flat + bucket
/// view described in the module docs.
pub fn expand_external_files(
    scene_path: &Path,
    description: &SceneDescription,
    log: &dyn RunLog,
) -> ExpandedFiles {
    let workspace_hint =
        description.project.as_ref().and_then(|project| project.workspace.as_deref());
    let workspace = compute_workspace(scene_path, workspace_hint);

    let mut collector = Collector {
        workspace,
        collected: BTreeSet::new(),
        categorized: BTreeMap::new(),
    };

    for (category, entries) in &description.external_files {
        // Data directories feed description parsing below; detailed files
        // are merged by the xgen pass with their own category.
        if category == XGEN_DATA_DIRS_KEY || category == XGEN_DETAILED_KEY {
            continue;
        }
        for path in entries.paths() {
            collector.add(path, category);
        }
    }

    for path in &description.file_textures {
        collector.add(path, "textures");
    }
    for path in &description.references {
        collector.add(path, "references");
    }

    expand_color_management(description, &mut collector, log);
    expand_xgen(description, &mut collector, log);

    collector.finish()
}

fn category_paths<'a>(description: &'a SceneDescription, key: &str) -> Vec<&'a str> {
    description
        .external_files
        .get(key)
        .map(|entries| entries.paths().collect())
        .unwrap_or_default()
}

fn expand_color_management(
    description: &SceneDescription,
    collector: &mut Collector,
    log: &dyn RunLog,
) {
    let configs = category_paths(description, "color_management");
    if configs.is_empty() {
        return;
    }
    log.info(&format!("    collecting {} color management entries...", configs.len()));

    let mut visited_dirs: BTreeSet<PathBuf> = BTreeSet::new();
    for config in configs {
        collector.add(config, "color_management");

        let expanded =
            shellexpand::env(config).map_or_else(|_| config.to_string(), |s| s.into_owned());
        let resolved = if is_absolute_path(&expanded) {
            PathBuf::from(normalize_separators(&expanded))
        } else {
            resolve_against(&collector.workspace, &expanded)
        };
        let Some(config_dir) = resolved.parent().map(Path::to_path_buf) else {
            continue;
        };
        if config_dir.is_dir() && visited_dirs.insert(config_dir.clone()) {
            let mut files = Vec::new();
            collect_directory_files(&config_dir, &mut files, Some(OCIO_EXTENSIONS));
            for file in files {
                collector.insert(&file, "color_management");
            }
        }
    }
}

fn expand_xgen(description: &SceneDescription, collector: &mut Collector, log: &dyn RunLog) {
    let xgen_files = category_paths(description, "xgen");
    if xgen_files.is_empty() {
        return;
    }
    log.info(&format!("    collecting xgen files ({} descriptions)...", xgen_files.len()));

    // Host-collected detailed files are the most accurate source; merge them
    // first when present.
    let detailed = category_paths(description, XGEN_DETAILED_KEY);
    for path in &detailed {
        collector.add(path, "xgen_data");
    }

    let data_dirs: Vec<PathBuf> = category_paths(description, XGEN_DATA_DIRS_KEY)
        .into_iter()
        .map(|dir| {
            if is_absolute_path(dir) {
                PathBuf::from(normalize_separators(dir))
            } else {
                resolve_against(&collector.workspace, dir)
            }
        })
        .filter(|dir| dir.is_dir())
        .collect();
    if data_dirs.is_empty() {
        return;
    }

    for xgen_file in xgen_files {
        let resolved = if is_absolute_path(xgen_file) {
            PathBuf::from(normalize_separators(xgen_file))
        } else {
            resolve_against(&collector.workspace, xgen_file)
        };
        if !resolved.is_file() {
            continue;
        }

        let mut parsed = false;
        for data_dir in &data_dirs {
            let dependencies = xgen::collect_xgen_dependencies(&resolved, Some(data_dir), log);
            if !dependencies.is_empty() {
                for dependency in dependencies {
                    collector.insert(&dependency, "xgen_data");
                }
                parsed = true;
                break;
            }
        }

        if !parsed {
            // Total parse failure: sweep the data directories rather than
            // ship a groom with missing maps.
            log.warn(&format!(
                "no xgen dependencies parsed from {}; collecting data directories wholesale",
                resolved.display()
            ));
            for data_dir in &data_dirs {
                let mut files = Vec::new();
                collect_directory_files(data_dir, &mut files, None);
                for file in files {
                    collector.insert(&file, "xgen_data");
                }
            }
        }
    }
}
