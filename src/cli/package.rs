//! The `package` subcommand.
//!
//! Runs the full packaging pipeline for one scene:
//!
//! 1. Validate the scene file and its extension
//! 2. Convert a binary scene to the text format (host application required)
//! 3. Inspect the scene for renderer, plugins and render globals
//! 4. Extract and save `render_settings.json`
//! 5. Build and save the `upload.json` manifest
//! 6. Create the upload zip archive
//! 7. Clean up conversion temporaries
//!
//! On success a single JSON line is printed on stdout with the artifact
//! paths and per-category dependency statistics. On failure the line is
//! `{"error": "..."}` and the process exits with code 2.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::{Value, json};

use crate::archive::create_upload_package;
use crate::core::{ASCII_SCENE_EXT, BINARY_SCENE_EXT, XGEN_EXT, ScenePackError, has_extension};
use crate::expand::SceneDescription;
use crate::inspect::HostApp;
use crate::manifest::{UploadManifest, build_upload_mapping};
use crate::report::{Reporter, RunLog};

/// Image extensions counted as textures in the dependency statistics.
const TEXTURE_EXTS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".tga", ".tif", ".tiff", ".bmp", ".psd", ".iff", ".sgi", ".exr",
    ".hdr", ".tx", ".dds", ".gif", ".dpx", ".rat",
];

/// Simulation and geometry cache extensions.
const CACHE_EXTS: &[&str] = &[
    ".abc", ".usd", ".usdz", ".vdb", ".bgeo", ".mcx", ".mc", ".ass", ".cache", ".xml", ".pdc",
    ".ptc", ".bif", ".sim", ".xpd",
];

/// Scene and geometry reference extensions.
const REFERENCE_EXTS: &[&str] = &[".ma", ".mb", ".fbx", ".obj", ".gltf", ".glb"];

/// XGen description and data extensions.
const XGEN_EXTS: &[&str] = &[".xgen", ".xgip", ".xgr", ".xuv"];

/// Arguments for the `package` subcommand.
#[derive(Args)]
pub struct PackageCommand {
    /// Path to the `.ma` or `.mb` scene file.
    #[arg(long)]
    scene: PathBuf,

    /// Output directory for the generated artifacts.
    ///
    /// Defaults to the directory containing the scene file.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Server root prefixed onto every mapped path, e.g. `/input/job/cfg`.
    ///
    /// An empty value keeps the bare drive-folded form.
    #[arg(long, default_value = "")]
    server_root: String,

    /// Additional destination the finished zip is copied to.
    #[arg(long)]
    out_zip: Option<PathBuf>,

    /// Explicit path to the host application interpreter (`mayapy`).
    ///
    /// When omitted, `mayapy` is looked up on `PATH`. A text-format scene
    /// can be packaged without it; render settings are then omitted.
    #[arg(long)]
    inspector: Option<PathBuf>,

    /// Write the run log to this file instead of the console.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl PackageCommand {
    /// Executes the command, printing the JSON result line on stdout.
    pub async fn execute(self, quiet: bool) -> Result<()> {
        if let Some(out_zip) = &self.out_zip {
            ensure_parent_dir(out_zip)?;
        }
        let reporter = match &self.log_file {
            Some(path) => {
                ensure_parent_dir(path)?;
                Reporter::with_log_file(path, false, false)?
            }
            None if quiet => Reporter::silent(),
            None => Reporter::console(),
        };

        let outcome = self.run(&reporter).await;
        reporter.flush();

        match outcome {
            Ok(mut result) => {
                if let Some(log_file) = &self.log_file {
                    result["log_file"] = json!(log_file.to_string_lossy());
                }
                println!("{result}");
                Ok(())
            }
            Err(err) => {
                println!("{}", json!({ "error": err.to_string() }));
                std::process::exit(2);
            }
        }
    }

    async fn run(&self, log: &Reporter) -> Result<Value> {
        let scene_str = self.scene.to_string_lossy().into_owned();
        if !self.scene.is_file() {
            return Err(ScenePackError::SceneNotFound { path: scene_str }.into());
        }
        let is_binary = has_extension(&scene_str, BINARY_SCENE_EXT);
        if !is_binary && !has_extension(&scene_str, ASCII_SCENE_EXT) {
            let extension = self
                .scene
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default();
            return Err(ScenePackError::UnsupportedSceneFormat { extension }.into());
        }

        let scene_abs = std::path::absolute(&self.scene)?;
        let scene_dir = scene_abs
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let output_dir = self.output_dir.clone().unwrap_or_else(|| scene_dir.clone());
        std::fs::create_dir_all(&output_dir)?;

        log.section("packaging scene for upload");
        log.info(&format!("scene file: {}", scene_abs.display()));
        log.info(&format!("output directory: {}", output_dir.display()));
        log.separator('=');

        // A text scene can be packaged without the host application; a
        // binary one cannot, conversion needs the interpreter.
        let host = match HostApp::locate(self.inspector.clone()) {
            Ok(host) => {
                log.info(&format!("host application: {}", host.program().display()));
                Some(host)
            }
            Err(err) if is_binary => return Err(err),
            Err(_) => {
                log.warn("host application not found; packaging without scene inspection");
                None
            }
        };

        let mut converted: Option<PathBuf> = None;
        let current_scene = if is_binary {
            log.info("converting binary scene to text format...");
            let stem = self
                .scene
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S");
            let ma_path = scene_dir.join(format!("{stem}_{timestamp}.ma"));
            // host is always present on the binary branch
            if let Some(host) = &host {
                host.convert_scene(&scene_abs, &ma_path).await?;
            }
            log.info(&format!("conversion complete: {}", ma_path.display()));
            converted = Some(ma_path.clone());
            ma_path
        } else {
            scene_abs.clone()
        };

        let description = match &host {
            Some(host) => {
                log.info("inspecting scene...");
                let out_json = tempfile::Builder::new()
                    .prefix("scene_description")
                    .suffix(".json")
                    .tempfile_in(&output_dir)?;
                Some(host.inspect_scene(&current_scene, out_json.path()).await?)
            }
            None => None,
        };

        let render_settings_path = match &description {
            Some(description) => {
                let settings = extract_render_settings(description);
                display_render_settings(&settings, log);
                let path = output_dir.join("render_settings.json");
                std::fs::write(&path, serde_json::to_string_pretty(&settings)?)?;
                Some(path)
            }
            None => None,
        };

        log.info("building upload mapping...");
        let manifest = build_upload_mapping(&current_scene, &self.server_root, log);
        let upload_path = output_dir.join("upload.json");
        manifest.save(&upload_path)?;
        log.info(&format!(
            "mapped {} files",
            manifest.asset.len() + manifest.scene.len()
        ));

        // The zip is named after the original scene, not the conversion
        // temporary: shot.mb packs as shot_mb.zip.
        let stem = self
            .scene
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = self
            .scene
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let zip_path = output_dir.join(format!("{stem}_{ext}.zip"));

        log.info("creating upload archive...");
        create_upload_package(
            &current_scene,
            &upload_path,
            &self.server_root,
            &zip_path,
            render_settings_path.as_deref(),
            log,
        )?;
        if let Ok(meta) = std::fs::metadata(&zip_path) {
            log.info(&format!(
                "archive complete: {:.2} MB",
                meta.len() as f64 / (1024.0 * 1024.0)
            ));
        }

        if let Some(ma_path) = &converted {
            cleanup_conversion(ma_path, &scene_dir, log);
        }

        let final_zip = match &self.out_zip {
            Some(out_zip) if std::path::absolute(out_zip)? != std::path::absolute(&zip_path)? => {
                std::fs::copy(&zip_path, out_zip).map_err(|err| {
                    ScenePackError::ArchiveCreateFailed {
                        path: out_zip.to_string_lossy().into_owned(),
                        reason: err.to_string(),
                    }
                })?;
                out_zip.clone()
            }
            _ => zip_path,
        };

        let stats = compute_dependency_stats(&upload_path);

        log.section("packaging complete");
        log.info(&format!("output directory: {}", output_dir.display()));
        log.separator('=');

        Ok(json!({
            "success": true,
            "zip": final_zip.to_string_lossy(),
            "zip_name": final_zip.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            "upload_json": upload_path.to_string_lossy(),
            "render_settings": render_settings_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
            "server_root": self.server_root,
            "stats": stats,
        }))
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = std::path::absolute(path)?.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Removes the conversion temporary and any XGen files the host application
/// exported next to it during conversion.
fn cleanup_conversion(ma_path: &Path, scene_dir: &Path, log: &dyn RunLog) {
    log.info("cleaning up conversion temporaries");
    if let Err(err) = std::fs::remove_file(ma_path) {
        log.warn(&format!("failed to delete {}: {err}", ma_path.display()));
    } else {
        log.info(&format!("deleted {}", ma_path.display()));
    }

    let Some(stem) = ma_path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        return;
    };
    let Ok(entries) = std::fs::read_dir(scene_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_lowercase().ends_with(XGEN_EXT) && name.starts_with(&stem) {
            match std::fs::remove_file(entry.path()) {
                Ok(()) => log.info(&format!("deleted XGen export: {name}")),
                Err(err) => log.warn(&format!("failed to delete {name}: {err}")),
            }
        }
    }
}

/// Render parameters extracted from the scene description.
///
/// Only values actually present in the scene are recorded; absent settings
/// stay `null` rather than being filled with guessed defaults. The one
/// exception is `output_format_actual`, which always carries the format the
/// renderer will really produce.
#[derive(Debug, Serialize)]
struct RenderSettings {
    renderer: Option<String>,
    renderer_version: Option<String>,
    resolution: Resolution,
    frame_range: FrameRange,
    render_cameras: Option<Vec<String>>,
    output_format: Option<String>,
    output_format_actual: String,
    output_path: Option<String>,
    render_device: Option<String>,
}

#[derive(Debug, Serialize)]
struct Resolution {
    width: Option<Value>,
    height: Option<Value>,
}

#[derive(Debug, Serialize)]
struct FrameRange {
    start_frame: Option<Value>,
    end_frame: Option<Value>,
    by_frame_step: Option<Value>,
}

/// Maps a render-globals image format code to its format name.
fn format_name(code: i64) -> Option<&'static str> {
    Some(match code {
        0 => "iff",
        1 => "soft",
        2 => "rla",
        3 => "tiff",
        4 => "tif",
        5 => "sgi",
        6 => "als",
        7 | 8 => "jpg",
        9 => "maya",
        10 => "cineon",
        11 => "quantel",
        19 => "targa",
        20 => "bmp",
        31 | 36 => "psd",
        32 => "png",
        35 => "dds",
        50 => "exr",
        _ => return None,
    })
}

/// The format a renderer produces when the scene sets no explicit one.
fn renderer_default_format(renderer: Option<&str>) -> &'static str {
    match renderer.map(str::to_lowercase).as_deref() {
        Some("arnold" | "vray" | "redshift" | "renderman") => "exr",
        Some("mayasoftware" | "mayahardware") => "iff",
        _ => "png",
    }
}

/// The plugin that carries a renderer's version number.
fn renderer_plugin_name(renderer: &str) -> Option<&'static str> {
    match renderer.to_lowercase().as_str() {
        "arnold" => Some("mtoa"),
        "vray" => Some("vrayformaya"),
        "redshift" => Some("redshift4maya"),
        "renderman" => Some("RenderMan_for_Maya"),
        _ => None,
    }
}

fn extract_render_settings(description: &SceneDescription) -> RenderSettings {
    let renderer = description
        .renderer
        .as_deref()
        .filter(|name| !name.is_empty() && *name != "unknown")
        .map(str::to_owned);

    let renderer_version = renderer.as_deref().and_then(|name| {
        let plugin_name = renderer_plugin_name(name)?;
        description
            .plugins
            .iter()
            .find(|plugin| plugin.name.to_lowercase().contains(&plugin_name.to_lowercase()))
            .and_then(|plugin| plugin.version.clone())
    });

    let resolution = description
        .render_settings
        .get("defaultResolution")
        .cloned()
        .unwrap_or(Value::Null);
    let globals = description
        .render_settings
        .get("defaultRenderGlobals")
        .cloned()
        .unwrap_or(Value::Null);

    let render_cameras = description
        .render_settings
        .get("render_cameras")
        .and_then(Value::as_array)
        .map(|cameras| {
            cameras
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .filter(|cameras| !cameras.is_empty());

    // An explicit imageFormat code wins when it maps to a known format;
    // otherwise the renderer's conventional default applies.
    let format_code = globals.get("imageFormat").and_then(Value::as_i64);
    let output_format = format_code.and_then(format_name).map(str::to_owned);
    let output_format_actual = output_format
        .clone()
        .unwrap_or_else(|| renderer_default_format(renderer.as_deref()).to_owned());

    let output_path = description
        .render_path
        .get("imageFilePrefix")
        .and_then(Value::as_str)
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_owned);

    let render_device = description
        .render_settings
        .get("render_device")
        .and_then(Value::as_str)
        .filter(|device| !device.is_empty())
        .map(str::to_owned);

    RenderSettings {
        renderer,
        renderer_version,
        resolution: Resolution {
            width: resolution.get("width").cloned(),
            height: resolution.get("height").cloned(),
        },
        frame_range: FrameRange {
            start_frame: globals.get("startFrame").cloned(),
            end_frame: globals.get("endFrame").cloned(),
            by_frame_step: globals.get("byFrameStep").cloned(),
        },
        render_cameras,
        output_format,
        output_format_actual,
        output_path,
        render_device,
    }
}

fn display_render_settings(settings: &RenderSettings, log: &dyn RunLog) {
    log.info("render settings:");
    let renderer = settings.renderer.as_deref().unwrap_or("not set");
    match settings.renderer_version.as_deref() {
        Some(version) => log.info(&format!("  renderer: {renderer} {version}")),
        None => log.info(&format!("  renderer: {renderer}")),
    }
    if let (Some(width), Some(height)) = (
        settings.resolution.width.as_ref().and_then(Value::as_i64),
        settings.resolution.height.as_ref().and_then(Value::as_i64),
    ) {
        log.info(&format!("  resolution: {width}x{height}"));
    }
    if let (Some(start), Some(end)) = (
        settings.frame_range.start_frame.as_ref().and_then(Value::as_f64),
        settings.frame_range.end_frame.as_ref().and_then(Value::as_f64),
    ) {
        let step = settings.frame_range.by_frame_step.as_ref().and_then(Value::as_f64);
        match step {
            Some(step) if step != 1.0 => {
                log.info(&format!("  frames: {start}-{end} (step {step})"));
            }
            _ => log.info(&format!("  frames: {start}-{end}")),
        }
    }
    if let Some(cameras) = &settings.render_cameras {
        let names: Vec<&str> = cameras
            .iter()
            .map(|camera| camera.rsplit(':').next().unwrap_or(camera))
            .collect();
        log.info(&format!("  cameras: {}", names.join(", ")));
    }
    log.info(&format!("  format: {}", settings.output_format_actual));
    if let Some(device) = &settings.render_device {
        log.info(&format!("  device: {}", device.to_uppercase()));
    }
}

/// Per-category dependency counts and byte totals.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
struct DependencyStats {
    texture_count: u64,
    texture_size: u64,
    cache_count: u64,
    cache_size: u64,
    reference_count: u64,
    reference_size: u64,
    xgen_count: u64,
    xgen_size: u64,
    other_count: u64,
    other_size: u64,
    total_files: u64,
    total_size: u64,
}

fn categorize_dependency(path: &str) -> &'static str {
    let lower = path.to_lowercase();
    let ext = lower
        .rfind('.')
        .map(|idx| &lower[idx..])
        .unwrap_or_default();

    if TEXTURE_EXTS.contains(&ext) {
        "texture"
    } else if CACHE_EXTS.contains(&ext) || lower.contains("cache") {
        "cache"
    } else if XGEN_EXTS.contains(&ext) || lower.contains("xgen") {
        "xgen"
    } else if REFERENCE_EXTS.contains(&ext) || lower.contains("reference") {
        "reference"
    } else {
        "other"
    }
}

/// Tallies the manifest's assets by category. A missing or unreadable
/// manifest yields zeroed statistics rather than an error.
fn compute_dependency_stats(upload_path: &Path) -> DependencyStats {
    let mut stats = DependencyStats::default();
    let Ok(manifest) = UploadManifest::load(upload_path) else {
        return stats;
    };

    for asset in &manifest.asset {
        let size = std::fs::metadata(&asset.local).map(|meta| meta.len()).unwrap_or(0);
        let (count, total) = match categorize_dependency(&asset.local) {
            "texture" => (&mut stats.texture_count, &mut stats.texture_size),
            "cache" => (&mut stats.cache_count, &mut stats.cache_size),
            "xgen" => (&mut stats.xgen_count, &mut stats.xgen_size),
            "reference" => (&mut stats.reference_count, &mut stats.reference_size),
            _ => (&mut stats.other_count, &mut stats.other_size),
        };
        *count += 1;
        *total += size;
        stats.total_files += 1;
        stats.total_size += size;
    }
    stats
}
