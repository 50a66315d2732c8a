//! Upload archive assembly
//!
//! Packs the manifest, the optional render-settings artifact, the scene, and
//! every asset into one deflate-compressed zip. Members are rooted at their
//! mapped server paths with the leading slash stripped.
//!
//! The manifest is re-read from disk rather than passed in memory: the build
//! and package steps are deliberately decoupled so a manifest can be
//! hand-edited in between. The same scene-self-exclusion and foreign-xgen
//! filters applied by the builder run again here, so a stale or edited
//! manifest cannot make archive contents diverge from manifest rules.
//!
//! Per-member write failures are counted and logged; the archive is still
//! produced, possibly incomplete. Only failure to create the archive itself
//! is fatal.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::core::{ASCII_SCENE_EXT, XGEN_EXT, has_extension};
use crate::manifest::{UploadManifest, to_server_path};
use crate::report::RunLog;

/// Archive member name for the manifest.
pub const MANIFEST_MEMBER: &str = "upload.json";
/// Archive member name for the render settings artifact.
pub const SETTINGS_MEMBER: &str = "render_settings.json";

/// Assembles the upload archive at `output_zip`.
///
/// `scene_path` is the fallback when the manifest's recorded scene path does
/// not exist on disk; the manifest wins when both are present.
pub fn create_upload_package(
    scene_path: &Path,
    upload_json_path: &Path,
    server_root: &str,
    output_zip: &Path,
    render_settings_path: Option<&Path>,
    log: &dyn RunLog,
) -> Result<()> {
    let manifest = UploadManifest::load(upload_json_path)?;

    // Prefer the manifest's recorded scene path when it still exists.
    let manifest_scene = manifest.scene_local().map(String::from);
    let scene_to_package: Option<String> = match &manifest_scene {
        Some(local) if Path::new(local).exists() => Some(local.clone()),
        _ if scene_path.exists() => Some(scene_path.to_string_lossy().into_owned()),
        Some(local) => Some(local.clone()),
        None => Some(scene_path.to_string_lossy().into_owned()),
    };

    if let Some(parent) = output_zip.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }
    let file = File::create(output_zip)
        .with_context(|| format!("Failed to create archive {}", output_zip.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_MEMBER, options)?;
    zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;

    if let Some(settings) = render_settings_path
        && settings.exists()
    {
        zip.start_file(SETTINGS_MEMBER, options)?;
        zip.write_all(&std::fs::read(settings)?)?;
    }

    let scene_server = manifest
        .scene
        .first()
        .map(|entry| entry.server.clone())
        .or_else(|| scene_to_package.as_deref().map(|local| to_server_path(local, server_root)));

    if let (Some(local), Some(server)) = (&scene_to_package, &scene_server)
        && Path::new(local).exists()
    {
        zip.start_file(server.trim_start_matches('/'), options)?;
        zip.write_all(&std::fs::read(local)?)?;
    }

    let scene_basename = manifest_scene
        .as_deref()
        .and_then(|local| Path::new(local).file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut written: BTreeSet<String> = BTreeSet::new();
    let mut success = 0usize;
    let mut failed = 0usize;

    for entry in &manifest.asset {
        // The scene format never travels as an asset.
        if has_extension(&entry.local, ASCII_SCENE_EXT) {
            continue;
        }
        // Foreign xgen descriptions are filtered on the way out too, in case
        // the manifest was edited by hand.
        if has_extension(&entry.local, XGEN_EXT) && !scene_basename.is_empty() {
            let keeps_prefix = Path::new(&entry.local)
                .file_stem()
                .is_some_and(|stem| stem.to_string_lossy().starts_with(&scene_basename));
            if !keeps_prefix {
                continue;
            }
        }

        let member = entry.server.trim_start_matches('/').to_string();
        if !written.insert(member.clone()) {
            continue;
        }

        let local = Path::new(&entry.local);
        if !local.exists() {
            failed += 1;
            continue;
        }
        let result = std::fs::read(local).map_err(anyhow::Error::from).and_then(|bytes| {
            zip.start_file(member.as_str(), options)?;
            zip.write_all(&bytes)?;
            Ok(())
        });
        match result {
            Ok(()) => success += 1,
            Err(err) => {
                failed += 1;
                log.warn(&format!("failed to pack {}: {err}", entry.local));
            }
        }
    }

    zip.finish().with_context(|| format!("Failed to finalize {}", output_zip.display()))?;

    log.info(&format!("  packed {success} assets ({failed} failed)"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{AssetEntry, SceneEntry};
    use crate::report::NullLog;
    use std::fs;
    use tempfile::tempdir;

    fn member_names(zip_path: &Path) -> Vec<String> {
        let file = File::open(zip_path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        (0..archive.len()).map(|i| archive.by_index(i).unwrap().name().to_string()).collect()
    }

    fn write_manifest(path: &Path, scene_local: &str, assets: &[(&str, &str)]) {
        let manifest = UploadManifest {
            scene: vec![SceneEntry {
                hash: "0".repeat(32),
                local: scene_local.to_string(),
                server: to_server_path(scene_local, ""),
                xxhash: "0".into(),
            }],
            asset: assets
                .iter()
                .map(|(local, server)| AssetEntry {
                    local: (*local).to_string(),
                    server: (*server).to_string(),
                })
                .collect(),
        };
        manifest.save(path).unwrap();
    }

    #[test]
    fn archive_contains_manifest_scene_and_assets() {
        let temp = tempdir().unwrap();
        let scene = temp.path().join("shot.ma");
        let tex = temp.path().join("skin.png");
        fs::write(&scene, b"//Maya ASCII").unwrap();
        fs::write(&tex, b"png").unwrap();

        let upload = temp.path().join("upload.json");
        let tex_str = tex.to_string_lossy().to_string();
        write_manifest(
            &upload,
            &scene.to_string_lossy(),
            &[(&tex_str, &to_server_path(&tex_str, ""))],
        );

        let out = temp.path().join("out/bundle.zip");
        create_upload_package(&scene, &upload, "", &out, None, &NullLog).unwrap();

        let names = member_names(&out);
        assert!(names.contains(&MANIFEST_MEMBER.to_string()));
        assert!(names.iter().any(|n| n.ends_with("shot.ma")));
        assert!(names.iter().any(|n| n.ends_with("skin.png")));
        assert!(names.iter().all(|n| !n.starts_with('/')));
    }

    #[test]
    fn settings_artifact_is_included_when_present() {
        let temp = tempdir().unwrap();
        let scene = temp.path().join("shot.ma");
        fs::write(&scene, b"//Maya ASCII").unwrap();
        let settings = temp.path().join("render_settings.json");
        fs::write(&settings, b"{}").unwrap();

        let upload = temp.path().join("upload.json");
        write_manifest(&upload, &scene.to_string_lossy(), &[]);

        let out = temp.path().join("bundle.zip");
        create_upload_package(&scene, &upload, "", &out, Some(&settings), &NullLog).unwrap();
        assert!(member_names(&out).contains(&SETTINGS_MEMBER.to_string()));
    }

    #[test]
    fn missing_assets_are_counted_not_fatal() {
        let temp = tempdir().unwrap();
        let scene = temp.path().join("shot.ma");
        fs::write(&scene, b"//Maya ASCII").unwrap();

        let upload = temp.path().join("upload.json");
        write_manifest(
            &upload,
            &scene.to_string_lossy(),
            &[("/no/such/file.png", "/no/such/file.png")],
        );

        let out = temp.path().join("bundle.zip");
        create_upload_package(&scene, &upload, "", &out, None, &NullLog).unwrap();
        assert!(out.exists());
        let names = member_names(&out);
        assert!(!names.iter().any(|n| n.ends_with("file.png")));
    }

    #[test]
    fn foreign_xgen_assets_are_filtered_again() {
        let temp = tempdir().unwrap();
        let scene = temp.path().join("wolf.ma");
        fs::write(&scene, b"//Maya ASCII").unwrap();
        let own = temp.path().join("wolf__body.xgen");
        let foreign = temp.path().join("bear__body.xgen");
        fs::write(&own, b"x").unwrap();
        fs::write(&foreign, b"x").unwrap();

        let upload = temp.path().join("upload.json");
        let own_str = own.to_string_lossy().to_string();
        let foreign_str = foreign.to_string_lossy().to_string();
        write_manifest(
            &upload,
            &scene.to_string_lossy(),
            &[
                (&own_str, &to_server_path(&own_str, "")),
                (&foreign_str, &to_server_path(&foreign_str, "")),
            ],
        );

        let out = temp.path().join("bundle.zip");
        create_upload_package(&scene, &upload, "", &out, None, &NullLog).unwrap();
        let names = member_names(&out);
        assert!(names.iter().any(|n| n.ends_with("wolf__body.xgen")));
        assert!(!names.iter().any(|n| n.ends_with("bear__body.xgen")));
    }

    #[test]
    fn corrupt_manifest_is_fatal() {
        let temp = tempdir().unwrap();
        let scene = temp.path().join("shot.ma");
        fs::write(&scene, b"//Maya ASCII").unwrap();
        let upload = temp.path().join("upload.json");
        fs::write(&upload, b"not json").unwrap();

        let out = temp.path().join("bundle.zip");
        let result = create_upload_package(&scene, &upload, "", &out, None, &NullLog);
        assert!(result.is_err());
    }
}
