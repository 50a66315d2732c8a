//! Library-level pipeline tests: extraction through manifest to archive,
//! against real scene trees on disk.

use std::fs::File;
use std::path::Path;

use scenepack::archive::{MANIFEST_MEMBER, create_upload_package};
use scenepack::manifest::build_upload_mapping;
use scenepack::report::NullLog;

use crate::common::SceneProject;

fn zip_members(path: &Path) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..archive.len()).map(|i| archive.by_index(i).unwrap().name().to_string()).collect()
}

#[test]
fn manifest_maps_existing_dependencies_only() {
    let project = SceneProject::new().unwrap();
    let wood = project.add_file("sourceimages/wood.png", "png bytes").unwrap();
    let missing = format!("{}/sourceimages/missing.png", project.path().display());
    let sim = project.add_file("cache/fluid.abc", "abc bytes").unwrap();

    let scene = project.write_scene("shot.ma", &[&wood, &missing], &[&sim]).unwrap();

    let manifest = build_upload_mapping(&scene, "", &NullLog);

    assert_eq!(manifest.scene.len(), 1);
    assert_eq!(manifest.scene[0].hash.len(), 32);
    assert!(manifest.scene[0].xxhash.parse::<u64>().is_ok());

    let locals: Vec<&str> = manifest.asset.iter().map(|a| a.local.as_str()).collect();
    assert!(locals.contains(&wood.as_str()));
    assert!(locals.contains(&sim.as_str()));
    assert!(!locals.iter().any(|l| l.ends_with("missing.png")));
}

#[test]
fn server_root_prefixes_every_mapped_path() {
    let project = SceneProject::new().unwrap();
    let wood = project.add_file("sourceimages/wood.png", "png bytes").unwrap();
    let scene = project.write_scene("shot.ma", &[&wood], &[]).unwrap();

    let manifest = build_upload_mapping(&scene, "/input/job/cfg", &NullLog);

    assert!(manifest.scene[0].server.starts_with("/input/job/cfg/"));
    for asset in &manifest.asset {
        assert!(
            asset.server.starts_with("/input/job/cfg/"),
            "unprefixed server path: {}",
            asset.server
        );
    }
}

#[test]
fn upload_package_contains_manifest_scene_and_assets() {
    let project = SceneProject::new().unwrap();
    let wood = project.add_file("sourceimages/wood.png", "png bytes").unwrap();
    let scene = project.write_scene("shot.ma", &[&wood], &[]).unwrap();

    let manifest = build_upload_mapping(&scene, "", &NullLog);
    let upload_path = project.path().join("upload.json");
    manifest.save(&upload_path).unwrap();

    let zip_path = project.path().join("shot_ma.zip");
    create_upload_package(&scene, &upload_path, "", &zip_path, None, &NullLog).unwrap();

    let members = zip_members(&zip_path);
    assert!(members.iter().any(|m| m == MANIFEST_MEMBER));
    assert!(members.iter().any(|m| m.ends_with("shot.ma")));
    assert!(members.iter().any(|m| m.ends_with("wood.png")));
    // Server paths are archive-relative: no leading slash on any member.
    assert!(members.iter().all(|m| !m.starts_with('/')));
}

#[test]
fn xgen_description_pulls_in_collection_data() {
    let project = SceneProject::new().unwrap();
    let wood = project.add_file("sourceimages/wood.png", "png bytes").unwrap();
    let guides = project.add_file("xgen/collections/fur/guides.abc", "abc").unwrap();
    let mask = project.add_file("xgen/collections/fur/fur_mask.png", "png").unwrap();
    project.add_file("xgen/collections/fur/notes.txt", "ignored").unwrap();

    let scene = project.write_scene("fluffy.ma", &[&wood], &[]).unwrap();

    let root = project.path().to_string_lossy().replace('\\', "/");
    let xgen = format!(
        "Palette\n\tname\t\tfur\n\txgProjectPath\t{root}/\n\txgDataPath\t${{PROJECT}}xgen/collections/fur\n"
    );
    project.add_file("scenes/fluffy__fur.xgen", &xgen).unwrap();

    let manifest = build_upload_mapping(&scene, "", &NullLog);
    let locals: Vec<&str> = manifest.asset.iter().map(|a| a.local.as_str()).collect();

    assert!(locals.contains(&guides.as_str()), "guides.abc missing from {locals:?}");
    assert!(locals.contains(&mask.as_str()));
    // .txt is outside the data-directory allow list
    assert!(!locals.iter().any(|l| l.ends_with("notes.txt")));
}

#[test]
fn foreign_xgen_descriptions_are_excluded() {
    let project = SceneProject::new().unwrap();
    let foreign = project.add_file("scenes/other__fur.xgen", "Palette\n\tname\t\tfur\n").unwrap();
    let scene = project.write_scene("shot.ma", &[&foreign], &[]).unwrap();

    let manifest = build_upload_mapping(&scene, "", &NullLog);
    let locals: Vec<&str> = manifest.asset.iter().map(|a| a.local.as_str()).collect();
    assert!(!locals.contains(&foreign.as_str()));
}

#[test]
fn ocio_config_expands_its_directory() {
    let project = SceneProject::new().unwrap();
    let config = project.add_file("color/config.ocio", "ocio_profile_version: 2").unwrap();
    let lut = project.add_file("color/luts/film.cube", "LUT_3D_SIZE 2").unwrap();
    let scene = project.write_scene("graded.ma", &[&config], &[]).unwrap();

    let manifest = build_upload_mapping(&scene, "", &NullLog);
    let locals: Vec<&str> = manifest.asset.iter().map(|a| a.local.as_str()).collect();
    assert!(locals.contains(&config.as_str()));
    assert!(locals.contains(&lut.as_str()), "LUT not pulled in: {locals:?}");
}
