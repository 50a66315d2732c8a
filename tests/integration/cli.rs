//! Binary-level tests for the `package` and `externals` subcommands.
//!
//! The host application is never assumed to be installed; tests either point
//! `--inspector` at a path that does not exist (forcing the degraded text
//! scene path) or at a fake shell script standing in for `mayapy`.

use serde_json::Value;

use crate::common::SceneProject;

/// The result line is the last JSON object on stdout; run-log lines may
/// precede it.
fn last_json(stdout: &str) -> Value {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str(line).ok())
        .unwrap_or_else(|| panic!("no JSON line in stdout: {stdout:?}"))
}

#[test]
fn package_missing_scene_reports_error_json() {
    let project = SceneProject::new().unwrap();
    let output = project
        .run_scenepack(&["package", "--scene", "scenes/nope.ma"])
        .unwrap();

    assert!(!output.success);
    assert_eq!(output.exit_code, Some(2));
    let result = last_json(&output.stdout);
    assert!(result["error"].as_str().unwrap().contains("nope.ma"));
}

#[test]
fn package_rejects_unsupported_extension() {
    let project = SceneProject::new().unwrap();
    project.add_file("scenes/notes.txt", "not a scene").unwrap();

    let output = project
        .run_scenepack(&["package", "--scene", "scenes/notes.txt"])
        .unwrap();

    assert_eq!(output.exit_code, Some(2));
    let result = last_json(&output.stdout);
    assert!(result["error"].as_str().unwrap().contains(".txt"));
}

#[test]
fn package_text_scene_degrades_without_host_application() {
    let project = SceneProject::new().unwrap();
    let wood = project.add_file("sourceimages/wood.png", "png bytes").unwrap();
    let scene = project.write_scene("shot.ma", &[&wood], &[]).unwrap();

    let output = project
        .run_scenepack(&[
            "package",
            "--scene",
            &scene.to_string_lossy(),
            "--server-root",
            "/input/job",
            "--inspector",
            "/nonexistent/mayapy",
        ])
        .unwrap();

    assert!(output.success, "stderr: {}", output.stderr);
    let result = last_json(&output.stdout);
    assert_eq!(result["success"], Value::Bool(true));
    assert_eq!(result["zip_name"], "shot_ma.zip");
    // No inspection means no render settings artifact.
    assert_eq!(result["render_settings"], Value::Null);
    assert_eq!(result["server_root"], "/input/job");
    assert_eq!(result["stats"]["texture_count"], 1);

    let zip = result["zip"].as_str().unwrap();
    assert!(std::path::Path::new(zip).is_file());
    let upload = result["upload_json"].as_str().unwrap();
    assert!(std::path::Path::new(upload).is_file());
}

#[test]
fn package_quiet_emits_only_the_result_line() {
    let project = SceneProject::new().unwrap();
    let scene = project.write_scene("shot.ma", &[], &[]).unwrap();

    let output = project
        .run_scenepack(&[
            "--quiet",
            "package",
            "--scene",
            &scene.to_string_lossy(),
            "--inspector",
            "/nonexistent/mayapy",
        ])
        .unwrap();

    assert!(output.success, "stderr: {}", output.stderr);
    let lines: Vec<&str> = output.stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(lines.len(), 1, "stdout: {:?}", output.stdout);
    assert!(serde_json::from_str::<Value>(lines[0]).is_ok());
}

#[test]
fn package_log_file_captures_the_run_log() {
    let project = SceneProject::new().unwrap();
    let scene = project.write_scene("shot.ma", &[], &[]).unwrap();
    let log_path = project.path().join("run.log");

    let output = project
        .run_scenepack(&[
            "package",
            "--scene",
            &scene.to_string_lossy(),
            "--log-file",
            &log_path.to_string_lossy(),
            "--inspector",
            "/nonexistent/mayapy",
        ])
        .unwrap();

    assert!(output.success, "stderr: {}", output.stderr);
    let result = last_json(&output.stdout);
    assert_eq!(result["log_file"].as_str(), Some(log_path.to_string_lossy().as_ref()));

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("packaging scene for upload"), "log: {log:?}");
}

#[test]
fn package_out_zip_copies_the_archive() {
    let project = SceneProject::new().unwrap();
    let scene = project.write_scene("shot.ma", &[], &[]).unwrap();
    let out_zip = project.path().join("delivery/final.zip");

    let output = project
        .run_scenepack(&[
            "package",
            "--scene",
            &scene.to_string_lossy(),
            "--out-zip",
            &out_zip.to_string_lossy(),
            "--inspector",
            "/nonexistent/mayapy",
        ])
        .unwrap();

    assert!(output.success, "stderr: {}", output.stderr);
    let result = last_json(&output.stdout);
    assert_eq!(result["zip_name"], "final.zip");
    assert!(out_zip.is_file());
}

#[cfg(unix)]
#[test]
fn package_with_fake_inspector_writes_render_settings() {
    use crate::common::write_fake_inspector;

    let project = SceneProject::new().unwrap();
    let wood = project.add_file("sourceimages/wood.png", "png bytes").unwrap();
    let scene = project.write_scene("shot.ma", &[&wood], &[]).unwrap();

    let description = r#"{"renderer": "arnold", "plugins": [{"name": "mtoa", "version": "5.3.1"}], "render_settings": {"defaultResolution": {"width": 1920, "height": 1080}, "defaultRenderGlobals": {"startFrame": 1.0, "endFrame": 24.0, "imageFormat": 50}}, "render_path": {"imageFilePrefix": "images/shot"}}"#;
    let inspector = write_fake_inspector(project.path(), description).unwrap();

    let output = project
        .run_scenepack(&[
            "package",
            "--scene",
            &scene.to_string_lossy(),
            "--inspector",
            &inspector.to_string_lossy(),
        ])
        .unwrap();

    assert!(output.success, "stderr: {}", output.stderr);
    let result = last_json(&output.stdout);
    let settings_path = result["render_settings"].as_str().unwrap();
    let settings: Value =
        serde_json::from_str(&std::fs::read_to_string(settings_path).unwrap()).unwrap();

    assert_eq!(settings["renderer"], "arnold");
    assert_eq!(settings["renderer_version"], "5.3.1");
    assert_eq!(settings["output_format"], "exr");
    assert_eq!(settings["output_format_actual"], "exr");
    assert_eq!(settings["resolution"]["width"], 1920);
    assert_eq!(settings["frame_range"]["end_frame"], 24.0);
}

#[cfg(unix)]
#[test]
fn externals_prints_expanded_files() {
    use crate::common::write_fake_inspector;

    let project = SceneProject::new().unwrap();
    let wood = project.add_file("sourceimages/wood.png", "png bytes").unwrap();
    let scene = project.write_scene("shot.ma", &[], &[]).unwrap();

    let description = format!(
        r#"{{"renderer": "vray", "external_files": {{"textures": ["{wood}"]}}, "render_settings": {{}}}}"#
    );
    let inspector = write_fake_inspector(project.path(), &description).unwrap();

    let output = project
        .run_scenepack(&[
            "externals",
            "--scene",
            &scene.to_string_lossy(),
            "--inspector",
            &inspector.to_string_lossy(),
        ])
        .unwrap();

    assert!(output.success, "stderr: {}", output.stderr);
    let result = last_json(&output.stdout);
    assert_eq!(result["renderer"], "vray");
    let all_files: Vec<&str> =
        result["all_files"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
    assert!(all_files.contains(&wood.as_str()), "all_files: {all_files:?}");
}

#[test]
fn externals_without_host_application_fails() {
    let project = SceneProject::new().unwrap();
    let scene = project.write_scene("shot.ma", &[], &[]).unwrap();

    let output = project
        .run_scenepack(&[
            "externals",
            "--scene",
            &scene.to_string_lossy(),
            "--inspector",
            "/nonexistent/mayapy",
        ])
        .unwrap();

    assert!(!output.success);
    assert_eq!(output.exit_code, Some(1));
}
