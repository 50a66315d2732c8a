//! Shared helpers for integration tests.
//!
//! [`SceneProject`] builds a realistic project tree in a temp directory:
//! a `scenes/` folder holding the scene file, `sourceimages/` and `cache/`
//! folders for dependencies, and an optional sibling `xgen/` data root.
//! Everything is cleaned up when the project is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use assert_cmd::Command;
use tempfile::TempDir;

/// Output captured from one CLI invocation.
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// A throwaway project tree for one test.
pub struct SceneProject {
    root: TempDir,
}

impl SceneProject {
    pub fn new() -> Result<Self> {
        let root = TempDir::new()?;
        fs::create_dir_all(root.path().join("scenes"))?;
        fs::create_dir_all(root.path().join("sourceimages"))?;
        fs::create_dir_all(root.path().join("cache"))?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn scenes_dir(&self) -> PathBuf {
        self.root.path().join("scenes")
    }

    /// Writes a dependency file with placeholder content and returns its
    /// absolute path with forward slashes.
    pub fn add_file(&self, relative: &str, content: &str) -> Result<String> {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path.to_string_lossy().replace('\\', "/"))
    }

    /// Writes a text scene under `scenes/` whose node attributes point at
    /// the given texture and cache paths.
    pub fn write_scene(&self, name: &str, textures: &[&str], caches: &[&str]) -> Result<PathBuf> {
        let mut content = String::from(
            "//Maya ASCII 2024 scene\nrequires maya \"2024\";\ncurrentUnit -l centimeter;\n",
        );
        for (idx, texture) in textures.iter().enumerate() {
            content.push_str(&format!(
                "createNode file -n \"file{idx}\";\n\tsetAttr \".fileTextureName\" -type \"string\" \"{texture}\";\n"
            ));
        }
        for (idx, cache) in caches.iter().enumerate() {
            content.push_str(&format!(
                "createNode cacheFile -n \"cache{idx}\";\n\tsetAttr \".cacheName\" -type \"string\" \"{cache}\";\n"
            ));
        }
        let path = self.scenes_dir().join(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Runs the scenepack binary with the given arguments, capturing output.
    pub fn run_scenepack(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = Command::cargo_bin("scenepack")?
            .args(args)
            .current_dir(self.root.path())
            .output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Writes an executable shell script that mimics the host application by
/// printing a fixed scene-description JSON on stdout. Unix only.
#[cfg(unix)]
pub fn write_fake_inspector(dir: &Path, description_json: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("fake_mayapy.sh");
    fs::write(
        &script,
        format!("#!/bin/sh\necho 'inspecting scene'\necho '{description_json}'\n"),
    )?;
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
    Ok(script)
}
