use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::BuildError;

/// Conventional location of the debug dynamic library cargo produces for `crate_name`.
pub fn artifact_path(crate_dir: &Path, crate_name: &str) -> PathBuf {
    let lib_name = crate_name.replace('-', "_");
    crate_dir.join("target").join("debug").join(format!(
        "{}{lib_name}{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    ))
}

#[derive(Debug, Clone)]
pub struct Cargo {
    program: PathBuf,
}

impl Default for Cargo {
    fn default() -> Self {
        Self::new(PathBuf::from("cargo"))
    }
}

impl Cargo {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Builds `crate_dir` as a dynamic library unless the artifact already exists.
    pub fn build_artifact(&self, crate_dir: &Path, crate_name: &str) -> Result<PathBuf, BuildError> {
        let artifact = artifact_path(crate_dir, crate_name);
        if artifact.exists() {
            return Ok(artifact);
        }

        request_dylib(&crate_dir.join("Cargo.toml"))?;

        tracing::info!(crate_dir = %crate_dir.display(), "building dynamic library");
        let output = Command::new(&self.program)
            .args(["build", "--all-features"])
            .current_dir(crate_dir)
            .output()
            .map_err(|source| BuildError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(crate_dir = %crate_dir.display(), status = %output.status, "build failed");
            return Err(BuildError::Failed {
                crate_dir: crate_dir.to_path_buf(),
                status: output.status,
                stderr: tail(stderr.trim(), 20),
            });
        }

        Ok(artifact)
    }
}

/// Sets `lib.crate-type = ["dylib"]` in the manifest, keeping any other `[lib]` keys.
pub fn request_dylib(manifest_path: &Path) -> Result<(), BuildError> {
    let manifest_err = |message: String| BuildError::Manifest {
        path: manifest_path.to_path_buf(),
        message,
    };

    let raw = std::fs::read_to_string(manifest_path).map_err(|e| manifest_err(e.to_string()))?;
    let mut manifest: toml::Table = raw.parse().map_err(|e: toml::de::Error| manifest_err(e.to_string()))?;

    let lib = manifest
        .entry("lib")
        .or_insert(toml::Value::Table(toml::Table::new()));
    let Some(lib) = lib.as_table_mut() else {
        return Err(manifest_err("`lib` is not a table".to_string()));
    };
    lib.insert(
        "crate-type".to_string(),
        toml::Value::Array(vec![toml::Value::String("dylib".to_string())]),
    );

    let rendered = toml::to_string(&manifest).map_err(|e| manifest_err(e.to_string()))?;
    std::fs::write(manifest_path, rendered).map_err(|e| manifest_err(e.to_string()))?;
    Ok(())
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
