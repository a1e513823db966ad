//! Dataset and dependency-manifest output.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::io::Write;
use std::path::Path;

use crate::models::{Crate, Function};

/// One CSV record per (function, decompile) pair.
pub fn crate_rows(krate: &Crate) -> Vec<[String; 6]> {
    krate
        .functions
        .iter()
        .flat_map(|function| function_rows(krate, function))
        .collect()
}

fn function_rows<'a>(krate: &'a Crate, function: &'a Function) -> impl Iterator<Item = [String; 6]> + 'a {
    let source = STANDARD.encode(function.source.as_bytes());
    function.decompiles.iter().map(move |decompile| {
        [
            krate.name.clone(),
            krate.version.clone(),
            function.name.clone(),
            if function.is_unsafe { "True" } else { "False" }.to_string(),
            source.clone(),
            STANDARD.encode(decompile.replace("\r\n", "\n").as_bytes()),
        ]
    })
}

/// Writes `krate`'s dataset to `path`; `None` (a failed build) yields an empty file.
pub fn write_crate_csv(krate: Option<&Crate>, path: &Path) -> Result<usize> {
    create_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create dataset file: {}", path.display()))?;

    let rows = krate.map(crate_rows).unwrap_or_default();
    for row in &rows {
        writer
            .write_record(row)
            .with_context(|| format!("Failed to write dataset row: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush dataset file: {}", path.display()))?;
    Ok(rows.len())
}

/// Writes `{target}: data/{name}.csv ...` as a single line.
pub fn write_dependency_file(target: &str, crate_names: &[String], path: &Path) -> Result<()> {
    create_parent(path)?;
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create dependency file: {}", path.display()))?;
    let mut line = format!("{target}:");
    for name in crate_names {
        line.push_str(&format!(" data/{name}.csv"));
    }
    file.write_all(line.as_bytes())
        .with_context(|| format!("Failed to write dependency file: {}", path.display()))?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}
