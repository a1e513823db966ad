use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;
use crate::registry::{DEFAULT_DOCS_URL, DEFAULT_REGISTRY_URL, Endpoints};

/// crates.io asks crawlers for at most one request per second.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoints: Endpoints,
    pub min_interval: Duration,
    pub user_agent: String,
    pub cargo: PathBuf,
    pub ghidra_headless: PathBuf,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let endpoints = Endpoints::new(
            cli.docs_url.as_deref().unwrap_or(DEFAULT_DOCS_URL),
            cli.registry_url.as_deref().unwrap_or(DEFAULT_REGISTRY_URL),
        );
        let min_interval = cli
            .min_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MIN_INTERVAL);

        Ok(Self {
            endpoints,
            min_interval,
            user_agent: user_agent(cli.contact.as_deref()),
            cargo: resolve_cargo_path(),
            ghidra_headless: resolve_ghidra_headless(cli)?,
        })
    }
}

pub fn user_agent(contact: Option<&str>) -> String {
    let base = format!("unrust@{}", env!("CARGO_PKG_VERSION"));
    match contact.map(str::trim).filter(|c| !c.is_empty()) {
        Some(contact) => format!("{base} executed by {contact}"),
        None => base,
    }
}

pub fn resolve_out_dir(outdir: Option<&Path>) -> Result<PathBuf> {
    let dir = match outdir {
        Some(p) => p.to_path_buf(),
        None => unrust_home()?,
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    Ok(dir)
}

pub fn resolve_cargo_path() -> PathBuf {
    env::var_os("UNRUST_CARGO")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("cargo"))
}

pub fn resolve_ghidra_headless(cli: &Cli) -> Result<PathBuf> {
    if let Some(p) = cli.ghidra.clone() {
        return Ok(p);
    }

    if let Some(install_dir) = env::var_os("GHIDRA_INSTALL_DIR") {
        let script = if cfg!(windows) {
            "analyzeHeadless.bat"
        } else {
            "analyzeHeadless"
        };
        let path = PathBuf::from(install_dir).join("support").join(script);
        if !path.exists() {
            anyhow::bail!(
                "GHIDRA_INSTALL_DIR is set but {} does not exist",
                path.display()
            );
        }
        return Ok(path);
    }

    Ok(PathBuf::from("analyzeHeadless"))
}

fn unrust_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve data directory"))?;
    Ok(base.join("unrust"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Commands;
    use clap::Parser;

    #[test]
    fn user_agent_mentions_contact_when_given() {
        let version = env!("CARGO_PKG_VERSION");
        assert_eq!(user_agent(None), format!("unrust@{version}"));
        assert_eq!(user_agent(Some("  ")), format!("unrust@{version}"));
        assert_eq!(
            user_agent(Some("me@example.com")),
            format!("unrust@{version} executed by me@example.com")
        );
    }

    #[test]
    fn explicit_flags_override_defaults() {
        let cli = Cli::parse_from([
            "unrust",
            "--docs-url",
            "http://localhost:8000/",
            "--min-interval-ms",
            "25",
            "--ghidra",
            "/opt/ghidra/support/analyzeHeadless",
            "build-crate-csv",
            "serde",
        ]);
        let config = Config::from_cli(&cli).unwrap();
        assert_eq!(config.min_interval, Duration::from_millis(25));
        assert_eq!(
            config.endpoints.crate_docs_url("serde"),
            "http://localhost:8000/serde/latest/serde/"
        );
        assert_eq!(
            config.ghidra_headless,
            PathBuf::from("/opt/ghidra/support/analyzeHeadless")
        );
        assert!(matches!(cli.command, Commands::BuildCrateCsv { .. }));
    }

    #[test]
    fn resolve_out_dir_creates_directory() {
        let dir = std::env::temp_dir().join(format!("unrust_config_test_{}", std::process::id()));
        let resolved = resolve_out_dir(Some(&dir)).unwrap();
        assert!(resolved.is_dir());
        let _ = std::fs::remove_dir_all(dir);
    }
}
