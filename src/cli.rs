use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "unrust")]
#[command(about = "Pair documented crate functions with their Ghidra decompilations")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log filter, e.g. `info` or `unrust=debug`.
    #[arg(long, global = true, env = "RUST_LOG", default_value = "info")]
    pub log: String,

    #[arg(long, global = true, value_name = "URL", env = "UNRUST_DOCS_URL")]
    pub docs_url: Option<String>,

    #[arg(long, global = true, value_name = "URL", env = "UNRUST_REGISTRY_URL")]
    pub registry_url: Option<String>,

    /// Minimum time between two outbound requests.
    #[arg(long, global = true, value_name = "MS", env = "UNRUST_MIN_INTERVAL_MS")]
    pub min_interval_ms: Option<u64>,

    /// Contact address advertised in the User-Agent.
    #[arg(long, global = true, value_name = "EMAIL", env = "UNRUST_CONTACT_EMAIL")]
    pub contact: Option<String>,

    /// Path to Ghidra's `analyzeHeadless`.
    #[arg(long, global = true, value_name = "FILE", env = "UNRUST_GHIDRA_HEADLESS")]
    pub ghidra: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Write a make-style dependency line listing one dataset per top crate.
    BuildCratesDependencies {
        outfile: PathBuf,

        target: String,

        #[arg(long, value_name = "N", default_value_t = 100)]
        top: usize,

        #[arg(long, default_value = "downloads")]
        sort: String,
    },
    /// Build the dataset CSV for one crate.
    BuildCrateCsv {
        crate_name: String,

        #[arg(long, value_name = "DIR")]
        outdir: Option<PathBuf>,
    },
}
