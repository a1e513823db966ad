use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use unrust::builder::CrateBuilder;
use unrust::cargo::Cargo;
use unrust::cli::{Cli, Commands};
use unrust::config::{Config, resolve_out_dir};
use unrust::error::error_chain;
use unrust::fetch::RateLimitedFetcher;
use unrust::ghidra::Ghidra;
use unrust::registry::list_crate_names;
use unrust::writer::{write_crate_csv, write_dependency_file};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log)?;
    let config = Config::from_cli(&cli)?;

    match cli.command.clone() {
        Commands::BuildCratesDependencies {
            outfile,
            target,
            top,
            sort,
        } => {
            let fetcher = RateLimitedFetcher::new(&config.user_agent, config.min_interval)?;
            let names = list_crate_names(&fetcher, &config.endpoints, top, &sort)?;
            write_dependency_file(&target, &names, &outfile)?;
        }
        Commands::BuildCrateCsv { crate_name, outdir } => {
            let out_dir = resolve_out_dir(outdir.as_deref())?;
            build_crate_csv(&config, &crate_name, &out_dir)?;
        }
    }

    Ok(())
}

fn init_logging(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter).with_context(|| format!("Invalid log filter: {filter}"))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn build_crate_csv(config: &Config, crate_name: &str, out_dir: &Path) -> Result<()> {
    let fetcher = RateLimitedFetcher::new(&config.user_agent, config.min_interval)?;
    let builder = CrateBuilder::new(
        fetcher,
        config.endpoints.clone(),
        Cargo::new(config.cargo.clone()),
        Ghidra::new(config.ghidra_headless.clone()),
        out_dir.to_path_buf(),
    );

    let krate = match builder.build_crate(crate_name) {
        Ok(report) => {
            for skipped in &report.skipped {
                tracing::warn!(locator = %skipped.locator, reason = %error_chain(&skipped.reason), "function skipped");
            }
            tracing::info!(
                crate_name,
                version = %report.krate.version,
                built = report.krate.functions.len(),
                skipped = report.skipped.len(),
                "crate built"
            );
            tracing::debug!("{}", report.krate);
            Some(report.krate)
        }
        Err(e) => {
            tracing::error!(crate_name, error = %error_chain(&e), "crate build failed; writing empty dataset");
            None
        }
    };

    let path = out_dir.join(format!("{crate_name}.csv"));
    let rows = write_crate_csv(krate.as_ref(), &path)?;
    tracing::info!(path = %path.display(), rows, "dataset written");
    Ok(())
}
