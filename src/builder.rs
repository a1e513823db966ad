//! Per-crate dataset construction.
//!
//! [`CrateBuilder::build_crate`] parses the crate's documentation root and
//! builds each documented function independently. Documentation fetch and
//! parse failures skip one function; a failing native build aborts the crate.

use std::path::PathBuf;

use crate::archive;
use crate::cargo::Cargo;
use crate::decompile::{Decompiler, decompile_function};
use crate::error::{CrateError, FunctionError, error_chain};
use crate::fetch::Fetch;
use crate::models::{Crate, Function};
use crate::parse::{parse_crate_index, parse_function_page, parse_source_view};
use crate::registry::{Endpoints, resolve_href};

#[derive(Debug)]
pub struct SkippedFunction {
    pub locator: String,
    pub reason: FunctionError,
}

#[derive(Debug)]
pub struct CrateReport {
    pub krate: Crate,
    pub skipped: Vec<SkippedFunction>,
}

pub struct CrateBuilder<F, D> {
    fetcher: F,
    endpoints: Endpoints,
    cargo: Cargo,
    decompiler: D,
    out_dir: PathBuf,
}

impl<F: Fetch, D: Decompiler> CrateBuilder<F, D> {
    pub fn new(fetcher: F, endpoints: Endpoints, cargo: Cargo, decompiler: D, out_dir: PathBuf) -> Self {
        Self {
            fetcher,
            endpoints,
            cargo,
            decompiler,
            out_dir,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn decompiler(&self) -> &D {
        &self.decompiler
    }

    pub fn build_crate(&self, name: &str) -> Result<CrateReport, CrateError> {
        tracing::info!(crate_name = name, "parsing crate");
        let url = self.endpoints.crate_docs_url(name);
        let html = self.fetcher.fetch(&url).map_err(|source| CrateError::Fetch {
            name: name.to_string(),
            source,
        })?;
        let index = parse_crate_index(&html).map_err(|source| CrateError::Parse {
            name: name.to_string(),
            source,
        })?;

        let mut krate = Crate::new(name, index.version);
        let mut skipped = Vec::new();
        for locator in index.function_locators {
            match self.build_function(&krate, &locator) {
                Ok(function) => krate.functions.push(function),
                Err(FunctionError::Build(e)) => return Err(CrateError::Build(e)),
                Err(reason) => {
                    tracing::error!(crate_name = name, locator = %locator, error = %error_chain(&reason), "skipping function");
                    skipped.push(SkippedFunction { locator, reason });
                }
            }
        }

        Ok(CrateReport { krate, skipped })
    }

    pub fn build_function(&self, krate: &Crate, locator: &str) -> Result<Function, FunctionError> {
        let page_url = self.endpoints.resolve_locator(krate, locator)?;
        let page = parse_function_page(&self.fetcher.fetch(&page_url)?)?;

        let mut function = Function::new(page.name);
        // The fragment only carries the line range; the page itself is fetched without it.
        let source_url = resolve_href(&page_url, &page.source.href)?;
        let source_url = source_url.split_once('#').map_or(source_url.as_str(), |(url, _)| url);
        let extract = parse_source_view(&page.source, &self.fetcher.fetch(source_url)?)?;
        function.source = extract.text;
        function.is_unsafe = extract.is_unsafe;

        function.decompiles = self.build_decompiles(krate, &function.name)?;
        if function.decompiles.is_empty() {
            tracing::debug!(function = %function.name, "no decompiles found");
        }
        Ok(function)
    }

    fn build_decompiles(&self, krate: &Crate, function_name: &str) -> Result<Vec<String>, FunctionError> {
        let archive = archive::acquire_archive(&self.fetcher, &self.endpoints, krate, &self.out_dir)?;
        let crate_dir = archive::unpack(krate, &archive, &self.out_dir)?;
        let artifact = self.cargo.build_artifact(&crate_dir, &krate.name)?;
        decompile_function(&self.decompiler, &artifact, krate, function_name).map_err(FunctionError::Session)
    }
}
