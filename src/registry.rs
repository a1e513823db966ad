//! Addresses on the documentation host and the crate registry.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;

use crate::error::ParseError;
use crate::fetch::Fetch;
use crate::models::Crate;

pub const DEFAULT_DOCS_URL: &str = "https://docs.rs";
pub const DEFAULT_REGISTRY_URL: &str = "https://crates.io/api/v1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    docs_base: String,
    registry_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_DOCS_URL, DEFAULT_REGISTRY_URL)
    }
}

impl Endpoints {
    pub fn new(docs_base: &str, registry_base: &str) -> Self {
        Self {
            docs_base: docs_base.trim_end_matches('/').to_string(),
            registry_base: registry_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn crate_docs_url(&self, name: &str) -> String {
        format!("{}/{name}/latest/{name}/", self.docs_base)
    }

    /// Resolves a documentation href found on one of `krate`'s pages.
    ///
    /// Relative hrefs are relative to the crate's versioned root page;
    /// absolute URLs pass through unchanged.
    pub fn resolve_locator(&self, krate: &Crate, locator: &str) -> Result<String, ParseError> {
        let root = format!(
            "{}/{name}/{version}/{name}/",
            self.docs_base,
            name = krate.name,
            version = krate.version
        );
        resolve_href(&root, locator)
    }

    pub fn download_url(&self, krate: &Crate) -> String {
        format!(
            "{}/crates/{}/{}/download",
            self.registry_base, krate.name, krate.version
        )
    }

    pub fn listing_url(&self, top: usize, sort: &str) -> String {
        format!(
            "{}/crates?page=1&per_page={top}&sort={sort}",
            self.registry_base
        )
    }
}

/// Resolves `href` as a link found on the page at `page_url`.
pub fn resolve_href(page_url: &str, href: &str) -> Result<String, ParseError> {
    let invalid = |message: String| ParseError::InvalidLocator {
        locator: href.to_string(),
        message,
    };
    let base = Url::parse(page_url).map_err(|e| invalid(e.to_string()))?;
    let url = base.join(href).map_err(|e| invalid(e.to_string()))?;
    Ok(url.to_string())
}

#[derive(Debug, Deserialize)]
struct Listing {
    crates: Vec<ListedCrate>,
}

#[derive(Debug, Deserialize)]
struct ListedCrate {
    name: String,
}

pub fn parse_crate_names(body: &str) -> Result<Vec<String>, ParseError> {
    let listing: Listing = serde_json::from_str(body).map_err(ParseError::Listing)?;
    Ok(listing.crates.into_iter().map(|c| c.name).collect())
}

/// Names of the `top` crates on the registry, ordered by `sort`.
pub fn list_crate_names(
    fetcher: &impl Fetch,
    endpoints: &Endpoints,
    top: usize,
    sort: &str,
) -> Result<Vec<String>> {
    let url = endpoints.listing_url(top, sort);
    let body = fetcher
        .fetch(&url)
        .with_context(|| format!("Failed to fetch crate listing: {url}"))?;
    let names = parse_crate_names(&body).context("Failed to parse crate listing")?;
    tracing::info!(count = names.len(), sort, "listed crates");
    Ok(names)
}
