//! Resolving compiled entry points back to documented functions.
//!
//! A [`Decompiler`] opens one [`DecompilerSession`] per artifact. Entry points
//! whose primary symbol names the target function (including monomorphized
//! instances such as `mycrate::foo<u8>`) are decompiled; a failure on one
//! entry point drops only that entry point.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::DecompileError;
use crate::models::Crate;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntryPoint {
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SymbolKind {
    Function,
    Label,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Symbol {
    /// Fully-qualified name, namespaces joined with `::`.
    pub name: String,
    pub kind: SymbolKind,
}

pub trait DecompilerSession {
    /// Externally visible entry points, in the decompiler's enumeration order.
    fn entry_points(&self) -> Vec<EntryPoint>;

    fn primary_symbol(&self, entry: &EntryPoint) -> Option<Symbol>;

    /// Decompiles `entries`, returning one result per entry in the same order.
    fn decompile(&mut self, entries: &[EntryPoint]) -> Vec<Result<String, DecompileError>>;
}

pub trait Decompiler {
    type Session: DecompilerSession;

    fn open(&self, artifact: &Path) -> Result<Self::Session, DecompileError>;
}

/// `true` if `symbol` is `{crate_name}::{function_name}` or an instance of it.
pub fn symbol_matches(symbol: &str, crate_name: &str, function_name: &str) -> bool {
    let target = format!("{crate_name}::{function_name}");
    match symbol.strip_prefix(target.as_str()) {
        Some(rest) => rest.is_empty() || rest.starts_with('<'),
        None => false,
    }
}

fn is_candidate(symbol: Option<&Symbol>, crate_name: &str, function_name: &str) -> bool {
    symbol.is_some_and(|symbol| {
        symbol.kind == SymbolKind::Function && symbol_matches(&symbol.name, crate_name, function_name)
    })
}

fn candidates<S: DecompilerSession>(
    session: &S,
    crate_name: &str,
    function_name: &str,
) -> Vec<EntryPoint> {
    session
        .entry_points()
        .into_iter()
        .filter(|entry| is_candidate(session.primary_symbol(entry).as_ref(), crate_name, function_name))
        .collect()
}

fn decompile_candidates<S: DecompilerSession>(
    session: &mut S,
    function: &str,
    entries: &[EntryPoint],
) -> Vec<String> {
    if entries.is_empty() {
        return Vec::new();
    }

    let results = session.decompile(entries);
    let mut decompiles = Vec::with_capacity(results.len());
    for (entry, result) in entries.iter().zip(results) {
        match result {
            Ok(code) => decompiles.push(code),
            Err(e) => {
                tracing::warn!(function, address = %entry.address, error = %e, "skipping entry point");
            }
        }
    }
    decompiles
}

/// Decompiles every entry point of `artifact` that resolves to `function_name`.
pub fn decompile_function<D: Decompiler>(
    decompiler: &D,
    artifact: &Path,
    krate: &Crate,
    function_name: &str,
) -> Result<Vec<String>, DecompileError> {
    tracing::info!(artifact = %artifact.display(), function = function_name, "opening decompiler session");
    let mut session = decompiler.open(artifact)?;
    let entries = candidates(&session, &krate.name, function_name);
    Ok(decompile_candidates(
        &mut session,
        &krate.symbol_path(function_name),
        &entries,
    ))
}

/// Like [`decompile_function`] for several functions over a single session.
pub fn decompile_functions<D: Decompiler>(
    decompiler: &D,
    artifact: &Path,
    krate: &Crate,
    function_names: &[&str],
) -> Result<BTreeMap<String, Vec<String>>, DecompileError> {
    tracing::info!(artifact = %artifact.display(), functions = function_names.len(), "opening decompiler session");
    let mut session = decompiler.open(artifact)?;
    let mut out = BTreeMap::new();
    for name in function_names {
        let entries = candidates(&session, &krate.name, name);
        let decompiles = decompile_candidates(&mut session, &krate.symbol_path(name), &entries);
        out.insert((*name).to_string(), decompiles);
    }
    Ok(out)
}
