use flate2::Compression;
use flate2::write::GzEncoder;
use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};
use unrust::builder::CrateBuilder;
use unrust::cargo::{Cargo, artifact_path};
use unrust::decompile::{Decompiler, DecompilerSession, EntryPoint, Symbol, SymbolKind};
use unrust::error::{DecompileError, FetchError};
use unrust::fetch::Fetch;
use unrust::registry::Endpoints;

const DOCS: &str = "https://docs.rs/mycrate/1.0.0/mycrate";
const DOWNLOAD: &str = "https://crates.io/api/v1/crates/mycrate/1.0.0/download";

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "unrust_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ))
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

fn crate_tarball(entries: &[(&str, &str)]) -> anyhow::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_bytes())?;
    }
    Ok(builder.into_inner()?.finish()?)
}

/// Serves documentation pages from memory and counts archive downloads.
struct SiteFetch {
    pages: HashMap<String, String>,
    archive: Vec<u8>,
    downloads: Cell<usize>,
}

impl Fetch for SiteFetch {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }

    fn fetch_file(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if url != DOWNLOAD {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            });
        }
        self.downloads.set(self.downloads.get() + 1);
        Ok(self.archive.clone())
    }
}

fn site(archive: Vec<u8>) -> SiteFetch {
    let mut pages = HashMap::new();
    pages.insert(
        "https://docs.rs/mycrate/latest/mycrate/".to_string(),
        "<html><span class=\"version\">1.0.0</span>\
         <a class=\"fn\" href=\"fn.alpha.html\">alpha</a>\
         <a class=\"fn\" href=\"fn.gamma.html\">gamma</a></html>"
            .to_string(),
    );
    pages.insert(
        format!("{DOCS}/fn.alpha.html"),
        "<span class=\"fn\">alpha</span><a class=\"src\" href=\"../src/mycrate/lib.rs.html#1-3\">source</a>"
            .to_string(),
    );
    pages.insert(
        format!("{DOCS}/fn.gamma.html"),
        "<span class=\"fn\">gamma</span><a class=\"src\" href=\"../src/mycrate/lib.rs.html#5\">source</a>"
            .to_string(),
    );
    pages.insert(
        "https://docs.rs/mycrate/1.0.0/src/mycrate/lib.rs.html".to_string(),
        "<pre><code>1pub fn alpha() {\n2    todo!()\n3}\n4\n5pub unsafe fn gamma&lt;T&gt;(t: T) {}</code></pre>"
            .to_string(),
    );
    SiteFetch {
        pages,
        archive,
        downloads: Cell::new(0),
    }
}

/// In-memory decompiler with three exported entry points.
#[derive(Default)]
struct StubDecompiler {
    opened: Cell<usize>,
}

struct StubSession;

impl DecompilerSession for StubSession {
    fn entry_points(&self) -> Vec<EntryPoint> {
        ["1000", "2000", "3000"]
            .into_iter()
            .map(|address| EntryPoint {
                address: address.to_string(),
            })
            .collect()
    }

    fn primary_symbol(&self, entry: &EntryPoint) -> Option<Symbol> {
        let name = match entry.address.as_str() {
            "1000" => "mycrate::alpha",
            "2000" => "mycrate::gamma<u8>",
            "3000" => "mycrate::gamma<u16>",
            _ => return None,
        };
        Some(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Function,
        })
    }

    fn decompile(&mut self, entries: &[EntryPoint]) -> Vec<Result<String, DecompileError>> {
        entries
            .iter()
            .map(|entry| Ok(format!("void FUN_{}(void)\r\n{{\r\n  return;\r\n}}", entry.address)))
            .collect()
    }
}

impl Decompiler for StubDecompiler {
    type Session = StubSession;

    fn open(&self, _artifact: &Path) -> Result<StubSession, DecompileError> {
        self.opened.set(self.opened.get() + 1);
        Ok(StubSession)
    }
}

#[cfg(unix)]
fn fake_cargo(base: &Path, artifact: &Path, counter: &Path) -> anyhow::Result<PathBuf> {
    let script = base.join("fake-cargo");
    write_file(
        &script,
        &format!(
            "#!/bin/sh\necho \"$@\" >> '{}'\nmkdir -p '{}'\nprintf 'ELF' > '{}'\n",
            counter.display(),
            artifact.parent().unwrap().display(),
            artifact.display()
        ),
    )?;
    make_executable(&script)?;
    Ok(script)
}

#[cfg(unix)]
#[test]
fn rerun_reuses_archive_and_build() -> anyhow::Result<()> {
    let base = temp_dir("rerun");
    let out = base.join("out");
    let counter = base.join("cargo-calls");
    let artifact = artifact_path(&out.join("mycrate-1.0.0"), "mycrate");
    let cargo = fake_cargo(&base, &artifact, &counter)?;

    let archive = crate_tarball(&[
        (
            "mycrate-1.0.0/Cargo.toml",
            "[package]\nname = \"mycrate\"\nversion = \"1.0.0\"\n\n[lib]\npath = \"src/lib.rs\"\n",
        ),
        ("mycrate-1.0.0/src/lib.rs", "pub fn alpha() {}\n"),
    ])?;
    let builder = CrateBuilder::new(
        site(archive),
        Endpoints::default(),
        Cargo::new(cargo),
        StubDecompiler::default(),
        out.clone(),
    );

    let first = builder.build_crate("mycrate")?;
    assert!(first.skipped.is_empty());
    assert_eq!(first.krate.version, "1.0.0");
    assert_eq!(first.krate.functions.len(), 2);

    let alpha = &first.krate.functions[0];
    assert_eq!(alpha.name, "alpha");
    assert!(!alpha.is_unsafe);
    assert_eq!(alpha.source, "pub fn alpha() {\n    todo!()\n}");
    assert_eq!(alpha.decompiles.len(), 1);

    let gamma = &first.krate.functions[1];
    assert!(gamma.is_unsafe);
    assert_eq!(gamma.source, "pub unsafe fn gamma<T>(t: T) {}");
    assert_eq!(gamma.decompiles.len(), 2);

    let manifest = std::fs::read_to_string(out.join("mycrate-1.0.0/Cargo.toml"))?;
    let manifest: toml::Table = manifest.parse()?;
    let lib = manifest["lib"].as_table().unwrap();
    assert_eq!(lib["path"].as_str(), Some("src/lib.rs"));
    assert_eq!(lib["crate-type"].as_array().unwrap().len(), 1);

    let second = builder.build_crate("mycrate")?;
    assert_eq!(second.krate, first.krate);
    assert_eq!(builder.fetcher().downloads.get(), 1);
    assert_eq!(builder.decompiler().opened.get(), 4);
    assert_eq!(std::fs::read_to_string(&counter)?.lines().count(), 1);

    let csv_path = out.join("mycrate.csv");
    assert_eq!(unrust::writer::write_crate_csv(Some(&second.krate), &csv_path)?, 3);

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn unreachable_docs_host_writes_empty_dataset() -> anyhow::Result<()> {
    let base = temp_dir("unreachable");
    let outdir = base.join("data");

    let out = Command::new(env!("CARGO_BIN_EXE_unrust"))
        .args([
            "--docs-url",
            "http://127.0.0.1:9",
            "--min-interval-ms",
            "0",
            "--log",
            "error",
            "build-crate-csv",
            "mycrate",
            "--outdir",
        ])
        .arg(&outdir)
        .env("NO_PROXY", "*")
        .env_remove("GHIDRA_INSTALL_DIR")
        .env_remove("HTTP_PROXY")
        .env_remove("http_proxy")
        .env_remove("ALL_PROXY")
        .env_remove("all_proxy")
        .output()?;

    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(std::fs::read(outdir.join("mycrate.csv"))?, b"");

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn help_lists_both_commands() -> anyhow::Result<()> {
    let out = Command::new(env!("CARGO_BIN_EXE_unrust"))
        .arg("--help")
        .output()?;
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("build-crates-dependencies"));
    assert!(stdout.contains("build-crate-csv"));
    Ok(())
}
