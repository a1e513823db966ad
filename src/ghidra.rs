//! Ghidra headless as a [`Decompiler`].
//!
//! Opening a session imports and auto-analyzes the artifact into a throwaway
//! project and exports its external entry points; each decompile batch reruns
//! the headless analyzer on that project without re-analysis. The project is
//! deleted when the session is dropped.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::decompile::{Decompiler, DecompilerSession, EntryPoint, Symbol};
use crate::error::DecompileError;

const PROJECT_NAME: &str = "unrust";
const EXPORT_SCRIPT: (&str, &str) = (
    "ExportEntryPoints.java",
    include_str!("../scripts/ExportEntryPoints.java"),
);
const DECOMPILE_SCRIPT: (&str, &str) = (
    "DecompileEntryPoints.java",
    include_str!("../scripts/DecompileEntryPoints.java"),
);

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

fn headless_command(program: &Path, args: &[&str]) -> Result<Output, DecompileError> {
    let spawn_err = |e: std::io::Error| DecompileError::Spawn {
        program: program.display().to_string(),
        message: e.to_string(),
    };

    #[cfg(windows)]
    {
        let lower = program.to_string_lossy().to_ascii_lowercase();
        if lower.ends_with(".cmd") || lower.ends_with(".bat") {
            return Command::new("cmd")
                .arg("/C")
                .arg(program)
                .args(args)
                .output()
                .map_err(spawn_err);
        }
    }

    Command::new(program).args(args).output().map_err(spawn_err)
}

fn check_status(output: &Output) -> Result<(), DecompileError> {
    if output.status.success() {
        return Ok(());
    }
    Err(DecompileError::Failed {
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

fn path_arg(path: &Path) -> Result<&str, DecompileError> {
    path.to_str().ok_or_else(|| DecompileError::Output {
        path: path.to_path_buf(),
        message: "path is not valid UTF-8".to_string(),
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DecompileError> {
    let output_err = |message: String| DecompileError::Output {
        path: path.to_path_buf(),
        message,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| output_err(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| output_err(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct Ghidra {
    headless: PathBuf,
    work_root: PathBuf,
}

impl Ghidra {
    pub fn new(headless: PathBuf) -> Self {
        Self {
            headless,
            work_root: std::env::temp_dir(),
        }
    }

    /// Directory under which per-session projects are created.
    pub fn with_work_root(mut self, work_root: PathBuf) -> Self {
        self.work_root = work_root;
        self
    }

    fn session_dir(&self) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.work_root.join(format!(
            "unrust-ghidra-{}-{nanos}-{seq}",
            std::process::id()
        ))
    }
}

#[derive(Debug, Deserialize)]
struct ExportedEntry {
    address: String,
    symbol: Option<Symbol>,
}

#[derive(Debug, Deserialize)]
struct DecompileRecord {
    address: String,
    code: Option<String>,
    error: Option<String>,
}

#[derive(Debug)]
pub struct GhidraSession {
    headless: PathBuf,
    dir: PathBuf,
    program_name: String,
    entries: Vec<EntryPoint>,
    symbols: HashMap<String, Symbol>,
    batches: usize,
}

impl GhidraSession {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn project_dir(&self) -> PathBuf {
        self.dir.join("project")
    }

    fn script_dir(&self) -> PathBuf {
        self.dir.join("scripts")
    }

    fn prepare(&self) -> Result<(), DecompileError> {
        let script_dir = self.script_dir();
        for dir in [self.project_dir(), script_dir.clone()] {
            std::fs::create_dir_all(&dir).map_err(|e| DecompileError::Output {
                path: dir.clone(),
                message: e.to_string(),
            })?;
        }
        for (name, body) in [EXPORT_SCRIPT, DECOMPILE_SCRIPT] {
            let path = script_dir.join(name);
            std::fs::write(&path, body).map_err(|e| DecompileError::Output {
                path,
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    fn import(&mut self, artifact: &Path) -> Result<(), DecompileError> {
        let project_dir = self.project_dir();
        let script_dir = self.script_dir();
        let out = self.dir.join("entry_points.json");

        let output = headless_command(
            &self.headless,
            &[
                path_arg(&project_dir)?,
                PROJECT_NAME,
                "-import",
                path_arg(artifact)?,
                "-overwrite",
                "-scriptPath",
                path_arg(&script_dir)?,
                "-postScript",
                EXPORT_SCRIPT.0,
                path_arg(&out)?,
            ],
        )?;
        check_status(&output)?;

        let exported: Vec<ExportedEntry> = read_json(&out)?;
        for entry in exported {
            if let Some(symbol) = entry.symbol {
                self.symbols.insert(entry.address.clone(), symbol);
            }
            self.entries.push(EntryPoint {
                address: entry.address,
            });
        }
        Ok(())
    }

    fn run_batch(&mut self, entries: &[EntryPoint]) -> Result<HashMap<String, DecompileRecord>, DecompileError> {
        self.batches += 1;
        let request = self.dir.join(format!("decompile_request_{}.json", self.batches));
        let out = self.dir.join(format!("decompile_result_{}.json", self.batches));
        let addresses: Vec<&str> = entries.iter().map(|e| e.address.as_str()).collect();
        let body = serde_json::to_string(&addresses).map_err(|e| DecompileError::Output {
            path: request.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&request, body).map_err(|e| DecompileError::Output {
            path: request.clone(),
            message: e.to_string(),
        })?;

        let project_dir = self.project_dir();
        let script_dir = self.script_dir();
        let output = headless_command(
            &self.headless,
            &[
                path_arg(&project_dir)?,
                PROJECT_NAME,
                "-process",
                &self.program_name,
                "-noanalysis",
                "-scriptPath",
                path_arg(&script_dir)?,
                "-postScript",
                DECOMPILE_SCRIPT.0,
                path_arg(&request)?,
                path_arg(&out)?,
            ],
        )?;
        check_status(&output)?;

        let records: Vec<DecompileRecord> = read_json(&out)?;
        Ok(records
            .into_iter()
            .map(|record| (record.address.clone(), record))
            .collect())
    }
}

impl Drop for GhidraSession {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to remove ghidra project");
        }
    }
}

impl Decompiler for Ghidra {
    type Session = GhidraSession;

    fn open(&self, artifact: &Path) -> Result<GhidraSession, DecompileError> {
        let program_name = artifact
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| DecompileError::Output {
                path: artifact.to_path_buf(),
                message: "artifact has no file name".to_string(),
            })?;

        let mut session = GhidraSession {
            headless: self.headless.clone(),
            dir: self.session_dir(),
            program_name,
            entries: Vec::new(),
            symbols: HashMap::new(),
            batches: 0,
        };
        session.prepare()?;
        session.import(artifact)?;
        tracing::debug!(entry_points = session.entries.len(), "ghidra session ready");
        Ok(session)
    }
}

impl DecompilerSession for GhidraSession {
    fn entry_points(&self) -> Vec<EntryPoint> {
        self.entries.clone()
    }

    fn primary_symbol(&self, entry: &EntryPoint) -> Option<Symbol> {
        self.symbols.get(&entry.address).cloned()
    }

    fn decompile(&mut self, entries: &[EntryPoint]) -> Vec<Result<String, DecompileError>> {
        let mut records = match self.run_batch(entries) {
            Ok(records) => records,
            Err(e) => return entries.iter().map(|_| Err(e.clone())).collect(),
        };

        entries
            .iter()
            .map(|entry| match records.remove(&entry.address) {
                Some(DecompileRecord {
                    code: Some(code), ..
                }) => Ok(code),
                Some(DecompileRecord { error, .. }) => Err(DecompileError::Entry {
                    address: entry.address.clone(),
                    message: error.unwrap_or_else(|| "no output".to_string()),
                }),
                None => Err(DecompileError::Missing {
                    address: entry.address.clone(),
                }),
            })
            .collect()
    }
}
