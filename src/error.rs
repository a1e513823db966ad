//! Error taxonomy for the dataset pipeline.
//!
//! Errors are split by the granularity at which they are handled:
//! [`FunctionError`] skips a single function, [`CrateError`] aborts one
//! crate's dataset, and [`DecompileError`] only ever drops one entry point.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitStatus;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing {0} in documentation page")]
    MissingNode(&'static str),
    #[error("invalid line range fragment in source locator {0:?}")]
    InvalidFragment(String),
    #[error("source range {lower}-{upper} selects no line")]
    EmptySourceRange { lower: usize, upper: usize },
    #[error("source line {line} does not start with its line number")]
    LineNumberMismatch { line: usize },
    #[error("malformed registry listing")]
    Listing(#[source] serde_json::Error),
    #[error("invalid locator {locator:?}: {message}")]
    InvalidLocator { locator: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("io error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to rewrite build manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },
    #[error("failed to execute build tool {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("build of {} failed ({status}): {stderr}", crate_dir.display())]
    Failed {
        crate_dir: PathBuf,
        status: ExitStatus,
        stderr: String,
    },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DecompileError {
    #[error("failed to execute decompiler {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("decompiler exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("unreadable decompiler output {}: {message}", path.display())]
    Output { path: PathBuf, message: String },
    #[error("decompilation of {address} failed: {message}")]
    Entry { address: String, message: String },
    #[error("decompiler returned no result for {address}")]
    Missing { address: String },
}

/// Reasons a single function is left out of a crate's dataset.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Acquire(AcquireError),
    #[error("could not open decompiler session")]
    Session(#[source] DecompileError),
    /// Never reported as a skip; the orchestrator escalates it to [`CrateError::Build`].
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Reasons a whole crate's dataset is abandoned.
#[derive(Debug, thiserror::Error)]
pub enum CrateError {
    #[error("failed to fetch documentation root for {name}")]
    Fetch {
        name: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to parse documentation root for {name}")]
    Parse {
        name: String,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Build(#[from] BuildError),
}

impl From<AcquireError> for FunctionError {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::Fetch(fetch) => FunctionError::Fetch(fetch),
            other => FunctionError::Acquire(other),
        }
    }
}

/// Renders `err` followed by each of its sources, separated by `: `.
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
