//! Registry archive download and extraction.
//!
//! Both steps are skipped when their output already exists on disk; nothing
//! here validates checksums or invalidates stale files.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::AcquireError;
use crate::fetch::Fetch;
use crate::models::Crate;
use crate::registry::Endpoints;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn archive_path(krate: &Crate, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}.tar", krate.name))
}

pub fn crate_dir(krate: &Crate, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}-{}", krate.name, krate.version))
}

/// Downloads `krate`'s registry archive to `{out_dir}/{name}.tar` unless present.
pub fn acquire_archive(
    fetcher: &impl Fetch,
    endpoints: &Endpoints,
    krate: &Crate,
    out_dir: &Path,
) -> Result<PathBuf, AcquireError> {
    let path = archive_path(krate, out_dir);
    if path.exists() {
        return Ok(path);
    }

    let bytes = fetcher.fetch_file(&endpoints.download_url(krate))?;
    std::fs::create_dir_all(out_dir).map_err(|source| AcquireError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;
    // Written under a temporary name so an interrupted download never
    // passes the existence check above.
    let partial = path.with_extension("tar.part");
    std::fs::write(&partial, bytes).map_err(|source| AcquireError::Io {
        path: partial.clone(),
        source,
    })?;
    std::fs::rename(&partial, &path).map_err(|source| AcquireError::Io {
        path: path.clone(),
        source,
    })?;
    tracing::info!(path = %path.display(), "archive written");
    Ok(path)
}

/// Extracts `archive` into `out_dir` unless `{out_dir}/{name}-{version}` exists.
pub fn unpack(krate: &Crate, archive: &Path, out_dir: &Path) -> Result<PathBuf, AcquireError> {
    let dir = crate_dir(krate, out_dir);
    if dir.exists() {
        return Ok(dir);
    }

    let io_err = |source| AcquireError::Io {
        path: archive.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(archive).map_err(io_err)?);
    let mut magic = [0u8; 2];
    let compressed = match reader.read_exact(&mut magic) {
        Ok(()) => magic == GZIP_MAGIC,
        Err(source) => return Err(io_err(source)),
    };

    let reader = BufReader::new(File::open(archive).map_err(io_err)?);
    let stream: Box<dyn Read> = if compressed {
        Box::new(GzDecoder::new(reader))
    } else {
        Box::new(reader)
    };
    tar::Archive::new(stream).unpack(out_dir).map_err(io_err)?;

    tracing::info!(archive = %archive.display(), dir = %dir.display(), "archive extracted");
    Ok(dir)
}
