// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output artifact helpers. A failed write never leaves a half-written file
// behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use sizewerk_core::error::{Result, SizewerkError};
use tracing::{debug, warn};

use crate::probe::SizeProbe;

/// Write `bytes` to `path`, replacing any previous content. On failure the
/// partial file is removed and `PartialWrite` is returned.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Err(err) = std::fs::write(path, bytes) {
        discard(path);
        return Err(SizewerkError::partial_write(path, err));
    }
    Ok(())
}

/// Replace the existing file at `path` with `bytes`. The new content is
/// written to a sibling temporary file and renamed over `path`, so on failure
/// the original is left whole and the temporary file is removed.
pub fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Copy `source` to `dest` byte for byte and return the size of the copy.
pub fn copy_through(source: &Path, dest: &Path) -> Result<u64> {
    if !SizeProbe::exists(source) {
        return Err(SizewerkError::NotFound(source.to_path_buf()));
    }
    if let Err(err) = std::fs::copy(source, dest) {
        discard(dest);
        return Err(SizewerkError::partial_write(dest, err));
    }
    debug!(from = %source.display(), to = %dest.display(), "Copied artifact through");
    SizeProbe::size_of(dest)
}

/// Remove `path` if it exists. Failures are logged, not returned.
pub fn discard(path: &Path) {
    if path.exists()
        && let Err(err) = std::fs::remove_file(path)
    {
        warn!(path = %path.display(), %err, "Failed to remove partial artifact");
    }
}

/// `<dir>/<prefix>_<uuid>.<ext>` — a fresh name that cannot collide with a
/// concurrent request writing into the same directory.
pub fn unique_sibling(dir: &Path, prefix: &str, ext: &str) -> PathBuf {
    dir.join(format!("{prefix}_{}.{ext}", uuid::Uuid::new_v4()))
}
