// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Size probe — stats artifacts on disk.

use std::path::Path;

use sizewerk_core::error::{Result, SizewerkError};

/// Measures artifact sizes.
///
/// Every call re-stats the file; the iterative searches overwrite their output
/// in place and rely on seeing the current on-disk size each time.
pub struct SizeProbe;

impl SizeProbe {
    /// Byte size of the regular file at `path`.
    pub fn size_of(path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Err(SizewerkError::InvalidInput(format!(
                "{} is not a regular file",
                path.display()
            ))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(SizewerkError::NotFound(path.to_path_buf()))
            }
            Err(err) => Err(SizewerkError::Io(err)),
        }
    }

    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_current_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, vec![0u8; 100]).unwrap();
        assert_eq!(SizeProbe::size_of(&path).unwrap(), 100);

        // Overwritten in place: the probe must not serve a stale value.
        std::fs::write(&path, vec![0u8; 7]).unwrap();
        assert_eq!(SizeProbe::size_of(&path).unwrap(), 7);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SizeProbe::size_of(dir.path().join("gone.pdf")).unwrap_err();
        assert!(matches!(err, SizewerkError::NotFound(_)));
    }

    #[test]
    fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SizeProbe::size_of(dir.path()).is_err());
        assert!(!SizeProbe::exists(dir.path()));
    }
}
