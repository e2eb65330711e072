//! Crash-safe file replacement.

use crate::{RegistryError, RegistryResult};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replaces the file at `path` with `bytes`.
///
/// The data is written to a temporary file in the same directory, flushed to disk and then
/// renamed over the target, so a crash leaves either the old contents or the new ones.
/// Missing parent directories are created.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> RegistryResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| RegistryError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| RegistryError::io(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| RegistryError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| RegistryError::io(path, e.error))?;
    Ok(())
}
