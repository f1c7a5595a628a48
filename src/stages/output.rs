//! Writing stage results under a destination directory.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Write `bytes` to `dest_root/rel`, creating parent directories as needed.
///
/// `rel` must be a plain relative path; anything that would escape
/// `dest_root` is rejected. An existing file is overwritten.
pub fn write_output(dest_root: &Path, rel: &Path, bytes: &[u8]) -> io::Result<PathBuf> {
    if rel.as_os_str().is_empty()
        || rel.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("output path '{}' escapes the destination", rel.display()),
        ));
    }

    let path = dest_root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, bytes)?;
    Ok(path)
}
