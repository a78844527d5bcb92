//! Utility functions for directory management and file output
//!
//! Directories follow the XDG Base Directory specification:
//!
//! - Config: `~/.config/aclopt/` - optional `config.json`
//!
//! # Example
//!
//! ```
//! use aclopt::utils::get_config_dir;
//!
//! if let Some(config_path) = get_config_dir() {
//!     // Look for config.json in config_path
//! }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

pub fn get_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "aclopt", "aclopt")
        .map(|pd| pd.config_dir().to_path_buf())
}

/// Writes `contents` to `path` atomically.
///
/// 1. Writes to a temporary file in the target directory.
/// 2. Flushes it to disk.
/// 3. Renames it over `path`.
///
/// Readers of `path` see either the old file or the complete new one.
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                format!("Disk full: cannot write {}", path.display()),
            )
        } else {
            e.error
        }
    })?;
    Ok(())
}
