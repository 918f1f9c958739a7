//! Filesystem primitives used by the rewrite protocol
//!
//! The [`Storage`] trait is the seam between the rewrite protocol and the
//! filesystem, so the commit path can be exercised with injected failures.

use crate::config::StoreConfig;
use crate::record::Record;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Operations the rewriter needs from the filesystem
pub trait Storage {
    /// Create a new, uniquely named temp file in `dir`
    fn create_temp(&self, dir: &Path) -> io::Result<NamedTempFile>;

    /// Append one record as a single line and flush it
    fn write_line(&self, temp: &mut NamedTempFile, record: &Record) -> io::Result<()>;

    /// Make everything written so far durable
    fn finish(&self, temp: &mut NamedTempFile) -> io::Result<()>;

    /// Atomically move `temp` over `target`. This is the commit point.
    fn rename(&self, temp: NamedTempFile, target: &Path) -> io::Result<()>;

    /// Make the directory entry created by [`Storage::rename`] durable.
    /// Runs after the commit point.
    fn sync_directory(&self, target: &Path) -> io::Result<()>;

    /// Open `path` for reading and appending, without creating it
    fn reopen_for_append(&self, path: &Path) -> io::Result<File>;
}

/// Storage backed by the local filesystem
#[derive(Debug, Clone)]
pub struct FsStorage {
    temp_prefix: String,
    sync: bool,
}

impl FsStorage {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            temp_prefix: config.temp_prefix.clone(),
            sync: config.sync_on_commit,
        }
    }
}

impl Default for FsStorage {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl Storage for FsStorage {
    fn create_temp(&self, dir: &Path) -> io::Result<NamedTempFile> {
        // Hidden name with a random suffix: never listed, never user-nameable
        tempfile::Builder::new()
            .prefix(&self.temp_prefix)
            .suffix(".tmp")
            .tempfile_in(dir)
    }

    fn write_line(&self, temp: &mut NamedTempFile, record: &Record) -> io::Result<()> {
        writeln!(temp, "{record}")?;
        temp.flush()
    }

    fn finish(&self, temp: &mut NamedTempFile) -> io::Result<()> {
        temp.flush()?;
        if self.sync {
            temp.as_file().sync_all()?;
        }
        Ok(())
    }

    fn rename(&self, temp: NamedTempFile, target: &Path) -> io::Result<()> {
        // On failure the PersistError owns the temp file; dropping it deletes it
        temp.persist(target).map(|_| ()).map_err(|err| err.error)
    }

    fn sync_directory(&self, target: &Path) -> io::Result<()> {
        if self.sync {
            sync_parent_directory(target)?;
        }
        Ok(())
    }

    fn reopen_for_append(&self, path: &Path) -> io::Result<File> {
        OpenOptions::new().read(true).append(true).open(path)
    }
}

/// Persist the directory entry created by the rename
fn sync_parent_directory(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            File::open(parent)?.sync_all()?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
