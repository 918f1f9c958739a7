//! Working folder and data file management

use crate::config::StoreConfig;
use crate::error::{StoreContext, StoreError, StoreResult};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use tracing::info;

/// Characters never allowed in a file name
pub const INVALID_NAME_CHARS: &str = "\\/:*?\"<>|";

/// Data files living in one working folder
#[derive(Debug, Clone)]
pub struct Workspace {
    config: StoreConfig,
}

impl Workspace {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Create the working folder if it does not exist yet
    pub fn ensure_working_folder(&self) -> StoreResult<()> {
        let dir = &self.config.working_dir;
        if !dir.is_dir() {
            fs::create_dir_all(dir)
                .with_context(|| format!("can't create working folder {}", dir.display()))?;
            info!(dir = %dir.display(), "created working folder");
        }
        Ok(())
    }

    /// Names of the visible files in the working folder, sorted.
    ///
    /// Entries starting with '.' are hidden, which keeps rewrite temp files
    /// out of the listing.
    pub fn list_files(&self) -> StoreResult<Vec<String>> {
        let dir = &self.config.working_dir;
        let entries = fs::read_dir(dir).with_file_context(&dir.display().to_string())?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Check a user-supplied file name (without extension)
    pub fn validate_file_name(&self, stem: &str) -> StoreResult<()> {
        if stem.is_empty() {
            return Err(StoreError::invalid_file_name(stem, "empty name"));
        }
        if stem.chars().count() > self.config.max_file_stem {
            return Err(StoreError::invalid_file_name(
                stem,
                &format!("longer than {} characters", self.config.max_file_stem),
            ));
        }
        if stem.starts_with('.') {
            return Err(StoreError::invalid_file_name(stem, "cannot start with '.'"));
        }
        if let Some((pos, ch)) = stem
            .chars()
            .enumerate()
            .find(|(_, ch)| INVALID_NAME_CHARS.contains(*ch))
        {
            return Err(StoreError::invalid_file_name(
                stem,
                &format!("found '{ch}' at position {}", pos + 1),
            ));
        }
        if stem.ends_with(' ') {
            return Err(StoreError::invalid_file_name(stem, "cannot end with a space"));
        }
        Ok(())
    }

    /// Map `stem` or `stem.ext` to the stored file name, validating the stem
    pub fn resolve(&self, name: &str) -> StoreResult<String> {
        let suffix = format!(".{}", self.config.extension);
        let stem = name.strip_suffix(suffix.as_str()).unwrap_or(name);
        self.validate_file_name(stem)?;
        Ok(self.config.file_name_for(stem))
    }

    /// Full path of a stored file name
    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.config.path_for(file_name)
    }

    /// Create an empty data file; returns its stored file name
    pub fn create_file(&self, name: &str) -> StoreResult<String> {
        let file_name = self.resolve(name)?;
        self.ensure_working_folder()?;
        let path = self.path_of(&file_name);

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .with_file_context(&file_name)?;

        info!(file = %file_name, "created data file");
        Ok(file_name)
    }

    /// Remove a data file; returns its stored file name
    pub fn delete_file(&self, name: &str) -> StoreResult<String> {
        let file_name = self.resolve(name)?;
        let path = self.path_of(&file_name);

        match fs::remove_file(&path) {
            Ok(()) => {
                info!(file = %file_name, "deleted data file");
                Ok(file_name)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::file_not_found(&file_name))
            }
            Err(err) => Err(err).with_file_context(&file_name),
        }
    }
}
