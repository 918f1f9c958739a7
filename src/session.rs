//! Session context: configuration, storage and the currently open file
//!
//! A session owns at most one open data file. Mutations go through the
//! [`Rewriter`], which closes and reopens the handle around the commit.

use crate::compare::{SortDirection, SortKey};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::loader;
use crate::order::{detect_order, DetectedOrder};
use crate::record::Record;
use crate::rewrite::{Committed, Mutation, Rewriter};
use crate::storage::{FsStorage, Storage};
use crate::workspace::Workspace;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The data file a session is working on
#[derive(Debug)]
pub struct OpenFile {
    name: String,
    path: PathBuf,
    handle: File,
}

impl OpenFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Explicit state threaded through every record operation
pub struct Session<S: Storage = FsStorage> {
    workspace: Workspace,
    storage: S,
    open: Option<OpenFile>,
}

impl Session<FsStorage> {
    /// Session on the local filesystem; creates the working folder
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let storage = FsStorage::new(&config);
        Self::with_storage(config, storage)
    }
}

impl<S: Storage> Session<S> {
    pub fn with_storage(config: StoreConfig, storage: S) -> StoreResult<Self> {
        config.validate()?;
        let workspace = Workspace::new(config);
        workspace.ensure_working_folder()?;
        Ok(Self {
            workspace,
            storage,
            open: None,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        self.workspace.config()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn current_file(&self) -> Option<&OpenFile> {
        self.open.as_ref()
    }

    pub fn list_files(&self) -> StoreResult<Vec<String>> {
        self.workspace.list_files()
    }

    pub fn create_file(&self, name: &str) -> StoreResult<String> {
        self.workspace.create_file(name)
    }

    /// Delete a data file, closing it first if it is the open one
    pub fn delete_file(&mut self, name: &str) -> StoreResult<String> {
        let file_name = self.workspace.resolve(name)?;
        if self.open.as_ref().map(OpenFile::name) == Some(file_name.as_str()) {
            self.close_file();
        }
        self.workspace.delete_file(&file_name)
    }

    /// Open an existing data file, replacing any previously open one
    pub fn open_file(&mut self, name: &str) -> StoreResult<&OpenFile> {
        let file_name = self.workspace.resolve(name)?;
        let path = self.workspace.path_of(&file_name);
        let handle = self.storage.reopen_for_append(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                StoreError::file_not_found(&file_name)
            } else {
                StoreError::Io(err)
            }
        })?;

        info!(file = %file_name, "opened data file");
        Ok(&*self.open.insert(OpenFile {
            name: file_name,
            path,
            handle,
        }))
    }

    pub fn close_file(&mut self) {
        if let Some(open) = self.open.take() {
            info!(file = %open.name, "closed data file");
        }
    }

    /// Load the open file's records fresh from disk
    pub fn records(&self) -> StoreResult<Vec<Record>> {
        let open = self.open.as_ref().ok_or(StoreError::NoFileOpen)?;
        loader::load(&open.path, self.config())
    }

    /// Order the open file's records already satisfy, if any
    pub fn detect_order(&self) -> StoreResult<Option<DetectedOrder>> {
        Ok(detect_order(&self.records()?))
    }

    /// Append one record to the end of the open file
    pub fn append_record(&mut self, record: &Record) -> StoreResult<()> {
        let open = self.open.as_mut().ok_or(StoreError::NoFileOpen)?;
        writeln!(open.handle, "{record}")?;
        open.handle.flush()?;
        Ok(())
    }

    /// Remove the record at a 0-based index
    pub fn delete_at(&mut self, index: usize) -> StoreResult<Committed> {
        self.mutate(Mutation::DeleteAt(index))
    }

    /// Replace the record at a 0-based index
    pub fn replace_at(&mut self, index: usize, record: Record) -> StoreResult<Committed> {
        self.mutate(Mutation::ReplaceAt(index, record))
    }

    /// Reorder every record by (key, direction)
    pub fn reorder(&mut self, key: SortKey, direction: SortDirection) -> StoreResult<Committed> {
        self.mutate(Mutation::Reorder { key, direction })
    }

    /// Insert a record where it keeps the file's detected order
    pub fn insert(&mut self, record: Record) -> StoreResult<Committed> {
        self.mutate(Mutation::Insert(record))
    }

    fn mutate(&mut self, mutation: Mutation) -> StoreResult<Committed> {
        let open = self.open.take().ok_or(StoreError::NoFileOpen)?;
        let OpenFile { name, path, handle } = open;

        let rewriter = Rewriter::new(&self.storage, self.workspace.config());
        match rewriter.rewrite(handle, &path, mutation) {
            Ok((handle, committed)) => {
                self.open = Some(OpenFile { name, path, handle });
                Ok(committed)
            }
            Err(err) => {
                if !err.original_intact() {
                    warn!(file = %name, error = %err, "data file was rewritten before the failure");
                }
                match self.storage.reopen_for_append(&path) {
                    Ok(handle) => self.open = Some(OpenFile { name, path, handle }),
                    Err(reopen_err) => {
                        warn!(file = %name, error = %reopen_err, "can't reopen after failed rewrite");
                    }
                }
                Err(err)
            }
        }
    }
}
