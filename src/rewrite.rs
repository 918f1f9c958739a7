//! Transactional rewrite of a data file
//!
//! Every mutating operation (delete, edit, sort, insert) follows the same
//! protocol:
//!
//! 1. load the current records from the target file
//! 2. compute the new sequence in memory
//! 3. write it to a fresh temp file in the same directory, flushing each line
//! 4. close the original handle and the temp file
//! 5. rename the temp file over the target (the commit point)
//! 6. reopen the target for append
//!
//! Before step 5 the target is untouched; after it the new content is fully
//! in place. The temp file is removed on every failure path. Failures after
//! step 5 surface as [`StoreError::ReopenFailed`] or
//! [`StoreError::ReloadFailed`], never as a failed commit.

use crate::compare::{SortDirection, SortKey};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::loader;
use crate::order::{detect_order, locate_insertion, DetectedOrder};
use crate::record::Record;
use crate::sort::sort_records;
use crate::storage::Storage;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// A change to apply to a record collection
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Remove the record at a 0-based index
    DeleteAt(usize),
    /// Replace the record at a 0-based index
    ReplaceAt(usize, Record),
    /// Reorder every record
    Reorder {
        key: SortKey,
        direction: SortDirection,
    },
    /// Insert a record where it keeps the detected order
    Insert(Record),
}

/// What a committed mutation did
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Deleted {
        index: usize,
        record: Record,
    },
    Replaced {
        index: usize,
        previous: Record,
        current: Record,
    },
    Reordered {
        key: SortKey,
        direction: SortDirection,
    },
    Inserted {
        index: usize,
        record: Record,
        order: DetectedOrder,
    },
}

/// Result of a successful rewrite
#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    /// Records as reloaded from the file after the commit
    pub records: Vec<Record>,
    pub change: Change,
}

/// Compute the new sequence for `mutation` without touching storage.
///
/// Every mutation needs at least one record. Inserting additionally needs the
/// records to satisfy one of the detectable orderings.
pub fn apply(mut records: Vec<Record>, mutation: Mutation) -> StoreResult<(Vec<Record>, Change)> {
    if records.is_empty() {
        return Err(StoreError::EmptyCollection);
    }
    let len = records.len();

    let change = match mutation {
        Mutation::DeleteAt(index) => {
            check_index(index, len)?;
            let record = records.remove(index);
            Change::Deleted { index, record }
        }
        Mutation::ReplaceAt(index, current) => {
            check_index(index, len)?;
            let previous = std::mem::replace(&mut records[index], current.clone());
            Change::Replaced {
                index,
                previous,
                current,
            }
        }
        Mutation::Reorder { key, direction } => {
            sort_records(&mut records, key, direction);
            Change::Reordered { key, direction }
        }
        Mutation::Insert(record) => {
            let order = detect_order(&records).ok_or(StoreError::UnorderedCollection)?;
            let index = locate_insertion(&records, &record, order.key, order.direction);
            records.insert(index, record.clone());
            Change::Inserted {
                index,
                record,
                order,
            }
        }
    };

    Ok((records, change))
}

fn check_index(index: usize, len: usize) -> StoreResult<()> {
    if index >= len {
        return Err(StoreError::IndexOutOfRange {
            position: index + 1,
            len,
        });
    }
    Ok(())
}

/// Runs the write-new/rename-over protocol against a [`Storage`]
pub struct Rewriter<'a, S: Storage> {
    storage: &'a S,
    config: &'a StoreConfig,
}

impl<'a, S: Storage> Rewriter<'a, S> {
    /// `config` supplies the record limits used when loading `target`
    pub fn new(storage: &'a S, config: &'a StoreConfig) -> Self {
        Self { storage, config }
    }

    /// Load `target`, apply `mutation`, and commit the result.
    ///
    /// `original` is the caller's open handle on `target`; it is closed before
    /// the commit rename. On success the reopened handle is returned together
    /// with the records reloaded from disk.
    pub fn rewrite(
        &self,
        original: File,
        target: &Path,
        mutation: Mutation,
    ) -> StoreResult<(File, Committed)> {
        let current = loader::load(target, self.config)?;
        debug!(file = %target.display(), records = current.len(), ?mutation, "rewrite start");

        let (next, change) = apply(current, mutation)?;
        let handle = self.commit(original, target, &next)?;

        let records =
            loader::load(target, self.config).map_err(|source| StoreError::ReloadFailed {
                path: target.to_path_buf(),
                source: Box::new(source),
            })?;
        info!(file = %target.display(), records = records.len(), ?change, "rewrite committed");
        Ok((handle, Committed { records, change }))
    }

    /// Durably replace the content of `target` with `records`
    pub fn commit(&self, original: File, target: &Path, records: &[Record]) -> StoreResult<File> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = self
            .storage
            .create_temp(dir)
            .map_err(|source| StoreError::TempFileCreateFailed {
                dir: dir.to_path_buf(),
                source,
            })?;
        let temp_path = temp.path().to_path_buf();
        debug!(temp = %temp_path.display(), "temp file created");

        // An error here drops `temp`, which deletes it
        let written: io::Result<()> = records
            .iter()
            .try_for_each(|record| self.storage.write_line(&mut temp, record))
            .and_then(|()| self.storage.finish(&mut temp));
        if let Err(source) = written {
            return Err(StoreError::TempFileWriteFailed {
                path: temp_path,
                source,
            });
        }

        drop(original);

        if let Err(source) = self.storage.rename(temp, target) {
            remove_orphan(&temp_path);
            return Err(StoreError::CommitRenameFailed {
                target: target.to_path_buf(),
                source,
            });
        }
        debug!(file = %target.display(), records = records.len(), "commit rename done");

        // The new content is in place; only durability of the rename is in doubt
        if let Err(err) = self.storage.sync_directory(target) {
            warn!(file = %target.display(), error = %err, "directory sync failed after commit");
        }

        self.storage
            .reopen_for_append(target)
            .map_err(|source| StoreError::ReopenFailed {
                path: target.to_path_buf(),
                source,
            })
    }
}

fn remove_orphan(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(temp = %path.display(), "removed orphaned temp file"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(temp = %path.display(), error = %err, "can't remove temp file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FsStorage;
    use std::fs::OpenOptions;
    use tempfile::{NamedTempFile, TempDir};

    fn rec(name: &str, area: f64, population: u32) -> Record {
        Record::new(name, area, population).expect("valid test record")
    }

    fn write_file(path: &Path, records: &[Record]) -> io::Result<()> {
        let text: String = records.iter().map(|r| format!("{r}\n")).collect();
        fs::write(path, text)
    }

    fn open(path: &Path) -> io::Result<File> {
        OpenOptions::new().read(true).append(true).open(path)
    }

    fn load(path: &Path) -> StoreResult<Vec<Record>> {
        loader::load(path, &StoreConfig::default())
    }

    fn rewrite<S: Storage>(
        storage: &S,
        path: &Path,
        mutation: Mutation,
    ) -> StoreResult<(File, Committed)> {
        let config = StoreConfig::default();
        Rewriter::new(storage, &config).rewrite(open(path)?, path, mutation)
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Step of the protocol a [`FaultyStorage`] fails at
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Fault {
        Create,
        Write,
        Finish,
        Rename,
        DirSync,
        Reopen,
        /// Overwrites the target with garbage right after the rename
        Corrupt,
    }

    /// Filesystem storage with one injected failure
    struct FaultyStorage {
        inner: FsStorage,
        fault: Fault,
    }

    impl FaultyStorage {
        fn new(fault: Fault) -> Self {
            Self {
                inner: FsStorage::default(),
                fault,
            }
        }

        fn check(&self, step: Fault) -> io::Result<()> {
            if self.fault == step {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("injected {step:?} failure"),
                ));
            }
            Ok(())
        }
    }

    impl Storage for FaultyStorage {
        fn create_temp(&self, dir: &Path) -> io::Result<NamedTempFile> {
            self.check(Fault::Create)?;
            self.inner.create_temp(dir)
        }
        fn write_line(&self, temp: &mut NamedTempFile, record: &Record) -> io::Result<()> {
            // Fail after the line hits the temp file so there is something to clean up
            self.inner.write_line(temp, record)?;
            self.check(Fault::Write)
        }
        fn finish(&self, temp: &mut NamedTempFile) -> io::Result<()> {
            self.check(Fault::Finish)?;
            self.inner.finish(temp)
        }
        fn rename(&self, temp: NamedTempFile, target: &Path) -> io::Result<()> {
            if self.fault == Fault::Rename {
                // Leak the temp file on disk to check the rewriter cleans it up
                temp.keep().map_err(|err| err.error)?;
                return self.check(Fault::Rename);
            }
            self.inner.rename(temp, target)
        }
        fn sync_directory(&self, target: &Path) -> io::Result<()> {
            if self.fault == Fault::Corrupt {
                fs::write(target, "broken\n")?;
            }
            self.check(Fault::DirSync)?;
            self.inner.sync_directory(target)
        }
        fn reopen_for_append(&self, path: &Path) -> io::Result<File> {
            self.check(Fault::Reopen)?;
            self.inner.reopen_for_append(path)
        }
    }

    #[test]
    fn test_apply_delete_and_replace() -> StoreResult<()> {
        let records = vec![rec("a", 1.0, 1), rec("b", 2.0, 2), rec("c", 3.0, 3)];

        let (next, change) = apply(records.clone(), Mutation::DeleteAt(0))?;
        assert_eq!(next, vec![rec("b", 2.0, 2), rec("c", 3.0, 3)]);
        assert_eq!(
            change,
            Change::Deleted {
                index: 0,
                record: rec("a", 1.0, 1)
            }
        );

        let (next, change) = apply(records, Mutation::ReplaceAt(1, rec("z", 9.0, 9)))?;
        assert_eq!(next[1], rec("z", 9.0, 9));
        assert_eq!(next.len(), 3);
        assert!(matches!(change, Change::Replaced { index: 1, .. }));
        Ok(())
    }

    #[test]
    fn test_apply_rejects_empty_and_out_of_range() {
        assert!(matches!(
            apply(Vec::new(), Mutation::DeleteAt(0)),
            Err(StoreError::EmptyCollection)
        ));
        assert!(matches!(
            apply(Vec::new(), Mutation::Insert(rec("a", 1.0, 1))),
            Err(StoreError::EmptyCollection)
        ));
        assert!(matches!(
            apply(vec![rec("a", 1.0, 1)], Mutation::DeleteAt(1)),
            Err(StoreError::IndexOutOfRange {
                position: 2,
                len: 1
            })
        ));
    }

    #[test]
    fn test_apply_insert_needs_order() -> StoreResult<()> {
        let unordered = vec![rec("b", 2.0, 2), rec("a", 3.0, 1), rec("c", 1.0, 3)];
        assert!(matches!(
            apply(unordered, Mutation::Insert(rec("d", 1.0, 1))),
            Err(StoreError::UnorderedCollection)
        ));

        // Names and areas unordered, population ascending
        let by_population = vec![rec("b", 2.0, 5), rec("a", 3.0, 50), rec("c", 1.0, 100)];
        let (next, change) = apply(by_population, Mutation::Insert(rec("m", 1.0, 60)))?;
        match change {
            Change::Inserted { index, order, .. } => {
                assert_eq!(order.key, SortKey::Population);
                assert_eq!(order.direction, SortDirection::Ascending);
                assert_eq!(index, 2);
            }
            other => panic!("unexpected change: {other:?}"),
        }
        let populations: Vec<u32> = next.iter().map(Record::population).collect();
        assert_eq!(populations, vec![5, 50, 60, 100]);
        Ok(())
    }

    #[test]
    fn test_rewrite_delete_first_record() -> StoreResult<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("regions.txt");
        write_file(
            &path,
            &[rec("a", 1.0, 1), rec("b", 2.0, 2), rec("c", 3.0, 3)],
        )?;

        let (_handle, committed) = rewrite(&FsStorage::default(), &path, Mutation::DeleteAt(0))?;

        assert_eq!(committed.records, vec![rec("b", 2.0, 2), rec("c", 3.0, 3)]);
        assert_eq!(load(&path)?, committed.records);
        assert_eq!(dir_entries(temp_dir.path()), vec!["regions.txt"]);
        Ok(())
    }

    #[test]
    fn test_rewrite_reorder_by_area() -> StoreResult<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("regions.txt");
        write_file(&path, &[rec("Alpha", 10.0, 5), rec("Beta", 2.0, 100)])?;

        let mutation = Mutation::Reorder {
            key: SortKey::Area,
            direction: SortDirection::Ascending,
        };
        let (_handle, committed) = rewrite(&FsStorage::default(), &path, mutation)?;

        assert_eq!(
            committed.records,
            vec![rec("Beta", 2.0, 100), rec("Alpha", 10.0, 5)]
        );
        Ok(())
    }

    #[test]
    fn test_rewrite_honours_configured_limits() -> StoreResult<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("regions.txt");
        let wide = StoreConfig {
            area_max: 1e12,
            ..StoreConfig::default()
        };
        let big = Record::with_limits("Big", 5e9, 1, &wide)?;
        write_file(&path, &[big.clone(), rec("a", 1.0, 2)])?;

        let storage = FsStorage::default();
        let mutation = Mutation::Reorder {
            key: SortKey::Area,
            direction: SortDirection::Ascending,
        };
        let (_handle, committed) =
            Rewriter::new(&storage, &wide).rewrite(open(&path)?, &path, mutation)?;

        assert_eq!(committed.records, vec![rec("a", 1.0, 2), big]);
        Ok(())
    }

    #[test]
    fn test_reopened_handle_appends() -> StoreResult<()> {
        use std::io::Write;

        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("regions.txt");
        write_file(&path, &[rec("a", 1.0, 1), rec("b", 2.0, 2)])?;

        let (mut handle, _) = rewrite(&FsStorage::default(), &path, Mutation::DeleteAt(1))?;
        writeln!(handle, "{}", rec("c", 3.0, 3))?;
        handle.flush()?;

        assert_eq!(load(&path)?, vec![rec("a", 1.0, 1), rec("c", 3.0, 3)]);
        Ok(())
    }

    #[test]
    fn test_failed_rename_leaves_original_intact() -> StoreResult<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("regions.txt");
        let original = vec![rec("a", 1.0, 1), rec("b", 2.0, 2), rec("c", 3.0, 3)];
        write_file(&path, &original)?;
        let before = fs::read(&path)?;

        let result = rewrite(&FaultyStorage::new(Fault::Rename), &path, Mutation::DeleteAt(0));

        match result {
            Err(err @ StoreError::CommitRenameFailed { .. }) => assert!(err.original_intact()),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(fs::read(&path)?, before);
        assert_eq!(load(&path)?, original);
        assert_eq!(dir_entries(temp_dir.path()), vec!["regions.txt"]);
        Ok(())
    }

    #[test]
    fn test_failed_temp_create_aborts() -> StoreResult<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("regions.txt");
        let original = vec![rec("b", 2.0, 2), rec("a", 1.0, 1)];
        write_file(&path, &original)?;

        let mutation = Mutation::Reorder {
            key: SortKey::Name,
            direction: SortDirection::Ascending,
        };
        let result = rewrite(&FaultyStorage::new(Fault::Create), &path, mutation);

        assert!(matches!(result, Err(StoreError::TempFileCreateFailed { .. })));
        assert_eq!(load(&path)?, original);
        Ok(())
    }

    #[test]
    fn test_failed_temp_write_removes_temp() -> StoreResult<()> {
        for fault in [Fault::Write, Fault::Finish] {
            let temp_dir = TempDir::new()?;
            let path = temp_dir.path().join("regions.txt");
            write_file(&path, &[rec("a", 1.0, 1), rec("b", 2.0, 2)])?;
            let before = fs::read(&path)?;

            let result = rewrite(&FaultyStorage::new(fault), &path, Mutation::DeleteAt(1));

            match result {
                Err(err @ StoreError::TempFileWriteFailed { .. }) => {
                    assert!(err.original_intact())
                }
                other => panic!("{fault:?}: unexpected {other:?}"),
            }
            assert_eq!(fs::read(&path)?, before, "{fault:?}");
            assert_eq!(dir_entries(temp_dir.path()), vec!["regions.txt"], "{fault:?}");
        }
        Ok(())
    }

    #[test]
    fn test_failed_reopen_reports_committed_change() -> StoreResult<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("regions.txt");
        write_file(&path, &[rec("a", 1.0, 1), rec("b", 2.0, 2)])?;

        let result = rewrite(&FaultyStorage::new(Fault::Reopen), &path, Mutation::DeleteAt(0));

        match result {
            Err(err @ StoreError::ReopenFailed { .. }) => {
                assert!(!err.original_intact());
                assert_eq!(err.exit_code(), crate::STORE_FAILURE);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(load(&path)?, vec![rec("b", 2.0, 2)]);
        assert_eq!(dir_entries(temp_dir.path()), vec!["regions.txt"]);
        Ok(())
    }

    #[test]
    fn test_directory_sync_failure_keeps_commit() -> StoreResult<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("regions.txt");
        write_file(&path, &[rec("a", 1.0, 1), rec("b", 2.0, 2)])?;

        let (_handle, committed) =
            rewrite(&FaultyStorage::new(Fault::DirSync), &path, Mutation::DeleteAt(0))?;

        assert_eq!(committed.records, vec![rec("b", 2.0, 2)]);
        assert_eq!(load(&path)?, committed.records);
        Ok(())
    }

    #[test]
    fn test_unreadable_after_commit_is_not_a_failed_commit() -> StoreResult<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("regions.txt");
        write_file(&path, &[rec("a", 1.0, 1), rec("b", 2.0, 2)])?;

        let result = rewrite(&FaultyStorage::new(Fault::Corrupt), &path, Mutation::DeleteAt(0));

        match result {
            Err(err @ StoreError::ReloadFailed { .. }) => {
                assert!(!err.original_intact());
                assert_eq!(err.exit_code(), crate::STORE_FAILURE);
            }
            other => panic!("unexpected: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_logical_failure_writes_nothing() -> StoreResult<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("regions.txt");
        fs::write(&path, "")?;

        let result = rewrite(&FsStorage::default(), &path, Mutation::DeleteAt(0));
        assert!(matches!(result, Err(StoreError::EmptyCollection)));
        assert_eq!(dir_entries(temp_dir.path()), vec!["regions.txt"]);
        Ok(())
    }
}
