//! Error handling for the record store

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error type for record store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("No file was opened")]
    NoFileOpen,

    #[error("Empty file: the operation needs at least one record")]
    EmptyCollection,

    #[error("Records are not sorted by any known order")]
    UnorderedCollection,

    #[error("No such file or directory: {file}")]
    FileNotFound { file: String },

    #[error("File already exists: {file}")]
    FileExists { file: String },

    #[error("Invalid file name '{name}': {reason}")]
    InvalidFileName { name: String, reason: String },

    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },

    #[error("Record position {position} is out of range (file has {len} records)")]
    IndexOutOfRange { position: usize, len: usize },

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Can't create temporary file in {}: {source}", .dir.display())]
    TempFileCreateFailed {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Can't write temporary file {}: {source}", .path.display())]
    TempFileWriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Can't rename temporary file over {}: {source}", .target.display())]
    CommitRenameFailed {
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Can't reopen {}: {source}", .path.display())]
    ReopenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Changes to {} were committed but can't be read back: {source}", .path.display())]
    ReloadFailed {
        path: PathBuf,
        #[source]
        source: Box<StoreError>,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl StoreError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            StoreError::Io(_)
            | StoreError::FileNotFound { .. }
            | StoreError::TempFileCreateFailed { .. }
            | StoreError::TempFileWriteFailed { .. }
            | StoreError::CommitRenameFailed { .. }
            | StoreError::ReopenFailed { .. }
            | StoreError::ReloadFailed { .. } => crate::STORE_FAILURE,

            _ => crate::EXIT_FAILURE,
        }
    }

    /// Whether the on-disk file is guaranteed untouched after this error.
    /// False only for failures past the commit rename.
    pub fn original_intact(&self) -> bool {
        !matches!(
            self,
            StoreError::ReopenFailed { .. } | StoreError::ReloadFailed { .. }
        )
    }

    /// Create a file not found error
    pub fn file_not_found(file: &str) -> Self {
        StoreError::FileNotFound {
            file: file.to_string(),
        }
    }

    /// Create a file exists error
    pub fn file_exists(file: &str) -> Self {
        StoreError::FileExists {
            file: file.to_string(),
        }
    }

    /// Create an invalid file name error
    pub fn invalid_file_name(name: &str, reason: &str) -> Self {
        StoreError::InvalidFileName {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid record error
    pub fn invalid_record(message: &str) -> Self {
        StoreError::InvalidRecord {
            message: message.to_string(),
        }
    }

    /// Create a parse error for a 1-based line number
    pub fn parse_error(line: usize, message: &str) -> Self {
        StoreError::ParseError {
            line,
            message: message.to_string(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: &str) -> Self {
        StoreError::InvalidConfig {
            message: message.to_string(),
        }
    }
}

/// Result type for record store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Context trait for attaching a file name to I/O failures
pub trait StoreContext<T> {
    fn with_context<F>(self, f: F) -> StoreResult<T>
    where
        F: FnOnce() -> String;

    fn with_file_context(self, filename: &str) -> StoreResult<T>;
}

impl<T> StoreContext<T> for Result<T, io::Error> {
    fn with_context<F>(self, f: F) -> StoreResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|io_err| {
            StoreError::Io(io::Error::new(
                io_err.kind(),
                format!("{}: {}", f(), io_err),
            ))
        })
    }

    fn with_file_context(self, filename: &str) -> StoreResult<T> {
        self.map_err(|io_err| match io_err.kind() {
            io::ErrorKind::NotFound => StoreError::file_not_found(filename),
            io::ErrorKind::AlreadyExists => StoreError::file_exists(filename),
            _ => StoreError::Io(io::Error::new(
                io_err.kind(),
                format!("{}: {}", filename, io_err),
            )),
        })
    }
}
