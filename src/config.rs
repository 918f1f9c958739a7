//! Configuration management for the record store

use crate::error::{StoreError, StoreResult};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the default working folder
pub const WORKING_DIR_ENV: &str = "REGIONS_DIR";

/// Default folder holding the data files
pub const DEFAULT_WORKING_DIR: &str = "./files";

/// Main configuration structure for record store operations
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Folder holding every data file
    pub working_dir: PathBuf,
    /// Extension appended to new data files
    pub extension: String,
    /// Prefix of rewrite temp files; must start with '.' to stay out of listings
    pub temp_prefix: String,
    /// Maximum length of a file name without extension
    pub max_file_stem: usize,
    /// Maximum length of a region name in bytes
    pub max_name_len: usize,
    /// Inclusive area bounds
    pub area_min: f64,
    pub area_max: f64,
    /// Inclusive population bounds
    pub population_min: u32,
    pub population_max: u32,
    /// fsync the temp file before the commit rename
    pub sync_on_commit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from(DEFAULT_WORKING_DIR),
            extension: "txt".to_string(),
            temp_prefix: ".regions-".to_string(),
            max_file_stem: 10,
            max_name_len: 20,
            area_min: 0.0,
            area_max: 1e9,
            population_min: 0,
            population_max: 1_000_000_000,
            sync_on_commit: true,
        }
    }
}

impl StoreConfig {
    /// Default configuration with the working folder taken from `REGIONS_DIR` if set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(WORKING_DIR_ENV) {
            if !dir.is_empty() {
                config.working_dir = PathBuf::from(dir);
            }
        }
        config
    }

    /// Set the working folder
    pub fn with_working_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.working_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> StoreResult<()> {
        if self.working_dir.as_os_str().is_empty() {
            return Err(StoreError::invalid_config("working folder is empty"));
        }

        if self.extension.is_empty() || self.extension.contains('.') {
            return Err(StoreError::invalid_config(
                "extension must be non-empty and contain no '.'",
            ));
        }

        // Temp files must never be confused with user-nameable data files
        if !self.temp_prefix.starts_with('.') {
            return Err(StoreError::invalid_config(
                "temp prefix must start with '.'",
            ));
        }

        if self.max_file_stem == 0 || self.max_name_len == 0 {
            return Err(StoreError::invalid_config("length limits must be positive"));
        }

        if !(self.area_min.is_finite() && self.area_max.is_finite())
            || self.area_min > self.area_max
        {
            return Err(StoreError::invalid_config("invalid area bounds"));
        }

        if self.population_min > self.population_max {
            return Err(StoreError::invalid_config("invalid population bounds"));
        }

        Ok(())
    }

    /// File name for a stem, e.g. `south` -> `south.txt`
    pub fn file_name_for(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension)
    }

    /// Full path of a data file inside the working folder
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.working_dir.join(file_name)
    }
}

/// Builder pattern for creating configurations
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Start building from the environment-aware defaults
    pub fn new() -> Self {
        Self {
            config: StoreConfig::from_env(),
        }
    }

    /// Set the working folder
    pub fn working_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.working_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Skip fsync before the commit rename
    pub fn no_sync(mut self) -> Self {
        self.config.sync_on_commit = false;
        self
    }

    /// Set area bounds
    pub fn area_bounds(mut self, min: f64, max: f64) -> Self {
        self.config.area_min = min;
        self.config.area_max = max;
        self
    }

    /// Set population bounds
    pub fn population_bounds(mut self, min: u32, max: u32) -> Self {
        self.config.population_min = min;
        self.config.population_max = max;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> StoreResult<StoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
