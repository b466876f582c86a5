use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// How the duplicate router compares a new hash against the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Only identical 64-bit hashes count as duplicates
    ExactMatch,

    /// Hashes within the given Hamming distance count as duplicates
    DistanceThreshold(u32),
}

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Configuration for one ingest run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the files to ingest
    pub source_dir: PathBuf,

    /// Organized tree that receives renamed files
    pub target_dir: PathBuf,

    /// Where duplicates are moved instead of being deleted
    pub recycle_dir: PathBuf,

    /// Path to the catalog database (defaults to `<target_dir>/catalog.db`)
    pub database_path: Option<PathBuf>,

    /// Number of decode/hash workers
    pub hasher_threads: usize,

    /// Number of metadata extraction workers
    pub analyzer_threads: usize,

    /// Capacity of every queue between two stages
    pub queue_capacity: usize,

    /// Number of moved items written to the catalog per transaction
    pub registration_batch_size: usize,

    /// Highest numeric suffix tried before a move is abandoned
    pub max_collision_probes: u32,

    /// Duplicate comparison mode
    pub duplicate_policy: DuplicatePolicy,

    /// Also treat hashes accepted earlier in the same run as duplicates
    pub detect_run_duplicates: bool,

    /// Draw terminal progress bars
    pub show_progress: bool,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("import"),
            target_dir: PathBuf::from("processed"),
            recycle_dir: PathBuf::from("duplicates"),
            database_path: None,
            hasher_threads: 8,
            analyzer_threads: 10,
            queue_capacity: 256,
            registration_batch_size: 100,
            max_collision_probes: 999,
            duplicate_policy: DuplicatePolicy::ExactMatch,
            detect_run_duplicates: false,
            show_progress: true,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Build a configuration for the three roots, everything else default
    pub fn new(
        source_dir: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
        recycle_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            recycle_dir: recycle_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Catalog location, falling back to a file inside the target tree
    pub fn catalog_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.target_dir.join("catalog.db"))
    }

    /// Check only the organized tree, for catalog-only commands
    pub fn validate_target(&self) -> Result<()> {
        require_dir("Target", &self.target_dir)
    }

    /// Check the organized tree and the recycle bin, for commands that move
    /// files out of the library
    pub fn validate_library(&self) -> Result<()> {
        require_dir("Target", &self.target_dir)?;
        require_dir("Recycle", &self.recycle_dir)?;
        reject_nested(&[("Target", &self.target_dir), ("Recycle", &self.recycle_dir)])
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        require_dir("Source", &self.source_dir)?;
        require_dir("Target", &self.target_dir)?;
        require_dir("Recycle", &self.recycle_dir)?;
        reject_nested(&[
            ("Source", &self.source_dir),
            ("Target", &self.target_dir),
            ("Recycle", &self.recycle_dir),
        ])?;

        if self.hasher_threads == 0 || self.analyzer_threads == 0 {
            return Err(Error::Configuration(
                "Worker counts must be at least 1".to_string(),
            ));
        }

        if self.queue_capacity == 0 || self.registration_batch_size == 0 {
            return Err(Error::Configuration(
                "Queue capacity and batch size must be at least 1".to_string(),
            ));
        }

        if self.max_collision_probes == 0 {
            return Err(Error::Configuration(
                "At least one collision probe is required".to_string(),
            ));
        }

        Ok(())
    }
}

fn require_dir(name: &str, dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "{} directory does not exist: {}",
            name,
            dir.display()
        )))
    }
}

/// No root may equal or contain another once symlinks are resolved
fn reject_nested(roots: &[(&str, &PathBuf)]) -> Result<()> {
    let mut resolved = Vec::with_capacity(roots.len());
    for (name, dir) in roots {
        resolved.push((*name, std::fs::canonicalize(dir)?));
    }

    for (i, (name, dir)) in resolved.iter().enumerate() {
        for (other_name, other) in &resolved[i + 1..] {
            if dir.starts_with(other) || other.starts_with(dir) {
                return Err(Error::Configuration(format!(
                    "{} directory {} and {} directory {} must not overlap",
                    name,
                    dir.display(),
                    other_name,
                    other.display()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn roots() -> (tempfile::TempDir, Config) {
        let dir = tempdir().unwrap();
        for name in ["in", "out", "bin"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let config = Config::new(
            dir.path().join("in"),
            dir.path().join("out"),
            dir.path().join("bin"),
        );
        (dir, config)
    }

    #[test]
    fn test_valid_roots_pass() {
        let (_dir, config) = roots();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_root_is_configuration_error() {
        let (dir, mut config) = roots();
        config.recycle_dir = dir.path().join("missing");

        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_recycle_inside_target_rejected() {
        let (dir, mut config) = roots();
        let nested = dir.path().join("out").join("bin");
        fs::create_dir(&nested).unwrap();
        config.recycle_dir = nested;

        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_target_inside_source_rejected() {
        let (dir, mut config) = roots();
        let nested = dir.path().join("in").join("library");
        fs::create_dir(&nested).unwrap();
        config.target_dir = nested;

        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_source_inside_target_rejected() {
        let (dir, mut config) = roots();
        let nested = dir.path().join("out").join("incoming");
        fs::create_dir(&nested).unwrap();
        config.source_dir = nested;

        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_same_directory_twice_rejected() {
        let (dir, mut config) = roots();
        config.recycle_dir = dir.path().join("in");

        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_library_check_ignores_source() {
        let (dir, mut config) = roots();
        config.source_dir = dir.path().join("missing");

        assert!(config.validate_library().is_ok());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let (_dir, mut config) = roots();
        config.hasher_threads = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_catalog_path_defaults_into_target() {
        let config = Config::new("a", "b", "c");
        assert_eq!(config.catalog_path(), PathBuf::from("b").join("catalog.db"));
    }

    #[test]
    fn test_round_trip_through_file() {
        let (dir, mut config) = roots();
        config.duplicate_policy = DuplicatePolicy::DistanceThreshold(4);
        let path = dir.path().join("ingest.json");

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();

        assert_eq!(loaded.duplicate_policy, DuplicatePolicy::DistanceThreshold(4));
        assert_eq!(loaded.target_dir, config.target_dir);
    }
}
