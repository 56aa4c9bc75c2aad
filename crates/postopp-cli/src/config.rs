//! Database location

use directories::ProjectDirs;
use std::path::PathBuf;

/// Journal file name inside the data directory
pub const DB_FILE_NAME: &str = "postopp.db";

/// Default journal path: the platform local data dir, or the working directory
pub fn default_db_path() -> PathBuf {
    ProjectDirs::from("com", "PostOpp", "PostOpp")
        .map(|dirs| dirs.data_local_dir().join(DB_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DB_FILE_NAME))
}

/// Explicit `--db` value, falling back to [`default_db_path`]
pub fn resolve_db_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(default_db_path)
}
