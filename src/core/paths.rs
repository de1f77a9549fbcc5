// src/core/paths.rs

use crate::constants::{APP_DIR_NAME, GLOBAL_STORE_FILENAME, PROJECT_STORE_FILENAME};
use lazy_static::lazy_static;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

lazy_static! {
    static ref VSS_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find the system config directory.")]
    ConfigDirNotFound,
    #[error("Could not find the system cache directory.")]
    CacheDirNotFound,
    #[error("Could not create directory at '{path}': {source}")]
    DirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not expand path '{path}': {reason}")]
    Expansion { path: String, reason: String },
    #[error("'{0}' does not exist.")]
    NotFound(String),
    #[error("'{0}' is not a directory.")]
    NotADirectory(String),
    #[error("Could not resolve '{path}': {source}")]
    Canonicalize {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn ensure_dir(path: &Path) -> Result<(), PathError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| PathError::DirCreation {
            path: path.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Returns the path to the vss configuration directory (`~/.config/vss`).
/// Creates it if it doesn't exist.
///
/// Memoized: the first call computes and caches the path.
pub fn get_vss_config_dir() -> Result<PathBuf, PathError> {
    // A poisoned lock still holds a usable path.
    let mut cached = VSS_CONFIG_DIR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(path) = &*cached {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(APP_DIR_NAME);
    ensure_dir(&config_path)?;

    *cached = Some(config_path.clone());
    Ok(config_path)
}

/// Returns the path to the global `global.json` store.
pub fn get_global_store_path() -> Result<PathBuf, PathError> {
    get_vss_config_dir().map(|dir| dir.join(GLOBAL_STORE_FILENAME))
}

/// Returns the path to the per-project store inside `cwd`.
pub fn get_project_store_path(cwd: &Path) -> PathBuf {
    cwd.join(PROJECT_STORE_FILENAME)
}

/// Returns the cache directory (`~/.cache/vss` on Linux), creating it if needed.
pub fn get_vss_cache_dir() -> Result<PathBuf, PathError> {
    let base = match dirs::cache_dir() {
        Some(dir) => dir,
        None => dirs::home_dir()
            .ok_or(PathError::CacheDirNotFound)?
            .join(".cache"),
    };
    let cache_path = base.join(APP_DIR_NAME);
    ensure_dir(&cache_path)?;
    Ok(cache_path)
}

/// Expands `~` and environment variables in a user-entered value.
pub fn expand_user_path(raw: &str) -> Result<String, PathError> {
    shellexpand::full(raw.trim())
        .map(|expanded| expanded.into_owned())
        .map_err(|e| PathError::Expansion {
            path: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Expands and canonicalizes a directory, failing if it is missing or not a directory.
pub fn resolve_existing_dir(raw: &str) -> Result<PathBuf, PathError> {
    let expanded = PathBuf::from(expand_user_path(raw)?);
    if !expanded.exists() {
        return Err(PathError::NotFound(expanded.display().to_string()));
    }
    if !expanded.is_dir() {
        return Err(PathError::NotADirectory(expanded.display().to_string()));
    }
    dunce::canonicalize(&expanded).map_err(|e| PathError::Canonicalize {
        path: expanded.display().to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_existing_dir() {
        let dir = tempdir().unwrap();
        let resolved = resolve_existing_dir(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(resolved, dunce::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn test_resolve_rejects_missing_and_files() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            resolve_existing_dir(missing.to_str().unwrap()),
            Err(PathError::NotFound(_))
        ));

        let file = dir.path().join("file.sh");
        fs::write(&file, "").unwrap();
        assert!(matches!(
            resolve_existing_dir(file.to_str().unwrap()),
            Err(PathError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_expands_home() {
        let home = dirs::home_dir().unwrap();
        let expanded = expand_user_path("~/projects").unwrap();
        assert_eq!(PathBuf::from(expanded), home.join("projects"));
    }

    #[test]
    fn test_project_store_lives_in_cwd() {
        let path = get_project_store_path(Path::new("/work"));
        assert_eq!(path, PathBuf::from("/work/.vss-app.json"));
    }
}
