// src/core/store.rs

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Could not read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{path}' is not valid: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Could not write '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not serialize '{path}': {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The journaled content of a store.
#[derive(Debug)]
enum StoreState<T> {
    /// No mutable access has been handed out since the last load or flush.
    Pristine(T),
    /// Mutable access was requested; `original` is the on-disk snapshot.
    Dirty { original: T, current: T },
}

/// A JSON document on disk with load-on-open and explicit, change-aware flushing.
#[derive(Debug)]
pub struct JsonStore<T> {
    path: PathBuf,
    state: StoreState<T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default + Clone + PartialEq,
{
    /// Loads the store. A missing file yields the default value; a malformed one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let value = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => T::default(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| StoreError::Parse {
                path: path.display().to_string(),
                source: e,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("Store '{}' not found, starting empty.", path.display());
                T::default()
            }
            Err(e) => {
                return Err(StoreError::Read {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        Ok(Self {
            path,
            state: StoreState::Pristine(value),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> &T {
        match &self.state {
            StoreState::Pristine(value) | StoreState::Dirty { current: value, .. } => value,
        }
    }

    /// Mutable access. The first call snapshots the loaded value so `needs_saving`
    /// can tell a real change from a no-op edit.
    pub fn get_mut(&mut self) -> &mut T {
        if let StoreState::Pristine(_) = self.state {
            self.state = match std::mem::replace(&mut self.state, StoreState::Pristine(T::default())) {
                StoreState::Pristine(value) => StoreState::Dirty {
                    original: value.clone(),
                    current: value,
                },
                dirty => dirty,
            };
        }
        match &mut self.state {
            StoreState::Dirty { current, .. } | StoreState::Pristine(current) => current,
        }
    }

    pub fn needs_saving(&self) -> bool {
        match &self.state {
            StoreState::Pristine(_) => false,
            StoreState::Dirty { original, current } => original != current,
        }
    }

    /// Writes the document as pretty JSON when it changed. Returns whether a write happened.
    pub fn flush(&mut self) -> Result<bool, StoreError> {
        if !self.needs_saving() {
            log::debug!("Store '{}' unchanged, skipping write.", self.path.display());
            return Ok(false);
        }

        let json = serde_json::to_string_pretty(self.get()).map_err(|e| StoreError::Serialize {
            path: self.path.display().to_string(),
            source: e,
        })?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        fs::write(&self.path, json + "\n").map_err(|e| StoreError::Write {
            path: self.path.display().to_string(),
            source: e,
        })?;

        self.state = match std::mem::replace(&mut self.state, StoreState::Pristine(T::default())) {
            StoreState::Dirty { current, .. } => StoreState::Pristine(current),
            pristine => pristine,
        };
        log::debug!("Store '{}' written.", self.path.display());
        Ok(true)
    }
}
