// src/cli/handlers/commons.rs

// Shared plumbing for the handlers: stores, the cache directory and discovery output.

use anyhow::{Context, Result};
use colored::*;
use std::path::{Path, PathBuf};

use crate::{
    core::{
        paths,
        repository::{self, Discovery, ScriptRepository},
        store::JsonStore,
    },
    models::{GlobalConfig, ProjectState},
    system::runtime,
};

/// The files a run needs on disk before anything is executed.
#[derive(Debug)]
pub struct Workspace {
    pub runtime: PathBuf,
    pub repository: ScriptRepository,
}

pub fn open_global_store() -> Result<JsonStore<GlobalConfig>> {
    let path = paths::get_global_store_path()?;
    JsonStore::open(&path).with_context(|| format!(t!("common.error.store_open"), path = path.display()))
}

/// The per-project store lives in the directory vss is started from.
pub fn open_project_store() -> Result<JsonStore<ProjectState>> {
    let cwd = std::env::current_dir().context(t!("common.error.no_cwd"))?;
    let path = paths::get_project_store_path(&cwd);
    JsonStore::open(&path).with_context(|| format!(t!("common.error.store_open"), path = path.display()))
}

/// Writes the runtime wrapper and the bundled scripts to the cache directory and
/// builds the repository over them and the registered directories.
pub fn prepare_workspace(global: &GlobalConfig) -> Result<Workspace> {
    let cache_dir = paths::get_vss_cache_dir()?;
    let runtime = runtime::prepare_runtime(&cache_dir)?;
    let bundled = runtime::prepare_bundled_scripts(&cache_dir)?;
    Ok(Workspace {
        runtime,
        repository: ScriptRepository::with_dirs(Some(bundled), &global.script_dirs),
    })
}

/// Discovers scripts, reporting everything that was skipped.
pub fn discover(repository: &ScriptRepository) -> Discovery {
    let discovery = repository.discover();
    for skipped in &discovery.skipped {
        log::warn!("{}", skipped);
        print_warning(&skipped.to_string());
    }
    discovery
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", t!("common.warning").yellow().bold(), message);
}

/// Number of eligible scripts directly inside `dir`, or `None` if it cannot be listed.
pub fn count_scripts(dir: &Path) -> Option<usize> {
    repository::list_script_files(dir).ok().map(|files| files.len())
}
