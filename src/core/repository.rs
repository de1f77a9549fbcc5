// src/core/repository.rs

use crate::constants::SCRIPT_EXTENSION;
use crate::core::annotations::{self, AnnotationError};
use crate::models::{Script, ScriptId, ScriptOrigin};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Non-fatal problems met during discovery. Each one skips a directory or a single script.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Could not read script directory '{path}': {reason}")]
    UnreadableDir { path: String, reason: String },
    #[error("Could not read script '{path}': {source}")]
    UnreadableScript {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Invalid(#[from] AnnotationError),
}

/// A directory to scan, tagged with the origin its scripts get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    pub dir: PathBuf,
    pub origin: ScriptOrigin,
}

/// What `discover` found: the valid scripts, and everything that was skipped.
#[derive(Debug, Default)]
pub struct Discovery {
    pub scripts: Vec<Script>,
    pub skipped: Vec<DiscoveryError>,
}

/// The bundled directory plus the registered external ones, in priority order.
#[derive(Debug, Clone)]
pub struct ScriptRepository {
    sources: Vec<ScriptSource>,
}

impl ScriptRepository {
    pub fn new(sources: Vec<ScriptSource>) -> Self {
        Self { sources }
    }

    /// Bundled first, then the external directories in registration order.
    pub fn with_dirs(bundled_dir: Option<PathBuf>, external_dirs: &[String]) -> Self {
        let bundled = bundled_dir.map(|dir| ScriptSource {
            dir,
            origin: ScriptOrigin::Bundled,
        });
        let externals = external_dirs.iter().map(|dir| ScriptSource {
            dir: PathBuf::from(dir),
            origin: ScriptOrigin::External,
        });
        Self::new(bundled.into_iter().chain(externals).collect())
    }

    pub fn sources(&self) -> &[ScriptSource] {
        &self.sources
    }

    /// Directories in the order dependency names are probed.
    pub fn directories(&self) -> Vec<PathBuf> {
        self.sources.iter().map(|s| s.dir.clone()).collect()
    }

    /// Lists and parses every script of every source. Order: sources in priority order,
    /// files by name within a source. Nothing here aborts discovery.
    pub fn discover(&self) -> Discovery {
        let mut discovery = Discovery::default();
        let mut seen: HashSet<ScriptId> = HashSet::new();

        for source in &self.sources {
            let files = match list_script_files(&source.dir) {
                Ok(files) => files,
                Err(reason) => {
                    discovery.skipped.push(DiscoveryError::UnreadableDir {
                        path: source.dir.display().to_string(),
                        reason,
                    });
                    continue;
                }
            };
            log::debug!(
                "Found {} script(s) in {} directory '{}'",
                files.len(),
                source.origin,
                source.dir.display()
            );

            // Parsing is independent per file; `collect` keeps the listing order.
            let parsed: Vec<Result<Script, DiscoveryError>> = files
                .par_iter()
                .map(|path| load_script(&source.dir, path, source.origin))
                .collect();

            for result in parsed {
                match result {
                    Ok(script) if seen.insert(script.id.clone()) => discovery.scripts.push(script),
                    Ok(script) => log::debug!("Skipping '{}': already discovered.", script.id),
                    Err(e) => discovery.skipped.push(e),
                }
            }
        }

        discovery
    }
}

fn load_script(dir: &Path, path: &Path, origin: ScriptOrigin) -> Result<Script, DiscoveryError> {
    let content = fs::read_to_string(path).map_err(|e| DiscoveryError::UnreadableScript {
        path: path.display().to_string(),
        source: e,
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(annotations::parse_script(
        &content,
        ScriptId::new(dir, file_name),
        origin,
    )?)
}

/// The `.sh` files directly inside `dir`, sorted by file name.
pub fn list_script_files(dir: &Path) -> Result<Vec<PathBuf>, String> {
    if !dir.is_dir() {
        return Err(if dir.exists() {
            "not a directory".to_string()
        } else {
            "no such directory".to_string()
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| e.to_string())?;
        let is_script = entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXTENSION);
        if is_script {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_lists_only_shell_scripts_sorted() {
        let dir = tempdir().unwrap();
        write(dir.path(), "b.sh", "");
        write(dir.path(), "a.sh", "");
        write(dir.path(), "notes.md", "");
        fs::create_dir(dir.path().join("nested.sh")).unwrap();

        let files = list_script_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.sh", "b.sh"]);
    }

    #[test]
    fn test_discovery_order_and_origin() {
        let bundled = tempdir().unwrap();
        let external = tempdir().unwrap();
        write(bundled.path(), "z.sh", "# @vercel.name Zed\n");
        write(external.path(), "a.sh", "# @vercel.name Ay\n");
        write(external.path(), "z.sh", "# @vercel.name Other zed\n");

        let repo = ScriptRepository::with_dirs(
            Some(bundled.path().to_path_buf()),
            &[external.path().display().to_string()],
        );
        let discovery = repo.discover();

        assert!(discovery.skipped.is_empty());
        let names: Vec<_> = discovery.scripts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Zed", "Ay", "Other zed"]);
        assert_eq!(discovery.scripts[0].origin, ScriptOrigin::Bundled);
        assert_eq!(discovery.scripts[2].origin, ScriptOrigin::External);
        // Same file name, different directories: distinct identities.
        assert_ne!(discovery.scripts[0].id, discovery.scripts[2].id);
    }

    #[test]
    fn test_unreadable_dir_and_invalid_script_are_skipped() {
        let external = tempdir().unwrap();
        write(external.path(), "good.sh", "# @vercel.name Good\n");
        write(external.path(), "bad.sh", "# @vercel.opt {broken\n");

        let repo = ScriptRepository::with_dirs(
            None,
            &[
                "/definitely/not/a/real/dir".to_string(),
                external.path().display().to_string(),
            ],
        );
        let discovery = repo.discover();

        assert_eq!(discovery.scripts.len(), 1);
        assert_eq!(discovery.scripts[0].name, "Good");
        assert_eq!(discovery.skipped.len(), 2);
        assert!(matches!(discovery.skipped[0], DiscoveryError::UnreadableDir { .. }));
        assert!(matches!(discovery.skipped[1], DiscoveryError::Invalid(_)));
    }

    #[test]
    fn test_same_directory_registered_twice_is_discovered_once() {
        let external = tempdir().unwrap();
        write(external.path(), "a.sh", "");
        let dir = external.path().display().to_string();

        let repo = ScriptRepository::with_dirs(None, &[dir.clone(), dir]);
        assert_eq!(repo.discover().scripts.len(), 1);
    }
}
