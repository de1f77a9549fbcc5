// src/system/git.rs

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// One entry of `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub path: PathBuf,
    pub head: String,
    /// Branch name without `refs/heads/`, or `(detached)`.
    pub branch: String,
}

impl Worktree {
    /// Path relative to `base_dir`, or the full path when it lives elsewhere.
    pub fn relative_path(&self, base_dir: &Path) -> PathBuf {
        self.path
            .strip_prefix(base_dir)
            .unwrap_or(&self.path)
            .to_path_buf()
    }

    /// `branch (relative/path)`, or just the branch for the base directory itself.
    pub fn display_name(&self, base_dir: &Path) -> String {
        let relative = self.relative_path(base_dir);
        if relative.as_os_str().is_empty() {
            self.branch.clone()
        } else {
            format!("{} ({})", self.branch, relative.display())
        }
    }
}

/// Lists the worktrees rooted at a directory. A seam so parameter resolution can be tested
/// without a git repository.
pub trait WorktreeSource {
    fn list(&self, base_dir: &Path) -> Vec<Worktree>;
}

/// Asks the `git` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitWorktrees;

impl WorktreeSource for GitWorktrees {
    fn list(&self, base_dir: &Path) -> Vec<Worktree> {
        list_worktrees(base_dir)
    }
}

/// Runs `git worktree list --porcelain` in `base_dir`. Any failure (no git, not a
/// repository, unreadable output) yields an empty list.
pub fn list_worktrees(base_dir: &Path) -> Vec<Worktree> {
    let output = match Command::new("git")
        .args(["worktree", "list", "--porcelain"])
        .current_dir(dunce::simplified(base_dir))
        .stdin(Stdio::null())
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            log::debug!("git could not be run in '{}': {}", base_dir.display(), e);
            return Vec::new();
        }
    };

    if !output.status.success() {
        log::debug!(
            "git worktree list failed in '{}' ({}): {}",
            base_dir.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return Vec::new();
    }

    parse_porcelain(&String::from_utf8_lossy(&output.stdout))
}

/// Parses porcelain records separated by blank lines. Records without a path or HEAD are skipped.
pub fn parse_porcelain(output: &str) -> Vec<Worktree> {
    let mut worktrees = Vec::new();
    let mut path: Option<PathBuf> = None;
    let mut head: Option<String> = None;
    let mut branch: Option<String> = None;

    let mut finish = |path: &mut Option<PathBuf>, head: &mut Option<String>, branch: &mut Option<String>| {
        if let (Some(path), Some(head)) = (path.take(), head.take()) {
            worktrees.push(Worktree {
                path,
                head,
                branch: branch.take().unwrap_or_else(|| "(detached)".to_string()),
            });
        }
        *branch = None;
    };

    for line in output.lines() {
        if line.trim().is_empty() {
            finish(&mut path, &mut head, &mut branch);
        } else if let Some(value) = line.strip_prefix("worktree ") {
            path = Some(PathBuf::from(value));
        } else if let Some(value) = line.strip_prefix("HEAD ") {
            head = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("branch ") {
            branch = Some(value.strip_prefix("refs/heads/").unwrap_or(value).to_string());
        }
    }
    finish(&mut path, &mut head, &mut branch);

    worktrees
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PORCELAIN: &str = "worktree /home/user/project
HEAD 1234567890abcdef1234567890abcdef12345678
branch refs/heads/main

worktree /home/user/project/worktrees/feature
HEAD abcdef1234567890abcdef1234567890abcdef12
branch refs/heads/feature-branch

worktree /home/user/project-detached
HEAD fedcba0987654321fedcba0987654321fedcba09
detached
";

    #[test]
    fn test_parse_porcelain() {
        let worktrees = parse_porcelain(PORCELAIN);
        assert_eq!(worktrees.len(), 3);
        assert_eq!(worktrees[0].path, PathBuf::from("/home/user/project"));
        assert_eq!(worktrees[0].branch, "main");
        assert_eq!(worktrees[1].branch, "feature-branch");
        assert_eq!(worktrees[1].head, "abcdef1234567890abcdef1234567890abcdef12");
        assert_eq!(worktrees[2].branch, "(detached)");
    }

    #[test]
    fn test_parse_without_trailing_blank_line() {
        let worktrees = parse_porcelain("worktree /a\nHEAD 1\nbranch refs/heads/x");
        assert_eq!(worktrees.len(), 1);
        assert_eq!(worktrees[0].branch, "x");
    }

    #[test]
    fn test_display_name() {
        let base = Path::new("/home/user/project");
        let worktrees = parse_porcelain(PORCELAIN);
        assert_eq!(worktrees[0].display_name(base), "main");
        assert_eq!(
            worktrees[1].display_name(base),
            "feature-branch (worktrees/feature)"
        );
        assert_eq!(
            worktrees[2].display_name(base),
            "(detached) (/home/user/project-detached)"
        );
    }

    #[test]
    fn test_non_repository_yields_empty_list() {
        let dir = tempdir().unwrap();
        assert!(list_worktrees(dir.path()).is_empty());
        assert!(list_worktrees(&dir.path().join("missing")).is_empty());
    }
}
