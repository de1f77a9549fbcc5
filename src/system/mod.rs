//! # System Interaction Layer
//!
//! The boundary between the core logic and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: spawns one child process from a launch descriptor, streams or inherits its
//!   output and turns `Ctrl+C` into a clean interruption.
//! - **`git`**: lists the worktrees of a repository for the worktree picker.
//! - **`prompt`**: the terminal widgets, behind a trait so tests can answer for the user.
//! - **`runtime`**: the embedded runtime wrapper and bundled scripts, written to the cache
//!   directory, and the reader for the environment snapshots the wrapper leaves behind.

pub mod executor;
pub mod git;
pub mod prompt;
pub mod runtime;
