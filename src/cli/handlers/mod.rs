// src/cli/handlers/mod.rs

pub mod add_dir;
pub mod commons;
pub mod completions;
pub mod list_dirs;
pub mod list_scripts;
pub mod new_script;
pub mod remove_dir;
pub mod run;
